pub mod change_request;
pub mod document;
pub mod idea;
pub mod project;
pub mod task;
pub mod today_plan;
