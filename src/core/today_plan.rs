use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::document::Document;
use super::project::ProjectStatus;
use super::task::{Column, Priority};

/// One planned entry: a pointer into a project plus display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub task_id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
}

/// The day's task selection, regenerated at most once per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayPlan {
    pub date: NaiveDate,
    pub tasks: Vec<PlannedTask>,
    pub populated_at: DateTime<Utc>,
}

impl TodayPlan {
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.date != today
    }
}

pub const DEFAULT_WEIGHT: u32 = 5;

/// Select today's tasks across active projects, proportional to each
/// project's weight (roughly weight/10 tasks, at least one when any are
/// available). Candidate order within a project: upnext, then in_progress,
/// then todo; tasks already in `done` are skipped.
///
/// Returns `None` when the document already has a non-empty plan for
/// `today`; population is idempotent per date.
pub fn populate_today(
    doc: &Document,
    today: NaiveDate,
    weights: &HashMap<String, u32>,
    now: DateTime<Utc>,
) -> Option<TodayPlan> {
    if let Some(ref existing) = doc.today_plan {
        if !existing.is_stale(today) && !existing.tasks.is_empty() {
            return None;
        }
    }

    let mut planned = Vec::new();
    for project in doc.projects.iter().filter(|p| p.status == ProjectStatus::Active) {
        let weight = weights.get(&project.id).copied().unwrap_or(DEFAULT_WEIGHT);
        let done_ids: Vec<&str> = project
            .column(Column::Done)
            .iter()
            .map(|t| t.id.as_str())
            .collect();

        let available: Vec<_> = project
            .column(Column::Upnext)
            .iter()
            .chain(project.column(Column::InProgress))
            .chain(project.column(Column::Todo))
            .filter(|t| !done_ids.contains(&t.id.as_str()))
            .collect();
        if available.is_empty() {
            continue;
        }

        let count = ((weight as usize).div_ceil(10).max(1)).min(available.len());
        for task in &available[..count] {
            planned.push(PlannedTask {
                task_id: task.id.clone(),
                project_id: project.id.clone(),
                title: task.title.clone(),
                priority: task.priority,
            });
        }
    }

    Some(TodayPlan {
        date: today,
        tasks: planned,
        populated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::Project;
    use crate::core::task::Task;

    fn make_doc() -> Document {
        let mut heavy = Project::new("heavy", "Heavy");
        for i in 0..6 {
            heavy.column_mut(Column::Upnext).push(Task::new(format!("h{i}")));
        }
        let mut light = Project::new("light", "Light");
        light.column_mut(Column::Todo).push(Task::new("l0"));
        light.column_mut(Column::Todo).push(Task::new("l1"));
        let mut paused = Project::new("paused", "Paused");
        paused.status = ProjectStatus::Paused;
        paused.column_mut(Column::Todo).push(Task::new("p0"));

        let mut doc = Document::default();
        doc.projects = vec![heavy, light, paused];
        doc
    }

    #[test]
    fn weights_scale_selection() {
        let doc = make_doc();
        let weights = HashMap::from([("heavy".to_string(), 40)]);
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let plan = populate_today(&doc, today, &weights, Utc::now()).unwrap();

        let heavy_count = plan.tasks.iter().filter(|t| t.project_id == "heavy").count();
        let light_count = plan.tasks.iter().filter(|t| t.project_id == "light").count();
        assert_eq!(heavy_count, 4); // weight 40 → 4 tasks
        assert_eq!(light_count, 1); // default weight 5 → 1 task
        assert!(plan.tasks.iter().all(|t| t.project_id != "paused"));
    }

    #[test]
    fn population_is_idempotent_per_date() {
        let mut doc = make_doc();
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let plan = populate_today(&doc, today, &HashMap::new(), Utc::now()).unwrap();
        doc.today_plan = Some(plan);

        assert!(populate_today(&doc, today, &HashMap::new(), Utc::now()).is_none());

        // A stale plan gets replaced.
        let tomorrow = today.succ_opt().unwrap();
        assert!(populate_today(&doc, tomorrow, &HashMap::new(), Utc::now()).is_some());
    }
}
