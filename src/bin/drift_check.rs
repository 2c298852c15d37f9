use std::sync::Arc;

use plank::config::Config;
use plank::core::document::{Document, TaskLocation};
use plank::core::task::{Column, ColumnTarget, TaskPatch};
use plank::overrides::store::OverrideStore;
use plank::overrides::Placement;
use plank::sync::api::ApiClient;

#[tokio::main]
async fn main() {
    systemd_journal_logger::JournalLog::new()
        .unwrap()
        .with_syslog_identifier("plank-drift-check".to_string())
        .install()
        .unwrap();
    log::set_max_level(log::LevelFilter::Info);

    let prune = std::env::args().any(|a| a == "--prune");
    let config = Config::from_env();

    println!("=== Overrides vs Snapshot ===\n");

    let api = match ApiClient::new(&config.api_base) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            println!("Client error: {e}");
            return;
        }
    };

    let doc = match api.fetch_snapshot().await {
        Ok(doc) => doc,
        Err(e) => {
            println!("Snapshot fetch failed: {e}");
            return;
        }
    };

    let mut store = OverrideStore::open(config.overrides_dir());
    let overrides = store.snapshot().clone();

    println!(
        "Snapshot: {} projects, {} loose todos, last updated {}",
        doc.projects.len(),
        doc.todos.len(),
        doc.last_updated
    );
    for project in &doc.projects {
        let (done, total) = project.completion_ratio();
        println!("  {} [{}]: {done}/{total} done", project.name, project.id);
    }
    println!(
        "Overrides: {} task records, {} orders, {} local tasks, {} reminders\n",
        overrides.tasks.len(),
        overrides.orders.len(),
        overrides.local_tasks.len(),
        overrides.reminders.len()
    );

    let mut redundant: Vec<String> = Vec::new();
    let mut active = Vec::new();
    let mut orphaned = Vec::new();

    for (task_id, ov) in &overrides.tasks {
        let placement_done = placement_redundant(&doc, task_id, &ov.placement);
        let patch_done = match ov.patch {
            Some(ref patch) => patch_redundant(&doc, task_id, patch),
            None => true,
        };

        if !doc.contains_task(task_id) && !matches!(ov.placement, Placement::Unset) {
            orphaned.push(task_id.clone());
        } else if placement_done && patch_done {
            redundant.push(task_id.clone());
        } else {
            active.push(task_id.clone());
        }
    }

    let mut committed_locals = Vec::new();
    for local in &overrides.local_tasks {
        if doc.contains_task(&local.task.id) {
            committed_locals.push(local.task.id.clone());
        }
    }

    report("Redundant (snapshot already encodes them)", &redundant);
    report("Active (still ahead of the snapshot)", &active);
    report("Orphaned (task id absent from snapshot)", &orphaned);
    report("Local tasks now committed", &committed_locals);

    let pending_locals = overrides.local_tasks.len() - committed_locals.len();
    if pending_locals > 0 {
        println!("\n{pending_locals} local task(s) still awaiting commit");
    }

    if prune {
        for id in &redundant {
            store.clear_task(id);
        }
        for id in &committed_locals {
            store.remove_local_task(id);
        }
        println!(
            "\nPruned {} redundant override(s) and {} committed local task(s)",
            redundant.len(),
            committed_locals.len()
        );
    } else if !redundant.is_empty() || !committed_locals.is_empty() {
        println!("\nRun with --prune to delete the redundant entries");
    }
}

fn report(label: &str, ids: &[String]) {
    println!("{label}: {}", ids.len());
    for id in ids {
        println!("  - {id}");
    }
}

/// Whether the snapshot already places the task where the override wants it.
fn placement_redundant(doc: &Document, task_id: &str, placement: &Placement) -> bool {
    let located = doc.locate_task(task_id);
    match placement {
        Placement::Unset => true,
        Placement::MovedTo(target) => match located {
            Some(TaskLocation::Project(pi, col, idx)) => {
                let task = &doc.projects[pi].column(col)[idx];
                let column_matches = col == target.storage_column();
                match target {
                    ColumnTarget::Assignee(name) => {
                        column_matches && task.assignee.as_deref() == Some(name.as_str())
                    }
                    ColumnTarget::Column(_) => column_matches,
                }
            }
            _ => false,
        },
        Placement::Completed(completed) => match located {
            Some(TaskLocation::Project(_, col, _)) => (col == Column::Done) == *completed,
            Some(loc @ TaskLocation::Loose(_)) => {
                doc.get_task(&loc).completed_at.is_some() == *completed
            }
            None => false,
        },
    }
}

/// Whether every patched field already matches the canonical task.
fn patch_redundant(doc: &Document, task_id: &str, patch: &TaskPatch) -> bool {
    let Some(loc) = doc.locate_task(task_id) else {
        return false;
    };
    let task = doc.get_task(&loc);
    let mut merged = task.clone();
    merged.apply_patch(patch);
    merged == *task
}
