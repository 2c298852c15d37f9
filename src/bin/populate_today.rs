use std::sync::Arc;

use chrono::{Datelike, Local};

use plank::config::Config;
use plank::mutate::DocumentMutator;
use plank::store::RemoteStore;

/// Daily plan populator, meant to run from a scheduler each morning.
/// Skips configured rest days and never overwrites a plan already set for
/// today.
#[tokio::main]
async fn main() {
    systemd_journal_logger::JournalLog::new()
        .unwrap()
        .with_syslog_identifier("plank-populate-today".to_string())
        .install()
        .unwrap();
    log::set_max_level(log::LevelFilter::Info);

    let config = Config::from_env();

    let now = Local::now();
    let weekday = now.weekday().num_days_from_sunday();
    if config.rest_days.contains(&weekday) {
        println!("Skipping — today is a rest day ({})", now.weekday());
        return;
    }

    let store = match RemoteStore::from_config(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Store error: {e}");
            std::process::exit(1);
        }
    };
    let mutator = DocumentMutator::new(store, config.write_attempts);

    match mutator
        .populate_today(now.date_naive(), &config.plan_weights)
        .await
    {
        Ok(0) => println!("Today's plan already populated"),
        Ok(count) => println!("Populated {count} task(s) for {}", now.date_naive()),
        Err(e) => {
            eprintln!("Populate failed: {e}");
            std::process::exit(1);
        }
    }
}
