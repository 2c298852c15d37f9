use plank::config::Config;
use plank::server::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Log to the systemd user journal (`journalctl --user -t plank -f`).
    systemd_journal_logger::JournalLog::new()?
        .with_syslog_identifier("plank".to_string())
        .install()?;
    plank::set_debug_logging(config.debug_logging);
    log::set_max_level(if config.debug_logging {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    if config.store_url().is_empty() || config.store_token.is_none() {
        log::warn!(
            "Document store not configured (PLANK_STORE_REPO / PLANK_STORE_TOKEN); \
             mutations will fail until it is"
        );
    }

    let state = AppState::from_config(&config);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("Serving board API on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
