use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crease::command::{response_json, Command};
use crease::compactor;
use crease::config::Settings;
use crease::engine::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries replies, so logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let settings = Settings::from_env();
    crease::observability::init(settings.metrics_port)?;
    std::fs::create_dir_all(&settings.data_dir)?;

    let engine = Arc::new(Engine::from_settings(&settings)?);
    let compactor_engine = engine.clone();
    let threshold = settings.compact_threshold;
    tokio::spawn(async move {
        compactor::run_compactor(compactor_engine, threshold).await;
    });

    let cfg = engine.effective_config();
    info!("crease ready, reading commands from stdin");
    info!("  journal: {}", settings.journal_path().display());
    info!(
        "  slots: {} min, hours {}-{}, operators {}",
        cfg.slot_minutes, cfg.business_start, cfg.business_end, cfg.operator_capacity
    );
    info!("  lock timeout: {:?}", settings.lock_timeout);
    info!(
        "  metrics: {}",
        settings
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown on SIGTERM/ctrl-c; EOF on stdin also stops the loop.
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let result = match Command::from_json(&line) {
                    Ok(cmd) => engine.execute(cmd).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    tracing::debug!("command failed: {e}");
                }
                let mut out = serde_json::to_string(&response_json(&result))?;
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("crease stopped");
    Ok(())
}
