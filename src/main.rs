// CLI entry point: capture the primary display until Ctrl-C

use screensnap::{CaptureConfig, CaptureSession, DisplaySource};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match CaptureConfig::from_json_file(std::path::Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        None => CaptureConfig::default(),
    };

    let source = DisplaySource::new(config.frame_rate);
    let session = CaptureSession::new(source, config);

    session.start().await;
    log::info!(
        "[Main] Capturing to {}; press Ctrl-C to stop",
        session.output_dir().display()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[Main] Failed to listen for shutdown signal: {}", e);
    }

    session.stop().await;

    let stats = session.stats().await;
    println!(
        "Captured {} snapshots in {:.1}s ({} skipped, {} dropped) -> {}",
        stats.written,
        stats.duration,
        stats.skipped,
        stats.dropped,
        session.output_dir().display()
    );
}
