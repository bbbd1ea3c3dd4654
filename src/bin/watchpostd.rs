//! watchpostd - edge person-detection alert bot daemon.
//!
//! This daemon:
//! 1. Loads layered configuration (file, environment) and fails fast on a
//!    missing bot token
//! 2. Builds the acquisition source, detector backend, and overlay painter
//! 3. Long-polls Telegram for the trigger command
//! 4. Runs one capture -> detect -> alert cycle per trigger, sequentially
//! 5. Delivers the annotated photo and alert text with bounded retry
//! 6. Converts cycle failures into text alerts and keeps running

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use watchpost::{
    build_backend, BotConfig, BotService, Dispatcher, ImageSource, OverlayPainter, RetryPolicy,
    ServiceSettings, TelegramClient, TelegramPoller,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Edge person-detection alert bot")]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "WATCHPOST_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = BotConfig::load_from(args.config.as_deref())?;

    let client = TelegramClient::new(&cfg.telegram);
    let poller = TelegramPoller::new(
        client.clone(),
        cfg.poll.timeout_secs,
        cfg.poll.command.clone(),
    );
    let dispatcher = Dispatcher::new(
        Box::new(client),
        RetryPolicy::from_settings(&cfg.retry),
    );

    let images = ImageSource::from_config(&cfg.capture);
    let mut detector = build_backend(&cfg.model)?;
    detector.warm_up()?;

    let mut painter = OverlayPainter::new(cfg.model.class_names.clone());
    if let Some(font_path) = &cfg.output.font_path {
        painter = painter.with_font_path(font_path);
    }

    log::info!("watchpostd starting");
    log::info!("  source: {}", images.describe());
    log::info!(
        "  detector: {} (input {}px, conf {}, iou {})",
        detector.name(),
        cfg.model.input_size,
        cfg.detection.confidence_threshold,
        cfg.detection.iou_threshold
    );
    log::info!("  trigger command: {}", cfg.poll.command);
    log::info!("  output: {}", cfg.output.path.display());
    log::info!(
        "  retry: {} attempt(s), {:?} delay",
        cfg.retry.max_attempts,
        cfg.retry.delay
    );

    let settings = ServiceSettings::from_config(&cfg);
    let mut service = BotService::new(
        Box::new(poller),
        images,
        detector,
        dispatcher,
        painter,
        settings,
    );
    service.run()
}
