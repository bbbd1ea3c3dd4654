//! detect - one-shot pipeline check.
//!
//! Runs the detection data path once over a local image and writes the
//! annotated result, without touching the messaging stack. Useful for
//! validating a model and thresholds on the bench before deploying the bot.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use watchpost::config::ModelSettings;
use watchpost::{
    build_backend, compose_alert, filter_and_draw, prepare, FileConfig, ImageSource,
    OverlayPainter,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the detection pipeline once over an image")]
struct Args {
    /// Image to run detection on.
    image: PathBuf,

    /// Detector backend ('stub' or 'tract').
    #[arg(long, default_value = "stub")]
    backend: String,

    /// ONNX model path (tract backend).
    #[arg(long, env = "WATCHPOST_MODEL_PATH", default_value = "models/person.onnx")]
    model: PathBuf,

    /// Model input resolution.
    #[arg(long, default_value_t = 640)]
    input_size: u32,

    /// Confidence threshold.
    #[arg(long, default_value_t = 0.50)]
    conf: f32,

    /// IoU threshold for suppression.
    #[arg(long, default_value_t = 0.45)]
    iou: f32,

    /// Annotated output path.
    #[arg(long, default_value = "results/detection.jpg")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let model = ModelSettings {
        path: args.model.clone(),
        backend: args.backend.clone(),
        input_size: args.input_size,
        class_names: vec!["person".to_string()],
    };
    let mut detector = build_backend(&model)?;
    detector.warm_up()?;

    let source = ImageSource::file(FileConfig {
        path: args.image.clone(),
    });
    let frame = source.capture()?;
    let (input, transform) = prepare(&frame, args.input_size)?;
    let raw = detector.infer(&input)?;

    let painter = OverlayPainter::new(model.class_names.clone());
    let (candidates, annotated) = filter_and_draw(
        &raw,
        args.conf,
        args.iou,
        Some(&[0]),
        &transform,
        &frame,
        &painter,
    );

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    annotated.save(&args.output)?;

    println!(
        "{} | count={} | output={}",
        compose_alert(candidates.len()).replace('\n', " "),
        candidates.len(),
        args.output.display()
    );
    Ok(())
}
