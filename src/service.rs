//! Command-driven service loop.
//!
//! The service is a single sequential worker: it polls the command source,
//! then runs one full detection cycle per trigger - capture, preprocess,
//! infer, postprocess, write the annotated output, and deliver photo plus
//! alert text through the retrying dispatcher. A cycle runs to completion
//! (including all dispatch attempts) before the next trigger is examined,
//! which also serializes writes to the shared output path.
//!
//! A failing cycle never terminates the loop: the error is logged, converted
//! into a best-effort text alert to the requester, and the service returns
//! to polling.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::alert::AlertEvent;
use crate::capture::ImageSource;
use crate::config::BotConfig;
use crate::detect::DetectorBackend;
use crate::dispatch::{ChatId, DispatchOutcome, Dispatcher};
use crate::vision::{filter_and_draw, prepare, OverlayPainter};

/// Pause before re-polling after a command-source failure.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// One recognized inbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    /// Chat the command arrived from.
    pub chat: ChatId,
}

/// Source of trigger commands.
///
/// Implementations may block (long polling); returning an empty batch is
/// fine and simply means no trigger arrived this round.
pub trait CommandSource {
    fn next_triggers(&mut self) -> Result<Vec<Trigger>>;
}

/// Per-cycle tunables, fixed at startup.
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub class_filter: Option<Vec<u32>>,
    /// Annotated frame destination, overwritten each cycle.
    pub output_path: PathBuf,
    /// Fixed alert destination; `None` replies to the requester.
    pub destination: Option<ChatId>,
}

impl ServiceSettings {
    pub fn from_config(cfg: &BotConfig) -> Self {
        Self {
            input_size: cfg.model.input_size,
            confidence_threshold: cfg.detection.confidence_threshold,
            iou_threshold: cfg.detection.iou_threshold,
            class_filter: cfg.detection.class_filter.clone(),
            output_path: cfg.output.path.clone(),
            destination: cfg.telegram.chat_id,
        }
    }
}

/// What one completed cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    pub count: usize,
    /// Photo delivery outcome; absent when the event carried no photo.
    pub photo: Option<DispatchOutcome>,
    pub text: DispatchOutcome,
}

/// The detection-and-alert service.
pub struct BotService {
    source: Box<dyn CommandSource>,
    images: ImageSource,
    detector: Box<dyn DetectorBackend>,
    dispatcher: Dispatcher,
    painter: OverlayPainter,
    settings: ServiceSettings,
}

impl BotService {
    pub fn new(
        source: Box<dyn CommandSource>,
        images: ImageSource,
        detector: Box<dyn DetectorBackend>,
        dispatcher: Dispatcher,
        painter: OverlayPainter,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            source,
            images,
            detector,
            dispatcher,
            painter,
            settings,
        }
    }

    /// Run until externally terminated.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if let Err(err) = self.poll_once() {
                log::error!(
                    "command polling failed: {:#}; retrying in {:?}",
                    err,
                    POLL_RETRY_DELAY
                );
                std::thread::sleep(POLL_RETRY_DELAY);
            }
        }
    }

    /// Fetch one batch of triggers and process them strictly in order.
    ///
    /// Returns the number of triggers processed.
    pub fn poll_once(&mut self) -> Result<usize> {
        let triggers = self.source.next_triggers()?;
        let count = triggers.len();
        for trigger in triggers {
            self.process_trigger(trigger);
        }
        Ok(count)
    }

    /// Run one cycle for a trigger, converting any failure into a
    /// best-effort text alert to the requester.
    pub fn process_trigger(&mut self, trigger: Trigger) {
        match self.run_cycle(trigger) {
            Ok(report) => {
                log::info!(
                    "cycle complete: count={} photo_attempts={:?} text_attempts={} output={}",
                    report.count,
                    report.photo.as_ref().map(DispatchOutcome::attempts),
                    report.text.attempts(),
                    self.settings.output_path.display()
                );
            }
            Err(err) => {
                log::error!("detection cycle failed: {:#}", err);
                let event = AlertEvent::failure(format!("Detection cycle failed: {:#}", err));
                let outcome = self.dispatcher.send_text(trigger.chat, &event.text);
                if !outcome.is_delivered() {
                    log::warn!(
                        "failure alert not delivered after {} attempt(s)",
                        outcome.attempts()
                    );
                }
            }
        }
    }

    fn run_cycle(&mut self, trigger: Trigger) -> Result<CycleReport> {
        let frame = self.images.capture()?;
        log::debug!(
            "captured {}x{} frame ({:?})",
            frame.width(),
            frame.height(),
            frame.origin()
        );

        let (input, transform) = prepare(&frame, self.settings.input_size)?;
        let raw = self
            .detector
            .infer(&input)
            .with_context(|| format!("{} backend inference failed", self.detector.name()))?;

        let (candidates, annotated) = filter_and_draw(
            &raw,
            self.settings.confidence_threshold,
            self.settings.iou_threshold,
            self.settings.class_filter.as_deref(),
            &transform,
            &frame,
            &self.painter,
        );
        let count = candidates.len();

        write_annotated(&self.settings.output_path, &annotated)?;
        let jpeg = encode_jpeg(&annotated)?;
        let event = AlertEvent::detection(count, jpeg);

        let chat = self.settings.destination.unwrap_or(trigger.chat);
        let photo = event
            .photo
            .as_deref()
            .map(|jpeg| self.dispatcher.send_photo(chat, jpeg, None));
        let text = self.dispatcher.send_text(chat, &event.text);

        Ok(CycleReport { count, photo, text })
    }
}

/// Write the annotated frame to the shared output path, creating parent
/// directories as needed.
fn write_annotated(path: &Path, annotated: &RgbImage) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }
    }
    annotated
        .save(path)
        .with_context(|| format!("write annotated frame to {}", path.display()))
}

fn encode_jpeg(annotated: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    annotated
        .write_to(&mut buffer, image::ImageFormat::Jpeg)
        .context("encode annotated frame as JPEG")?;
    Ok(buffer.into_inner())
}
