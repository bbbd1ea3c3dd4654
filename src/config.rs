use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MODEL_PATH: &str = "models/person.onnx";
const DEFAULT_MODEL_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.50;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_PERSON_CLASS_ID: u32 = 0;
const DEFAULT_IMAGE_PATH: &str = "assets/sample.jpg";
const DEFAULT_CAPTURE_COMMAND: &str = "libcamera-still";
const DEFAULT_CAPTURE_PATH: &str = "results/capture.jpg";
const DEFAULT_OUTPUT_PATH: &str = "results/detection.jpg";
const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 25;
const DEFAULT_TRIGGER_COMMAND: &str = "/photo";

#[derive(Debug, Deserialize, Default)]
struct BotConfigFile {
    model: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
    capture: Option<CaptureConfigFile>,
    output: Option<OutputConfigFile>,
    telegram: Option<TelegramConfigFile>,
    retry: Option<RetryConfigFile>,
    poll: Option<PollConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    backend: Option<String>,
    input_size: Option<u32>,
    class_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    class_filter: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    mode: Option<String>,
    image_path: Option<PathBuf>,
    capture_command: Option<String>,
    capture_args: Option<Vec<String>>,
    capture_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    path: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramConfigFile {
    chat_id: Option<i64>,
    api_base: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RetryConfigFile {
    max_attempts: Option<u32>,
    delay_secs: Option<u64>,
    retry_permanent: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct PollConfigFile {
    timeout_secs: Option<u64>,
    command: Option<String>,
}

/// Acquisition mode, fixed once per deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    File,
    Device,
}

impl CaptureMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "file" => Ok(CaptureMode::File),
            "device" => Ok(CaptureMode::Device),
            other => Err(anyhow!(
                "capture mode must be 'file' or 'device', got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub model: ModelSettings,
    pub detection: DetectionSettings,
    pub capture: CaptureSettings,
    pub output: OutputSettings,
    pub telegram: TelegramSettings,
    pub retry: RetrySettings,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub backend: String,
    pub input_size: u32,
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Class ids to keep; `None` keeps every class.
    pub class_filter: Option<Vec<u32>>,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    pub image_path: PathBuf,
    pub capture_command: String,
    pub capture_args: Vec<String>,
    pub capture_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub path: PathBuf,
    pub font_path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct TelegramSettings {
    /// Bot token, from `TELEGRAM_BOT_TOKEN`. Never logged.
    pub token: String,
    /// Fixed destination chat; `None` replies to the requester.
    pub chat_id: Option<i64>,
    pub api_base: String,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay: Duration,
    pub retry_permanent: bool,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub command: String,
}

impl BotConfig {
    /// Load configuration from the file named by `WATCHPOST_CONFIG` (if any),
    /// apply environment overrides, and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WATCHPOST_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load configuration from an explicit file path (or defaults when `None`).
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BotConfigFile) -> Result<Self> {
        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            path: model_file
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            backend: model_file
                .backend
                .unwrap_or_else(|| DEFAULT_MODEL_BACKEND.to_string()),
            input_size: model_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            class_names: model_file
                .class_names
                .unwrap_or_else(|| vec!["person".to_string()]),
        };

        let detection_file = file.detection.unwrap_or_default();
        let detection = DetectionSettings {
            confidence_threshold: detection_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detection_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            class_filter: Some(
                detection_file
                    .class_filter
                    .unwrap_or_else(|| vec![DEFAULT_PERSON_CLASS_ID]),
            ),
        };

        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureSettings {
            mode: match capture_file.mode {
                Some(mode) => CaptureMode::parse(&mode)?,
                None => CaptureMode::File,
            },
            image_path: capture_file
                .image_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_PATH)),
            capture_command: capture_file
                .capture_command
                .unwrap_or_else(|| DEFAULT_CAPTURE_COMMAND.to_string()),
            capture_args: capture_file.capture_args.unwrap_or_default(),
            capture_path: capture_file
                .capture_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_PATH)),
        };

        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            path: output_file
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            font_path: output_file.font_path,
        };

        let telegram_file = file.telegram.unwrap_or_default();
        let telegram = TelegramSettings {
            token: String::new(),
            chat_id: telegram_file.chat_id,
            api_base: telegram_file
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        };

        let retry_file = file.retry.unwrap_or_default();
        let retry = RetrySettings {
            max_attempts: retry_file.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            delay: Duration::from_secs(
                retry_file.delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS),
            ),
            retry_permanent: retry_file.retry_permanent.unwrap_or(false),
        };

        let poll_file = file.poll.unwrap_or_default();
        let poll = PollSettings {
            timeout_secs: poll_file.timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            command: poll_file
                .command
                .unwrap_or_else(|| DEFAULT_TRIGGER_COMMAND.to_string()),
        };

        Ok(Self {
            model,
            detection,
            capture,
            output,
            telegram,
            retry,
            poll,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.token = token;
        }
        if let Ok(chat) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat.trim().is_empty() {
                let id: i64 = chat
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("TELEGRAM_CHAT_ID must be an integer chat id"))?;
                self.telegram.chat_id = Some(id);
            }
        }
        if let Ok(mode) = std::env::var("WATCHPOST_CAPTURE_MODE") {
            if !mode.trim().is_empty() {
                self.capture.mode = CaptureMode::parse(&mode)?;
            }
        }
        if let Ok(path) = std::env::var("WATCHPOST_IMAGE_PATH") {
            if !path.trim().is_empty() {
                self.capture.image_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("WATCHPOST_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("WATCHPOST_OUTPUT_PATH") {
            if !path.trim().is_empty() {
                self.output.path = PathBuf::from(path);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(anyhow!(
                "TELEGRAM_BOT_TOKEN must be set (the bot cannot deliver alerts without it)"
            ));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model.input_size must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(anyhow!("detection.confidence_threshold must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(anyhow!("detection.iou_threshold must be in [0, 1]"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.capture.mode == CaptureMode::Device
            && self.capture.capture_command.trim().is_empty()
        {
            return Err(anyhow!(
                "capture.capture_command is required in device capture mode"
            ));
        }
        if self.poll.command.trim().is_empty() {
            return Err(anyhow!("poll.command must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<BotConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
