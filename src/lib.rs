//! Watchpost - edge person-detection alert bot.
//!
//! This crate implements the detection-and-alert pipeline behind `watchpostd`:
//! a chat command triggers one capture -> detect -> alert cycle, and the
//! annotated photo plus an alert text are pushed back to the requesting chat.
//!
//! # Architecture
//!
//! One cycle flows through the components in order:
//!
//! 1. `capture`: acquire a frame from a fixed image file or an external
//!    still-capture process.
//! 2. `vision::preprocess`: letterbox the frame into the model input tensor,
//!    recording the invertible resize/pad transform.
//! 3. `detect`: run an opaque detector backend over the tensor.
//! 4. `vision::postprocess`: threshold, suppress, rescale to frame
//!    coordinates, and draw overlays on a copy of the frame.
//! 5. `alert` + `dispatch`: compose the alert and deliver photo and text
//!    with bounded retry.
//!
//! Cycles are strictly sequential: the service loop in `service` runs one
//! cycle to completion (including all dispatch attempts) before looking at
//! the next trigger, so the shared annotated-output path is never written
//! concurrently.
//!
//! # Module Structure
//!
//! - `config`: layered configuration (file, environment, validation)
//! - `frame`: captured frame with origin tag
//! - `capture`: acquisition sources (file / device)
//! - `detect`: detector backend contract and implementations
//! - `vision`: preprocessing, postprocessing, overlay drawing
//! - `alert`: detection count -> alert text
//! - `dispatch`: retrying message dispatcher
//! - `telegram`: Telegram Bot API transport and command poller
//! - `service`: command-driven service loop

pub mod alert;
pub mod capture;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod frame;
pub mod service;
pub mod telegram;
pub mod vision;

pub use alert::{compose_alert, AlertEvent};
pub use capture::{AcquisitionError, DeviceConfig, FileConfig, ImageSource};
pub use config::{BotConfig, CaptureMode};
pub use detect::{build_backend, DetectionCandidate, DetectorBackend, RawDetection, StubBackend};
pub use dispatch::{
    ChatId, ChatTransport, Clock, DispatchOutcome, Dispatcher, RetryPolicy, SystemClock,
    TransportError, TransportErrorKind,
};
pub use frame::{Frame, FrameOrigin};
pub use service::{BotService, CommandSource, ServiceSettings, Trigger};
pub use telegram::{TelegramClient, TelegramPoller};
pub use vision::{filter_and_draw, prepare, LetterboxTransform, ModelInput, OverlayPainter};
