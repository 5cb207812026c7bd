//! External collaborator interfaces: speech-to-text, machine translation,
//! WER scoring and host resource checks. Each trait ships a deterministic
//! or no-op implementation so the worker pipeline can be built and tested
//! without real model weights or API keys.

pub mod error;
pub mod metrics;
pub mod mt;
pub mod stt;
pub mod wer;

pub use error::{EngineError, EngineResult};
pub use metrics::{SysinfoMetrics, SystemMetrics};
pub use mt::{MtEngine, TaggingMtEngine};
pub use stt::{EchoSttEngine, SttEngine, Transcription};
pub use wer::{validate_hypothesis, LevenshteinWer, WerCalculator};
