use crate::{env_or_default, env_parsed, ConfigError, FromEnv};

/// External engine selection and quality gates (`STT_MODEL`, `WER_THRESHOLD`).
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Identifier of the speech-to-text model/backend to invoke.
    pub stt_model: String,
    /// Maximum acceptable word error rate, in [0, 1], above which a
    /// transcription is flagged rather than passed downstream.
    pub wer_threshold: f32,
}

impl FromEnv for EngineSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let wer_threshold = env_parsed("WER_THRESHOLD", "0.3")?;
        if !(0.0..=1.0).contains(&wer_threshold) {
            return Err(ConfigError::ParseError {
                key: "WER_THRESHOLD".to_string(),
                details: format!("must be within [0, 1], got {}", wer_threshold),
            });
        }

        Ok(Self {
            stt_model: env_or_default("STT_MODEL", "whisper-base"),
            wer_threshold,
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stt_model: "whisper-base".to_string(),
            wer_threshold: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [("STT_MODEL", None::<&str>), ("WER_THRESHOLD", None::<&str>)],
            || {
                let settings = EngineSettings::from_env().unwrap();
                assert_eq!(settings.stt_model, "whisper-base");
                assert!((settings.wer_threshold - 0.3).abs() < f32::EPSILON);
            },
        );
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        temp_env::with_var("WER_THRESHOLD", Some("1.5"), || {
            assert!(EngineSettings::from_env().is_err());
        });
    }
}
