use crate::{env_list, env_or_default, env_parsed, ConfigError, FromEnv};

/// Task lifecycle and upload policy (`TASK_*`, `UPLOAD_DIR`, `RESULT_DIR`,
/// `MAX_FILE_SIZE`, `ALLOWED_AUDIO_FORMATS`, `SUPPORTED_LANGUAGES`).
#[derive(Clone, Debug)]
pub struct TaskSettings {
    /// Max number of retries before a task is moved to FAILED.
    pub retry_limit: u32,
    /// Wall-clock budget for a single task attempt, in seconds.
    pub timeout_secs: u64,
    /// Directory where uploaded audio/bundle files are written.
    pub upload_dir: String,
    /// Directory where durable result JSON files are written.
    pub result_dir: String,
    /// Max accepted upload size, in bytes.
    pub max_file_size_bytes: u64,
    /// Accepted audio container/extensions, lowercase, without the leading dot.
    pub allowed_audio_formats: Vec<String>,
    /// Target language codes the pipeline is permitted to translate into.
    pub supported_languages: Vec<String>,
}

impl FromEnv for TaskSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            retry_limit: env_parsed("TASK_RETRY_LIMIT", "3")?,
            timeout_secs: env_parsed("TASK_TIMEOUT", "1800")?,
            upload_dir: env_or_default("UPLOAD_DIR", "./data/uploads"),
            result_dir: env_or_default("RESULT_DIR", "./data/results"),
            max_file_size_bytes: env_parsed("MAX_FILE_SIZE", "104857600")?,
            allowed_audio_formats: env_list("ALLOWED_AUDIO_FORMATS", &["mp3"]),
            supported_languages: env_list("SUPPORTED_LANGUAGES", &["en", "zh", "zh-CN", "zh-TW", "ja"]),
        })
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            timeout_secs: 1800,
            upload_dir: "./data/uploads".to_string(),
            result_dir: "./data/results".to_string(),
            max_file_size_bytes: 104_857_600,
            allowed_audio_formats: vec!["mp3"].into_iter().map(String::from).collect(),
            supported_languages: vec!["en", "zh", "zh-CN", "zh-TW", "ja"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl TaskSettings {
    pub fn is_audio_format_allowed(&self, extension: &str) -> bool {
        self.allowed_audio_formats
            .iter()
            .any(|fmt| fmt.eq_ignore_ascii_case(extension))
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.supported_languages
            .iter()
            .any(|lang| lang.eq_ignore_ascii_case(language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("TASK_RETRY_LIMIT", None::<&str>),
                ("TASK_TIMEOUT", None::<&str>),
                ("UPLOAD_DIR", None::<&str>),
                ("RESULT_DIR", None::<&str>),
                ("MAX_FILE_SIZE", None::<&str>),
                ("ALLOWED_AUDIO_FORMATS", None::<&str>),
                ("SUPPORTED_LANGUAGES", None::<&str>),
            ],
            || {
                let settings = TaskSettings::from_env().unwrap();
                assert_eq!(settings.retry_limit, 3);
                assert!(settings.is_audio_format_allowed("MP3"));
                assert!(settings.is_language_supported("en"));
                assert!(settings.is_language_supported("zh"));
                assert!(settings.is_language_supported("zh-CN"));
                assert!(!settings.is_language_supported("xx"));
            },
        );
    }

    #[test]
    fn test_custom_formats() {
        temp_env::with_var("ALLOWED_AUDIO_FORMATS", Some("ogg"), || {
            let settings = TaskSettings::from_env().unwrap();
            assert!(settings.is_audio_format_allowed("ogg"));
            assert!(!settings.is_audio_format_allowed("mp3"));
        });
    }
}
