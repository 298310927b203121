//! Main settings module.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::audio as audio_const;
use crate::ConfigError;

/// Runtime environment; governs how strictly `Settings::validate` treats
/// missing-but-optional configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Top-level settings, covering every key enumerated in the external
/// interface's configuration section: `asr.*`, `audio.*`, `llm.*`,
/// `coalesce.*`, `paragraph.*`, `summary.*`, plus the ambient observability
/// section the pipeline's own logging depends on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub asr: AsrConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub llm: LlmModelsConfig,

    #[serde(default)]
    pub coalesce: CoalesceConfig,

    #[serde(default)]
    pub paragraph: ParagraphConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings. In `Development` most out-of-range values only
    /// warn; `Staging`/`Production` reject them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_paragraph()?;
        self.validate_coalesce()?;
        self.validate_summary()?;
        Ok(())
    }

    fn validate_paragraph(&self) -> Result<(), ConfigError> {
        let p = &self.paragraph;
        if p.min_ms >= p.max_ms {
            return Err(ConfigError::InvalidValue {
                field: "paragraph.min_ms".to_string(),
                message: format!(
                    "must be less than paragraph.max_ms ({} >= {})",
                    p.min_ms, p.max_ms
                ),
            });
        }
        Ok(())
    }

    fn validate_coalesce(&self) -> Result<(), ConfigError> {
        let c = &self.coalesce;
        if c.debounce_ms > c.force_ms {
            return Err(ConfigError::InvalidValue {
                field: "coalesce.debounce_ms".to_string(),
                message: format!(
                    "must not exceed coalesce.force_ms ({} > {})",
                    c.debounce_ms, c.force_ms
                ),
            });
        }
        Ok(())
    }

    fn validate_summary(&self) -> Result<(), ConfigError> {
        let s = &self.summary;
        if s.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "summary.interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// ASR provider configuration (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    pub model: String,
    #[serde(default = "default_true")]
    pub interim: bool,
    #[serde(default = "default_endpointing_ms")]
    pub endpointing_ms: u32,
    #[serde(default = "default_utterance_end_ms")]
    pub utterance_end_ms: u32,
    #[serde(default)]
    pub smart_format: bool,
    #[serde(default)]
    pub no_delay: bool,
    /// Bearer token read from the environment, never persisted in a file.
    #[serde(default)]
    pub api_key: Option<String>,
    /// WebSocket endpoint for the streaming ASR provider.
    #[serde(default = "default_asr_endpoint")]
    pub endpoint: String,
}

fn default_endpointing_ms() -> u32 {
    800
}
fn default_utterance_end_ms() -> u32 {
    1000
}
fn default_asr_endpoint() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            interim: true,
            endpointing_ms: default_endpointing_ms(),
            utterance_end_ms: default_utterance_end_ms(),
            smart_format: false,
            no_delay: false,
            api_key: std::env::var("ASR_API_KEY").ok(),
            endpoint: default_asr_endpoint(),
        }
    }
}

/// Audio ingress configuration (C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
}

fn default_frame_ms() -> u32 {
    audio_const::FRAME_MS
}
fn default_sample_rate() -> u32 {
    audio_const::SAMPLE_RATE
}
fn default_frame_size() -> usize {
    audio_const::FRAME_SIZE
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_ms: default_frame_ms(),
            sample_rate: default_sample_rate(),
            frame_size: default_frame_size(),
        }
    }
}

/// Per-operation model selection and token budgets for the `llm` crate's
/// six distinct request shapes (translate, summary, summary-translate,
/// user-translate, vocabulary, report).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmModelsConfig {
    #[serde(default = "default_model_translate")]
    pub model_translate: String,
    #[serde(default = "default_model_translate")]
    pub model_summary: String,
    #[serde(default = "default_model_translate")]
    pub model_summary_translate: String,
    #[serde(default = "default_model_translate")]
    pub model_user_translate: String,
    #[serde(default = "default_model_translate")]
    pub model_vocabulary: String,
    #[serde(default = "default_model_report")]
    pub model_report: String,

    #[serde(default = "default_max_tokens_translate")]
    pub max_tokens_translate: u32,
    #[serde(default = "default_max_tokens_translate")]
    pub max_tokens_summary: u32,
    #[serde(default = "default_max_tokens_translate")]
    pub max_tokens_vocabulary: u32,
    #[serde(default = "default_max_tokens_report")]
    pub max_tokens_report: u32,

    /// Base URL for the streaming completion endpoint.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Max in-flight sockets in the Keep-Alive pool (external interface §6).
    #[serde(default = "default_pool_size")]
    pub connection_pool_size: usize,
}

fn default_model_translate() -> String {
    "llama3.1:8b".to_string()
}
fn default_model_report() -> String {
    "llama3.1:70b".to_string()
}
fn default_max_tokens_translate() -> u32 {
    1500
}
fn default_max_tokens_report() -> u32 {
    8192
}
fn default_llm_endpoint() -> String {
    std::env::var("LLM_ENDPOINT").unwrap_or_else(|_| "http://localhost:11434".to_string())
}
fn default_pool_size() -> usize {
    50
}

impl Default for LlmModelsConfig {
    fn default() -> Self {
        Self {
            model_translate: default_model_translate(),
            model_summary: default_model_translate(),
            model_summary_translate: default_model_translate(),
            model_user_translate: default_model_translate(),
            model_vocabulary: default_model_translate(),
            model_report: default_model_report(),
            max_tokens_translate: default_max_tokens_translate(),
            max_tokens_summary: default_max_tokens_translate(),
            max_tokens_vocabulary: default_max_tokens_translate(),
            max_tokens_report: default_max_tokens_report(),
            endpoint: default_llm_endpoint(),
            connection_pool_size: default_pool_size(),
        }
    }
}

/// Stream Coalescer configuration (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoalesceConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_force_ms")]
    pub force_ms: u64,
}

fn default_debounce_ms() -> u64 {
    100
}
fn default_force_ms() -> u64 {
    500
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            force_ms: default_force_ms(),
        }
    }
}

/// Paragraph Builder configuration (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphConfig {
    #[serde(default = "default_paragraph_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_paragraph_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_paragraph_silence_ms")]
    pub silence_ms: u64,
}

fn default_paragraph_min_ms() -> u64 {
    10_000
}
fn default_paragraph_max_ms() -> u64 {
    40_000
}
fn default_paragraph_silence_ms() -> u64 {
    2_000
}

impl Default for ParagraphConfig {
    fn default() -> Self {
        Self {
            min_ms: default_paragraph_min_ms(),
            max_ms: default_paragraph_max_ms(),
            silence_ms: default_paragraph_silence_ms(),
        }
    }
}

/// Progressive Summarizer configuration (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_summary_word_threshold")]
    pub word_threshold: usize,
}

fn default_summary_interval_ms() -> u64 {
    180_000
}
fn default_summary_word_threshold() -> usize {
    400
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_summary_interval_ms(),
            word_threshold: default_summary_word_threshold(),
        }
    }
}

/// Observability configuration: how `tracing-subscriber` is initialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`UNIVOICE__` prefix, double-underscore nesting)
/// 2. `config/{env}.yaml` (if `env` is specified)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("UNIVOICE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.coalesce.debounce_ms, 100);
    }

    #[test]
    fn paragraph_min_must_be_below_max() {
        let mut settings = Settings::default();
        settings.paragraph.min_ms = 50_000;
        settings.paragraph.max_ms = 40_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn coalesce_debounce_must_not_exceed_force() {
        let mut settings = Settings::default();
        settings.coalesce.debounce_ms = 1000;
        settings.coalesce.force_ms = 500;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn summary_interval_must_be_positive() {
        let mut settings = Settings::default();
        settings.summary.interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
