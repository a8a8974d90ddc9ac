//! Configuration management
//!
//! This module handles loading, validation, and management of the Yojana
//! configuration. Configuration is stored in TOML format at
//! ~/.yojana/config.toml and is created with defaults on first run.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Language backend settings (OpenAI-compatible chat completions)
//! - **retrieval**: Scheme retrieval service settings
//! - **speech**: STT/TTS service settings
//! - **agent**: Orchestration loop thresholds and bounds

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Language backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval service configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Speech services configuration
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Language backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Per-request deadline in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Retrieval service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Base URL of the retrieval service; when unset, the catalog-backed
    /// keyword retriever is used instead
    #[serde(default)]
    pub base_url: Option<String>,

    /// Number of hits to request
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Per-request deadline in seconds
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

/// Speech services configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Enable the speech boundary (voice input/output)
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the speech API
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,

    /// STT model name
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// TTS model name
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// TTS speaker voice
    #[serde(default = "default_tts_speaker")]
    pub tts_speaker: String,

    /// Per-request deadline in seconds
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    #[serde(default = "default_speech_api_key_env")]
    pub api_key_env: String,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Minimum eligibility match score the evaluator accepts as complete
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    /// Maximum plan/execute/evaluate iterations per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Conversation turns retained in memory before FIFO eviction
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Idle seconds before a session is archived
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// Top-ranked schemes considered when aggregating missing attributes
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Turns a pending high-severity contradiction is held before it times
    /// out and the original value stands
    #[serde(default = "default_contradiction_ttl")]
    pub contradiction_ttl_turns: u32,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.yojana")
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_retrieval_timeout() -> u64 {
    10
}

fn default_speech_base_url() -> String {
    "https://api.sarvam.ai".to_string()
}

fn default_stt_model() -> String {
    "saarika:v1".to_string()
}

fn default_tts_model() -> String {
    "bulbul:v2".to_string()
}

fn default_tts_speaker() -> String {
    "anushka".to_string()
}

fn default_speech_timeout() -> u64 {
    30
}

fn default_speech_api_key_env() -> String {
    "SARVAM_API_KEY".to_string()
}

fn default_score_threshold() -> f64 {
    0.7
}

fn default_max_iterations() -> usize {
    5
}

fn default_max_turns() -> usize {
    10
}

fn default_session_timeout() -> u64 {
    900
}

fn default_top_n() -> usize {
    5
}

fn default_contradiction_ttl() -> u32 {
    2
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_speech_base_url(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            tts_speaker: default_tts_speaker(),
            timeout_secs: default_speech_timeout(),
            api_key_env: default_speech_api_key_env(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            max_iterations: default_max_iterations(),
            max_turns: default_max_turns(),
            session_timeout_secs: default_session_timeout(),
            top_n: default_top_n(),
            contradiction_ttl_turns: default_contradiction_ttl(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            speech: SpeechConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.yojana/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default
    /// configuration. Validates the configuration after loading and returns
    /// descriptive errors if validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.yojana/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".yojana").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// Validates field ranges, expands ~ in the data directory, and creates
    /// the data directory if it doesn't exist.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !(0.0..=1.0).contains(&self.agent.score_threshold) {
            return Err(EngineError::Config(
                "score_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(EngineError::Config(
                "max_turns must be at least 1".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(EngineError::Config("top_k must be at least 1".to_string()));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
