//! Speech-to-text / text-to-speech boundary
//!
//! Narrow interfaces consumed at the session boundary, outside the state
//! machine proper. STT failure routes to a clarification asking the user to
//! repeat; TTS failure degrades the reply to text-only. Neither ever blocks
//! the orchestrator.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::SpeechConfig;

/// Result type for speech operations
pub type Result<T> = std::result::Result<T, SpeechError>;

/// Errors that can occur during speech operations
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Speech services not configured")]
    NotConfigured,
}

/// A transcription result
#[derive(Debug, Clone, Deserialize)]
pub struct Transcript {
    pub text: String,

    #[serde(default)]
    pub language_code: String,

    #[serde(default)]
    pub confidence: f32,
}

/// A synthesized audio clip
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub format: String,
}

/// Speech-to-text service
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_wav: &[u8]) -> Result<Transcript>;
}

/// Text-to-speech service
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}

/// Client for the hosted speech API (Sarvam-style)
pub struct SpeechClient {
    config: SpeechConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            api_key,
            client,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(SpeechError::NotConfigured)
    }

    fn map_send_error(e: reqwest::Error) -> SpeechError {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::NetworkError(e.to_string())
        }
    }
}

#[async_trait]
impl SpeechToText for SpeechClient {
    async fn transcribe(&self, audio_wav: &[u8]) -> Result<Transcript> {
        let api_key = self.api_key()?;
        let url = format!("{}/speech-to-text", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("api-subscription-key", api_key)
            .json(&serde_json::json!({
                "model": self.config.stt_model,
                "audio": BASE64.encode(audio_wav),
            }))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(SpeechError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let transcript: Transcript = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        debug!(chars = transcript.text.len(), "Transcription received");
        Ok(transcript)
    }
}

#[async_trait]
impl TextToSpeech for SpeechClient {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let api_key = self.api_key()?;
        let url = format!("{}/text-to-speech", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("api-subscription-key", api_key)
            .json(&serde_json::json!({
                "model": self.config.tts_model,
                "speaker": self.config.tts_speaker,
                "text": text,
            }))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(SpeechError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct TtsResponse {
            audio: String,
            #[serde(default = "default_format")]
            format: String,
        }

        fn default_format() -> String {
            "wav".to_string()
        }

        let body: TtsResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        let data = BASE64
            .decode(&body.audio)
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        Ok(AudioClip {
            data,
            format: body.format,
        })
    }
}
