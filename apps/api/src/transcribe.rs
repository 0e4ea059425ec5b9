//! Transcription collaborator — turns uploaded audio into text for a message
//! turn. Any failure here is a turn-level upstream failure; empty input is a
//! client error caught before the upstream call.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::errors::AppError;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes) -> Result<String, AppError>;
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
}

impl ListenResponse {
    fn transcript(self) -> Option<String> {
        self.results
            .channels
            .into_iter()
            .next()?
            .alternatives
            .into_iter()
            .next()
            .map(|a| a.transcript)
    }
}

/// Client for the GreenPT speech-to-text endpoint (Deepgram-compatible
/// `/v1/listen` wire format).
#[derive(Clone)]
pub struct GreenPtStt {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl GreenPtStt {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        GreenPtStt {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            api_url,
            model,
        }
    }
}

#[async_trait]
impl Transcriber for GreenPtStt {
    async fn transcribe(&self, audio: Bytes) -> Result<String, AppError> {
        if audio.is_empty() {
            return Err(AppError::Validation(
                "audio payload is empty; cannot transcribe".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("model", self.model.as_str())])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "transcription service returned {status}: {body}"
            )));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("unreadable transcription response: {e}")))?;

        let transcript = parsed
            .transcript()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Upstream("transcription produced no transcript".to_string())
            })?;

        debug!("transcribed {} characters of speech", transcript.len());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listen_response_transcript_path() {
        let parsed: ListenResponse = serde_json::from_value(json!({
            "results": {
                "channels": [
                    {"alternatives": [{"transcript": "tell me about yourself"}]}
                ]
            }
        }))
        .unwrap();
        assert_eq!(
            parsed.transcript().as_deref(),
            Some("tell me about yourself")
        );
    }

    #[test]
    fn test_listen_response_empty_channels() {
        let parsed: ListenResponse =
            serde_json::from_value(json!({"results": {"channels": []}})).unwrap();
        assert_eq!(parsed.transcript(), None);
    }
}
