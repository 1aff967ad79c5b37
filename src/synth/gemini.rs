//! Speech synthesis over the Gemini generateContent REST endpoint.
//!
//! One request per text segment, audio-only response. The response may
//! split audio across several inline-data parts; they are concatenated
//! in response order before decoding.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::runtime::Runtime;

use crate::config::SynthesisConfig;
use crate::error::{BookvoxError, Result};
use crate::pipeline::error::{LogReporter, PipelineReport, ProgressReporter};
use crate::synth::{RetryPolicy, SpeechSynthesizer, pcm_bytes_to_samples};
use crate::voice;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiSynthesizer {
    http: reqwest::Client,
    runtime: Runtime,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    style: Option<String>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    reporter: Arc<dyn ProgressReporter>,
}

impl GeminiSynthesizer {
    pub fn new(config: &SynthesisConfig, api_key: String) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BookvoxError::Other(format!("Failed to start HTTP runtime: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            runtime,
            base_url: BASE_URL.to_string(),
            api_key,
            model: config.model.clone(),
            voice: config.voice.clone(),
            style: voice::resolve_style(&config.style),
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_secs(config.backoff_secs),
            ),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            reporter: Arc::new(LogReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn attempt(&self, prompt: &str) -> Result<Vec<i16>> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let body = request_body(prompt, &self.voice);

        // One timeout spans the whole attempt, send and body read both.
        let response: Value = self.runtime.block_on(async {
            let exchange = async {
                let response = self
                    .http
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| BookvoxError::Http {
                        message: format!("request failed: {e}"),
                    })?;

                let status = response.status();
                let text = response.text().await.map_err(|e| BookvoxError::Http {
                    message: format!("failed to read response: {e}"),
                })?;

                if !status.is_success() {
                    return Err(BookvoxError::Http {
                        message: format!("status {status}: {}", truncate(&text, 200)),
                    });
                }

                serde_json::from_str(&text).map_err(|e| BookvoxError::ResponseFormat {
                    message: format!("invalid JSON: {e}"),
                })
            };

            tokio::time::timeout(self.attempt_timeout, exchange)
                .await
                .map_err(|_| BookvoxError::Http {
                    message: format!(
                        "attempt timed out after {}s",
                        self.attempt_timeout.as_secs()
                    ),
                })?
        })?;

        let bytes = extract_audio_bytes(&response)?;
        Ok(pcm_bytes_to_samples(&bytes))
    }
}

impl SpeechSynthesizer for GeminiSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<i16>> {
        let prompt = match &self.style {
            Some(directive) => format!("{directive}:\n\n{text}"),
            None => text.to_string(),
        };
        let label = truncate(text, 40);
        let max_attempts = self.retry.max_attempts();

        self.retry.run(
            |_| self.attempt(&prompt),
            |attempt, error| {
                self.reporter.report(&PipelineReport::Retrying {
                    label: label.clone(),
                    attempt,
                    max_attempts,
                    detail: error.to_string(),
                });
            },
        )
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn request_body(prompt: &str, voice: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            }
        }
    })
}

/// Pull every inline-data audio part out of the response, in order,
/// and decode the concatenation. Zero audio parts is a transient
/// failure carrying whatever block/finish reason the response gives.
fn extract_audio_bytes(response: &Value) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();

    let candidates = response
        .get("candidates")
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or_default();

    for candidate in candidates {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .unwrap_or_default();
        for part in parts {
            if let Some(data) = part.pointer("/inlineData/data").and_then(|v| v.as_str()) {
                let decoded =
                    BASE64
                        .decode(data)
                        .map_err(|e| BookvoxError::ResponseFormat {
                            message: format!("invalid base64 audio: {e}"),
                        })?;
                bytes.extend_from_slice(&decoded);
            }
        }
    }

    if bytes.is_empty() {
        return Err(BookvoxError::ResponseFormat {
            message: format!("no audio in response ({})", refusal_detail(response)),
        });
    }
    Ok(bytes)
}

/// Best-effort diagnostic from a refusing response.
fn refusal_detail(response: &Value) -> String {
    if let Some(reason) = response
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        return format!("blocked: {reason}");
    }
    if let Some(reason) = response
        .pointer("/candidates/0/finishReason")
        .and_then(|v| v.as_str())
    {
        return format!("finish reason: {reason}");
    }
    "no diagnostic in response".to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_response(parts: &[&[u8]]) -> Value {
        let encoded: Vec<Value> = parts
            .iter()
            .map(|p| json!({ "inlineData": { "data": BASE64.encode(p), "mimeType": "audio/L16" } }))
            .collect();
        json!({ "candidates": [{ "content": { "parts": encoded } }] })
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("Read this", "Kore");
        assert_eq!(
            body.pointer("/contents/0/parts/0/text").unwrap(),
            "Read this"
        );
        assert_eq!(
            body.pointer("/generationConfig/responseModalities/0")
                .unwrap(),
            "AUDIO"
        );
        assert_eq!(
            body.pointer(
                "/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName"
            )
            .unwrap(),
            "Kore"
        );
    }

    #[test]
    fn test_extract_single_part() {
        let response = audio_response(&[&[0x01, 0x00, 0xFF, 0x7F]]);
        assert_eq!(
            extract_audio_bytes(&response).unwrap(),
            vec![0x01, 0x00, 0xFF, 0x7F]
        );
    }

    #[test]
    fn test_extract_concatenates_parts_in_order() {
        let response = audio_response(&[&[0x01, 0x02], &[0x03, 0x04], &[0x05, 0x06]]);
        assert_eq!(
            extract_audio_bytes(&response).unwrap(),
            vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06]
        );
    }

    #[test]
    fn test_empty_response_is_transient_error() {
        let response = json!({ "candidates": [{ "content": { "parts": [] } }] });
        let err = extract_audio_bytes(&response).unwrap_err();
        assert!(matches!(err, BookvoxError::ResponseFormat { .. }));
    }

    #[test]
    fn test_block_reason_surfaced() {
        let response = json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        });
        let err = extract_audio_bytes(&response).unwrap_err();
        assert!(err.to_string().contains("blocked: SAFETY"));
    }

    #[test]
    fn test_finish_reason_surfaced() {
        let response = json!({
            "candidates": [{ "finishReason": "RECITATION", "content": { "parts": [] } }]
        });
        let err = extract_audio_bytes(&response).unwrap_err();
        assert!(err.to_string().contains("finish reason: RECITATION"));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let response = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "data": "not//valid!!", "mimeType": "audio/L16" } }
            ] } }]
        });
        assert!(extract_audio_bytes(&response).is_err());
    }

    #[test]
    fn test_attempt_timeout_covers_send_and_body_read() {
        use crate::config::SynthesisConfig;
        use std::net::TcpListener;
        use std::time::Instant;

        // Accept the connection, then say nothing.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (_socket, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(3));
        });

        let config = SynthesisConfig {
            max_attempts: 1,
            attempt_timeout_secs: 1,
            ..SynthesisConfig::default()
        };
        let synth = GeminiSynthesizer::new(&config, "test-key".to_string())
            .unwrap()
            .with_base_url(&format!("http://{addr}"));

        let started = Instant::now();
        let err = synth.synthesize("hello").unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.to_string().contains("timed out"), "error was: {err}");
        assert!(
            elapsed < Duration::from_millis(1800),
            "attempt took {elapsed:?}, more than one timeout"
        );
        server.join().unwrap();
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 40), "short");
        let long = "x".repeat(50);
        let cut = truncate(&long, 40);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 43);
    }
}
