//! Text-to-speech proxying against Google Cloud TTS.
//!
//! Replies are written for a chat bubble — emoji, markdown markers,
//! the odd HTML tag — so the text is sanitized before synthesis. The
//! API key is resolved from the environment per request.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::config::TtsConfig;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Emoji and pictograph blocks stripped before synthesis.
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[\u{1F300}-\u{1F5FF}\u{1F600}-\u{1F64F}\u{1F680}-\u{1F6FF}\u{1F700}-\u{1FAFF}\u{2600}-\u{27BF}]",
    )
    .unwrap()
});

/// Strip everything that reads badly aloud: HTML tags, emoji, and
/// markdown emphasis/heading/list markers.
pub fn sanitize_for_speech(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = EMOJI.replace_all(&text, "");
    text.replace('*', "")
        .replace('#', "")
        .replace("- ", "")
        .trim()
        .to_string()
}

/// Thin client for the `text:synthesize` endpoint.
pub struct TtsClient {
    client: reqwest::Client,
    config: TtsConfig,
}

impl TtsClient {
    pub fn new(config: TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.config.api_key_env).unwrap_or_default();
        if key.is_empty() {
            anyhow::bail!(
                "Thiếu cấu hình {} trong file .env",
                self.config.api_key_env
            );
        }
        Ok(key)
    }

    /// Synthesize `text` and return the base64 MP3 payload.
    pub async fn synthesize(&self, text: &str) -> Result<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/text:synthesize?key={}", self.config.endpoint, api_key);

        let body = json!({
            "input": { "text": text },
            "voice": {
                "languageCode": self.config.language_code,
                "name": self.config.voice,
            },
            "audioConfig": { "audioEncoding": "MP3" },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Google TTS request failed")?;

        let status = response.status();
        if !status.is_success() {
            let payload: Value = response.json().await.unwrap_or_default();
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("Có lỗi xảy ra khi gọi Google TTS API");
            anyhow::bail!("{}", message);
        }

        let payload: Value = response
            .json()
            .await
            .context("Google TTS response was not valid JSON")?;
        let audio = payload
            .pointer("/audioContent")
            .and_then(Value::as_str)
            .context("Google TTS response carried no audio content")?;
        Ok(audio.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn sanitizer_strips_emoji_and_markdown() {
        let text = "**Học phí** là 500 nghìn ạ! 🏫😊\n- Bao gồm ăn trưa\n# Ghi chú";
        let clean = sanitize_for_speech(text);
        assert!(!clean.contains('*'));
        assert!(!clean.contains('#'));
        assert!(!clean.contains("- "));
        assert!(!clean.contains('🏫'));
        assert!(clean.contains("Học phí là 500 nghìn ạ!"));
    }

    #[test]
    fn sanitizer_strips_html_tags() {
        assert_eq!(sanitize_for_speech("<b>chào</b> bố mẹ"), "chào bố mẹ");
    }

    #[test]
    fn emoji_only_text_sanitizes_to_empty() {
        assert_eq!(sanitize_for_speech("🎉🎈✨"), "");
    }

    #[tokio::test]
    async fn synthesize_returns_audio_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/text:synthesize");
            then.status(200)
                .json_body(serde_json::json!({ "audioContent": "bW9jay1tcDM=" }));
        });

        std::env::set_var("KINDERCHAT_TEST_TTS_KEY", "test-key");
        let client = TtsClient::new(TtsConfig {
            voice: "vi-VN-Neural2-A".to_string(),
            language_code: "vi-VN".to_string(),
            api_key_env: "KINDERCHAT_TEST_TTS_KEY".to_string(),
            endpoint: server.base_url(),
        });

        let audio = client.synthesize("Học phí là 500 nghìn ạ.").await.unwrap();
        mock.assert();
        assert_eq!(audio, "bW9jay1tcDM=");
    }

    #[tokio::test]
    async fn missing_key_reports_env_name() {
        let client = TtsClient::new(TtsConfig {
            voice: "vi-VN-Neural2-A".to_string(),
            language_code: "vi-VN".to_string(),
            api_key_env: "KINDERCHAT_TEST_UNSET_TTS_KEY".to_string(),
            endpoint: "http://localhost:1".to_string(),
        });
        let err = client.synthesize("xin chào").await.unwrap_err();
        assert!(err.to_string().contains("KINDERCHAT_TEST_UNSET_TTS_KEY"));
    }
}
