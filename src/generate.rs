//! Answer generation against the Google Gemini API.
//!
//! The retrieval core hands the assembled context to an
//! [`AnswerGenerator`]; the server depends only on the trait so tests
//! can substitute a canned generator. [`GeminiGenerator`] is the real
//! implementation, calling `models/<model>:generateContent` with a fixed
//! Vietnamese system instruction.
//!
//! An empty context is a distinguished input, not an error: the prompt
//! switches to an ungrounded conversational template that ends by
//! directing the parent to the school's hotline or fanpage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::GeneratorConfig;
use crate::models::ChatMessage;

/// Persona and ground rules for every reply.
const SYSTEM_PROMPT: &str = "\
Bạn là Trợ lý AI Trường mầm non Ninh Lai.
Hỗ trợ phụ huynh giải đáp thắc mắc nhanh chóng, chính xác và thân thiện dựa trên nội dung được cung cấp.

QUY TẮC:
- Trả lời ngắn gọn, đi thẳng vào vấn đề.
- Sử dụng emoji phù hợp để tạo sự gần gũi.
- Xưng hô: \"em\" hoặc \"nhà trường\" - \"bố/mẹ\" hoặc \"phụ huynh\".
- Không chào lại ở đầu câu.
- Nếu không có thông tin trong tài liệu: Phản hồi khéo léo, ngắn gọn và hướng dẫn phụ huynh liên hệ trực tiếp nhà trường qua hotline/fanpage.";

/// Produces the user-facing reply from (context, question, history).
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String>;
}

/// Gemini-backed generator. The API key is resolved from the
/// environment at call time, so the server can start without one and
/// surface a configuration error per request instead.
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.config.api_key_env).unwrap_or_default();
        if key.is_empty() || key == "your_api_key_here" {
            anyhow::bail!(
                "{} chưa được cấu hình. Vui lòng thêm API key vào file .env",
                self.config.api_key_env
            );
        }
        Ok(key)
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate(
        &self,
        context: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, api_key
        );

        let mut contents = gemini_history(history);
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": build_user_prompt(context, question) }]
        }));

        let body = json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": contents,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API returned {}: {}", status, detail);
        }

        let payload: Value = response
            .json()
            .await
            .context("Gemini response was not valid JSON")?;
        let reply = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .context("Gemini response contained no candidate text")?;

        Ok(reply.trim().to_string())
    }
}

/// Map chat history onto Gemini roles (`bot` → `model`).
///
/// Gemini requires the history to start with a user message, so a
/// leading model message (the frontend's welcome bubble) is dropped.
fn gemini_history(history: &[ChatMessage]) -> Vec<Value> {
    let mut contents = Vec::new();
    for (i, msg) in history.iter().enumerate() {
        let role = if msg.role == "bot" { "model" } else { "user" };
        if i == 0 && role == "model" {
            continue;
        }
        contents.push(json!({
            "role": role,
            "parts": [{ "text": msg.content }]
        }));
    }
    contents
}

/// Final user turn: grounded when an excerpt is available, playful
/// ungrounded fallback otherwise.
fn build_user_prompt(context: &str, question: &str) -> String {
    if !context.trim().is_empty() {
        format!(
            "NỘI DUNG THAM CHIẾU TỪ NHÀ TRƯỜNG:\n<<<\n{}\n>>>\n\n\
             CÂU HỎI HIỆN TẠI TỪ PHỤ HUYNH:\n{}\n\n\
             Hãy dựa vào NỘI DUNG THAM CHIẾU trên để trả lời câu hỏi hiện tại.",
            context, question
        )
    } else {
        format!(
            "NỘI DUNG THAM CHIẾU: (Không tìm thấy thông tin liên quan hoặc câu hỏi nằm ngoài ngữ cảnh)\n\n\
             CÂU HỎI HIỆN TẠI TỪ PHỤ HUYNH:\n{}\n\n\
             Vì không có thông tin tham chiếu, hãy nghĩ ra một câu trả lời thật hài hước, \
             trêu đùa phụ huynh để tạo tiếng cười. Dùng nhiều emoji vào nhé!\n\
             Sau khi trêu đùa xong, CẦN LUÔN CHỐT LẠI ý này một cách tự nhiên: \
             \"Tuy nhiên, thông tin này em chưa được nhà trường cung cấp. Bố mẹ vui lòng \
             liên hệ trực tiếp qua số điện thoại hoặc fanpage của trường để được hỗ trợ thêm nha!\"",
            question
        )
    }
}
