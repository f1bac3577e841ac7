//! Optional remote challenge generation.
//!
//! The trainer never depends on a remote provider: every call is bounded by
//! a time budget and any failure falls back to offline generation.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

/// Time allowed for a remote reply before falling back
pub const REMOTE_BUDGET: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Provider returned an error or an unusable reply
    Failed(String),
    /// No reply within the time budget
    Timeout,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Failed(msg) => write!(f, "Remote generation failed: {}", msg),
            RemoteError::Timeout => write!(f, "Remote generation timed out"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// A provider that turns a prompt into drill text
pub trait RemoteGenerator: Send + Sync {
    fn generate(&self, prompt: &str, api_key: Option<&str>) -> Result<String, RemoteError>;
}

/// Start the provider on a worker thread and return the channel its single
/// reply arrives on. Dropping the receiver discards a late reply.
pub fn spawn_request(
    remote: Arc<dyn RemoteGenerator>,
    prompt: String,
    api_key: Option<String>,
) -> Receiver<Result<String, RemoteError>> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(remote.generate(&prompt, api_key.as_deref()));
    });
    rx
}

/// Run the provider on a worker thread and wait at most `budget` for it.
/// A late reply is discarded when it eventually arrives.
pub fn call_with_budget(
    remote: Arc<dyn RemoteGenerator>,
    prompt: String,
    api_key: Option<String>,
    budget: Duration,
) -> Result<String, RemoteError> {
    match spawn_request(remote, prompt, api_key).recv_timeout(budget) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(RemoteError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(RemoteError::Failed("provider thread exited".to_string())),
    }
}

#[cfg(feature = "remote")]
pub use chat::ChatCompletionsGenerator;

#[cfg(feature = "remote")]
mod chat {
    use std::time::Duration;

    use log::{debug, error};
    use serde::{Deserialize, Serialize};

    use super::{RemoteError, RemoteGenerator};

    pub const BASE_URL_ENV: &str = "MORSE_TRAINER_AI_BASE_URL";
    pub const MODEL_ENV: &str = "MORSE_TRAINER_AI_MODEL";

    const SYSTEM_PROMPT: &str = "You write short Morse code practice text for amateur radio \
        operators. Reply with the practice text only: no quotes, no explanations.";

    #[derive(Serialize)]
    struct ChatMessage {
        role: &'static str,
        content: String,
    }

    #[derive(Serialize)]
    struct ChatRequest {
        model: String,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: Option<String>,
    }

    /// OpenAI-compatible chat completions client
    pub struct ChatCompletionsGenerator {
        client: reqwest::blocking::Client,
        base_url: String,
        model: String,
    }

    impl ChatCompletionsGenerator {
        pub fn from_env() -> Result<Self, RemoteError> {
            let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| "https://api.openai.com/v1".into());
            let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| "gpt-4o-mini".into());
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .map_err(|e| RemoteError::Failed(e.to_string()))?;
            Ok(Self { client, base_url, model })
        }
    }

    impl RemoteGenerator for ChatCompletionsGenerator {
        fn generate(&self, prompt: &str, api_key: Option<&str>) -> Result<String, RemoteError> {
            let api_key = api_key.ok_or_else(|| RemoteError::Failed("no API key configured".to_string()))?;
            let url = format!("{}/chat/completions", self.base_url);
            let req = ChatRequest {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                    ChatMessage { role: "user", content: prompt.to_string() },
                ],
                temperature: 0.9,
                max_tokens: 40,
            };

            let resp = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&req)
                .send()
                .map_err(|e| RemoteError::Failed(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                error!(target: "content", "Chat completion returned {}", status);
                return Err(RemoteError::Failed(format!("HTTP {}", status)));
            }

            let body: ChatResponse = resp.json().map_err(|e| RemoteError::Failed(e.to_string()))?;
            let text = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| RemoteError::Failed("empty completion".to_string()))?;
            debug!(target: "content", "{} replied with {} bytes", self.model, text.len());
            Ok(text)
        }
    }
}
