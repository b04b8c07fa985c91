//! Transcription client: one page image in, one page of text out.
//!
//! The remote call sits behind the [`Transcriber`] trait so the retry and
//! pacing logic in [`TranscriptionClient`] can be driven by a deterministic
//! stub in tests. [`LlmTranscriber`] is the production implementation over
//! any `edgequake_llm` vision provider.
//!
//! ## Conversation layout
//!
//! 1. **System message** — the instruction prompt for the chosen dialect
//! 2. **Previous page** *(pages after the first, unless its answer was
//!    empty)* — the prior page image as a user turn, followed by the model's
//!    own prior answer as an assistant turn
//! 3. **Current page** — the page image as a user turn
//!
//! Only one page of history is sent. That is enough for the model to continue
//! a numbered list or finish an equation split across the page break, and
//! keeps each request the same size however long the document is.

use crate::config::ConversionConfig;
use crate::error::{Pdf2HtmlError, TranscribeError};
use crate::pipeline::source::Page;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// The previous page and the model's answer for it.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub page: &'a Page,
    pub response: &'a str,
}

/// Everything a single model call needs.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptionRequest<'a> {
    pub prompt: &'a str,
    pub page: &'a Page,
    pub context: Option<PageContext<'a>>,
}

/// Raw answer of one successful model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ModelReply {
    /// Reply without token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A remote (or stubbed) multimodal model.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Perform exactly one call. Retries are the caller's business.
    async fn transcribe(
        &self,
        request: &TranscriptionRequest<'_>,
    ) -> Result<ModelReply, TranscribeError>;
}

/// The transcription of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    /// 0-based index of the source page.
    pub page_index: usize,
    /// Model output, trimmed of surrounding whitespace.
    pub text: String,
    /// Failed attempts before the successful one.
    pub retries: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Wall-clock time including retry waits, excluding pacing.
    pub duration_ms: u64,
}

// ── Production transcriber ───────────────────────────────────────────────

/// [`Transcriber`] over an `edgequake_llm` provider.
pub struct LlmTranscriber {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmTranscriber {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// Build the chat turns for one request.
///
/// The previous page is left out when its answer is empty: providers reject
/// an empty assistant turn, and an empty answer carries no context anyway.
pub fn build_messages(request: &TranscriptionRequest<'_>) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(request.prompt)];

    if let Some(ctx) = request.context.filter(|c| !c.response.is_empty()) {
        messages.push(ChatMessage::user_with_images("", vec![ctx.page.encoded.clone()]));
        messages.push(ChatMessage::assistant(ctx.response));
    }

    messages.push(ChatMessage::user_with_images(
        "",
        vec![request.page.encoded.clone()],
    ));
    messages
}

#[async_trait]
impl Transcriber for LlmTranscriber {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest<'_>,
    ) -> Result<ModelReply, TranscribeError> {
        let messages = build_messages(request);
        let options = self.options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| TranscribeError::Api(e.to_string()))?;

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

// ── Retrying client ──────────────────────────────────────────────────────

/// Wraps a [`Transcriber`] with the retry policy, pacing and timeout.
pub struct TranscriptionClient {
    transcriber: Arc<dyn Transcriber>,
    prompt: String,
    policy: RetryPolicy,
    pacing_delay: Duration,
    api_timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
}

impl TranscriptionClient {
    pub fn new(transcriber: Arc<dyn Transcriber>, config: &ConversionConfig) -> Self {
        Self {
            transcriber,
            prompt: config.prompt().to_string(),
            policy: config.retry_policy,
            pacing_delay: config.pacing_delay,
            api_timeout: config.api_timeout_secs.map(Duration::from_secs),
            progress: config.progress_callback.clone(),
        }
    }

    /// Transcribe `page`, optionally continuing from `context`.
    ///
    /// Every failure is reported, followed by the policy's delay, then the
    /// identical request is sent again. Only a bounded policy can make this
    /// return an error.
    pub async fn transcribe(
        &self,
        page: &Page,
        context: Option<PageContext<'_>>,
    ) -> Result<Transcription, Pdf2HtmlError> {
        let start = Instant::now();
        let request = TranscriptionRequest {
            prompt: &self.prompt,
            page,
            context,
        };

        let mut failures: u32 = 0;
        let reply = loop {
            match self.call_once(&request).await {
                Ok(reply) => break reply,
                Err(e) => {
                    failures += 1;
                    let err_msg = e.to_string();
                    if !self.policy.should_retry(failures) {
                        warn!(
                            "Page {} ({}): attempt {} failed — {}; giving up",
                            page.number(),
                            page.label,
                            failures,
                            err_msg
                        );
                        return Err(Pdf2HtmlError::RetriesExhausted {
                            page: page.number(),
                            attempts: failures,
                            last_error: err_msg,
                        });
                    }

                    let delay = self.policy.delay_after(failures);
                    warn!(
                        "Page {} ({}): attempt {} failed — {}; retrying in {:?}",
                        page.number(),
                        page.label,
                        failures,
                        err_msg,
                        delay
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_page_retry(page.number(), failures, delay, &err_msg);
                    }
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        };

        let duration = start.elapsed();
        let text = reply.text.trim().to_string();
        debug!(
            "Page {}: {} chars, {} input tokens, {} output tokens, {:?}",
            page.number(),
            text.len(),
            reply.input_tokens,
            reply.output_tokens,
            duration
        );

        if !self.pacing_delay.is_zero() {
            sleep(self.pacing_delay).await;
        }

        Ok(Transcription {
            page_index: page.index,
            text,
            retries: failures,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            duration_ms: duration.as_millis() as u64,
        })
    }

    async fn call_once(
        &self,
        request: &TranscriptionRequest<'_>,
    ) -> Result<ModelReply, TranscribeError> {
        match self.api_timeout {
            Some(limit) => tokio::time::timeout(limit, self.transcriber.transcribe(request))
                .await
                .map_err(|_| TranscribeError::Timeout {
                    secs: limit.as_secs(),
                })?,
            None => self.transcriber.transcribe(request).await,
        }
    }
}
