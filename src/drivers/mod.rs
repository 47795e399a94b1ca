//! LLM drivers.
//!
//! The OCR core talks to the model through the [`Driver`] trait, so tests can
//! swap in a canned driver without touching the network.

use std::{error, fmt, time::Duration};

use async_trait::async_trait;

use crate::prompt::OcrPrompt;

pub mod openai;

/// The fixed vision-capable model we transcribe with.
pub const OCR_MODEL: &str = "gpt-4o-mini";

/// Upper limit on the number of completion tokens to generate.
pub const MAX_COMPLETION_TOKENS: u32 = 4096;

/// How long we wait for a complete response. Note that even if a request
/// times out, you'll probably still be charged.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Our chat-related options. These are fixed for OCR; they exist as a struct
/// so every driver shares one signature.
#[derive(Clone, Debug)]
pub struct LlmOpts {
    /// The model to use.
    pub model: &'static str,

    /// An upper limit on the number of completion tokens to generate.
    pub max_completion_tokens: u32,

    /// A timeout for the LLM to return a complete response.
    pub timeout: Duration,
}

impl Default for LlmOpts {
    fn default() -> Self {
        Self {
            model: OCR_MODEL,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Interface trait for LLM drivers.
#[async_trait]
pub trait Driver: fmt::Debug + Send + Sync + 'static {
    /// Run a "chat completion" request and return the first completion's
    /// text content.
    async fn chat_completion(
        &self,
        prompt: &OcrPrompt,
        opts: &LlmOpts,
    ) -> Result<String, LlmError>;
}

/// An error which occurred while calling an LLM.
///
/// Drivers use this to report an elapsed timeout separately from whatever the
/// remote side had to say.
#[derive(Debug)]
pub enum LlmError {
    /// A native error.
    Native(anyhow::Error),

    /// A timeout error.
    Timeout,
}

impl LlmError {
    /// Wrap a native error.
    pub fn native(err: impl Into<anyhow::Error>) -> Self {
        LlmError::Native(err.into())
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Native(err) => write!(f, "LLM error: {err:#}"),
            LlmError::Timeout => write!(f, "LLM request timed out"),
        }
    }
}

impl error::Error for LlmError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LlmError::Native(err) => Some(err.as_ref()),
            LlmError::Timeout => None,
        }
    }
}
