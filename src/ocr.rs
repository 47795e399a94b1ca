//! The OCR core: one image in, extracted text or a classified failure out.
//!
//! This is a single-shot request/response. There is no queueing, no retry
//! policy, and nothing is kept between calls.

use std::{error, fmt};

use crate::{
    data_url::{data_url, mime_type_for_extension},
    drivers::{Driver, LlmError, LlmOpts, openai::OpenAiDriver},
    prelude::*,
    prompt::{Language, OcrPrompt},
};

/// The placeholder key we ship in `.env.example`. Treated the same as no key
/// at all.
const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Configuration for [`OcrClient`]. Passed in explicitly, so callers (and
/// tests) control exactly what the client sees.
#[derive(Clone, Debug, Default)]
pub struct OcrConfig {
    /// The API key for the OpenAI-compatible endpoint.
    pub api_key: Option<String>,

    /// Override the server URL.
    pub api_base: Option<String>,
}

impl OcrConfig {
    /// Read our configuration from `OPENAI_API_KEY` and `OPENAI_API_BASE`.
    pub fn from_env() -> OcrConfig {
        OcrConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            api_base: std::env::var("OPENAI_API_BASE").ok(),
        }
    }
}

/// A classified OCR failure.
///
/// Callers pattern-match on this instead of digging through error chains:
/// configuration problems need the user to fix their setup before retrying,
/// timeouts can be retried as-is, and everything else carries the underlying
/// diagnostic.
#[derive(Debug)]
pub enum OcrError {
    /// The API key is missing, empty, or still the placeholder value.
    Configuration(String),

    /// The remote call timed out. Retrying the same submission may work.
    Timeout(String),

    /// Any other failure from the remote call, wrapping the underlying
    /// message.
    Execution(String),
}

impl fmt::Display for OcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrError::Configuration(message) => write!(f, "{message}"),
            OcrError::Timeout(message) => {
                write!(f, "OCR request timed out: {message}")
            }
            OcrError::Execution(message) => write!(f, "OCR request failed: {message}"),
        }
    }
}

impl error::Error for OcrError {}

/// Classify a driver error. Remote APIs report timeouts in several shapes, so
/// in addition to our own elapsed timer we match "timeout" anywhere in the
/// error text.
fn classify_llm_error(err: LlmError, opts: &LlmOpts) -> OcrError {
    match err {
        LlmError::Timeout => OcrError::Timeout(format!(
            "no complete response after {}s",
            opts.timeout.as_secs()
        )),
        LlmError::Native(err) => {
            let message = format!("{err:#}");
            if message.to_lowercase().contains("timeout") {
                OcrError::Timeout(message)
            } else {
                OcrError::Execution(message)
            }
        }
    }
}

/// Client for single-shot OCR requests.
pub struct OcrClient {
    /// Our configuration.
    config: OcrConfig,

    /// Fixed request parameters.
    opts: LlmOpts,

    /// The driver that talks to the model.
    driver: Box<dyn Driver>,
}

impl OcrClient {
    /// Create a client that talks to an OpenAI-compatible endpoint.
    pub fn new(config: OcrConfig) -> OcrClient {
        let driver = Box::new(OpenAiDriver::new(&config));
        OcrClient {
            config,
            opts: LlmOpts::default(),
            driver,
        }
    }

    /// Create a client with a specific driver.
    #[cfg(test)]
    fn with_driver(config: OcrConfig, driver: Box<dyn Driver>) -> OcrClient {
        OcrClient {
            config,
            opts: LlmOpts::default(),
            driver,
        }
    }

    /// Check that we have a usable API key before doing anything else.
    fn ensure_configured(&self) -> Result<(), OcrError> {
        match self.config.api_key.as_deref() {
            None | Some("") | Some(PLACEHOLDER_API_KEY) => {
                Err(OcrError::Configuration(
                    "API key is not set. Add OPENAI_API_KEY to your environment or .env file."
                        .to_owned(),
                ))
            }
            Some(_) => Ok(()),
        }
    }

    /// Transcribe a single image.
    ///
    /// `extension` is the file extension the caller saw; it only selects the
    /// MIME type in the data URL. `language` selects which instruction we
    /// send, falling back to automatic detection for unknown values. On
    /// success, the returned text is the model's output, untouched.
    #[instrument(
        level = "debug",
        skip_all,
        fields(extension = %extension, language = %language, bytes = image_data.len())
    )]
    pub async fn submit(
        &self,
        image_data: &[u8],
        extension: &str,
        language: &str,
    ) -> Result<String, OcrError> {
        self.ensure_configured()?;

        let mime_type = mime_type_for_extension(extension);
        let prompt = OcrPrompt::new(
            Language::from_option_str(language),
            data_url(mime_type, image_data),
        );
        debug!(%mime_type, "submitting OCR request");

        match self.driver.chat_completion(&prompt, &self.opts).await {
            Ok(text) => Ok(text),
            Err(err) => Err(classify_llm_error(err, &self.opts)),
        }
    }
}

// We focus on the sad paths here; the happy path against a live server is
// covered by the ignored CLI tests.
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;

    /// Canned driver outcomes.
    #[derive(Clone, Copy, Debug)]
    enum Canned {
        Text(&'static str),
        Failure(&'static str),
        Timeout,
    }

    /// A driver that returns a canned outcome and counts its calls.
    #[derive(Debug)]
    struct CannedDriver {
        outcome: Canned,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Driver for CannedDriver {
        async fn chat_completion(
            &self,
            _prompt: &OcrPrompt,
            _opts: &LlmOpts,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Canned::Text(text) => Ok(text.to_owned()),
                Canned::Failure(message) => Err(LlmError::Native(anyhow!("{message}"))),
                Canned::Timeout => Err(LlmError::Timeout),
            }
        }
    }

    fn client_with(config: OcrConfig, outcome: Canned) -> (OcrClient, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let driver = Box::new(CannedDriver {
            outcome,
            calls: calls.clone(),
        });
        (OcrClient::with_driver(config, driver), calls)
    }

    fn configured() -> OcrConfig {
        OcrConfig {
            api_key: Some("sk-test".to_owned()),
            api_base: None,
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_calling_the_driver() {
        let (client, calls) = client_with(OcrConfig::default(), Canned::Text("hi"));
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        assert!(matches!(err, OcrError::Configuration(_)), "got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn placeholder_api_key_behaves_like_a_missing_one() {
        let config = OcrConfig {
            api_key: Some("your_api_key_here".to_owned()),
            api_base: None,
        };
        let (client, calls) = client_with(config, Canned::Text("hi"));
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        assert!(matches!(err, OcrError::Configuration(_)), "got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_api_key_behaves_like_a_missing_one() {
        let config = OcrConfig {
            api_key: Some(String::new()),
            api_base: None,
        };
        let (client, calls) = client_with(config, Canned::Text("hi"));
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        assert!(matches!(err, OcrError::Configuration(_)), "got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_messages_are_classified_as_timeouts() {
        let (client, calls) = client_with(
            configured(),
            Canned::Failure("Connection timeout after 60s"),
        );
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout(_)), "got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_matching_ignores_case() {
        let (client, _calls) =
            client_with(configured(), Canned::Failure("Request TIMEOUT"));
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn elapsed_driver_timeouts_are_classified_as_timeouts() {
        let (client, _calls) = client_with(configured(), Canned::Timeout);
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn other_failures_keep_the_underlying_message() {
        let (client, calls) =
            client_with(configured(), Canned::Failure("rate limit exceeded"));
        let err = client.submit(b"fake png", "png", "auto").await.unwrap_err();
        match &err {
            OcrError::Execution(message) => assert_eq!(message, "rate limit exceeded"),
            other => panic!("expected an execution failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_responses_are_returned_verbatim() {
        let (client, calls) =
            client_with(configured(), Canned::Text("こんにちは\nWorld"));
        let text = client.submit(b"fake png", "png", "auto").await.unwrap();
        assert_eq!(text, "こんにちは\nWorld");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
