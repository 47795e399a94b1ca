//! Our OpenAI driver, which also works with LiteLLM, Ollama and other
//! compatible gateways.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
};
use async_trait::async_trait;
use futures::TryFutureExt as _;
use tokio::time;

use crate::{ocr::OcrConfig, prelude::*, prompt::OcrPrompt};

use super::{Driver, LlmError, LlmOpts};

/// Our OpenAI driver.
#[derive(Debug)]
pub struct OpenAiDriver {
    /// The OpenAI client.
    client: Client<OpenAIConfig>,
}

impl OpenAiDriver {
    /// Create a new OpenAI driver for the given configuration.
    pub fn new(config: &OcrConfig) -> Self {
        let mut client_config = OpenAIConfig::new();
        if let Some(api_key) = &config.api_key {
            client_config = client_config.with_api_key(api_key);
        }
        if let Some(api_base) = &config.api_base {
            client_config = client_config.with_api_base(api_base);
        }
        Self {
            client: Client::with_config(client_config),
        }
    }
}

/// Turn an OCR prompt into a chat request: the fixed system message, plus one
/// user message carrying the instruction text and the inline image.
fn build_request(
    prompt: &OcrPrompt,
    opts: &LlmOpts,
) -> Result<CreateChatCompletionRequest> {
    let system = ChatCompletionRequestSystemMessageArgs::default()
        .content(prompt.system)
        .build()?;
    let instruction = ChatCompletionRequestMessageContentPartTextArgs::default()
        .text(prompt.instruction)
        .build()?;
    let image = ChatCompletionRequestMessageContentPartImageArgs::default()
        .image_url(
            ImageUrlArgs::default()
                .url(prompt.image_data_url.clone())
                .build()?,
        )
        .build()?;
    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(vec![instruction.into(), image.into()])
        .build()?;
    CreateChatCompletionRequestArgs::default()
        .model(opts.model)
        .messages(vec![system.into(), user.into()])
        .max_completion_tokens(opts.max_completion_tokens)
        .build()
        .context("error building chat request")
}

#[async_trait]
impl Driver for OpenAiDriver {
    async fn chat_completion(
        &self,
        prompt: &OcrPrompt,
        opts: &LlmOpts,
    ) -> Result<String, LlmError> {
        let req = build_request(prompt, opts).map_err(LlmError::Native)?;
        trace!(?req, "request");

        // Call OpenAI, with a hard timeout on the whole request.
        let chat = self.client.chat();
        let chat_future = chat.create(req).map_err(LlmError::native);
        let response = match time::timeout(opts.timeout, chat_future).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout),
        };
        debug!(id = %response.id, "chat completion response");

        // Return the content of our first choice, untouched.
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Native(anyhow!("no choices in response")))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}
