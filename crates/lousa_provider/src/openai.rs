use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionStreamOptions, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    CreateEmbeddingRequest, EmbeddingInput,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use lousa_domain::{
    ChatCompletion, ChatDelta, ChatMessage, ChatRequest, ChatRole, Error, ModelConfig,
    ProviderService, ResultStream, RetryConfig, Usage,
};
use tracing::debug;

use crate::retry::retry_with_config;

/// Model provider backed by the OpenAI API: batched embeddings plus chat
/// completion with token streaming.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: ModelConfig,
    retry: RetryConfig,
}

impl OpenAiProvider {
    /// Reads the API key from `OPENAI_API_KEY`.
    pub fn new(model: ModelConfig, retry: RetryConfig) -> Self {
        Self { client: Client::new(), model, retry }
    }

    pub fn with_api_key(api_key: impl Into<String>, model: ModelConfig, retry: RetryConfig) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self { client: Client::with_config(config), model, retry }
    }

    fn build_chat_request(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> anyhow::Result<CreateChatCompletionRequest> {
        let messages = request
            .messages
            .iter()
            .map(to_request_message)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.model.chat_model.clone())
            .messages(messages)
            .max_tokens(request.max_tokens.unwrap_or(self.model.max_tokens));
        if let Some(temperature) = request.temperature {
            builder.temperature(temperature);
        }
        if stream {
            builder
                .stream(true)
                .stream_options(ChatCompletionStreamOptions { include_usage: true });
        }
        Ok(builder.build()?)
    }
}

fn to_request_message(message: &ChatMessage) -> anyhow::Result<ChatCompletionRequestMessage> {
    let message = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
    };
    Ok(message)
}

fn to_usage(usage: Option<async_openai::types::CompletionUsage>) -> Usage {
    usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default()
}

#[async_trait]
impl ProviderService for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatCompletion> {
        let payload = self.build_chat_request(&request, false)?;
        debug!(model = %self.model.chat_model, messages = payload.messages.len(), "Chat completion");

        let response = retry_with_config(&self.retry, || {
            let payload = payload.clone();
            async move {
                self.client
                    .chat()
                    .create(payload)
                    .await
                    .map_err(|e| anyhow::Error::from(Error::retryable(e)))
            }
        })
        .await?;

        let usage = to_usage(response.usage);
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(ChatCompletion::new(content, usage))
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> ResultStream<ChatDelta, anyhow::Error> {
        let payload = self.build_chat_request(&request, true)?;
        debug!(model = %self.model.chat_model, "Opening chat stream");

        let stream = retry_with_config(&RetryConfig::streaming(), || {
            let payload = payload.clone();
            async move {
                self.client
                    .chat()
                    .create_stream(payload)
                    .await
                    .map_err(|e| anyhow::Error::from(Error::retryable(e)))
            }
        })
        .await?;

        let mapped = stream.map(|item| match item {
            Ok(response) => {
                let content = response
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.clone())
                    .unwrap_or_default();
                Ok(ChatDelta { content, usage: response.usage.map(|u| to_usage(Some(u))) })
            }
            Err(e) => Err(anyhow::Error::from(e)),
        });

        Ok(Box::new(mapped))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let count = texts.len();
        debug!(model = %self.model.embedding_model, count, "Embedding batch");

        let response = retry_with_config(&self.retry, || {
            let texts = texts.clone();
            async move {
                self.client
                    .embeddings()
                    .create(CreateEmbeddingRequest {
                        model: self.model.embedding_model.clone(),
                        input: EmbeddingInput::StringArray(texts),
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| anyhow::Error::from(Error::retryable(e)))
            }
        })
        .await
        .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        if response.data.len() != count {
            anyhow::bail!(Error::EmbeddingUnavailable(format!(
                "provider returned {} vectors for {} inputs",
                response.data.len(),
                count
            )));
        }

        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embed_batch(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("empty embedding response".into()).into())
    }

    fn embedding_dimension(&self) -> u64 {
        self.model.embedding_dimension()
    }
}
