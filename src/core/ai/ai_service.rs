use super::models::{AiConfig, AiMessage, AiProviderResponse};
use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request to the AI provider.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider>
// This lets the composition root pick Gemini or OpenRouter at runtime
// while the services stay generic over the provider.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        (**self).chat_complete(messages, config).await
    }
}

/// A provider bound to one fixed instruction and generation config.
pub struct AiService<P: AiProvider> {
    provider: P,
    system_prompt: String,
    config: AiConfig,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, system_prompt: String, config: AiConfig) -> Self {
        Self {
            provider,
            system_prompt,
            config,
        }
    }

    /// Send the instruction plus one user message and return the answer text.
    pub async fn ask(&self, user_content: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let messages = vec![
            AiMessage::system(self.system_prompt.clone()),
            AiMessage::user(user_content),
        ];

        let response = self.provider.chat_complete(&messages, &self.config).await?;
        Ok(response.content)
    }
}
