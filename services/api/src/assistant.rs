//! The action that chat credits pay for

use anyhow::Result;
use async_trait::async_trait;

/// Something that answers a prompt
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn respond(&self, prompt: &str) -> Result<String>;
}

/// Local assistant that acknowledges the prompt without calling out
#[derive(Debug, Clone, Default)]
pub struct EchoAssistant;

#[async_trait]
impl Assistant for EchoAssistant {
    async fn respond(&self, prompt: &str) -> Result<String> {
        Ok(format!("You asked: {}", prompt.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_trims_prompt() {
        let reply = EchoAssistant.respond("  hello  ").await.unwrap();
        assert_eq!(reply, "You asked: hello");
    }
}
