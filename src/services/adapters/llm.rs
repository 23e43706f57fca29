use async_trait::async_trait;

use super::error::ServiceError;
use super::ollama::OllamaClient;

/// Input longer than this many characters is cut before summarising.
pub const SUMMARY_INPUT_CHARS: usize = 4000;

/// Text LLM used both to summarise documents and to propose folders.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, ServiceError>;

    /// Returns a raw POSIX-style path suggestion; callers clean it up.
    async fn suggest_folder(
        &self,
        filename: &str,
        description: &str,
        category: &str,
    ) -> Result<String, ServiceError>;
}

pub struct OllamaTextGenerator {
    client: OllamaClient,
}

impl OllamaTextGenerator {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following document in 2-3 sentences. Reply with the summary only.\n\n{}",
        truncate_chars(text, SUMMARY_INPUT_CHARS)
    )
}

fn folder_prompt(filename: &str, description: &str, category: &str) -> String {
    format!(
        "Suggest a folder for this file in a personal file library.\n\
         File name: {}\nCategory: {}\nDescription: {}\n\n\
         Reply with a single folder path such as /Photos/Travel and nothing else.",
        filename, category, description
    )
}

#[async_trait]
impl TextGenerator for OllamaTextGenerator {
    async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
        let summary = self.client.generate(&summary_prompt(text), Vec::new()).await?;
        Ok(summary.trim().to_string())
    }

    async fn suggest_folder(
        &self,
        filename: &str,
        description: &str,
        category: &str,
    ) -> Result<String, ServiceError> {
        self.client
            .generate(&folder_prompt(filename, description, category), Vec::new())
            .await
    }
}
