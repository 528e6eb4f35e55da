use std::env;

use crate::ai::chat::{DEFAULT_END_MARK, DEFAULT_MAX_ROUNDS};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub openai_models: Vec<String>,
    pub model_family: String,
    pub system_message: String,
    pub end_mark: String,
    pub max_rounds: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let openai_api_hostname = env::var("STITCH_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let openai_models = env::var("STITCH_LLM_MODELS")
            .unwrap_or_else(|_| "gpt-4.1-mini".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let model_family =
            env::var("STITCH_MODEL_FAMILY").unwrap_or_else(|_| "gpt".to_string());
        let system_message = env::var("STITCH_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| "You are a helpful assistant.".to_string());
        let end_mark =
            env::var("STITCH_END_MARK").unwrap_or_else(|_| DEFAULT_END_MARK.to_string());
        let max_rounds = env::var("STITCH_MAX_ROUNDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ROUNDS);

        Self {
            openai_api_hostname,
            openai_api_key,
            openai_models,
            model_family,
            system_message,
            end_mark,
            max_rounds,
        }
    }
}
