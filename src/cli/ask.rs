use std::sync::Arc;

use anyhow::Result;

use crate::ai::chat::ChatSession;
use crate::ai::model::{ModelQuery, ModelSelector};
use crate::core::AppConfig;
use crate::openai::{Message, OpenAiModels, Role};

pub async fn run(prompt: &str, max_rounds: Option<usize>) -> Result<()> {
    let config = AppConfig::default();
    let selector: Arc<dyn ModelSelector> = Arc::new(OpenAiModels::new(
        &config.openai_api_hostname,
        &config.openai_api_key,
        config.openai_models.clone(),
    ));

    // The model only emits the end-marker if it's told to
    let system = format!(
        "{} End every complete answer with \"{}\".",
        config.system_message, config.end_mark
    );

    let session = ChatSession::builder(selector)
        .seed(vec![Message::new(Role::System, &system)])
        .model_query(ModelQuery::family(&config.model_family))
        .max_rounds(max_rounds.unwrap_or(config.max_rounds))
        .end_mark(&config.end_mark)
        .build();

    let answer = session.send(prompt).await?;
    println!("{}", answer);

    Ok(())
}
