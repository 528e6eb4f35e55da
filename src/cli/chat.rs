use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::ai::chat::ChatSession;
use crate::ai::model::{ModelQuery, ModelSelector};
use crate::core::AppConfig;
use crate::openai::{Message, OpenAiModels, Role};

pub async fn run() -> Result<()> {
    let mut rl = DefaultEditor::new().expect("Editor failed");

    let config = AppConfig::default();
    let selector: Arc<dyn ModelSelector> = Arc::new(OpenAiModels::new(
        &config.openai_api_hostname,
        &config.openai_api_key,
        config.openai_models.clone(),
    ));

    let system = format!(
        "{} End every complete answer with \"{}\".",
        config.system_message, config.end_mark
    );
    let mut history = vec![Message::new(Role::System, &system)];

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                // Each turn gets a fresh session seeded with the
                // conversation so far; the session only tracks the
                // rounds of one completed answer
                let session = ChatSession::builder(selector.clone())
                    .seed(history.clone())
                    .model_query(ModelQuery::family(&config.model_family))
                    .max_rounds(config.max_rounds)
                    .end_mark(&config.end_mark)
                    .build();

                let answer = session.send(line.as_str()).await?;
                println!("{}", answer);

                history.push(Message::new(Role::User, &line));
                history.push(Message::new(Role::Assistant, &answer));
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
