//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::ChatRequest;
use crate::server::AppState;
use anyhow::Result;

/// Answer one question, optionally continuing a session.
pub async fn run_ask(question: &str, session: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let state = AppState::from_settings(&settings)?;

    let mut request = ChatRequest::new(question);
    request.session_id = session;

    let spinner = Output::spinner("Thinking...");
    let result = state.chat.answer(request).await;
    spinner.finish_and_clear();

    match result {
        Ok(reply) => {
            Output::answer(&reply.answer);
            Output::kv("Session", &reply.session_id.to_string());
            Output::info("Pass --session to continue this conversation.");
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            Err(e.into())
        }
    }
}
