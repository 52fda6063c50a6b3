//! The per-request answer pipeline.
//!
//! detect language -> translate in -> load history -> rewrite -> embed ->
//! retrieve -> assemble -> generate -> translate out -> persist.
//!
//! Only embedding, retrieval and generation are mandatory. Every other step
//! falls back to a safe default and logs a warning.

use super::context::{context_texts, ContextBuilder};
use crate::capability::bounded;
use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use crate::history::{HistoryStore, Message, Role, Turn};
use crate::language::LanguageService;
use crate::llm::{ChatModel, CompletionOptions};
use crate::prompt::PromptAssembler;
use crate::rewrite::QueryRewriter;
use crate::session::SessionId;
use crate::vector_store::VectorStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Identifier recorded for callers that do not send one.
pub const DEFAULT_USER_ID: &str = "defaultUser";

/// One chat question with its optional session context.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub question: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// History the client holds. Used only when the store has none.
    pub client_history: Vec<Message>,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// A generated answer and the session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatAnswer {
    pub answer: String,
    pub session_id: SessionId,
}

/// Retrieval-augmented answering over a shared document store.
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct RagAnswerPipeline {
    language: LanguageService,
    rewriter: QueryRewriter,
    context: ContextBuilder,
    assembler: PromptAssembler,
    answer_model: Arc<dyn ChatModel>,
    history: Arc<dyn HistoryStore>,
    prompts: Prompts,
    system_prompt_path: Option<PathBuf>,
    max_prompt_turns: usize,
    timeout: Duration,
}

impl RagAnswerPipeline {
    /// Wire the pipeline from settings.
    ///
    /// `utility_model` serves detection, translation and rewriting;
    /// `answer_model` only generates answers.
    pub fn new(
        settings: &Settings,
        prompts: Prompts,
        answer_model: Arc<dyn ChatModel>,
        utility_model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let timeout = settings.capability_timeout();

        let language = LanguageService::new(utility_model.clone(), settings.language.working_language)
            .with_prompts(prompts.clone())
            .with_timeout(timeout);
        let rewriter = QueryRewriter::new(utility_model)
            .with_settings(settings.rewrite.clone())
            .with_prompts(prompts.clone())
            .with_timeout(timeout);
        let context = ContextBuilder::new(vector_store, embedder).with_settings(settings.retrieval.clone());

        Self {
            language,
            rewriter,
            context,
            assembler: PromptAssembler::new(prompts.rag.clone()),
            answer_model,
            history,
            prompts,
            system_prompt_path: settings
                .prompts
                .system_prompt_path
                .as_deref()
                .map(Settings::expand_path),
            max_prompt_turns: settings.history.max_prompt_turns,
            timeout,
        }
    }

    /// Answer one question.
    ///
    /// Fails with `InvalidInput` on an empty question and with a capability
    /// error when embedding, retrieval or generation fail. Nothing is
    /// persisted for a failed exchange.
    #[instrument(skip(self, request), fields(session = tracing::field::Empty))]
    pub async fn answer(&self, request: ChatRequest) -> Result<ChatAnswer> {
        let started = Instant::now();

        let question = request.question.trim();
        if question.is_empty() {
            return Err(DocentError::InvalidInput("Please provide a question.".into()));
        }

        let session_id = SessionId::resolve(request.session_id.as_deref());
        tracing::Span::current().record("session", tracing::field::display(session_id));
        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_USER_ID);

        let working = self.language.working_language();
        let user_language = self.language.detect_language(question).await;

        let working_question = if user_language == working {
            question.to_string()
        } else {
            match self.language.translate(question, user_language, working).await {
                Ok(translated) => translated,
                Err(e) => {
                    warn!("Question translation failed, using original text: {}", e);
                    question.to_string()
                }
            }
        };

        let history = self.load_history(&session_id, request.client_history).await;

        let query = self.rewriter.rewrite(&working_question, &history).await;

        let query_vector = bounded("query embedding", self.timeout, self.context.embed_query(&query)).await?;
        let matches = bounded("vector query", self.timeout, self.context.retrieve(&query_vector)).await?;
        debug!("Retrieved {} context chunks", matches.len());

        let system_prompt = self.prompts.system_prompt(self.system_prompt_path.as_deref()).await;
        let messages = self.assembler.build(
            &system_prompt,
            &context_texts(&matches),
            &history,
            &working_question,
        );

        let answer = bounded(
            "answer generation",
            self.timeout,
            self.answer_model.complete(&messages, CompletionOptions::default()),
        )
        .await?;

        let answer = if user_language == working {
            answer
        } else {
            match self.language.translate(&answer, working, user_language).await {
                Ok(translated) => translated,
                Err(e) => {
                    warn!("Answer translation failed, returning {} answer: {}", working, e);
                    answer
                }
            }
        };

        self.persist(&session_id, user_id, &request.question, &answer).await;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            language = %user_language,
            context_chunks = matches.len(),
            "Answered chat request"
        );

        Ok(ChatAnswer { answer, session_id })
    }

    /// Stored history for the session, else the client's copy, capped to
    /// the most recent `max_prompt_turns`.
    async fn load_history(&self, session_id: &SessionId, client_history: Vec<Message>) -> Vec<Message> {
        let stored = match bounded("history read", self.timeout, self.history.read(session_id)).await {
            Ok(turns) => turns.iter().map(Turn::message).collect(),
            Err(e) => {
                warn!("History read failed, continuing without stored history: {}", e);
                Vec::new()
            }
        };

        let mut history: Vec<Message> = if stored.is_empty() { client_history } else { stored };

        if history.len() > self.max_prompt_turns {
            let excess = history.len() - self.max_prompt_turns;
            debug!("Dropping {} oldest turns from the prompt", excess);
            history.drain(..excess);
        }
        history
    }

    async fn persist(&self, session_id: &SessionId, user_id: &str, question: &str, answer: &str) {
        let turns = [
            Turn::new(*session_id, user_id, Role::User, question),
            Turn::new(*session_id, user_id, Role::Assistant, answer),
        ];
        if let Err(e) = bounded("history write", self.timeout, self.history.append(&turns)).await {
            warn!("Failed to persist chat turns: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use crate::llm::ChatMessage;
    use crate::testing::{last_user, system_of, KeywordEmbedder, ScriptedChatModel};
    use crate::vector_store::{MemoryVectorStore, StoredChunk};
    use async_trait::async_trait;
    use chrono::Utc;

    const AUTISM_FACT: &str = "Autism is a developmental condition affecting communication.";

    /// Utility model that detects by keyword and translates by lookup table.
    fn utility_model() -> ScriptedChatModel {
        ScriptedChatModel::new(|messages: &[ChatMessage]| {
            let system = system_of(messages);
            let text = last_user(messages);
            if system.contains("language detection") {
                return Ok(if text.contains("autismo") { "spa" } else { "eng" }.to_string());
            }
            if system.contains("user question to English") {
                return Ok(text.replace("¿Qué es el autismo?", "What is autism?"));
            }
            if system.contains("into Spanish") {
                return Ok(text.replace("Autism is", "El autismo es"));
            }
            Ok(format!("standalone: {}", text))
        })
    }

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = KeywordEmbedder::new(&["autism", "diet"]);
        let vector = embedder.embed(AUTISM_FACT).await.unwrap();
        store
            .insert(&[StoredChunk::new("faq.txt".into(), AUTISM_FACT.into(), Utc::now(), vector)])
            .await
            .unwrap();
        store
    }

    struct Harness {
        pipeline: RagAnswerPipeline,
        answer_model: Arc<ScriptedChatModel>,
        history: Arc<MemoryHistoryStore>,
    }

    fn harness(
        answer_model: ScriptedChatModel,
        store: Arc<MemoryVectorStore>,
        history: Arc<MemoryHistoryStore>,
    ) -> Harness {
        let answer_model = Arc::new(answer_model);
        let pipeline = RagAnswerPipeline::new(
            &Settings::default(),
            Prompts::default(),
            answer_model.clone(),
            Arc::new(utility_model()),
            Arc::new(KeywordEmbedder::new(&["autism", "diet"])),
            store,
            history.clone(),
        );
        Harness {
            pipeline,
            answer_model,
            history,
        }
    }

    #[tokio::test]
    async fn test_empty_question_is_invalid_input() {
        let h = harness(
            ScriptedChatModel::replying("unused"),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryHistoryStore::new()),
        );

        let err = h.pipeline.answer(ChatRequest::new("   ")).await.unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(h.answer_model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context_and_persists_turns() {
        let h = harness(
            ScriptedChatModel::replying("Autism is a spectrum."),
            seeded_store().await,
            Arc::new(MemoryHistoryStore::new()),
        );

        let reply = h.pipeline.answer(ChatRequest::new("What is autism?")).await.unwrap();
        assert_eq!(reply.answer, "Autism is a spectrum.");

        let calls = h.answer_model.calls();
        let system = system_of(&calls[0].0);
        assert!(system.contains("Relevant information from documents:"));
        assert!(system.contains(AUTISM_FACT));
        assert_eq!(last_user(&calls[0].0), "What is autism?");

        let turns = h.history.read(&reply.session_id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "What is autism?");
        assert_eq!(turns[0].user_id, DEFAULT_USER_ID);
        assert_eq!(turns[1].content, "Autism is a spectrum.");
    }

    #[tokio::test]
    async fn test_no_matches_uses_bare_system_prompt() {
        let h = harness(
            ScriptedChatModel::replying("I can help with that."),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryHistoryStore::new()),
        );

        let reply = h.pipeline.answer(ChatRequest::new("What is autism?")).await.unwrap();
        assert_eq!(reply.answer, "I can help with that.");
        assert_eq!(
            system_of(&h.answer_model.calls()[0].0),
            crate::config::DEFAULT_SYSTEM_PROMPT
        );
    }

    #[tokio::test]
    async fn test_generation_failure_persists_nothing() {
        let history = Arc::new(MemoryHistoryStore::new());
        let h = harness(ScriptedChatModel::failing(), seeded_store().await, history.clone());

        let session = SessionId::mint();
        let result = h
            .pipeline
            .answer(ChatRequest::new("What is autism?").with_session(session.to_string()))
            .await;

        assert!(matches!(result, Err(DocentError::Generation(_))));
        assert!(history.read(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_question_is_translated_both_ways() {
        let h = harness(
            ScriptedChatModel::replying("<b>Autism is</b> a developmental condition."),
            seeded_store().await,
            Arc::new(MemoryHistoryStore::new()),
        );

        let reply = h.pipeline.answer(ChatRequest::new("¿Qué es el autismo?")).await.unwrap();

        assert_eq!(reply.answer, "<b>El autismo es</b> a developmental condition.");
        // Generation ran on the working-language question
        assert_eq!(last_user(&h.answer_model.calls()[0].0), "What is autism?");
        // The original question is what gets persisted
        let turns = h.history.read(&reply.session_id).await.unwrap();
        assert_eq!(turns[0].content, "¿Qué es el autismo?");
        assert_eq!(turns[1].content, reply.answer);
    }

    #[tokio::test]
    async fn test_existing_session_history_is_replayed() {
        let history = Arc::new(MemoryHistoryStore::new());
        let h = harness(ScriptedChatModel::replying("Yes."), seeded_store().await, history.clone());

        let first = h.pipeline.answer(ChatRequest::new("What is autism?")).await.unwrap();
        let second = h
            .pipeline
            .answer(ChatRequest::new("Is it lifelong?").with_session(first.session_id.to_string()))
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);

        let calls = h.answer_model.calls();
        let roles: Vec<&str> = calls[1].0.iter().map(|m| m.role_name()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);

        let contents: Vec<String> = history
            .read(&first.session_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["What is autism?", "Yes.", "Is it lifelong?", "Yes."]);
    }

    #[tokio::test]
    async fn test_client_history_used_when_store_is_empty() {
        let h = harness(
            ScriptedChatModel::replying("Sure."),
            seeded_store().await,
            Arc::new(MemoryHistoryStore::new()),
        );

        let mut request = ChatRequest::new("and adults?");
        request.client_history = vec![
            Message::new(Role::User, "What is autism?"),
            Message::new(Role::Assistant, "A developmental condition."),
        ];
        h.pipeline.answer(request).await.unwrap();

        let calls = h.answer_model.calls();
        assert_eq!(calls[0].0.len(), 4);
        assert_eq!(calls[0].0[2].content(), "A developmental condition.");
    }

    #[tokio::test]
    async fn test_invalid_session_id_is_replaced() {
        let h = harness(
            ScriptedChatModel::replying("Hi."),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryHistoryStore::new()),
        );

        let reply = h
            .pipeline
            .answer(ChatRequest::new("hello").with_session("not-a-uuid"))
            .await
            .unwrap();
        assert_ne!(reply.session_id.to_string(), "not-a-uuid");
        assert!(SessionId::parse(&reply.session_id.to_string()).is_some());
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let history = Arc::new(MemoryHistoryStore::new());
        let session = SessionId::mint();
        let turns: Vec<Turn> = (0..30)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                Turn::new(session, "u", role, format!("turn {}", i))
            })
            .collect();
        history.append(&turns).await.unwrap();

        let h = harness(ScriptedChatModel::replying("ok"), seeded_store().await, history);
        h.pipeline
            .answer(ChatRequest::new("What is autism and why does it matter for my family?").with_session(session.to_string()))
            .await
            .unwrap();

        let messages = &h.answer_model.calls()[0].0;
        // system + 20 history + question
        assert_eq!(messages.len(), 22);
        assert_eq!(messages[1].content(), "turn 10");
    }

    /// Detects `code` for every message, fails every translation and rewrites
    /// follow-ups to `rewritten`.
    fn untranslating_utility(code: &'static str, rewritten: &'static str) -> ScriptedChatModel {
        ScriptedChatModel::new(move |messages: &[ChatMessage]| {
            let system = system_of(messages);
            if system.contains("language detection") {
                return Ok(code.to_string());
            }
            if system.starts_with("Translate") {
                return Err(DocentError::Generation("translator unavailable".into()));
            }
            Ok(rewritten.to_string())
        })
    }

    #[tokio::test]
    async fn test_translation_failures_fall_back_to_untranslated_text() {
        let answer_model = Arc::new(ScriptedChatModel::replying("Autism is a spectrum."));
        let utility = Arc::new(untranslating_utility("spa", "unused"));
        let history = Arc::new(MemoryHistoryStore::new());
        let pipeline = RagAnswerPipeline::new(
            &Settings::default(),
            Prompts::default(),
            answer_model.clone(),
            utility.clone(),
            Arc::new(KeywordEmbedder::new(&["autism", "diet"])),
            seeded_store().await,
            history.clone(),
        );

        let reply = pipeline.answer(ChatRequest::new("¿Qué es el autismo?")).await.unwrap();

        // The answer comes back in the working language
        assert_eq!(reply.answer, "Autism is a spectrum.");
        // Generation ran on the original question
        assert_eq!(last_user(&answer_model.calls()[0].0), "¿Qué es el autismo?");

        let translation_attempts = utility
            .calls()
            .iter()
            .filter(|(messages, _)| system_of(messages).starts_with("Translate"))
            .count();
        assert_eq!(translation_attempts, 2);

        let turns = history.read(&reply.session_id).await.unwrap();
        assert_eq!(turns[0].content, "¿Qué es el autismo?");
        assert_eq!(turns[1].content, "Autism is a spectrum.");
    }

    #[tokio::test]
    async fn test_rewritten_query_is_what_gets_embedded() {
        let answer_model = Arc::new(ScriptedChatModel::replying("In adults it persists."));
        let embedder = Arc::new(KeywordEmbedder::new(&["autism", "diet"]));
        let pipeline = RagAnswerPipeline::new(
            &Settings::default(),
            Prompts::default(),
            answer_model.clone(),
            Arc::new(untranslating_utility("eng", "What is autism in adults?")),
            embedder.clone(),
            seeded_store().await,
            Arc::new(MemoryHistoryStore::new()),
        );

        let mut request = ChatRequest::new("and adults?");
        request.client_history = vec![
            Message::new(Role::User, "What is autism?"),
            Message::new(Role::Assistant, "A developmental condition."),
        ];
        pipeline.answer(request).await.unwrap();

        assert_eq!(embedder.embedded_texts(), vec!["What is autism in adults?"]);

        // The rewritten query found the autism chunk
        let calls = answer_model.calls();
        assert!(system_of(&calls[0].0).contains(AUTISM_FACT));
        // The prompt still carries the question as asked
        assert_eq!(last_user(&calls[0].0), "and adults?");
    }

    struct BrokenHistory;

    #[async_trait]
    impl HistoryStore for BrokenHistory {
        async fn append(&self, _turns: &[Turn]) -> Result<()> {
            Err(DocentError::History("disk full".into()))
        }

        async fn read(&self, _session_id: &SessionId) -> Result<Vec<Turn>> {
            Err(DocentError::History("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_history_failures_do_not_fail_the_request() {
        let answer_model = Arc::new(ScriptedChatModel::replying("Still here."));
        let pipeline = RagAnswerPipeline::new(
            &Settings::default(),
            Prompts::default(),
            answer_model,
            Arc::new(utility_model()),
            Arc::new(KeywordEmbedder::new(&["autism", "diet"])),
            seeded_store().await,
            Arc::new(BrokenHistory),
        );

        let reply = pipeline.answer(ChatRequest::new("What is autism?")).await.unwrap();
        assert_eq!(reply.answer, "Still here.");
    }
}
