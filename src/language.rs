//! Language detection and translation.
//!
//! Retrieval and generation run in one working language. Questions in any
//! other supported language are translated in, answers translated back.
//! Detection never fails from the caller's point of view: anything
//! unrecognised collapses to the working language.

use crate::capability::{bounded, DEFAULT_CALL_TIMEOUT};
use crate::config::{LanguagePrompts, Prompts};
use crate::error::{DocentError, Result};
use crate::llm::{ChatMessage, ChatModel, CompletionOptions};
use crate::markup::ProtectedText;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Supported languages, identified by ISO 639-3 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "rus")]
    Russian,
    #[serde(rename = "eng")]
    English,
    #[serde(rename = "spa")]
    Spanish,
    #[serde(rename = "fra")]
    French,
    #[serde(rename = "deu")]
    German,
    #[serde(rename = "ita")]
    Italian,
    #[serde(rename = "por")]
    Portuguese,
    #[serde(rename = "heb")]
    Hebrew,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Russian,
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Hebrew,
    ];

    /// ISO 639-3 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Russian => "rus",
            Language::English => "eng",
            Language::Spanish => "spa",
            Language::French => "fra",
            Language::German => "deu",
            Language::Italian => "ita",
            Language::Portuguese => "por",
            Language::Hebrew => "heb",
        }
    }

    /// English display name, used in translation instructions.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Russian => "Russian",
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Hebrew => "Hebrew",
        }
    }

    /// Look up a code, ignoring case and surrounding whitespace.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        Self::ALL.into_iter().find(|l| l.code() == code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Detects and translates between the user's language and the working language.
pub struct LanguageService {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
    working: Language,
    timeout: Duration,
}

impl LanguageService {
    pub fn new(model: Arc<dyn ChatModel>, working: Language) -> Self {
        Self {
            model,
            prompts: Prompts::default(),
            working,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn working_language(&self) -> Language {
        self.working
    }

    fn language_prompts(&self) -> &LanguagePrompts {
        &self.prompts.language
    }

    /// Ask the model for the language code of `text`.
    ///
    /// Fails on capability errors and on codes outside the supported set.
    #[instrument(skip(self, text))]
    pub async fn try_detect(&self, text: &str) -> Result<Language> {
        let messages = vec![
            ChatMessage::System(self.language_prompts().detect.clone()),
            ChatMessage::User(text.to_string()),
        ];

        let reply = bounded(
            "language detection",
            self.timeout,
            self.model.complete(&messages, CompletionOptions::deterministic()),
        )
        .await?;

        Language::from_code(&reply).ok_or(DocentError::UnsupportedLanguage(reply))
    }

    /// Detect the language of `text`, defaulting to the working language.
    pub async fn detect_language(&self, text: &str) -> Language {
        match self.try_detect(text).await {
            Ok(language) => {
                debug!("Detected language: {}", language);
                language
            }
            Err(e) => {
                warn!("Language detection failed, assuming {}: {}", self.working, e);
                self.working
            }
        }
    }

    /// Translate `text` from `from` into `to`. Identity when the languages match.
    ///
    /// Markup tags come back byte-for-byte or the translation is rejected.
    #[instrument(skip(self, text))]
    pub async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String> {
        if from == to {
            return Ok(text.to_string());
        }

        let protected = ProtectedText::protect(text);

        let template = if to == self.working {
            &self.language_prompts().translate_question
        } else {
            &self.language_prompts().translate_answer
        };
        let mut vars = HashMap::new();
        vars.insert("from".to_string(), from.name().to_string());
        vars.insert("to".to_string(), to.name().to_string());
        let instruction = self.prompts.render_with_custom(template, &vars);

        let messages = vec![
            ChatMessage::System(instruction),
            ChatMessage::User(protected.text.clone()),
        ];

        let translated = bounded(
            "translation",
            self.timeout,
            self.model.complete(&messages, CompletionOptions::deterministic()),
        )
        .await
        .map_err(|e| DocentError::Translation(e.to_string()))?;

        protected.restore(translated.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{last_user, system_of, ScriptedChatModel};

    fn service(model: ScriptedChatModel) -> (LanguageService, Arc<ScriptedChatModel>) {
        let model = Arc::new(model);
        (LanguageService::new(model.clone(), Language::English), model)
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code(" RUS\n"), Some(Language::Russian));
        assert_eq!(Language::from_code("heb"), Some(Language::Hebrew));
        assert_eq!(Language::from_code("jpn"), None);
        assert_eq!(Language::Portuguese.name(), "Portuguese");
        for language in Language::ALL {
            assert_eq!(Language::from_code(language.code()), Some(language));
        }
    }

    #[tokio::test]
    async fn test_detect_supported_language() {
        let (svc, model) = service(ScriptedChatModel::replying("spa"));
        assert_eq!(svc.detect_language("¿Qué es el autismo?").await, Language::Spanish);

        let calls = model.calls();
        assert_eq!(calls[0].1.temperature, Some(0.0));
        assert!(system_of(&calls[0].0).contains("ISO639-3"));
    }

    #[tokio::test]
    async fn test_detect_unsupported_code_defaults_to_working_language() {
        let (svc, _) = service(ScriptedChatModel::replying("jpn"));
        assert!(matches!(
            svc.try_detect("自閉症とは").await,
            Err(DocentError::UnsupportedLanguage(_))
        ));
        assert_eq!(svc.detect_language("自閉症とは").await, Language::English);
    }

    #[tokio::test]
    async fn test_detect_failure_defaults_to_working_language() {
        let (svc, _) = service(ScriptedChatModel::failing());
        assert_eq!(svc.detect_language("Was ist Autismus?").await, Language::English);
    }

    #[tokio::test]
    async fn test_translate_same_language_is_identity_without_a_call() {
        let (svc, model) = service(ScriptedChatModel::failing());
        for language in Language::ALL {
            let text = "<b>unchanged</b> text";
            assert_eq!(svc.translate(text, language, language).await.unwrap(), text);
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_translate_answer_preserves_markup() {
        let (svc, model) = service(ScriptedChatModel::new(|messages| {
            Ok(last_user(messages).replace("Sorry, try again.", "Lo siento, inténtalo de nuevo."))
        }));

        let answer = "<span class=\"error\">Sorry, try again.</span>";
        let translated = svc
            .translate(answer, Language::English, Language::Spanish)
            .await
            .unwrap();

        assert_eq!(translated, "<span class=\"error\">Lo siento, inténtalo de nuevo.</span>");

        let calls = model.calls();
        let instruction = system_of(&calls[0].0);
        assert!(instruction.contains("into Spanish"));
        assert!(instruction.contains("Preserve all HTML tags"));
        // The translator never sees raw tags
        assert!(!last_user(&calls[0].0).contains("<span"));
    }

    #[tokio::test]
    async fn test_translate_question_uses_question_prompt() {
        let (svc, model) = service(ScriptedChatModel::replying("What is autism?"));
        let translated = svc
            .translate("Что такое аутизм?", Language::Russian, Language::English)
            .await
            .unwrap();

        assert_eq!(translated, "What is autism?");
        assert!(system_of(&model.calls()[0].0).contains("user question to English"));
    }

    #[tokio::test]
    async fn test_translation_that_drops_markup_fails() {
        let (svc, _) = service(ScriptedChatModel::replying("Lo siento"));
        let result = svc
            .translate("<span class=\"error\">Sorry</span>", Language::English, Language::Spanish)
            .await;
        assert!(matches!(result, Err(DocentError::Translation(_))));
    }

    #[tokio::test]
    async fn test_translation_capability_failure_is_translation_error() {
        let (svc, _) = service(ScriptedChatModel::failing());
        let result = svc.translate("Hola", Language::Spanish, Language::English).await;
        assert!(matches!(result, Err(DocentError::Translation(_))));
    }
}
