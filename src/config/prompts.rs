//! Prompt templates for Docent.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// System prompt used when no prompt file is configured or readable.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Answer questions based on the provided context.";

fn variable_pattern() -> &'static Regex {
    static VARIABLE: OnceLock<Regex> = OnceLock::new();
    VARIABLE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("variable pattern is valid"))
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    pub language: LanguagePrompts,
    pub rewrite: RewritePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// Built-in system prompt, used when the prompt file is unavailable.
    pub system: String,
    /// Text placed between the system prompt and retrieved document context.
    pub context_separator: String,
    /// Text placed between consecutive context chunks.
    pub chunk_joiner: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_separator: "\n\nRelevant information from documents:\n".to_string(),
            chunk_joiner: "\n\n".to_string(),
        }
    }
}

/// Prompts for language detection and translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagePrompts {
    pub detect: String,
    /// Instruction for translating a user question into the working language.
    pub translate_question: String,
    /// Instruction for translating a generated answer back to the user's language.
    pub translate_answer: String,
}

impl Default for LanguagePrompts {
    fn default() -> Self {
        Self {
            detect: "You are a language detection assistant. Reply only with the ISO639-3 code of the language of the user's message.".to_string(),
            translate_question: "Translate the following user question to {{to}}. Reply with the translation only.".to_string(),
            translate_answer: "Translate the following {{from}} answer into {{to}}. Preserve all HTML tags and every placeholder of the form [[mN]] exactly as written.".to_string(),
        }
    }
}

/// Prompt for rewriting follow-up questions into standalone queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewritePrompts {
    pub user: String,
}

impl Default for RewritePrompts {
    fn default() -> Self {
        Self {
            user: r#"Given the following conversation history between a user and an AI assistant, rewrite the user's latest question to make it a clear, standalone query. Conversation History:
{{history}}
User's latest question: {{question}}
Rewritten query:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }

            let language_path = custom_path.join("language.toml");
            if language_path.exists() {
                let content = std::fs::read_to_string(&language_path)?;
                prompts.language = toml::from_str(&content)?;
            }

            let rewrite_path = custom_path.join("rewrite.toml");
            if rewrite_path.exists() {
                let content = std::fs::read_to_string(&rewrite_path)?;
                prompts.rewrite = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template, so `{{name}}` inside a
    /// substituted value is left as written. Unknown variables stay in place.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        variable_pattern()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Read the system prompt from `path`, falling back to the built-in one.
    ///
    /// Called once per chat request so edits to the file apply without a restart.
    pub async fn system_prompt(&self, path: Option<&Path>) -> String {
        let Some(path) = path else {
            return self.rag.system.clone();
        };

        match tokio::fs::read_to_string(path).await {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => self.rag.system.clone(),
            Err(e) => {
                debug!("System prompt {:?} unavailable ({}), using default", path, e);
                self.rag.system.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert_eq!(prompts.rag.system, DEFAULT_SYSTEM_PROMPT);
        assert!(prompts.rewrite.user.contains("{{history}}"));
        assert!(prompts.rewrite.user.contains("{{question}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let template = "History:\n{{history}}\nQuestion: {{question}} {{unknown}}";
        let mut vars = std::collections::HashMap::new();
        vars.insert("history".to_string(), "user: what does {{question}} mean?".to_string());
        vars.insert("question".to_string(), "and {{history}}?".to_string());

        for _ in 0..10 {
            assert_eq!(
                Prompts::render(template, &vars),
                "History:\nuser: what does {{question}} mean?\nQuestion: and {{history}}? {{unknown}}"
            );
        }
    }

    #[test]
    fn test_provided_variables_override_custom() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("to".into(), "Klingon".into());

        let mut vars = std::collections::HashMap::new();
        vars.insert("to".to_string(), "French".to_string());

        let rendered = prompts.render_with_custom("into {{to}}", &vars);
        assert_eq!(rendered, "into French");
    }

    #[tokio::test]
    async fn test_system_prompt_file_and_fallback() {
        let prompts = Prompts::default();
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.txt");
        assert_eq!(prompts.system_prompt(Some(&missing)).await, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(prompts.system_prompt(None).await, DEFAULT_SYSTEM_PROMPT);

        let file = dir.path().join("system_prompt.txt");
        std::fs::write(&file, "You answer questions about autism support.").unwrap();
        assert_eq!(
            prompts.system_prompt(Some(&file)).await,
            "You answer questions about autism support."
        );
    }

    #[test]
    fn test_custom_dir_overrides_rewrite_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rewrite.toml"),
            "user = \"History: {{history}} / Q: {{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rewrite.user, "History: {{history}} / Q: {{question}}");
        assert_eq!(prompts.rag.system, DEFAULT_SYSTEM_PROMPT);
    }
}
