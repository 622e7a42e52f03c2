//! Prompt table keyed by `(language, persona)`.
//!
//! The table is data, not code: the built-in copy is compiled from
//! `assets/prompts.toml` and any edited copy can be loaded at runtime.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::PromptConfig;
use super::conversation::{Language, Persona};
use crate::error::ConfigError;

pub const QUESTION_PLACEHOLDER: &str = "{question}";
pub const DOCUMENTS_PLACEHOLDER: &str = "{search_documents}";

const BUILTIN_PROMPTS: &str = include_str!("../../assets/prompts.toml");

/// Fixed system and assistant turns plus the first-turn user template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub assistant: String,
    pub user: String,
}

impl PromptTemplate {
    /// Fill the user template in a single pass, so placeholder-like text
    /// inside the question or documents is never expanded again.
    pub fn render_user(&self, question: &str, search_documents: &str) -> String {
        let mut out =
            String::with_capacity(self.user.len() + question.len() + search_documents.len());
        let mut rest = self.user.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                out.push_str(question);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(DOCUMENTS_PLACEHOLDER) {
                out.push_str(search_documents);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaPrompts {
    #[serde(rename = "CHATTING")]
    pub chatting: PromptTemplate,

    #[serde(rename = "TESTING")]
    pub testing: PromptTemplate,

    #[serde(rename = "THEOREM")]
    pub theorem: PromptTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTable {
    #[serde(rename = "ENGLISH")]
    pub english: PersonaPrompts,

    #[serde(rename = "CHINESE")]
    pub chinese: PersonaPrompts,
}

impl PromptTable {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(BUILTIN_PROMPTS)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// The table named by `[prompts] path`, or the built-in one.
    pub fn from_config(config: &PromptConfig) -> Result<Self, ConfigError> {
        match &config.path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let table: PromptTable = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    pub fn get(&self, language: Language, persona: Persona) -> &PromptTemplate {
        let prompts = match language {
            Language::English => &self.english,
            Language::Chinese => &self.chinese,
        };
        match persona {
            Persona::Chatting => &prompts.chatting,
            Persona::Testing => &prompts.testing,
            Persona::Theorem => &prompts.theorem,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for language in [Language::English, Language::Chinese] {
            for persona in [Persona::Chatting, Persona::Testing, Persona::Theorem] {
                let template = self.get(language, persona);
                for placeholder in [QUESTION_PLACEHOLDER, DOCUMENTS_PLACEHOLDER] {
                    if !template.user.contains(placeholder) {
                        return Err(ConfigError::ValidationError(format!(
                            "prompt {language}.{persona} user template lacks {placeholder}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(user: &str) -> PromptTemplate {
        PromptTemplate {
            system: "sys".to_string(),
            assistant: "asst".to_string(),
            user: user.to_string(),
        }
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = PromptTable::builtin().unwrap();
        let english = table.get(Language::English, Persona::Chatting);
        assert!(english.system.contains("economics professor"));

        let chinese = table.get(Language::Chinese, Persona::Theorem);
        assert!(chinese.user.starts_with("問題："));
    }

    #[test]
    fn test_render_user() {
        let t = template("Question:{question} Query documents:{search_documents} Your answer:");
        assert_eq!(
            t.render_user("What is GDP?", "AB"),
            "Question:What is GDP? Query documents:AB Your answer:"
        );
    }

    #[test]
    fn test_render_user_does_not_reexpand_inputs() {
        let t = template("{question}|{search_documents}");
        assert_eq!(
            t.render_user("{search_documents}", "{question}"),
            "{search_documents}|{question}"
        );
    }

    #[test]
    fn test_render_user_keeps_unknown_braces() {
        let t = template("{x} {question} {search_documents} {");
        assert_eq!(t.render_user("q", "d"), "{x} q d {");
    }

    #[test]
    fn test_parse_rejects_missing_placeholder() {
        let content = BUILTIN_PROMPTS.replacen(
            "Query documents:{search_documents}",
            "Query documents:",
            1,
        );
        assert_ne!(content, BUILTIN_PROMPTS);

        match PromptTable::parse(&content) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains(DOCUMENTS_PLACEHOLDER), "{msg}");
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_missing_question() {
        let mut table = PromptTable::builtin().unwrap();
        table.chinese.theorem.user = "{search_documents}".to_string();
        assert!(matches!(
            table.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains(QUESTION_PLACEHOLDER)
        ));
    }

    #[test]
    fn test_load_external_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.toml");
        let content = BUILTIN_PROMPTS.replace("economics professor", "physics tutor");
        std::fs::write(&path, content).unwrap();

        let table = PromptTable::load(&path).unwrap();
        assert!(
            table
                .get(Language::English, Persona::Testing)
                .system
                .contains("physics tutor")
        );
    }
}
