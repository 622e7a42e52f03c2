//! Conversation and generation models.

use serde::{Deserialize, Serialize};

use super::config::GenerationParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::Assistant => write!(f, "assistant"),
            Role::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Answer language selecting half of the prompt table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    #[default]
    English,
    Chinese,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "chinese" | "zh" => Ok(Language::Chinese),
            _ => Err(format!("unknown language: {}", s)),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::English => write!(f, "ENGLISH"),
            Language::Chinese => write!(f, "CHINESE"),
        }
    }
}

/// Behavioral style of the assistant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Persona {
    /// Conversational answers
    #[default]
    Chatting,
    /// Exam-style answer and explanation
    Testing,
    /// Step-by-step tutoring on concepts
    Theorem,
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chatting" => Ok(Persona::Chatting),
            "testing" => Ok(Persona::Testing),
            "theorem" => Ok(Persona::Theorem),
            _ => Err(format!("unknown persona: {}", s)),
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Persona::Chatting => write!(f, "CHATTING"),
            Persona::Testing => write!(f, "TESTING"),
            Persona::Theorem => write!(f, "THEOREM"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub conversation: Vec<ConversationMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
}

impl GenerationRequest {
    pub fn new(conversation: Vec<ConversationMessage>, params: &GenerationParams) -> Self {
        Self {
            conversation,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_token_count: u64,
}

/// What a generation call produced.
///
/// `Malformed` replaces the empty-string sentinel: the provider answered but
/// the expected fields were missing, so callers can tell it apart from a
/// model that genuinely returned nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Generated(GenerationResult),
    Malformed { reason: String },
}

impl GenerationOutcome {
    pub fn is_malformed(&self) -> bool {
        matches!(self, GenerationOutcome::Malformed { .. })
    }

    /// The generated result, or an empty text with zero tokens when malformed.
    pub fn into_result(self) -> GenerationResult {
        match self {
            GenerationOutcome::Generated(result) => result,
            GenerationOutcome::Malformed { .. } => GenerationResult::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_and_persona_parse() {
        assert_eq!("ENGLISH".parse::<Language>().unwrap(), Language::English);
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Chinese);
        assert_eq!("Theorem".parse::<Persona>().unwrap(), Persona::Theorem);
        assert!("lecture".parse::<Persona>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ConversationMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_request_takes_params() {
        let params = GenerationParams::default();
        let request = GenerationRequest::new(vec![ConversationMessage::user("q")], &params);
        assert_eq!(request.max_tokens, 8192);
        assert_eq!(request.top_k, 30);
        assert_eq!(request.conversation.len(), 1);
    }

    #[test]
    fn test_malformed_outcome_degrades_to_empty() {
        let outcome = GenerationOutcome::Malformed {
            reason: "missing generated_text".to_string(),
        };
        assert!(outcome.is_malformed());
        let result = outcome.into_result();
        assert!(result.text.is_empty());
        assert_eq!(result.prompt_token_count, 0);
    }
}
