//! Conversation assembly.
//!
//! Every conversation opens with the fixed system and assistant turns of the
//! selected prompt. A single-entry history is a first question: it is sent
//! through the user template together with the retrieved fragments. A longer
//! history is replayed as a transcript, alternating assistant (even index)
//! and user (odd index), without retrieved context.

use crate::models::{ConversationMessage, Language, Persona, PromptTable, SearchResult};

/// Concatenate fragment texts in rank order with no separator.
pub fn join_fragments(fragments: &[SearchResult]) -> String {
    fragments.iter().map(|f| f.fragment_text.as_str()).collect()
}

pub fn assemble(
    prompts: &PromptTable,
    persona: Persona,
    language: Language,
    fragments: &[SearchResult],
    history: &[String],
) -> Vec<ConversationMessage> {
    let template = prompts.get(language, persona);

    let mut messages = Vec::with_capacity(2 + history.len().max(1));
    messages.push(ConversationMessage::system(template.system.as_str()));
    messages.push(ConversationMessage::assistant(template.assistant.as_str()));

    match history {
        [] => {}
        [question] => {
            let documents = join_fragments(fragments);
            messages.push(ConversationMessage::user(
                template.render_user(question, &documents),
            ));
        }
        transcript => {
            messages.extend(transcript.iter().enumerate().map(|(i, entry)| {
                if i % 2 == 0 {
                    ConversationMessage::assistant(entry.as_str())
                } else {
                    ConversationMessage::user(entry.as_str())
                }
            }));
        }
    }

    messages
}
