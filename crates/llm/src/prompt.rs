//! Prompt construction for the pipeline's streaming completion requests.
//!
//! Every tier (C4 realtime draft, C9 high-quality refinement, C10 summary,
//! plus the `translateUserInput`/`generateVocabulary`/`generateFinalReport`
//! command-surface operations) sends the same shape: one system message
//! carrying the instruction, one user message carrying the content.

use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Builds the two-message prompt for a plain translation request
/// (C4 realtime and C9's sentence/paragraph refinement pass share this
/// shape; only the system instruction's register differs).
pub fn translate_prompt(source_text: &str, source_lang: &str, target_lang: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "Translate {source_lang} to {target_lang}. Output only the translation, with no \
             commentary, quotation marks, or explanation."
        )),
        Message::user(source_text.to_string()),
    ]
}

/// C9's refinement prompt: same request shape, instructed to preserve
/// technical terms and use the surrounding context already in `source_text`.
pub fn refine_prompt(source_text: &str, source_lang: &str, target_lang: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "Translate the following {source_lang} passage to {target_lang}. This is a \
             context-aware refinement of an earlier draft: preserve technical terms and proper \
             nouns exactly, and produce fluent, coherent prose for the full passage. Output only \
             the translation."
        )),
        Message::user(source_text.to_string()),
    ]
}

/// C10's summarization prompt, run before its own translation pass.
pub fn summarize_prompt(accumulated_text: &str, source_lang: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "Summarize the following {source_lang} lecture transcript in 2-3 sentences, \
             preserving the key claims and terminology. Output only the summary."
        )),
        Message::user(accumulated_text.to_string()),
    ]
}

/// `generateVocabulary` command-surface prompt.
pub fn vocabulary_prompt(accumulated_text: &str, source_lang: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "Extract a vocabulary list of the key technical terms and proper nouns from the \
             following {source_lang} lecture transcript. Output one term per line, with a short \
             gloss after a colon."
        )),
        Message::user(accumulated_text.to_string()),
    ]
}

/// `generateFinalReport` command-surface prompt.
pub fn report_prompt(accumulated_text: &str, source_lang: &str) -> Vec<Message> {
    vec![
        Message::system(format!(
            "Write a long-form report summarizing the following {source_lang} lecture \
             transcript in full, organized by topic with headings. Output only the report."
        )),
        Message::user(accumulated_text.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_prompt_carries_source_text_verbatim() {
        let messages = translate_prompt("Hello world.", "English", "Japanese");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hello world.");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[0].role, Role::System);
    }
}
