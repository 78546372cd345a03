//! System instruction for grounded answering.
//!
//! The template tells the model to answer only from the supplied context,
//! to reply with the refusal phrase verbatim when the context does not
//! cover the question, and to always answer in the configured language.
//! Retrieved context is substituted for `{context}` at the end of the
//! system message.

use crate::config::PromptConfig;
use crate::llm::ChatMessage;

pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are an assistant that answers questions about a \
collection of educational documents.
Answer strictly from the context below.
If the context does not contain the answer, reply exactly: \"{refusal}\".
Do not invent facts that are not in the context.
Always answer in {language}, even if the context is written in another language.

Context:
{context}";

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    refusal: String,
    language: String,
}

impl PromptTemplate {
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            template: config
                .system_template
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_TEMPLATE.to_string()),
            refusal: config.refusal_phrase.clone(),
            language: config.language.clone(),
        }
    }

    /// Render the system instruction with `context` substituted last, so
    /// braces inside document text are never treated as placeholders.
    pub fn system_message(&self, context: &str) -> String {
        self.template
            .replace("{refusal}", &self.refusal)
            .replace("{language}", &self.language)
            .replace("{context}", context)
    }

    /// System instruction plus the question as the user turn.
    pub fn messages(&self, context: &str, question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_message(context)),
            ChatMessage::user(question),
        ]
    }
}

/// Join retrieved chunk texts with blank lines.
pub fn join_context<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts.into_iter().collect::<Vec<_>>().join("\n\n")
}
