/// Answer returned when no indexed chunk is relevant to the query. The
/// grounding instruction asks the model to reply with the same sentence.
pub const NO_ANSWER: &str =
    "I'm sorry, but I don't know the answer. The information is not available in the document.";

/// Used when the model call succeeds but produces no text.
pub const EMPTY_COMPLETION_FALLBACK: &str =
    "I apologize, but I couldn't generate a response at this time.";

pub const DEFAULT_TITLE: &str = "New Conversation";

/// System instruction sent verbatim with every grounded completion.
pub const GROUNDING_INSTRUCTION: &str = r#"You are an AI assistant that helps users understand their documents.
Answer queries ONLY based on the provided context from the documents.
If the context doesn't contain enough information, respond exactly with: "I'm sorry, but I don't know the answer. The information is not available in the document.""#;

pub fn build_answer_prompt(query: &str, context: &str) -> String {
    format!(
        r#"Query: {}

Context from documents:
{}

Please provide a helpful answer based ONLY on the context above."#,
        query, context
    )
}

pub fn build_title_prompt(first_message: &str) -> String {
    format!(
        r#"Generate a short, descriptive title (3-5 words) for a conversation that starts with this message: "{}"

Return only the title, no quotes or additional text."#,
        first_message
    )
}
