use medrag_llm::Message;
use medrag_store::ScoredVectorPoint;

pub const SYSTEM_PROMPT: &str = "You are a helpful medical assistant. Use the provided medical \
context to answer questions accurately. Always remind users to consult healthcare professionals \
for medical advice.";

/// Payload field holding the chunk text.
pub const CONTENT_FIELD: &str = "content";
/// Payload field holding the chunk's source path.
pub const SOURCE_FIELD: &str = "source";

/// Join retrieved chunk texts in rank order. Hits without text are skipped.
#[must_use]
pub fn build_context(hits: &[ScoredVectorPoint]) -> String {
    hits.iter()
        .filter_map(|hit| hit.text(CONTENT_FIELD))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distinct sources in rank order.
#[must_use]
pub fn collect_sources(hits: &[ScoredVectorPoint]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in hits.iter().filter_map(|hit| hit.text(SOURCE_FIELD)) {
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_owned());
        }
    }
    sources
}

#[must_use]
pub fn build_messages(context: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(format!(
            "Medical Context:\n{context}\n\nQuestion: {question}"
        )),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use medrag_llm::Role;
    use serde_json::json;

    use super::*;

    fn hit(id: &str, content: Option<&str>, source: &str) -> ScoredVectorPoint {
        let mut payload = HashMap::from([(SOURCE_FIELD.to_owned(), json!(source))]);
        if let Some(content) = content {
            payload.insert(CONTENT_FIELD.to_owned(), json!(content));
        }
        ScoredVectorPoint {
            id: id.into(),
            score: 0.5,
            payload,
        }
    }

    #[test]
    fn context_joins_in_rank_order() {
        let hits = [
            hit("1", Some("Diabetes is a metabolic disorder."), "a.pdf"),
            hit("2", Some("Insulin regulates glucose."), "b.pdf"),
        ];
        assert_eq!(
            build_context(&hits),
            "Diabetes is a metabolic disorder.\nInsulin regulates glucose."
        );
    }

    #[test]
    fn context_skips_hits_without_content() {
        let hits = [hit("1", None, "a.pdf"), hit("2", Some("text"), "a.pdf")];
        assert_eq!(build_context(&hits), "text");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn sources_are_deduplicated() {
        let hits = [
            hit("1", Some("x"), "b.pdf"),
            hit("2", Some("y"), "a.pdf"),
            hit("3", Some("z"), "b.pdf"),
        ];
        assert_eq!(collect_sources(&hits), vec!["b.pdf", "a.pdf"]);
    }

    #[test]
    fn messages_follow_prompt_layout() {
        let messages = build_messages("ctx line", "What is asthma?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("consult healthcare professionals"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            "Medical Context:\nctx line\n\nQuestion: What is asthma?"
        );
    }
}
