//! Prompt templates
//!
//! Placeholders are `{name}` and are filled with plain string replacement.

/// Asks for three alternate phrasings, one per line
pub const MULTI_QUERY: &str = "You are an AI assistant helping to generate multiple search queries.
Given the user question, generate 3 different versions of the question to retrieve relevant documents.
Provide these alternative questions separated by newlines.
Original question: {question}
Alternative questions:";

/// Asks for a hypothetical passage answering the question
pub const HYDE: &str = "Write a short passage that would answer the following question.
Do not say \"I don't know\". Write a plausible answer even if you're unsure.
Question: {question}
Passage:";

/// Rewrites a follow-up into a standalone question
pub const CONDENSE_QUESTION: &str = "Given the following conversation history and a follow-up question, rephrase the follow-up question to be a standalone question that captures the full context.

Chat History:
{chat_history}

Follow-up Question: {question}

Standalone Question:";

/// Grounded answer prompt
pub const ANSWER: &str = "You are a knowledgeable assistant. Use the following context to provide a detailed, comprehensive answer to the question.

Instructions:
- Give thorough, well-structured answers with explanations and examples from the context
- Use bullet points or numbered lists when appropriate for clarity
- Include relevant details, definitions, and relationships between concepts
- If the context covers multiple aspects of the question, address all of them
- Cite the source documents you used
- If the context is insufficient, say what you can answer and what is missing
{chat_history_block}
Context:
{context}

Question: {question}

Detailed Answer:";

/// Fill `{name}` placeholders of a template in a single pass.
///
/// Substituted values are never rescanned; unknown placeholders are kept verbatim.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_every_placeholder() {
        let prompt = render(
            CONDENSE_QUESTION,
            &[("chat_history", "User: hi"), ("question", "and then?")],
        );
        assert!(prompt.contains("Chat History:\nUser: hi\n"));
        assert!(prompt.contains("Follow-up Question: and then?"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_answer_template_without_history() {
        let prompt = render(
            ANSWER,
            &[("chat_history_block", ""), ("context", "ctx"), ("question", "q")],
        );
        assert!(prompt.contains("missing\n\nContext:\nctx\n\nQuestion: q"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let prompt = render("{context}|{question}", &[("context", "{question}"), ("question", "q")]);
        assert_eq!(prompt, "{question}|q");

        assert_eq!(render("json {\"a\": 1}", &[("a", "x")]), "json {\"a\": 1}");
    }
}
