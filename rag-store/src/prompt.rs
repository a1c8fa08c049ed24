//! Grounded-answer prompt assembly.

use crate::record::HistoryEntry;

const PROMPT_TEMPLATE: &str = "You are a helpful AI assistant. Use the following context from documents to answer the question. If you cannot find the answer in the context, say so.

Chat History:
{history}

Context from documents:
{context}

Question: {question}

Answer:";

/// Renders history as `Human:`/`Assistant:` pairs, oldest first.
pub fn format_history(entries: &[HistoryEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("Human: {}\nAssistant: {}", e.question, e.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fills the prompt template. Placeholders are substituted in a single pass,
/// so braces inside user text are left untouched.
pub fn build_prompt(history: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(
        PROMPT_TEMPLATE.len() + history.len() + context.len() + question.len(),
    );
    let mut rest = PROMPT_TEMPLATE;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let (value, used) = if tail.starts_with("{history}") {
            (history, "{history}".len())
        } else if tail.starts_with("{context}") {
            (context, "{context}".len())
        } else if tail.starts_with("{question}") {
            (question, "{question}".len())
        } else {
            ("{", 1)
        };
        out.push_str(value);
        rest = &tail[used..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(q: &str, a: &str) -> HistoryEntry {
        HistoryEntry {
            question: q.into(),
            answer: a.into(),
        }
    }

    #[test]
    fn history_lines_pair_questions_and_answers() {
        let h = format_history(&[entry("q1", "a1"), entry("q2", "a2")]);
        assert_eq!(h, "Human: q1\nAssistant: a1\nHuman: q2\nAssistant: a2");
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn prompt_has_all_sections_in_order() {
        let p = build_prompt("Human: hi\nAssistant: hello", "ctx one\n\nctx two", "What?");
        assert!(p.starts_with("You are a helpful AI assistant."));
        let h = p.find("Chat History:\nHuman: hi").unwrap();
        let c = p.find("Context from documents:\nctx one\n\nctx two").unwrap();
        let q = p.find("Question: What?\n\nAnswer:").unwrap();
        assert!(h < c && c < q);
        assert!(p.ends_with("Answer:"));
    }

    #[test]
    fn user_braces_are_not_reinterpreted() {
        let p = build_prompt("", "literal {question} in a doc", "why {x}?");
        assert!(p.contains("literal {question} in a doc"));
        assert!(p.contains("Question: why {x}?"));
    }
}
