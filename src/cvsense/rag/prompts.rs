// SPDX-License-Identifier: MIT

use super::knowledge::Passage;

pub const DECISION_SYSTEM: &str = "You control a retrieval loop over a knowledge base. \
Decide whether the passages gathered so far are enough to answer the question. \
If not, ask for another retrieval with a query aimed at what is still missing. Answer with JSON only.";

pub const ANSWER_SYSTEM: &str = "You answer questions using only the supplied passages. \
Cite passage ids in square brackets after the statements they support. \
If the passages do not contain the answer, say that you do not have enough information.";

const EXCERPT_CHARS: usize = 300;

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

pub fn decision_prompt(
    question: &str,
    passages: &[Passage],
    previous_queries: &[String],
    iteration: u32,
    max_iterations: u32,
) -> String {
    let gathered = if passages.is_empty() {
        "(none yet)".to_string()
    } else {
        passages
            .iter()
            .map(|p| format!("[{}] {}", p.id, excerpt(&p.content, EXCERPT_CHARS)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let queries = if previous_queries.is_empty() {
        "(none)".to_string()
    } else {
        previous_queries.join("; ")
    };

    format!(
        "Question: {}\n\nStep {} of {}.\nQueries already issued: {}\n\nPassages gathered:\n{}\n\n\
Return {{\"action\": \"retrieve\" | \"answer\", \"query\": \"...\", \"reason\": \"...\"}}.",
        question, iteration, max_iterations, queries, gathered
    )
}

pub fn answer_prompt(question: &str, passages: &[Passage], incomplete: bool) -> String {
    let mut prompt = if passages.is_empty() {
        format!(
            "Question: {}\n\nNo passages were found. Tell the user you do not have enough information to answer.",
            question
        )
    } else {
        let context = passages
            .iter()
            .map(|p| format!("[{}]\n{}", p.id, p.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("Passages:\n{}\n\nQuestion: {}", context, question)
    };
    if incomplete {
        prompt.push_str("\n\nThe search stopped early; mention that the answer may be incomplete.");
    }
    prompt
}
