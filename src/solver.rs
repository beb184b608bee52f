//! Solver synthesis: asks the LLM for a program that computes the answer.
//!
//! The synthesized program is untrusted model output. It is handed to the
//! evaluator verbatim after code-fence stripping; nothing here validates
//! that it is safe, correct, or even syntactically valid Python.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::llm::{ChatMessage, LlmClient};
use crate::render::RenderedPage;

/// The identifier the synthesized program must bind its result to.
pub const ANSWER_IDENT: &str = "final_answer";

/// A program synthesized by the model. May be empty when synthesis failed.
#[derive(Debug, Clone, Default)]
pub struct SynthesizedProgram {
    pub source: String,
}

impl SynthesizedProgram {
    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// Asks the LLM to write a program whose execution binds the answer to
/// [`ANSWER_IDENT`].
pub struct SolverSynthesizer {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl SolverSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, model: String) -> Self {
        Self { llm, model }
    }

    /// Synthesize a solver program for the rendered page.
    ///
    /// Never fails: if the model is unavailable or errors, returns an empty
    /// program and the cycle continues with a null answer.
    pub async fn synthesize(&self, page: &RenderedPage) -> SynthesizedProgram {
        let prompt = build_solver_prompt(&page.body_text);

        match self
            .llm
            .chat_completion(&self.model, &[ChatMessage::user(prompt)])
            .await
        {
            Ok(response) => {
                let source = strip_code_fences(response.text());
                if let Some(usage) = &response.usage {
                    tracing::debug!(
                        chars = source.len(),
                        tokens = usage.total_tokens,
                        "Synthesized solver program"
                    );
                } else {
                    tracing::debug!(chars = source.len(), "Synthesized solver program");
                }
                SynthesizedProgram { source }
            }
            Err(e) => {
                tracing::warn!(
                    transient = e.is_transient(),
                    "Solver synthesis failed, continuing with empty program: {}",
                    e
                );
                SynthesizedProgram::default()
            }
        }
    }
}

fn build_solver_prompt(page_text: &str) -> String {
    format!(
        r#"You are an expert Python automation script writer.
Below is the text content of a quiz page. It contains a data question.

TASK:
1. Identify the data source (CSV url, API, or data embedded in the text).
2. Write a COMPLETE Python script that computes the answer.
3. Assign the final answer to a variable named '{ANSWER_IDENT}'.

CONTEXT:
{page_text}

RULES:
- Use 'requests', 'pandas', or the standard library.
- Handle errors gracefully.
- Do NOT print the answer, only assign it to '{ANSWER_IDENT}'.
- Return ONLY Python code. No markdown fences. No comments."#
    )
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("valid fence regex"));

/// Remove markdown code-fence markers the model was told not to emit.
///
/// Models routinely ignore the "no markdown" instruction, so this is applied
/// unconditionally.
fn strip_code_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}
