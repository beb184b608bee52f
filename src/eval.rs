//! Answer computation from untrusted synthesized programs.
//!
//! The reference behavior for this kind of pipeline is to `exec` model
//! output inside the host process. Here evaluation runs in a separate OS
//! process instead: `python3 -I` (isolated mode: no site-packages from the
//! environment, no current directory on `sys.path`), bounded by a
//! wall-clock timeout, reading the program on stdin. The child still runs
//! with the service's OS privileges and unrestricted network access; that
//! residual trust boundary is a documented property of the design, not an
//! oversight.
//!
//! Any failure — spawn error, nonzero exit, crash, timeout, unbound output
//! identifier — degrades to "no answer". The cycle continues to submission
//! with a null answer rather than aborting.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::solver::{SynthesizedProgram, ANSWER_IDENT};

/// Sentinel prefixing the harness's result line, so the answer survives any
/// stdout noise the synthesized program produces.
const ANSWER_SENTINEL: &str = "@@QUIZCHAIN_ANSWER@@";

/// Harness executed via `python -c`. Runs the untrusted program from stdin
/// in a fresh namespace, then reports whatever got bound to [`ANSWER_IDENT`]
/// as a sentinel-prefixed JSON line. Errors inside the program are
/// swallowed; an unbound identifier reports null.
static HARNESS: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"
import json, sys

scope = {{}}
try:
    exec(compile(sys.stdin.read(), "<synthesized>", "exec"), scope)
except BaseException:
    pass

value = scope.get("{ANSWER_IDENT}")
try:
    encoded = json.dumps(value)
except (TypeError, ValueError):
    encoded = json.dumps(str(value))
sys.stdout.write("\n{ANSWER_SENTINEL}" + encoded + "\n")
"#
    )
});

/// Computes an answer from a synthesized program.
///
/// Implementations must never fail: a program that cannot produce an answer
/// yields `None`.
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    async fn evaluate(&self, program: &SynthesizedProgram) -> Option<Value>;
}

/// Evaluates programs in an isolated Python subprocess.
pub struct PythonProcessEvaluator {
    python_bin: String,
    timeout: Duration,
}

impl PythonProcessEvaluator {
    pub fn new(python_bin: String, timeout: Duration) -> Self {
        Self {
            python_bin,
            timeout,
        }
    }
}

#[async_trait]
impl AnswerEvaluator for PythonProcessEvaluator {
    async fn evaluate(&self, program: &SynthesizedProgram) -> Option<Value> {
        if program.is_empty() {
            tracing::debug!("Empty program, skipping evaluation");
            return None;
        }

        let mut child = match Command::new(&self.python_bin)
            .arg("-I")
            .arg("-c")
            .arg(HARNESS.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to spawn {}: {}", self.python_bin, e);
                return None;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(program.source.as_bytes()).await {
                tracing::warn!("Failed to write program to evaluator: {}", e);
                return None;
            }
            // Dropping stdin closes the pipe so the harness sees EOF.
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!("Evaluator process failed: {}", e);
                return None;
            }
            Err(_) => {
                // kill_on_drop reaps the child when the future is dropped.
                tracing::warn!("Evaluation timed out after {:?}", self.timeout);
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_answer_line(&stdout)
    }
}

/// Extract the sentinel-prefixed JSON value from harness stdout.
///
/// Returns `None` for a missing sentinel, unparseable JSON, or a JSON null
/// (the identifier was never bound).
fn parse_answer_line(stdout: &str) -> Option<Value> {
    let line = stdout
        .lines()
        .rev()
        .find_map(|l| l.strip_prefix(ANSWER_SENTINEL))?;

    match serde_json::from_str::<Value>(line.trim()) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Evaluator produced unparseable answer line: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(source: &str) -> SynthesizedProgram {
        SynthesizedProgram {
            source: source.to_string(),
        }
    }

    fn evaluator() -> PythonProcessEvaluator {
        PythonProcessEvaluator::new("python3".to_string(), Duration::from_secs(10))
    }

    #[test]
    fn harness_embeds_identifier_and_sentinel() {
        assert!(HARNESS.contains(ANSWER_IDENT));
        assert!(HARNESS.contains(ANSWER_SENTINEL));
    }

    #[test]
    fn parses_sentinel_line() {
        let out = format!("noise\n{}42\n", ANSWER_SENTINEL);
        assert_eq!(parse_answer_line(&out), Some(Value::from(42)));
    }

    #[test]
    fn null_answer_is_none() {
        let out = format!("{}null\n", ANSWER_SENTINEL);
        assert_eq!(parse_answer_line(&out), None);
    }

    #[test]
    fn missing_sentinel_is_none() {
        assert_eq!(parse_answer_line("just some prints\n"), None);
    }

    #[tokio::test]
    async fn computes_numeric_answer() {
        let answer = evaluator()
            .evaluate(&program("final_answer = sum(range(10))"))
            .await;
        assert_eq!(answer, Some(Value::from(45)));
    }

    #[tokio::test]
    async fn computes_string_answer() {
        let answer = evaluator()
            .evaluate(&program("final_answer = 'hello'.upper()"))
            .await;
        assert_eq!(answer, Some(Value::from("HELLO")));
    }

    #[tokio::test]
    async fn unbound_identifier_yields_none() {
        let answer = evaluator().evaluate(&program("x = 1 + 1")).await;
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn runtime_error_yields_none() {
        let answer = evaluator().evaluate(&program("final_answer = 1 / 0")).await;
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn syntax_error_yields_none() {
        let answer = evaluator().evaluate(&program("def broken(:")).await;
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn empty_program_yields_none() {
        let answer = evaluator().evaluate(&program("   \n")).await;
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn stdout_noise_does_not_break_extraction() {
        let answer = evaluator()
            .evaluate(&program("print('debug spam')\nfinal_answer = [1, 2]"))
            .await;
        assert_eq!(answer, Some(serde_json::json!([1, 2])));
    }

    #[tokio::test]
    async fn infinite_loop_is_bounded_by_timeout() {
        let evaluator =
            PythonProcessEvaluator::new("python3".to_string(), Duration::from_millis(500));
        let answer = evaluator
            .evaluate(&program("while True:\n    pass"))
            .await;
        assert_eq!(answer, None);
    }
}
