use crate::model::{Model, ModelError};
use crate::utils::tokens::{estimate_tokens, truncate_to_tokens};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

/// `EX_TEMPFAIL` from sysexits.h.
const EXIT_TEMPFAIL: i32 = 75;

/// Runs an external command per prompt: the prompt goes to stdin and the
/// answer is read from stdout.
///
/// Exit status 75 or a "rate limit" message on stderr is reported as
/// [`ModelError::Transient`]; any other non-zero exit is a failure.
pub struct CommandModel {
    program: String,
    args: Vec<String>,
    max_prompt_tokens: usize,
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>, max_prompt_tokens: usize) -> Self {
        Self {
            program: program.into(),
            args,
            max_prompt_tokens,
        }
    }
}

impl Model for CommandModel {
    fn analyze(&self, prompt: &str) -> Result<String, ModelError> {
        let prompt = if estimate_tokens(prompt) > self.max_prompt_tokens {
            tracing::debug!(limit = self.max_prompt_tokens, "truncating prompt");
            truncate_to_tokens(prompt, self.max_prompt_tokens)
        } else {
            prompt.to_owned()
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ModelError::Failure(format!("cannot start `{}`: {e}", self.program)))?;

        // fed from a thread so a chatty child cannot fill stdout and stall us
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });

        let out = child
            .wait_with_output()
            .map_err(|e| ModelError::Failure(format!("`{}` failed: {e}", self.program)))?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // the child may legitimately stop reading early
                Ok(Err(e)) => tracing::debug!("prompt write interrupted: {e}"),
                Err(_) => return Err(ModelError::Failure("prompt writer panicked".into())),
            }
        }

        if out.status.success() {
            return Ok(String::from_utf8_lossy(&out.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_owned();
        let msg = format!("`{}` exited with {}: {stderr}", self.program, out.status);
        let rate_limited = out.status.code() == Some(EXIT_TEMPFAIL)
            || stderr.to_ascii_lowercase().contains("rate limit");
        if rate_limited {
            Err(ModelError::Transient(msg))
        } else {
            Err(ModelError::Failure(msg))
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(unix)]
#[test]
fn command_model_echoes_stdout() {
    let model = CommandModel::new("cat", vec![], 8000);
    assert_eq!(model.analyze("## Vulnerability Assessment\nVulnerable").unwrap(),
               "## Vulnerability Assessment\nVulnerable");
}

#[cfg(unix)]
#[test]
fn command_model_maps_exit_codes() {
    let tempfail = CommandModel::new("sh", vec!["-c".into(), "cat >/dev/null; exit 75".into()], 8000);
    assert!(tempfail.analyze("x").unwrap_err().is_transient());

    let limited = CommandModel::new(
        "sh",
        vec!["-c".into(), "cat >/dev/null; echo 'Rate limit exceeded' >&2; exit 1".into()],
        8000,
    );
    assert!(limited.analyze("x").unwrap_err().is_transient());

    let broken = CommandModel::new("sh", vec!["-c".into(), "cat >/dev/null; exit 2".into()], 8000);
    assert!(!broken.analyze("x").unwrap_err().is_transient());
}

#[test]
fn missing_program_is_a_failure() {
    let model = CommandModel::new("definitely-not-a-real-binary-4242", vec![], 8000);
    let err = model.analyze("x").unwrap_err();
    assert!(!err.is_transient());
    assert!(err.to_string().contains("cannot start"));
}
