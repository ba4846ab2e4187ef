//! The model capability: one blocking `analyze(prompt) -> text` call.
//!
//! Concrete clients and the retry / logging decorators live here, behind
//! the [`Model`] trait. The analyzer only ever sees the trait.

pub mod command;

pub use command::CommandModel;

use chrono::{Local, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Rate limiting or another condition worth retrying.
    #[error("transient model error: {0}")]
    Transient(String),

    #[error("{0}")]
    Failure(String),
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }
}

pub trait Model: Send + Sync {
    fn analyze(&self, prompt: &str) -> Result<String, ModelError>;

    /// Short label used in logs and chat-log file names.
    fn name(&self) -> &str {
        "model"
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn analyze(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).analyze(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// Retry with linear backoff
// ---------------------------------------------------------------------------

/// Retries [`ModelError::Transient`] up to `max_retries` times, sleeping
/// `delay × attempt` between tries. Exhausted retries surface as a failure.
pub struct Retrying<M> {
    inner: M,
    max_retries: u32,
    delay: Duration,
}

impl<M: Model> Retrying<M> {
    pub fn new(inner: M, max_retries: u32, delay: Duration) -> Self {
        Self { inner, max_retries, delay }
    }
}

impl<M: Model> Model for Retrying<M> {
    fn analyze(&self, prompt: &str) -> Result<String, ModelError> {
        let mut attempt = 0;
        loop {
            match self.inner.analyze(prompt) {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.delay * attempt;
                    tracing::warn!(
                        model = self.inner.name(),
                        attempt,
                        max = self.max_retries,
                        "{e}; retrying in {:?}",
                        wait
                    );
                    thread::sleep(wait);
                }
                Err(e) if e.is_transient() => {
                    return Err(ModelError::Failure(format!(
                        "gave up after {} retries: {e}",
                        self.max_retries
                    )));
                }
                other => return other,
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ---------------------------------------------------------------------------
// Chat log
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatEntry<'a> {
    timestamp: String,
    provider: &'a str,
    prompt: &'a str,
    response: &'a str,
}

/// Writes every successful prompt/response pair to a JSON file in `dir`.
/// Logging failures are reported and otherwise ignored.
pub struct ChatLog<M> {
    inner: M,
    dir: PathBuf,
    seq: AtomicUsize,
}

impl<M: Model> ChatLog<M> {
    pub fn new(inner: M, dir: &Path) -> Self {
        Self {
            inner,
            dir: dir.to_path_buf(),
            seq: AtomicUsize::new(0),
        }
    }

    fn record(&self, prompt: &str, response: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = self
            .dir
            .join(format!("{stamp}_{n:04}_{}.log", self.inner.name()));

        let entry = ChatEntry {
            timestamp: Utc::now().to_rfc3339(),
            provider: self.inner.name(),
            prompt,
            response,
        };
        fs::write(&path, serde_json::to_string_pretty(&entry)?)?;
        Ok(path)
    }
}

impl<M: Model> Model for ChatLog<M> {
    fn analyze(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self.inner.analyze(prompt)?;
        match self.record(prompt, &response) {
            Ok(path) => tracing::debug!("interaction logged to {}", path.display()),
            Err(e) => tracing::warn!("could not write chat log: {e}"),
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Model, ModelError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned results in order and records every prompt it saw.
    pub struct Scripted {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok((*r).to_owned())).collect())
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl Model for Scripted {
        fn analyze(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_owned());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Failure("script exhausted".into())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}

#[test]
fn retrying_recovers_from_transient_errors() {
    let inner = testing::Scripted::new(vec![
        Err(ModelError::Transient("429".into())),
        Err(ModelError::Transient("429".into())),
        Ok("done".into()),
    ]);
    let model = Retrying::new(inner, 3, Duration::ZERO);
    assert_eq!(model.analyze("p").unwrap(), "done");
    assert_eq!(model.inner.calls(), 3);
}

#[test]
fn retrying_gives_up_and_reports_failure() {
    let inner = testing::Scripted::new(vec![
        Err(ModelError::Transient("429".into())),
        Err(ModelError::Transient("429".into())),
        Ok("never reached".into()),
    ]);
    let model = Retrying::new(inner, 1, Duration::ZERO);
    let err = model.analyze("p").unwrap_err();
    assert!(!err.is_transient());
    assert!(err.to_string().contains("gave up after 1 retries"));
}

#[test]
fn retrying_does_not_retry_hard_failures() {
    let inner = testing::Scripted::new(vec![
        Err(ModelError::Failure("bad key".into())),
        Ok("never reached".into()),
    ]);
    let model = Retrying::new(inner, 5, Duration::ZERO);
    assert_eq!(model.analyze("p").unwrap_err().to_string(), "bad key");
    assert_eq!(model.inner.calls(), 1);
}

#[test]
fn chat_log_writes_one_json_file_per_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = ChatLog::new(testing::Scripted::ok(&["first", "second"]), dir.path());
    model.analyze("p1").unwrap();
    model.analyze("p2").unwrap();

    let mut logs: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    logs.sort();
    assert_eq!(logs.len(), 2);

    let v: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&logs[0]).unwrap()).unwrap();
    assert_eq!(v["provider"], "scripted");
    assert_eq!(v["prompt"], "p1");
    assert_eq!(v["response"], "first");
}
