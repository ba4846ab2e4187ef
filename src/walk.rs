use crossbeam_channel::{bounded, Receiver, Sender};
use ignore::{overrides::{Override, OverrideBuilder}, WalkBuilder, WalkState};
use std::{
    mem,
    path::{Path, PathBuf},
    thread,
};

use crate::utils::Config;

// ---------------------------------------------------------------------------
// Internal constants / helpers
// ---------------------------------------------------------------------------
const DEFAULT_BATCH: usize = 8;   // a tad larger for fewer sends

type Batch = Vec<PathBuf>;

struct Batcher {
    tx:    Sender<Batch>,
    batch: Batch,
}
impl Batcher {
    fn push(&mut self, p: PathBuf) {
        self.batch.push(p);
        if self.batch.len() == DEFAULT_BATCH {
            self.flush();
        }
    }
    fn flush(&mut self) {
        if !self.batch.is_empty() {
            let _ = self.tx.send(mem::take(&mut self.batch));
        }
    }
}
impl Drop for Batcher {
    fn drop(&mut self) { self.flush(); }
}

fn build_overrides(root: &Path, cfg: &Config) -> Override {
    let mut ob = OverrideBuilder::new(root);
    for ext in &cfg.scanner.excluded_extensions {
        if let Err(e) = ob.add(&format!("!*.{ext}")) {
            tracing::warn!("cannot add ignore pattern ‘{ext}’: {e}");
        }
    }
    for dir in &cfg.scanner.excluded_directories {
        if let Err(e) = ob.add(&format!("!**/{dir}/**")) {
            tracing::warn!("cannot add ignore pattern ‘{dir}’: {e}");
        }
    }
    ob.build().unwrap_or_else(|e| {
        tracing::warn!("ignoring exclusion overrides: {e}");
        Override::empty()
    })
}

// ---------------------------------------------------------------------------
/// Walk `root` and send *batches* of paths through the returned channel.
///
/// Entries whose name starts with `.` are skipped unless
/// `scanner.scan_hidden_files` is set. Paths arrive in no particular order.
pub fn spawn_senders(root: &Path, cfg: &Config) -> Receiver<Batch> {
    // ----- 1  build ignore/override rules ----------------------------------
    let overrides   = build_overrides(root, cfg);

    // ----- 2  channel & thread pool parameters -----------------------------
    let workers     = cfg.performance.worker_threads.unwrap_or_else(num_cpus::get).max(1);
    let capacity    = workers * cfg.performance.channel_multiplier.max(1);
    let (tx, rx)    = bounded::<Batch>(capacity);

    let root        = root.to_path_buf();
    let scan_hidden = cfg.scanner.scan_hidden_files;
    let vcsignore   = cfg.scanner.read_vcsignore;
    let follow      = cfg.scanner.follow_symlinks;
    let max_bytes   = cfg.scanner.max_file_size_mb.unwrap_or(0) * 1_048_576;

    // ----- 3  the background walker thread ---------------------------------
    thread::spawn(move || {
        WalkBuilder::new(root)
          .standard_filters(false)
          .hidden(!scan_hidden)
          .git_ignore(vcsignore)
          .git_exclude(vcsignore)
          .follow_links(follow)
          .threads(workers)
          .overrides(overrides)
          .build_parallel()
          .run(move || {
              let mut b = Batcher {
                  tx:    tx.clone(),
                  batch: Vec::with_capacity(DEFAULT_BATCH),
              };

              Box::new(move |entry| {
                  let entry = match entry {
                      Ok(e) if e.file_type().map(|ft| ft.is_file()).unwrap_or(false) => e,
                      Ok(_) => return WalkState::Continue,
                      Err(e) => {
                          tracing::warn!("walk error: {e}");
                          return WalkState::Continue;
                      }
                  };

                  if max_bytes != 0 {
                      match entry.metadata() {
                          Ok(m) if m.len() > max_bytes => {
                              tracing::debug!("skipping oversized {:?}", entry.path());
                              return WalkState::Continue;
                          }
                          Err(e) => {
                              tracing::debug!("metadata failed for {:?}: {e}", entry.path());
                              return WalkState::Continue;
                          }
                          _ => {}
                      }
                  }

                  b.push(entry.into_path());
                  WalkState::Continue
              })
          });
    });

    rx
}

/// Every file under `root`, sorted, so reports come out in a stable order.
pub fn collect_files(root: &Path, cfg: &Config) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = spawn_senders(root, cfg).into_iter().flatten().collect();
    files.sort();
    files
}

#[test]
fn hidden_entries_are_skipped_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join(".git")).unwrap();
    std::fs::create_dir_all(root.join("src/.cache")).unwrap();
    std::fs::write(root.join(".git/config.php"), "x").unwrap();
    std::fs::write(root.join("src/.cache/a.php"), "x").unwrap();
    std::fs::write(root.join("src/.env.php"), "x").unwrap();
    std::fs::write(root.join("src/b.php"), "x").unwrap();
    std::fs::write(root.join("a.php"), "x").unwrap();

    let files = collect_files(root, &Config::default());
    assert_eq!(files, vec![root.join("a.php"), root.join("src/b.php")]);

    let mut cfg = Config::default();
    cfg.scanner.scan_hidden_files = true;
    assert_eq!(collect_files(root, &cfg).len(), 5);
}

#[test]
fn excluded_directories_and_extensions_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("vendor")).unwrap();
    std::fs::write(root.join("vendor/lib.php"), "x").unwrap();
    std::fs::write(root.join("logo.png"), "x").unwrap();
    std::fs::write(root.join("index.php"), "x").unwrap();

    let mut cfg = Config::default();
    cfg.scanner.excluded_directories = vec!["vendor".into()];
    cfg.scanner.excluded_extensions = vec!["png".into()];

    assert_eq!(collect_files(root, &cfg), vec![root.join("index.php")]);
}
