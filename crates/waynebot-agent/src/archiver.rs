// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps the activity tables bounded per persona.
//!
//! Rows beyond the newest `max_events` are streamed to a gzip-compressed
//! JSON-lines file and only then deleted. A failed write removes the partial
//! file and leaves the rows; a failed delete leaves the finished file, which
//! the next run simply supersedes.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use strum::IntoEnumIterator;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use waynebot_core::WaynebotError;
use waynebot_storage::queries::activity;
use waynebot_storage::{ActivityTable, Database};

pub const MAX_EVENTS_PER_PERSONA: i64 = 10_000;
pub const PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const EXPORT_PAGE_SIZE: i64 = 1_000;

type ArchiveWriter = GzEncoder<BufWriter<File>>;

pub struct Archiver {
    db: Database,
    archive_dir: PathBuf,
    max_events: i64,
    interval: Duration,
}

impl Archiver {
    pub fn new(db: Database, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            archive_dir: archive_dir.into(),
            max_events: MAX_EVENTS_PER_PERSONA,
            interval: PURGE_INTERVAL,
        }
    }

    /// Rows kept per persona and table.
    pub fn with_max_events(mut self, max_events: i64) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Purge on every interval tick until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        info!(dir = %self.archive_dir.display(), max_events = self.max_events, "archiver started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.purge_all().await;
                }
            }
        }
        info!("archiver stopped");
    }

    /// One pass over both tables. Returns the number of rows archived.
    pub async fn purge_all(&self) -> usize {
        let mut archived = 0;
        for table in ActivityTable::iter() {
            let personas = match activity::personas_over_limit(&self.db, table, self.max_events).await {
                Ok(ids) => ids,
                Err(e) => {
                    error!(table = %table, error = %e, "failed to find personas over limit");
                    continue;
                }
            };
            for persona_id in personas {
                match self.purge_table(table, persona_id).await {
                    Ok(n) => archived += n,
                    Err(e) => error!(table = %table, persona_id, error = %e, "archive failed"),
                }
            }
        }
        archived
    }

    async fn purge_table(&self, table: ActivityTable, persona_id: i64) -> Result<usize, WaynebotError> {
        let Some(cutoff) =
            activity::archive_cutoff(&self.db, table, persona_id, self.max_events).await?
        else {
            return Ok(0);
        };

        let (path, file) = self.create_archive(table, persona_id).await?;
        let written = match self.write_archive(file, table, persona_id, cutoff).await {
            Ok(n) => n,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %rm, "failed to remove partial archive");
                }
                return Err(e);
            }
        };

        let deleted = activity::delete_archived(&self.db, table, persona_id, cutoff).await?;
        info!(
            table = %table,
            persona_id,
            archived = written,
            deleted,
            path = %path.display(),
            "activity rows archived"
        );
        Ok(written)
    }

    /// Create a fresh archive file; an existing archive is never reused.
    async fn create_archive(
        &self,
        table: ActivityTable,
        persona_id: i64,
    ) -> Result<(PathBuf, File), WaynebotError> {
        let dir = self.archive_dir.clone();
        let stem = format!("{table}_{persona_id}_{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
        blocking(move || {
            std::fs::create_dir_all(&dir)?;
            create_unique(&dir, &stem)
        })
        .await
    }

    /// Stream every row up to `cutoff` into `file`, then flush and fsync.
    async fn write_archive(
        &self,
        file: File,
        table: ActivityTable,
        persona_id: i64,
        cutoff: i64,
    ) -> Result<usize, WaynebotError> {
        let mut writer: ArchiveWriter = GzEncoder::new(BufWriter::new(file), Compression::default());

        let mut after_id = 0;
        let mut written = 0;
        loop {
            let page = activity::export_rows(
                &self.db,
                table,
                persona_id,
                after_id,
                cutoff,
                EXPORT_PAGE_SIZE,
            )
            .await?;
            let Some(&(last_id, _)) = page.last() else {
                break;
            };
            after_id = last_id;
            written += page.len();
            writer = blocking(move || {
                for (_, line) in &page {
                    writer.write_all(line.as_bytes())?;
                    writer.write_all(b"\n")?;
                }
                Ok(writer)
            })
            .await?;
        }

        blocking(move || {
            let file = writer
                .finish()?
                .into_inner()
                .map_err(|e| e.into_error())?;
            file.sync_all()
        })
        .await?;
        Ok(written)
    }
}

/// Open `<stem>.jsonl.gz` under `dir`, or `<stem>-N.jsonl.gz` for the first
/// free N when earlier archives share the stem.
fn create_unique(dir: &Path, stem: &str) -> std::io::Result<(PathBuf, File)> {
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{stem}.jsonl.gz")
        } else {
            format!("{stem}-{n}.jsonl.gz")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, WaynebotError>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WaynebotError::Internal(format!("archive writer task failed: {e}")))?
        .map_err(io_err)
}

fn io_err(e: std::io::Error) -> WaynebotError {
    WaynebotError::Storage { source: e.into() }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};

    use flate2::read::GzDecoder;
    use waynebot_storage::queries::activity::{insert_tool_execution, list_tool_executions};
    use waynebot_storage::NewToolExecution;
    use waynebot_test_utils::TestHarness;

    use super::*;

    async fn seed_tool_runs(h: &TestHarness, n: usize) {
        for i in 0..n {
            insert_tool_execution(
                &h.db,
                NewToolExecution {
                    persona_id: h.persona.id,
                    tool_name: "shell_exec".into(),
                    args_json: format!(r#"{{"command":"echo {i}"}}"#),
                    output_text: i.to_string(),
                    ..NewToolExecution::default()
                },
            )
            .await
            .unwrap();
        }
    }

    fn archives(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|rd| rd.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    #[tokio::test]
    async fn under_limit_is_untouched() {
        let h = TestHarness::new().await.unwrap();
        seed_tool_runs(&h, 5).await;
        let dir = h.dir().join("archive");
        let archiver = Archiver::new(h.db.clone(), &dir).with_max_events(5);

        assert_eq!(archiver.purge_all().await, 0);
        assert!(archives(&dir).is_empty());
    }

    #[tokio::test]
    async fn keeps_newest_and_archives_the_rest() {
        let h = TestHarness::new().await.unwrap();
        seed_tool_runs(&h, 25).await;
        let dir = h.dir().join("archive");
        let archiver = Archiver::new(h.db.clone(), &dir).with_max_events(10);

        assert_eq!(archiver.purge_all().await, 15);

        let kept = list_tool_executions(&h.db, h.persona.id, 100).await.unwrap();
        assert_eq!(kept.len(), 10);
        assert!(kept.iter().all(|r| r.output_text.parse::<usize>().unwrap() >= 15));

        let files = archives(&dir);
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("tool_executions_{}_", h.persona.id)), "{name}");
        assert!(name.ends_with("Z.jsonl.gz"), "{name}");

        let lines: Vec<serde_json::Value> = BufReader::new(GzDecoder::new(File::open(&files[0]).unwrap()))
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect();
        assert_eq!(lines.len(), 15);
        assert_eq!(lines[0]["output_text"], "0");
        assert_eq!(lines[14]["output_text"], "14");
        assert_eq!(lines[0]["tool_name"], "shell_exec");

        // A second pass has nothing left to do.
        assert_eq!(archiver.purge_all().await, 0);
    }

    #[test]
    fn archive_names_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let (first, mut file) = create_unique(dir.path(), "tool_executions_1_20260301T120000Z").unwrap();
        file.write_all(b"earlier run").unwrap();
        drop(file);

        let (second, _) = create_unique(dir.path(), "tool_executions_1_20260301T120000Z").unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("Z-1.jsonl.gz"));
        assert_eq!(std::fs::read(&first).unwrap(), b"earlier run");
    }

    #[tokio::test]
    async fn unwritable_archive_dir_keeps_rows() {
        let h = TestHarness::new().await.unwrap();
        seed_tool_runs(&h, 4).await;
        let blocker = h.dir().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();
        let archiver = Archiver::new(h.db.clone(), blocker.join("archive")).with_max_events(2);

        assert_eq!(archiver.purge_all().await, 0);
        let kept = list_tool_executions(&h.db, h.persona.id, 100).await.unwrap();
        assert_eq!(kept.len(), 4);
    }
}
