//! File-backed delivery queue.
//!
//! - one JSON entry file per queued job under the spool directory
//! - `enqueue` returns only after the entry is on disk (tmp file + rename,
//!   so a crash never leaves a half-written entry behind)
//! - a startup scan resumes whatever the previous process left spooled
//! - retry schedules are persisted per entry (`not_before`), so backoff
//!   carries across restarts instead of starting over
//! - entries that fail permanently, exhaust their retry budget or cannot be
//!   parsed are moved to `dead/` for inspection, never silently deleted

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use smsfwd_core::domain::{DeliveryJob, JobId, Outcome};
use smsfwd_core::ports::{JobExecutor, JobQueue};
use smsfwd_core::{Error, Result};

const DEAD_DIR: &str = "dead";
const ENTRY_EXT: &str = "json";

#[derive(Clone, Debug)]
pub struct SpoolConfig {
    pub dir: PathBuf,
    /// Attempts per job before it is given up on. At least 1.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

/// On-disk shape of one queued job.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SpoolEntry {
    id: String,
    attempts: u32,
    /// Epoch millis before which no attempt may run. 0 means immediately.
    not_before: i64,
    job: DeliveryJob,
}

/// Creates the spool directory (and its `dead/` subdirectory) and returns the
/// enqueue handle plus the runner that drives entries to completion.
pub fn open(config: SpoolConfig) -> Result<(SpoolQueue, SpoolRunner)> {
    std::fs::create_dir_all(config.dir.join(DEAD_DIR))?;
    remove_stale_tmp_files(&config.dir);

    let (wake_tx, wake_rx) = mpsc::unbounded_channel();
    let queue = SpoolQueue {
        dir: config.dir.clone(),
        seq: AtomicU64::new(0),
        wake: wake_tx,
    };
    let runner = SpoolRunner {
        config,
        wake: wake_rx,
    };
    Ok((queue, runner))
}

pub struct SpoolQueue {
    dir: PathBuf,
    seq: AtomicU64,
    wake: mpsc::UnboundedSender<JobId>,
}

impl SpoolQueue {
    fn next_id(&self) -> JobId {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        JobId(format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl JobQueue for SpoolQueue {
    async fn enqueue(&self, job: DeliveryJob) -> Result<JobId> {
        let id = self.next_id();
        let entry = SpoolEntry {
            id: id.0.clone(),
            attempts: 0,
            not_before: 0,
            job,
        };
        write_entry(&entry_path(&self.dir, &id), &entry)
            .await
            .map_err(|e| Error::Queue(format!("persist {id}: {e}")))?;

        // A gone runner just means the next startup scan picks the file up.
        let _ = self.wake.send(id.clone());
        Ok(id)
    }
}

pub struct SpoolRunner {
    config: SpoolConfig,
    wake: mpsc::UnboundedReceiver<JobId>,
}

impl SpoolRunner {
    /// Drives spooled jobs until `cancel` fires. An attempt already underway
    /// finishes; pending backoff waits are abandoned, their schedule is on
    /// disk for the next run.
    pub async fn run(mut self, executor: Arc<dyn JobExecutor>, cancel: CancellationToken) {
        let mut in_flight: HashSet<JobId> = HashSet::new();
        let mut tasks: JoinSet<JobId> = JoinSet::new();

        let resumed = scan_entries(&self.config.dir).await;
        if !resumed.is_empty() {
            info!(count = resumed.len(), "resuming spooled jobs");
        }
        for id in resumed {
            spawn_job(
                &mut tasks,
                &mut in_flight,
                &self.config,
                executor.clone(),
                cancel.clone(),
                id,
            );
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(id) = self.wake.recv() => {
                    spawn_job(
                        &mut tasks,
                        &mut in_flight,
                        &self.config,
                        executor.clone(),
                        cancel.clone(),
                        id,
                    );
                }
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    match finished {
                        Ok(id) => {
                            in_flight.remove(&id);
                        }
                        Err(e) => error!("spool job task failed: {e}"),
                    }
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("spool job task failed: {e}");
            }
        }
    }
}

fn spawn_job(
    tasks: &mut JoinSet<JobId>,
    in_flight: &mut HashSet<JobId>,
    config: &SpoolConfig,
    executor: Arc<dyn JobExecutor>,
    cancel: CancellationToken,
    id: JobId,
) {
    // Duplicate wakes (startup scan plus live enqueue) collapse here.
    if !in_flight.insert(id.clone()) {
        return;
    }
    tasks.spawn(drive_entry(config.clone(), executor, cancel, id));
}

/// Owns one entry file end to end: wait out its retry window, attempt,
/// reschedule or finish.
async fn drive_entry(
    config: SpoolConfig,
    executor: Arc<dyn JobExecutor>,
    cancel: CancellationToken,
    id: JobId,
) -> JobId {
    let path = entry_path(&config.dir, &id);
    let mut entry = match read_entry(&path).await {
        Ok(Some(entry)) => entry,
        // Raced with a completed duplicate wake, nothing to do.
        Ok(None) => return id,
        Err(e) => {
            warn!(job_id = %id, "unreadable spool entry, quarantining: {e}");
            quarantine(&config.dir, &path).await;
            return id;
        }
    };

    loop {
        if cancel.is_cancelled() {
            return id;
        }

        let now = now_ms();
        if entry.not_before > now {
            let wait = Duration::from_millis((entry.not_before - now) as u64);
            debug!(job_id = %id, wait_ms = wait.as_millis() as u64, "waiting for retry window");
            tokio::select! {
                _ = cancel.cancelled() => return id,
                _ = sleep(wait) => {}
            }
        }

        entry.attempts += 1;
        info!(job_id = %id, attempt = entry.attempts, "delivery attempt");
        match executor.execute(&entry.job).await {
            Outcome::Success => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(job_id = %id, "could not remove completed entry: {e}");
                }
                info!(job_id = %id, "job completed");
                return id;
            }
            Outcome::PermanentFailure => {
                error!(job_id = %id, "job failed permanently");
                quarantine(&config.dir, &path).await;
                return id;
            }
            Outcome::Retry => {
                if entry.attempts >= config.max_attempts {
                    error!(job_id = %id, attempts = entry.attempts, "retry budget exhausted");
                    quarantine(&config.dir, &path).await;
                    return id;
                }
                let delay = backoff_delay(&config, entry.attempts);
                entry.not_before = now_ms() + delay.as_millis() as i64;
                if let Err(e) = write_entry(&path, &entry).await {
                    // Keep the in-memory schedule; worst case a restart
                    // retries sooner than planned.
                    warn!(job_id = %id, "could not persist retry schedule: {e}");
                }
                info!(job_id = %id, delay_ms = delay.as_millis() as u64, "retry scheduled");
            }
        }
    }
}

/// Doubles per failed attempt starting from the base, clamped to the cap.
fn backoff_delay(config: &SpoolConfig, failed_attempts: u32) -> Duration {
    let exp = failed_attempts.saturating_sub(1).min(20);
    config
        .backoff_base
        .saturating_mul(1 << exp)
        .min(config.backoff_cap)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn entry_path(dir: &Path, id: &JobId) -> PathBuf {
    dir.join(format!("{id}.{ENTRY_EXT}"))
}

async fn write_entry(path: &Path, entry: &SpoolEntry) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_vec(entry)?;
    tokio::fs::write(&tmp, raw).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_entry(path: &Path) -> Result<Option<SpoolEntry>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&raw)?))
}

async fn quarantine(dir: &Path, path: &Path) {
    let Some(name) = path.file_name() else {
        return;
    };
    let target = dir.join(DEAD_DIR).join(name);
    if let Err(e) = tokio::fs::rename(path, &target).await {
        error!(path = %path.display(), "could not quarantine entry: {e}");
    }
}

async fn scan_entries(dir: &Path) -> Vec<JobId> {
    let mut ids = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(dir = %dir.display(), "cannot scan spool directory: {e}");
            return ids;
        }
    };
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(JobId(stem.to_string()));
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), "spool scan stopped early: {e}");
                break;
            }
        }
    }
    // Ids start with the enqueue timestamp, so this is oldest first.
    ids.sort_by(|a, b| a.0.cmp(&b.0));
    ids
}

fn remove_stale_tmp_files(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
            let _ = std::fs::remove_file(&path);
        }
    }
}
