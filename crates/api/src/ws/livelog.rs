//! Live build-log tailing sessions.
//!
//! One [`LiveLogSession`] per viewer connection tails a build's
//! append-only log file and pushes every newly appended chunk on the
//! connection's send channel, in file order. The loop stops
//! cooperatively: a shared flag is checked at each iteration boundary
//! (after each read pass, after each sleep) and an in-flight read is
//! always allowed to complete.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use packforge_core::types::DbId;
use packforge_db::models::build::BuildState;
use packforge_db::repositories::BuildRepo;
use packforge_db::DbPool;
use packforge_events::WsMessage;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::ws::manager::WsSender;

/// Fixed pause between read passes once the end of file is reached, and
/// after any recoverable error.
const BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on a single read; chunks are pushed as read, preserving
/// append order.
const CHUNK_SIZE: usize = 16 * 1024;

/// Seam for querying a build's state at end-of-file.
///
/// Implemented for the connection pool in production; tests substitute
/// a scripted probe.
#[async_trait]
pub trait BuildStateProbe: Send + Sync {
    async fn buildstate(&self, build_id: DbId) -> Result<Option<BuildState>, sqlx::Error>;
}

#[async_trait]
impl BuildStateProbe for DbPool {
    async fn buildstate(&self, build_id: DbId) -> Result<Option<BuildState>, sqlx::Error> {
        BuildRepo::buildstate(self, build_id).await
    }
}

/// Handle to one running log-tailing task.
///
/// Dropping the handle does not stop the task; call
/// [`stop`](Self::stop) (idempotent) to end it cooperatively.
pub struct LiveLogSession {
    build_id: DbId,
    running: Arc<AtomicBool>,
}

impl LiveLogSession {
    /// Start tailing `path` for `build_id`, pushing chunks to `sender`.
    ///
    /// The task keeps retrying until the build leaves its log-producing
    /// states or the session is stopped; a missing file only delays it.
    pub fn spawn(
        build_id: DbId,
        path: PathBuf,
        probe: Arc<dyn BuildStateProbe>,
        sender: WsSender,
    ) -> Self {
        tracing::info!(build_id, "Starting live log session");
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        tokio::spawn(async move {
            run_tail_loop(build_id, path, probe, sender, flag).await;
        });
        Self { build_id, running }
    }

    /// The build this session is tailing.
    pub fn build_id(&self) -> DbId {
        self.build_id
    }

    /// Request cooperative shutdown. Idempotent; never interrupts an
    /// in-flight read.
    pub fn stop(&self) {
        tracing::info!(build_id = self.build_id, "Stopping live log session");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the tail loop is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn run_tail_loop(
    build_id: DbId,
    path: PathBuf,
    probe: Arc<dyn BuildStateProbe>,
    sender: WsSender,
    running: Arc<AtomicBool>,
) {
    let mut offset: u64 = 0;

    while running.load(Ordering::SeqCst) {
        match read_appended(&path, &mut offset, &sender).await {
            Ok(()) => {
                // End of file: decide between backoff and completion.
                match probe.buildstate(build_id).await {
                    Ok(Some(state)) if state.keeps_log_open() => {
                        tokio::time::sleep(BACKOFF).await;
                    }
                    Ok(Some(_)) => {
                        tracing::info!(build_id, "End of build log");
                        break;
                    }
                    Ok(None) => {
                        tracing::error!(build_id, "Build not found");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(build_id, error = %e, "Build state query failed");
                        tokio::time::sleep(BACKOFF).await;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The build may not have started writing yet.
                tracing::warn!(build_id, path = %path.display(), "Log file not found");
                tokio::time::sleep(BACKOFF).await;
            }
            Err(e) => {
                tracing::error!(build_id, error = %e, "Error streaming live log");
                tokio::time::sleep(BACKOFF).await;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    tracing::debug!(build_id, "Live log session ended");
}

/// Read everything appended since `offset` in bounded chunks, pushing
/// each chunk immediately. Returns once the current end of file is
/// reached; `offset` is advanced past every pushed byte.
async fn read_appended(
    path: &PathBuf,
    offset: &mut u64,
    sender: &WsSender,
) -> std::io::Result<()> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(*offset)).await?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
        let message = WsMessage::buildlog_chunk(chunk);
        let text = serde_json::to_string(&message)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        sender
            .send(Message::Text(text.into()))
            .map_err(|_| std::io::Error::other("connection send channel closed"))?;
        *offset += n as u64;
    }
}
