//! Fire-and-forget queue handle and the background dispatcher task.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::AptlyClient;
use crate::task::AptlyTask;

/// Cloneable handle for enqueueing repository work.
///
/// `enqueue` never blocks and never reports delivery: the queue is
/// drained by [`run_dispatcher`], and a failed or dropped dispatcher
/// only shows up in the logs.
#[derive(Clone)]
pub struct AptlyQueue {
    tx: mpsc::UnboundedSender<AptlyTask>,
}

impl AptlyQueue {
    /// Create a queue handle together with the dispatcher's receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AptlyTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a task, fire-and-forget.
    pub fn enqueue(&self, task: AptlyTask) {
        tracing::info!(operation = task.operation(), "Enqueueing aptly task");
        if self.tx.send(task).is_err() {
            tracing::warn!("Aptly dispatcher is gone; task dropped");
        }
    }
}

/// Drain the queue, posting each task to the aptly daemon.
///
/// Post failures are logged and the task is dropped; the daemon is
/// expected to tolerate at-least-once delivery, and callers of
/// [`AptlyQueue::enqueue`] never observe delivery state. Runs until the
/// queue closes or `cancel` is triggered.
pub async fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<AptlyTask>,
    client: AptlyClient,
    cancel: CancellationToken,
) {
    loop {
        let task = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Aptly dispatcher shutting down");
                return;
            }
            task = rx.recv() => match task {
                Some(task) => task,
                None => {
                    tracing::info!("Aptly queue closed; dispatcher exiting");
                    return;
                }
            },
        };

        if let Err(e) = client.post_task(&task).await {
            tracing::error!(
                operation = task.operation(),
                error = %e,
                "Failed to deliver aptly task",
            );
        }
    }
}
