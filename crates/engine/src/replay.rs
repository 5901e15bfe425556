//! One FIFO pass over the offline queue.

use std::collections::HashSet;

use serde::Serialize;
use storefront_core::{ActionId, Shared};
use storefront_queue::{ActionQueue, ActionStatus, ActionStatusPatch, OfflineAction};
use storefront_remote::{RemoteError, RemoteService};

/// Outcome of a replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Left pending because the remote went offline or an earlier action for
    /// the same stream failed in this pass.
    pub skipped: usize,
}

/// Actions sharing a stream keep their relative order: once one fails, the
/// rest of its stream waits for the next pass.
fn stream_key(action: &OfflineAction) -> String {
    match &action.resource_id {
        Some(id) => format!("resource:{id}"),
        None => action
            .endpoint
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Marks an action in flight for the duration of one request.
///
/// If the pass is dropped while the request is outstanding, the action goes
/// back to `pending` so the next pass picks it up.
struct InFlight<'a> {
    queue: &'a Shared<ActionQueue>,
    id: ActionId,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn start(queue: &'a Shared<ActionQueue>, id: ActionId) -> Self {
        queue.write(|q| q.mark_processing(id));
        Self {
            queue,
            id,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let id = self.id;
        if self.queue.write(|q| q.release(id)) {
            tracing::info!(action_id = %id, "replay interrupted; action back to pending");
        }
    }
}

/// Resubmit every pending action once, in submission order.
///
/// Success removes the action; failure is recorded on it. Going offline ends
/// the pass without charging a retry.
pub(crate) async fn replay_pending<R: RemoteService>(
    queue: &Shared<ActionQueue>,
    remote: &R,
    mut on_change: impl FnMut(),
) -> ReplayReport {
    let pending: Vec<ActionId> = queue.read(|q| q.pending().map(|a| a.id).collect());
    let mut report = ReplayReport::default();
    let mut blocked: HashSet<String> = HashSet::new();

    for (pos, id) in pending.iter().enumerate() {
        // The driver or the user may have touched the queue while we awaited.
        let Some(action) = queue.read(|q| q.get(*id).cloned()) else {
            continue;
        };
        if action.status != ActionStatus::Pending {
            continue;
        }
        let stream = stream_key(&action);
        if blocked.contains(&stream) {
            report.skipped += 1;
            continue;
        }

        let in_flight = InFlight::start(queue, *id);
        report.attempted += 1;

        let outcome = remote.send(action.to_request()).await;
        in_flight.settle();
        match outcome {
            Ok(_) => {
                queue.write(|q| q.remove(*id));
                report.succeeded += 1;
                tracing::debug!(action_id = %id, action_type = %action.action_type, "replayed offline action");
            }
            Err(RemoteError::Offline) => {
                queue.write(|q| q.update_status(*id, ActionStatusPatch::status(ActionStatus::Pending)));
                report.attempted -= 1;
                report.skipped += pending.len() - pos;
                tracing::info!("remote offline; stopping replay pass");
                break;
            }
            Err(err) => {
                let status = queue.write(|q| q.record_failure(*id, err.to_string()));
                report.failed += 1;
                blocked.insert(stream);
                tracing::warn!(
                    action_id = %id,
                    action_type = %action.action_type,
                    error = %err,
                    status = ?status,
                    "offline action replay failed"
                );
            }
        }
    }

    if report.attempted > 0 || report.skipped > 0 {
        on_change();
    }
    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "replay pass finished"
    );
    report
}
