//! Worker event dispatch: resolve the delivery token, forward, reclaim.

use crate::registry::JobHandle;
use crate::worker::{WorkerEvent, WorkerSpawner};

use super::handle::Notice;
use super::{Coordinator, Lifecycle};

impl<S: WorkerSpawner> Coordinator<S> {
    /// The single dispatch path for every worker event, synthesized
    /// cancellations included.
    ///
    /// The token is a weak back-reference: if it no longer resolves, the job
    /// was already reclaimed and the event is dropped without effect. While
    /// draining, nothing is forwarded to the caller, but terminal events
    /// still reclaim their job so the drain completes. Forwarding happens
    /// before reclamation, so a job's terminal notice is always its last.
    pub(super) fn on_worker_event(&mut self, token: JobHandle, event: WorkerEvent) {
        let Some(job) = self.registry.get(token) else {
            tracing::trace!(?token, "dropping event for reclaimed job");
            return;
        };
        let id = job.request_id;
        let terminal = event.is_terminal();
        if self.lifecycle == Lifecycle::Running {
            let _ = self.notices.send(Notice::from_event(id, event));
        }
        if terminal {
            self.registry.close(token);
            tracing::debug!(id = id.0, live = self.registry.len(), "transfer reclaimed");
            self.check_drain();
        }
    }

    /// Run after every reclamation and after a shutdown request: once
    /// draining and the registry is empty, the coordinator stops.
    pub(super) fn check_drain(&mut self) {
        if self.lifecycle == Lifecycle::Draining && self.registry.is_empty() {
            self.lifecycle = Lifecycle::Stopped;
        }
    }
}
