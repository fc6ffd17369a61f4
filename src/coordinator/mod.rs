//! The coordinator: serialized control path for transfer jobs.
//!
//! One task owns the job registry, the pool directory, and the lifecycle
//! state. Callers talk to it through a [`CoordinatorHandle`]; workers report
//! back through per-job event senders. Because everything funnels through the
//! one task, registry mutations and dispatch decisions are linearized: no two
//! job creations or reclamations interleave their effects.
//!
//! None of the operations here block on I/O or on worker completion. Job
//! creation returns after spawning and admitting the worker, cancellation
//! after synthesizing the terminal event, shutdown after releasing worker
//! ownership; the drain then completes through the ordinary dispatch path.

mod dispatch;
mod handle;

pub use handle::{CoordinatorHandle, Notice};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::FtmConfig;
use crate::error::TransferError;
use crate::location::EndpointId;
use crate::pools::{is_small_transfer, PoolDirectory, PoolFactory};
use crate::registry::{JobHandle, JobTable, RequestId};
use crate::worker::{
    DownloadSpec, EventQueue, EventSender, FromBytesSpec, HashUploadSpec, UploadSpec,
    WorkerCommand, WorkerEvent, WorkerHandle, WorkerRef, WorkerSpawner,
};

use handle::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Running,
    Draining,
    Stopped,
}

/// Coordinates concurrent transfer jobs for one client core.
pub struct Coordinator<S: WorkerSpawner> {
    registry: JobTable,
    pools: PoolDirectory,
    spawner: S,
    notices: mpsc::UnboundedSender<Notice>,
    events_tx: EventQueue,
    lifecycle: Lifecycle,
    web_endpoint: EndpointId,
}

impl<S: WorkerSpawner + 'static> Coordinator<S> {
    /// Spawn the coordinator task. Caller notices arrive on `notices`; the
    /// returned join handle resolves once a requested shutdown has drained
    /// every live job.
    pub fn spawn(
        cfg: &FtmConfig,
        spawner: S,
        pool_factory: PoolFactory,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator {
            registry: JobTable::default(),
            pools: PoolDirectory::new(cfg, pool_factory),
            spawner,
            notices,
            events_tx,
            lifecycle: Lifecycle::Running,
            web_endpoint: EndpointId(cfg.web_endpoint),
        };
        let join = tokio::spawn(coordinator.run(commands_rx, events_rx));
        (CoordinatorHandle::new(commands_tx), join)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<(JobHandle, WorkerEvent)>,
    ) {
        loop {
            match self.lifecycle {
                Lifecycle::Stopped => break,
                Lifecycle::Running => {
                    tokio::select! {
                        command = commands.recv() => match command {
                            Some(command) => self.on_command(command),
                            // Caller dropped the handle: same as an explicit
                            // shutdown request.
                            None => self.request_shutdown(),
                        },
                        Some((token, event)) = events.recv() => {
                            self.on_worker_event(token, event);
                        }
                    }
                }
                Lifecycle::Draining => {
                    // Only worker events move the drain forward; commands
                    // queued behind the shutdown request are ignored.
                    match events.recv().await {
                        Some((token, event)) => self.on_worker_event(token, event),
                        None => break,
                    }
                }
            }
        }
        tracing::debug!("transfer coordinator stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::StartDownload {
                id,
                remote,
                local,
                size,
                name,
                encryption_key,
                search_file,
                offset,
                limit,
                priority,
            } => {
                let small = is_small_transfer(size);
                let endpoint = remote.endpoint_or(self.web_endpoint);
                let spec = DownloadSpec {
                    remote,
                    local,
                    size,
                    name,
                    encryption_key,
                    search_file,
                    offset,
                    limit,
                };
                tracing::debug!(id = id.0, size, small, endpoint = endpoint.0, "starting download");
                let worker = self.create_job(id, |spawner, events| {
                    spawner.spawn_download(spec, events)
                });
                self.pools.download_pool(small, endpoint).admit(worker, priority);
            }
            Command::StartUpload {
                id,
                local,
                remote,
                expected_size,
                encryption_key,
                priority,
                bad_parts,
            } => {
                let spec = UploadSpec {
                    local,
                    remote,
                    expected_size,
                    encryption_key,
                    bad_parts,
                };
                tracing::debug!(id = id.0, expected_size, "starting upload");
                let worker = self.create_job(id, |spawner, events| {
                    spawner.spawn_upload(spec, events)
                });
                self.pools.upload_pool().admit(worker, priority);
            }
            Command::StartUploadByHash {
                id,
                local,
                size,
                priority,
            } => {
                let spec = HashUploadSpec { local, size };
                tracing::debug!(id = id.0, size, "starting hash upload");
                let worker = self.create_job(id, |spawner, events| {
                    spawner.spawn_upload_by_hash(spec, events)
                });
                self.pools.upload_pool().admit(worker, priority);
            }
            Command::StartFromBytes {
                id,
                file_type,
                bytes,
                name,
            } => {
                let spec = FromBytesSpec {
                    file_type,
                    bytes,
                    name,
                };
                tracing::debug!(id = id.0, "starting raw-data import");
                // Raw imports are local-only work; they bypass pool admission.
                self.create_job(id, |spawner, events| {
                    spawner.spawn_from_bytes(spec, events)
                });
            }
            Command::UpdatePriority { id, priority } => {
                self.forward_command(id, WorkerCommand::UpdatePriority(priority));
            }
            Command::UpdateLocalLocation { id, local } => {
                self.forward_command(id, WorkerCommand::UpdateLocalLocation(local));
            }
            Command::UpdateDownloadedRange { id, offset, limit } => {
                self.forward_command(id, WorkerCommand::UpdateDownloadedRange { offset, limit });
            }
            Command::Cancel { id } => self.cancel(id),
            Command::Shutdown => self.request_shutdown(),
        }
    }

    /// Register a job under `id`, spawn its worker with the slot's handle as
    /// delivery token, and return the weak reference pools admit by.
    fn create_job(
        &mut self,
        id: RequestId,
        spawn: impl FnOnce(&mut S, EventSender) -> WorkerHandle,
    ) -> WorkerRef {
        let events_tx = self.events_tx.clone();
        let spawner = &mut self.spawner;
        let mut admitted = None;
        self.registry.create(id, |token| {
            let worker = spawn(spawner, EventSender::new(token, events_tx));
            admitted = Some(worker.worker_ref());
            worker
        });
        // The factory above always runs and always sets the reference.
        admitted.expect("job factory did not run")
    }

    /// Reprioritization and location updates go straight to the worker; the
    /// pool learns from the worker, not from us. Unknown ids are a no-op.
    fn forward_command(&self, id: RequestId, command: WorkerCommand) {
        let Some(handle) = self.registry.find(id) else {
            return;
        };
        let Some(job) = self.registry.get(handle) else {
            return;
        };
        if let Some(worker) = job.worker() {
            worker.command(command);
        }
    }

    /// Cancellation is a synthesized failure with the fixed reason, pushed
    /// through the same dispatch path as worker-reported failures. Unknown
    /// ids are a no-op.
    fn cancel(&mut self, id: RequestId) {
        let Some(handle) = self.registry.find(id) else {
            return;
        };
        self.on_worker_event(
            handle,
            WorkerEvent::Failed {
                error: TransferError::Canceled,
            },
        );
    }

    /// Release every worker and start draining. Returns immediately; workers
    /// tear down asynchronously and the drain completes as their jobs are
    /// reclaimed through dispatch.
    fn request_shutdown(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        self.lifecycle = Lifecycle::Draining;
        tracing::info!(live = self.registry.len(), "shutdown requested, draining transfers");
        self.registry.for_each(|_, job| job.release_worker());
        self.check_drain();
    }
}
