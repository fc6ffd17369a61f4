//! The seam between the coordinator and its transfer workers.
//!
//! A worker is an independent task owned exclusively by its job. Ownership is
//! the strong end of the worker's command channel ([`WorkerHandle`]); when the
//! job drops it, the channel closes and the worker is expected to stop on its
//! own time. Resource pools only ever see the weak [`WorkerRef`]. Events flow
//! back over a shared queue, tagged with the job's delivery token by the
//! worker's [`EventSender`]; dropping the sender posts a final `Released`
//! event so the coordinator always observes worker teardown.

use tokio::sync::mpsc;

use crate::error::TransferError;
use crate::location::{
    EncryptionKey, FileType, FullLocalLocation, FullRemoteLocation, LocalFileLocation,
    PartialLocalLocation, PartialRemoteLocation,
};
use crate::registry::JobHandle;

/// Control messages the coordinator forwards into a running worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    UpdatePriority(i8),
    UpdateLocalLocation(LocalFileLocation),
    UpdateDownloadedRange { offset: i64, limit: i64 },
}

/// Events a worker reports back to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Download worker has begun transferring.
    Started,
    DownloadProgress {
        partial: PartialLocalLocation,
        ready_bytes: i64,
        total_bytes: i64,
    },
    /// Hash-upload worker finished hashing the local file.
    HashReady { hash: String },
    UploadProgress {
        partial: PartialRemoteLocation,
        ready_bytes: i64,
    },
    DownloadDone {
        local: FullLocalLocation,
        size: i64,
        /// False when the file was found on disk instead of transferred.
        is_new: bool,
    },
    UploadDone {
        file_type: FileType,
        remote: PartialRemoteLocation,
        size: i64,
    },
    /// Hash-upload success: the remote side already has the full file.
    UploadDoneFull { remote: FullRemoteLocation },
    Failed { error: TransferError },
    /// The worker went away without reporting a terminal event. Posted by
    /// [`EventSender`] on drop; dispatched as `Failed(Canceled)`.
    Released,
}

impl WorkerEvent {
    /// Terminal events end the job; the dispatcher reclaims it right after
    /// forwarding, and every later event for the same token is dropped.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerEvent::DownloadDone { .. }
                | WorkerEvent::UploadDone { .. }
                | WorkerEvent::UploadDoneFull { .. }
                | WorkerEvent::Failed { .. }
                | WorkerEvent::Released
        )
    }
}

pub(crate) type EventQueue = mpsc::UnboundedSender<(JobHandle, WorkerEvent)>;

/// Worker-side event emitter bound to one job's delivery token.
///
/// The token is a weak back-reference: the job may already be reclaimed when
/// an event arrives, in which case the coordinator drops it. Dropping the
/// sender posts [`WorkerEvent::Released`].
pub struct EventSender {
    token: JobHandle,
    queue: EventQueue,
}

impl EventSender {
    pub(crate) fn new(token: JobHandle, queue: EventQueue) -> Self {
        Self { token, queue }
    }

    /// Report an event. Fire-and-forget: the coordinator may be gone.
    pub fn emit(&self, event: WorkerEvent) {
        let _ = self.queue.send((self.token, event));
    }
}

impl Drop for EventSender {
    fn drop(&mut self) {
        let _ = self.queue.send((self.token, WorkerEvent::Released));
    }
}

/// Exclusive ownership of a worker: the strong end of its command channel.
#[derive(Debug)]
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
}

impl WorkerHandle {
    /// Create a command channel. The handle goes into the job; the receiver
    /// goes into the worker task, which treats channel closure as its stop
    /// signal.
    pub fn channel() -> (WorkerHandle, mpsc::UnboundedReceiver<WorkerCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        (WorkerHandle { commands }, receiver)
    }

    /// Forward a command. Fire-and-forget: a worker that already stopped
    /// drops it.
    pub fn command(&self, command: WorkerCommand) {
        let _ = self.commands.send(command);
    }

    /// Weak reference for resource pools. Holding it does not keep the
    /// worker alive, and it stops delivering once the job releases ownership.
    pub fn worker_ref(&self) -> WorkerRef {
        WorkerRef {
            commands: self.commands.downgrade(),
        }
    }
}

/// Weak handle to a worker, safe to retain in pools past the job's lifetime.
#[derive(Debug, Clone)]
pub struct WorkerRef {
    commands: mpsc::WeakUnboundedSender<WorkerCommand>,
}

impl WorkerRef {
    /// Forward a command if the worker is still owned by a live job.
    /// Returns false once ownership was released.
    pub fn command(&self, command: WorkerCommand) -> bool {
        match self.commands.upgrade() {
            Some(commands) => commands.send(command).is_ok(),
            None => false,
        }
    }
}

/// What a download worker needs to start.
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    pub remote: FullRemoteLocation,
    pub local: LocalFileLocation,
    /// Total transfer size in bytes; also selects the pool size class.
    pub size: i64,
    pub name: String,
    pub encryption_key: EncryptionKey,
    /// Look for an existing matching file before transferring.
    pub search_file: bool,
    pub offset: i64,
    pub limit: i64,
}

/// What an upload worker needs to start.
#[derive(Debug, Clone)]
pub struct UploadSpec {
    pub local: LocalFileLocation,
    /// Prior partial upload to resume, if any.
    pub remote: Option<PartialRemoteLocation>,
    pub expected_size: i64,
    pub encryption_key: EncryptionKey,
    /// Parts the remote side rejected in a previous attempt; re-sent first.
    pub bad_parts: Vec<i32>,
}

/// What a hash-upload worker needs to start.
#[derive(Debug, Clone)]
pub struct HashUploadSpec {
    pub local: FullLocalLocation,
    pub size: i64,
}

/// What a raw-data import worker needs to start.
#[derive(Debug, Clone)]
pub struct FromBytesSpec {
    pub file_type: FileType,
    pub bytes: Vec<u8>,
    pub name: String,
}

/// Builds and launches transfer workers. The byte-level transfer logic lives
/// behind this trait, outside the coordination core.
pub trait WorkerSpawner: Send {
    fn spawn_download(&mut self, spec: DownloadSpec, events: EventSender) -> WorkerHandle;
    fn spawn_upload(&mut self, spec: UploadSpec, events: EventSender) -> WorkerHandle;
    fn spawn_upload_by_hash(&mut self, spec: HashUploadSpec, events: EventSender) -> WorkerHandle;
    fn spawn_from_bytes(&mut self, spec: FromBytesSpec, events: EventSender) -> WorkerHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{JobTable, RequestId};

    fn test_token() -> JobHandle {
        let mut table = JobTable::default();
        table.create(RequestId(1), |_| WorkerHandle::channel().0)
    }

    #[test]
    fn event_sender_tags_events_with_its_token() {
        let (queue, mut events) = mpsc::unbounded_channel();
        let token = test_token();
        let sender = EventSender::new(token, queue);
        sender.emit(WorkerEvent::Started);
        let (tagged, event) = events.try_recv().unwrap();
        assert_eq!(tagged, token);
        assert_eq!(event, WorkerEvent::Started);
    }

    #[test]
    fn dropping_event_sender_posts_released() {
        let (queue, mut events) = mpsc::unbounded_channel();
        let token = test_token();
        drop(EventSender::new(token, queue));
        let (tagged, event) = events.try_recv().unwrap();
        assert_eq!(tagged, token);
        assert_eq!(event, WorkerEvent::Released);
    }

    #[test]
    fn worker_ref_does_not_keep_the_worker_alive() {
        let (handle, mut commands) = WorkerHandle::channel();
        let weak = handle.worker_ref();
        assert!(weak.command(WorkerCommand::UpdatePriority(3)));
        assert_eq!(
            commands.try_recv().unwrap(),
            WorkerCommand::UpdatePriority(3)
        );

        drop(handle);
        assert!(!weak.command(WorkerCommand::UpdatePriority(4)));
        assert_eq!(
            commands.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn terminal_classification() {
        assert!(!WorkerEvent::Started.is_terminal());
        assert!(!WorkerEvent::HashReady { hash: "ab".into() }.is_terminal());
        assert!(WorkerEvent::Failed {
            error: TransferError::Canceled
        }
        .is_terminal());
        assert!(WorkerEvent::Released.is_terminal());
    }
}
