//! Caller-facing surface: job commands in, tagged notices out.

use tokio::sync::mpsc;

use crate::error::TransferError;
use crate::location::{
    EncryptionKey, FileType, FullLocalLocation, FullRemoteLocation, LocalFileLocation,
    PartialLocalLocation, PartialRemoteLocation,
};
use crate::registry::RequestId;
use crate::worker::WorkerEvent;

/// Operations accepted by the coordinator task.
#[derive(Debug)]
pub(super) enum Command {
    StartDownload {
        id: RequestId,
        remote: FullRemoteLocation,
        local: LocalFileLocation,
        size: i64,
        name: String,
        encryption_key: EncryptionKey,
        search_file: bool,
        offset: i64,
        limit: i64,
        priority: i8,
    },
    StartUpload {
        id: RequestId,
        local: LocalFileLocation,
        remote: Option<PartialRemoteLocation>,
        expected_size: i64,
        encryption_key: EncryptionKey,
        priority: i8,
        bad_parts: Vec<i32>,
    },
    StartUploadByHash {
        id: RequestId,
        local: FullLocalLocation,
        size: i64,
        priority: i8,
    },
    StartFromBytes {
        id: RequestId,
        file_type: FileType,
        bytes: Vec<u8>,
        name: String,
    },
    UpdatePriority {
        id: RequestId,
        priority: i8,
    },
    UpdateLocalLocation {
        id: RequestId,
        local: LocalFileLocation,
    },
    UpdateDownloadedRange {
        id: RequestId,
        offset: i64,
        limit: i64,
    },
    Cancel {
        id: RequestId,
    },
    Shutdown,
}

/// Events delivered to the caller, each tagged with the request id that
/// started the job. A job's terminal notice (`DownloadCompleted`,
/// `UploadCompleted`, `UploadCompletedFull`, or `Failed`) is always its last.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    DownloadStarted {
        id: RequestId,
    },
    DownloadProgress {
        id: RequestId,
        partial: PartialLocalLocation,
        ready_bytes: i64,
        total_bytes: i64,
    },
    HashReady {
        id: RequestId,
        hash: String,
    },
    UploadProgress {
        id: RequestId,
        partial: PartialRemoteLocation,
        ready_bytes: i64,
    },
    DownloadCompleted {
        id: RequestId,
        local: FullLocalLocation,
        size: i64,
        is_new: bool,
    },
    UploadCompleted {
        id: RequestId,
        file_type: FileType,
        remote: PartialRemoteLocation,
        size: i64,
    },
    UploadCompletedFull {
        id: RequestId,
        remote: FullRemoteLocation,
    },
    Failed {
        id: RequestId,
        error: TransferError,
    },
}

impl Notice {
    /// The request id this notice is tagged with.
    pub fn request_id(&self) -> RequestId {
        match self {
            Notice::DownloadStarted { id }
            | Notice::DownloadProgress { id, .. }
            | Notice::HashReady { id, .. }
            | Notice::UploadProgress { id, .. }
            | Notice::DownloadCompleted { id, .. }
            | Notice::UploadCompleted { id, .. }
            | Notice::UploadCompletedFull { id, .. }
            | Notice::Failed { id, .. } => *id,
        }
    }

    pub(super) fn from_event(id: RequestId, event: WorkerEvent) -> Notice {
        match event {
            WorkerEvent::Started => Notice::DownloadStarted { id },
            WorkerEvent::DownloadProgress {
                partial,
                ready_bytes,
                total_bytes,
            } => Notice::DownloadProgress {
                id,
                partial,
                ready_bytes,
                total_bytes,
            },
            WorkerEvent::HashReady { hash } => Notice::HashReady { id, hash },
            WorkerEvent::UploadProgress {
                partial,
                ready_bytes,
            } => Notice::UploadProgress {
                id,
                partial,
                ready_bytes,
            },
            WorkerEvent::DownloadDone { local, size, is_new } => Notice::DownloadCompleted {
                id,
                local,
                size,
                is_new,
            },
            WorkerEvent::UploadDone {
                file_type,
                remote,
                size,
            } => Notice::UploadCompleted {
                id,
                file_type,
                remote,
                size,
            },
            WorkerEvent::UploadDoneFull { remote } => Notice::UploadCompletedFull { id, remote },
            WorkerEvent::Failed { error } => Notice::Failed { id, error },
            // A worker that vanished without a terminal event.
            WorkerEvent::Released => Notice::Failed {
                id,
                error: TransferError::Canceled,
            },
        }
    }
}

/// Cheap cloneable handle to a running coordinator. Every operation is
/// fire-and-forget: results come back as [`Notice`]s on the channel supplied
/// at spawn time. Operations sent after shutdown are silently dropped.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    pub(super) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    fn send(&self, command: Command) {
        let _ = self.commands.send(command);
    }

    /// Start a download job. `size` selects the pool size class; `offset`
    /// and `limit` restrict the requested byte range.
    #[allow(clippy::too_many_arguments)]
    pub fn start_download(
        &self,
        id: RequestId,
        remote: FullRemoteLocation,
        local: LocalFileLocation,
        size: i64,
        name: String,
        encryption_key: EncryptionKey,
        search_file: bool,
        offset: i64,
        limit: i64,
        priority: i8,
    ) {
        self.send(Command::StartDownload {
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
        });
    }

    /// Start an upload job, optionally resuming a prior partial upload.
    pub fn start_upload(
        &self,
        id: RequestId,
        local: LocalFileLocation,
        remote: Option<PartialRemoteLocation>,
        expected_size: i64,
        encryption_key: EncryptionKey,
        priority: i8,
        bad_parts: Vec<i32>,
    ) {
        self.send(Command::StartUpload {
            id,
            local,
            remote,
            expected_size,
            encryption_key,
            priority,
            bad_parts,
        });
    }

    /// Start a hash-based upload: the worker hashes the local file and asks
    /// the remote side whether it already has it.
    pub fn start_upload_by_hash(
        &self,
        id: RequestId,
        local: FullLocalLocation,
        size: i64,
        priority: i8,
    ) {
        self.send(Command::StartUploadByHash {
            id,
            local,
            size,
            priority,
        });
    }

    /// Import raw bytes as a named local file.
    pub fn start_from_bytes(&self, id: RequestId, file_type: FileType, bytes: Vec<u8>, name: String) {
        self.send(Command::StartFromBytes {
            id,
            file_type,
            bytes,
            name,
        });
    }

    /// No-op if `id` has no live job.
    pub fn update_priority(&self, id: RequestId, priority: i8) {
        self.send(Command::UpdatePriority { id, priority });
    }

    /// No-op if `id` has no live job.
    pub fn update_local_location(&self, id: RequestId, local: LocalFileLocation) {
        self.send(Command::UpdateLocalLocation { id, local });
    }

    /// No-op if `id` has no live job.
    pub fn update_downloaded_range(&self, id: RequestId, offset: i64, limit: i64) {
        self.send(Command::UpdateDownloadedRange { id, offset, limit });
    }

    /// Cancel the job started with `id`. Surfaces as exactly one
    /// `Failed(Canceled)` notice; no-op if `id` has no live job.
    pub fn cancel(&self, id: RequestId) {
        self.send(Command::Cancel { id });
    }

    /// Stop accepting jobs and drain. The coordinator's join handle resolves
    /// once every live job has been reclaimed; no notices are delivered after
    /// this call is processed.
    pub fn request_shutdown(&self) {
        self.send(Command::Shutdown);
    }
}
