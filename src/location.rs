//! Local and remote file location descriptors.
//!
//! Pure data shared between the coordinator, the transfer workers, and the
//! caller. A download is addressed by a [`FullRemoteLocation`], produces a
//! [`FullLocalLocation`]; an upload goes the other way, reporting progress as
//! a [`PartialRemoteLocation`] until the remote side has every part.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// Identity of a remote storage endpoint. Downloads to different endpoints
/// are admitted through different resource pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub i32);

/// Coarse classification of a file's content, carried through uploads so the
/// caller can route the completed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Document,
    Photo,
    Video,
    Audio,
    VoiceNote,
}

/// Symmetric key material for encrypted transfers. Empty means plaintext.
/// The coordinator never looks inside; it is handed to the worker as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionKey {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl EncryptionKey {
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Fully specified remote file: the source of a download, or the final
/// location reported when a hash-based upload finds the file already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullRemoteLocation {
    /// File held by a storage endpoint.
    Endpoint { endpoint: EndpointId, file_id: i64 },
    /// File fetched from the web; served through the dedicated web endpoint.
    Web { url: Url },
}

impl FullRemoteLocation {
    pub fn is_web(&self) -> bool {
        matches!(self, FullRemoteLocation::Web { .. })
    }

    /// Endpoint this location is served from. Web files all go through the
    /// configured web endpoint.
    pub fn endpoint_or(&self, web_endpoint: EndpointId) -> EndpointId {
        match self {
            FullRemoteLocation::Endpoint { endpoint, .. } => *endpoint,
            FullRemoteLocation::Web { .. } => web_endpoint,
        }
    }
}

/// Remote side of an upload in progress: how much of the file the remote end
/// has acknowledged, part by part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRemoteLocation {
    pub file_id: i64,
    pub part_count: i32,
    pub part_size: i32,
    pub ready_part_count: i32,
}

/// Local file that is completely on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullLocalLocation {
    pub file_type: FileType,
    pub path: PathBuf,
}

/// Local file that is partially on disk (a download in progress, or the
/// already-read prefix of an upload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialLocalLocation {
    pub path: PathBuf,
    /// Contiguous prefix of the file that is present, in bytes.
    pub ready_bytes: i64,
}

/// Local side of a transfer in any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalFileLocation {
    /// Nothing on disk yet.
    Empty,
    Partial(PartialLocalLocation),
    Full(FullLocalLocation),
}

/// A full local location together with its expected size, as supplied by the
/// caller for validation before an upload starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullLocalLocationInfo {
    pub location: FullLocalLocation,
    /// Expected file size in bytes; 0 means unknown (filled from disk).
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_locations_use_the_web_endpoint() {
        let web_endpoint = EndpointId(4);
        let loc = FullRemoteLocation::Web {
            url: Url::parse("https://example.org/a.bin").unwrap(),
        };
        assert!(loc.is_web());
        assert_eq!(loc.endpoint_or(web_endpoint), web_endpoint);
    }

    #[test]
    fn endpoint_locations_keep_their_endpoint() {
        let loc = FullRemoteLocation::Endpoint {
            endpoint: EndpointId(2),
            file_id: 17,
        };
        assert!(!loc.is_web());
        assert_eq!(loc.endpoint_or(EndpointId(4)), EndpointId(2));
    }

    #[test]
    fn empty_encryption_key_means_plaintext() {
        assert!(EncryptionKey::default().is_empty());
        let key = EncryptionKey {
            key: vec![1, 2, 3],
            iv: vec![4, 5, 6],
        };
        assert!(!key.is_empty());
    }
}
