use serde::{Deserialize, Serialize};

/// One row of the transfer manifest: everything the downstream asset-copy
/// collaborator needs to move one video from the legacy store to the target
/// platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub consumer_site: String,
    pub course_key: String,
    /// Local name of the converted leaf in the course tree.
    pub xblock_id: String,
    /// Storage key of the HD rendition in the legacy blob store.
    pub videofront_key: String,
    /// Resolved target-platform identifier; empty for the direct-link shape,
    /// which produces no stable cross-reference.
    pub uuid: String,
}
