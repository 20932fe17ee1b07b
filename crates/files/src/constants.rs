/// Route prefix under which the REST layer serves local signed downloads.
pub const BLOBS_ROUTE_PREFIX: &str = "/blobs";

/// Longest expiry S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_TTL_SECS: u64 = 604_800;

/// Maximum total key length accepted by [`crate::BlobKey`].
pub(crate) const MAX_KEY_LEN: usize = 1024;
