pub mod local;

pub use local::LocalBlobStore;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Blob storage abstraction. Metadata rows hold only the refs returned
/// here, never the bytes themselves.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes under a freshly generated opaque ref and return it.
    /// An existing ref is never overwritten.
    async fn put(&self, data: Bytes) -> Result<String>;

    /// Write a derived variant next to an existing ref, keyed by target
    /// width. Regeneration overwrites, which is safe: variants are pure
    /// functions of the original.
    async fn put_variant(&self, blob_ref: &str, width: u32, data: Bytes) -> Result<()>;

    /// Read the original (`width == None`) or a derived variant. A variant
    /// that has not been generated yet reads as not found.
    async fn get(&self, blob_ref: &str, width: Option<u32>) -> Result<Bytes>;
}
