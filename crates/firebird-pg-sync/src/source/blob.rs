//! Bounded resolution of deferred text BLOBs.

use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::core::value::BlobHandle;
use crate::error::{Result, SyncError};

/// Fetch a deferred text BLOB and decode it as UTF-8.
///
/// Never fails: a fetch error or a fetch still running after `timeout`
/// yields `None`, which is loaded as NULL.
pub async fn resolve_text_blob(handle: &dyn BlobHandle, timeout: Duration) -> Option<String> {
    match tokio::time::timeout(timeout, read_all(handle)).await {
        Ok(Ok(buf)) => Some(String::from_utf8_lossy(&buf).into_owned()),
        Ok(Err(e)) => {
            debug!("BLOB fetch failed, storing NULL: {}", e);
            None
        }
        Err(_) => {
            warn!("{}, storing NULL", SyncError::BlobTimeout(timeout));
            None
        }
    }
}

async fn read_all(handle: &dyn BlobHandle) -> Result<BytesMut> {
    let mut stream = handle.open().await?;
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}
