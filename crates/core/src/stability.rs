//! Debounce before a newly detected file is read.
//!
//! Imaging hardware writes files in place, so a file seen on one poll may still be growing. The
//! filter waits a fixed period and then only checks that the file is still there; it does not
//! compare sizes or checksums.

use std::path::Path;
use std::time::Duration;

/// Wait `delay`, then report whether `path` still exists.
///
/// A file that disappeared in the meantime (picked up by another process, deleted by the
/// operator) is not an error: the caller simply abandons it.
pub async fn wait_until_stable(path: &Path, delay: Duration) -> bool {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
