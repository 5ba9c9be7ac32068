//! Generic progress callback trait and implementations.

use std::marker::PhantomData;

/// Progress data for a single object transfer.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Object key being transferred.
    pub key: String,
    /// Bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total bytes expected, if the transfer's length is known.
    pub total_bytes: Option<u64>,
}

/// Generic progress callback trait.
///
/// Type parameter `T` is the progress data type, allowing different
/// operations to report different progress information while sharing
/// the same callback pattern.
pub trait ProgressCallback<T>: Send + Sync {
    /// Called with progress updates.
    ///
    /// # Arguments
    /// * `progress` - Progress data for the current operation
    ///
    /// # Returns
    /// - `true` to continue the operation
    /// - `false` to cancel the operation
    fn on_progress(&self, progress: &T) -> bool;
}

/// A no-op progress callback that always continues.
pub struct NoOpProgress;

impl<T> ProgressCallback<T> for NoOpProgress {
    fn on_progress(&self, _progress: &T) -> bool {
        true
    }
}

/// A progress callback that wraps a closure.
pub struct FnProgress<F, T> {
    callback: F,
    _marker: PhantomData<T>,
}

impl<F, T> FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    /// Create a new closure-based progress callback.
    ///
    /// # Arguments
    /// * `callback` - Closure that receives progress and returns whether to continue
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _marker: PhantomData,
        }
    }
}

impl<F, T> ProgressCallback<T> for FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
    T: Send + Sync,
{
    fn on_progress(&self, progress: &T) -> bool {
        (self.callback)(progress)
    }
}

/// Create a progress callback from a closure.
///
/// # Arguments
/// * `f` - Closure that receives progress and returns whether to continue
pub fn progress_fn<F, T>(f: F) -> FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    FnProgress::new(f)
}
