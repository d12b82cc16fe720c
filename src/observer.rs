//! Lifecycle callbacks fired by the upload queue

use crate::file::FileEntry;
use serde_json::Value;

/// Answer of [`UploadObserver::on_before_upload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BeforeUpload {
    #[default]
    Continue,
    /// Abort this upload before any request is made.
    Veto,
}

/// One method per lifecycle event. Every method has a no-op default, so an
/// observer only implements what it cares about.
///
/// Callbacks are invoked without any queue lock held.
pub trait UploadObserver: Send + Sync + 'static {
    fn on_init(&self) {}

    /// The transport cannot run here; the queue will not be built.
    fn on_fallback_mode(&self, _message: &str) {}

    fn on_new_file(&self, _index: usize, _file: &FileEntry) {}

    fn on_before_upload(&self, _index: usize) -> BeforeUpload {
        BeforeUpload::Continue
    }

    fn on_complete(&self) {}

    /// `percent` is in `0..=100` and never decreases within one upload.
    fn on_upload_progress(&self, _index: usize, _percent: u32) {}

    fn on_upload_success(&self, _index: usize, _data: &Value) {}

    fn on_upload_error(&self, _index: usize, _message: &str) {}

    fn on_file_size_error(&self, _file: &FileEntry) {}

    fn on_file_type_error(&self, _file: &FileEntry) {}

    fn on_file_ext_error(&self, _file: &FileEntry) {}

    fn on_files_max_error(&self, _file: &FileEntry) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}
