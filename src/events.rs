//! Upload event payloads and a channel-backed observer

use crate::file::{FileEntry, FileInfo};
use crate::observer::{BeforeUpload, UploadObserver};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// Every observer callback as a serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum UploadEvent {
    Init,
    FallbackMode { message: String },
    NewFile { index: usize, file: FileInfo },
    BeforeUpload { index: usize },
    Complete,
    UploadProgress { index: usize, percent: u32 },
    UploadSuccess { index: usize, data: Value },
    UploadError { index: usize, message: String },
    FileSizeError { file: FileInfo },
    FileTypeError { file: FileInfo },
    FileExtError { file: FileInfo },
    FilesMaxError { file: FileInfo },
}

/// Forwards each callback to an unbounded channel. Never vetoes an upload.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<UploadEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<UploadEvent>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: UploadEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl UploadObserver for ChannelObserver {
    fn on_init(&self) {
        self.emit(UploadEvent::Init);
    }

    fn on_fallback_mode(&self, message: &str) {
        self.emit(UploadEvent::FallbackMode {
            message: message.to_string(),
        });
    }

    fn on_new_file(&self, index: usize, file: &FileEntry) {
        self.emit(UploadEvent::NewFile {
            index,
            file: file.info(),
        });
    }

    fn on_before_upload(&self, index: usize) -> BeforeUpload {
        self.emit(UploadEvent::BeforeUpload { index });
        BeforeUpload::Continue
    }

    fn on_complete(&self) {
        self.emit(UploadEvent::Complete);
    }

    fn on_upload_progress(&self, index: usize, percent: u32) {
        self.emit(UploadEvent::UploadProgress { index, percent });
    }

    fn on_upload_success(&self, index: usize, data: &Value) {
        self.emit(UploadEvent::UploadSuccess {
            index,
            data: data.clone(),
        });
    }

    fn on_upload_error(&self, index: usize, message: &str) {
        self.emit(UploadEvent::UploadError {
            index,
            message: message.to_string(),
        });
    }

    fn on_file_size_error(&self, file: &FileEntry) {
        self.emit(UploadEvent::FileSizeError { file: file.info() });
    }

    fn on_file_type_error(&self, file: &FileEntry) {
        self.emit(UploadEvent::FileTypeError { file: file.info() });
    }

    fn on_file_ext_error(&self, file: &FileEntry) {
        self.emit(UploadEvent::FileExtError { file: file.info() });
    }

    fn on_files_max_error(&self, file: &FileEntry) {
        self.emit(UploadEvent::FilesMaxError { file: file.info() });
    }
}
