//! Validated, sequential file uploads.
//!
//! Files are checked against an [`UploadPolicy`] when they are enqueued and
//! then uploaded one at a time by an [`UploadQueue`] through a [`Transport`]
//! (by default [`HttpTransport`]). Progress and outcomes are reported to an
//! [`UploadObserver`].

pub mod error;
pub mod events;
pub mod file;
pub mod names;
pub mod observer;
pub mod queue;
pub mod settings;
pub mod sources;
pub mod transport;
pub mod validator;

pub use error::{Rejection, TransportError, UploaderError};
pub use events::{ChannelObserver, UploadEvent};
pub use file::{FileEntry, FileInfo, FilePayload};
pub use observer::{BeforeUpload, NoopObserver, UploadObserver};
pub use queue::{DrainState, UploadQueue};
pub use settings::{PayloadFormat, Settings, UploadPolicy};
pub use sources::resolve_dropped_paths;
pub use transport::{HttpTransport, ProgressSink, Transport, UploadRequest};

/// Queue wired to the reqwest transport.
pub type HttpUploadQueue<O> = UploadQueue<HttpTransport, O>;

/// Build an [`HttpUploadQueue`] from settings.
pub fn http_queue<O: UploadObserver>(
    settings: Settings,
    observer: O,
) -> error::Result<HttpUploadQueue<O>> {
    let transport = HttpTransport::new(&settings)?;
    UploadQueue::new(settings, transport, observer)
}
