//! Sequential upload queue
//!
//! Holds the accepted files, a cursor and a [`DrainState`]. Uploads run one
//! at a time through the injected [`Transport`]; every transition is reported
//! to the [`UploadObserver`]. A failed upload is reported and the drain moves
//! on to the next entry.
//!
//! | From         | Trigger                   | To                          |
//! |--------------|---------------------------|-----------------------------|
//! | Idle         | `start_all`               | Draining                    |
//! | Idle         | `start_one(i)`            | AwaitingItem                |
//! | Draining     | upload finished           | Draining, next entry        |
//! | Draining     | past the last entry       | Idle, `on_complete`         |
//! | Draining     | veto                      | Idle, cursor at last entry  |
//! | AwaitingItem | upload finished           | Idle, `on_complete`         |
//! | AwaitingItem | veto                      | Idle, cursor reset          |
//!
//! The state lock is never held across an `.await` or while the observer
//! runs, so files can be added or removed while a drain waits on the network.
//!
//! Dropping a `start_all`/`start_one` future before it resolves puts the
//! queue back to Idle. The interrupted entry counts as processed, and no
//! `on_complete` fires.

use crate::error::{Rejection, Result, UploaderError};
use crate::file::FileEntry;
use crate::names;
use crate::observer::{BeforeUpload, UploadObserver};
use crate::settings::{Settings, UploadPolicy};
use crate::transport::{ProgressSink, Transport, UploadRequest};
use crate::validator;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    /// Walking the queue from the cursor to the end.
    Draining,
    /// Uploading one explicitly requested entry.
    AwaitingItem,
}

#[derive(Debug)]
struct QueueState {
    entries: Vec<FileEntry>,
    /// Entry being uploaded, or the last one processed.
    cursor: Option<usize>,
    state: DrainState,
}

struct Shared<T, O> {
    settings: Settings,
    policy: UploadPolicy,
    transport: T,
    observer: O,
    state: Mutex<QueueState>,
}

/// Resets a running queue to Idle if its start future is dropped mid-upload.
struct RunGuard<'a> {
    state: &'a Mutex<QueueState>,
    armed: bool,
}

impl<'a> RunGuard<'a> {
    fn new(state: &'a Mutex<QueueState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let last = state.entries.len().checked_sub(1);
        state.cursor = match (state.cursor, last) {
            (Some(cursor), Some(last)) => Some(cursor.min(last)),
            _ => None,
        };
        state.state = DrainState::Idle;
        log::warn!("Upload queue run cancelled, queue is idle again");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transaction {
    Finished,
    Vetoed,
}

/// Cheaply cloneable handle; clones share the same queue.
pub struct UploadQueue<T, O> {
    shared: Arc<Shared<T, O>>,
}

impl<T, O> Clone for UploadQueue<T, O> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport, O: UploadObserver> UploadQueue<T, O> {
    /// Build a queue. If the transport reports it cannot work here, the
    /// observer gets `on_fallback_mode` and no queue is created.
    pub fn new(settings: Settings, transport: T, observer: O) -> Result<Self> {
        if let Err(message) = transport.check_environment() {
            log::warn!("Upload queue running in fallback mode: {}", message);
            observer.on_fallback_mode(&message);
            return Err(UploaderError::UnsupportedEnvironment(message));
        }

        let policy = settings.policy()?;
        let queue = Self {
            shared: Arc::new(Shared {
                settings,
                policy,
                transport,
                observer,
                state: Mutex::new(QueueState {
                    entries: Vec::new(),
                    cursor: None,
                    state: DrainState::Idle,
                }),
            }),
        };

        queue.shared.observer.on_init();
        Ok(queue)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and append files. Returns true if at least one was accepted.
    pub fn enqueue<I>(&self, files: I) -> bool
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut outcomes = Vec::new();
        {
            let mut state = self.lock();
            for file in files {
                match validator::evaluate(&file, state.entries.len(), &self.shared.policy) {
                    Ok(()) => {
                        state.entries.push(file.clone());
                        outcomes.push(Ok((state.entries.len() - 1, file)));
                    }
                    Err(rejection) => outcomes.push(Err((rejection, file))),
                }
            }
        }

        let observer = &self.shared.observer;
        let mut accepted = false;
        for outcome in outcomes {
            match outcome {
                Ok((index, file)) => {
                    accepted = true;
                    observer.on_new_file(index, &file);
                }
                Err((rejection, file)) => {
                    log::debug!("Rejected {}: {}", file.name(), rejection);
                    match rejection {
                        Rejection::FileTooLarge { .. } => observer.on_file_size_error(&file),
                        Rejection::DisallowedType { .. } => observer.on_file_type_error(&file),
                        Rejection::DisallowedExtension { .. } => observer.on_file_ext_error(&file),
                        Rejection::QueueFull { .. } => observer.on_files_max_error(&file),
                    }
                }
            }
        }
        accepted
    }

    /// Remove the entry at `index`. Refused for the entry currently uploading
    /// and for out-of-range indexes. Later entries shift down by one.
    pub fn remove(&self, index: usize) -> bool {
        let mut state = self.lock();
        if index >= state.entries.len() {
            return false;
        }
        if state.state != DrainState::Idle && state.cursor == Some(index) {
            return false;
        }
        state.entries.remove(index);
        true
    }

    /// Upload every entry after the cursor, in order, then fire `on_complete`.
    ///
    /// Returns false without doing anything if the queue is already running;
    /// otherwise resolves once the drain stops.
    pub async fn start_all(&self) -> bool {
        {
            let mut state = self.lock();
            if state.state != DrainState::Idle {
                return false;
            }
            state.state = DrainState::Draining;
        }

        let guard = RunGuard::new(&self.shared.state);
        log::info!("Upload queue drain started");
        self.drain().await;
        guard.disarm();
        true
    }

    /// Upload only the entry at `index`, then go idle and fire `on_complete`.
    /// Returns false if the queue is running or `index` is out of range.
    pub async fn start_one(&self, index: usize) -> bool {
        let file = {
            let mut state = self.lock();
            if state.state != DrainState::Idle || index >= state.entries.len() {
                return false;
            }
            state.state = DrainState::AwaitingItem;
            state.cursor = Some(index);
            state.entries[index].clone()
        };

        let guard = RunGuard::new(&self.shared.state);
        let outcome = self.transact(index, file, DrainState::AwaitingItem).await;
        guard.disarm();
        if outcome == Transaction::Finished {
            self.lock().state = DrainState::Idle;
            self.shared.observer.on_complete();
        }
        true
    }

    async fn drain(&self) {
        loop {
            let next = {
                let mut state = self.lock();
                let cursor = state.cursor.map_or(0, |c| c + 1);
                if cursor >= state.entries.len() {
                    let last = state.entries.len().checked_sub(1);
                    state.cursor = last;
                    state.state = DrainState::Idle;
                    None
                } else {
                    state.cursor = Some(cursor);
                    Some((cursor, state.entries[cursor].clone()))
                }
            };

            let Some((index, file)) = next else {
                log::info!("Upload queue drained");
                self.shared.observer.on_complete();
                return;
            };

            if self.transact(index, file, DrainState::Draining).await == Transaction::Vetoed {
                return;
            }
        }
    }

    /// One upload attempt, from the before-upload hook to the terminal outcome.
    async fn transact(&self, index: usize, file: FileEntry, mode: DrainState) -> Transaction {
        let observer = &self.shared.observer;

        if observer.on_before_upload(index) == BeforeUpload::Veto {
            let mut state = self.lock();
            // A veto during a drain stops the whole drain.
            let cursor = match mode {
                DrainState::Draining => state.entries.len().checked_sub(1),
                _ => None,
            };
            state.cursor = cursor;
            state.state = DrainState::Idle;
            log::warn!("Upload of entry {} vetoed, queue stopped", index);
            return Transaction::Vetoed;
        }

        let settings = &self.shared.settings;
        let name = names::generate(file.mime_type());
        log::info!("Uploading {} ({} bytes) as {}", file.name(), file.size(), name);

        let request = UploadRequest {
            url: format!("{}{}", settings.url, name),
            method: settings.method.clone(),
            app_id: settings.app_id.clone(),
            api_key: settings.api_key.clone(),
            field_name: settings.file_name.clone(),
            extra_data: settings.extra_data.clone(),
            file,
        };

        match self
            .shared
            .transport
            .upload(request, self.progress_sink(index))
            .await
        {
            Ok(data) => observer.on_upload_success(index, &data),
            Err(err) => {
                log::warn!("Upload of entry {} failed: {}", index, err);
                observer.on_upload_error(index, &err.to_string());
            }
        }
        Transaction::Finished
    }

    /// Sink that turns byte counts into non-decreasing percentages for `index`.
    fn progress_sink(&self, index: usize) -> ProgressSink {
        let shared = self.shared.clone();
        let highest = AtomicU32::new(0);
        Arc::new(move |loaded, total| {
            let Some(percent) = percent(loaded, total) else {
                return;
            };
            if percent < highest.fetch_max(percent, Ordering::SeqCst) {
                return;
            }
            shared.observer.on_upload_progress(index, percent);
        })
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.lock().entries.clone()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.lock().cursor
    }

    pub fn state(&self) -> DrainState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() != DrainState::Idle
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }
}

/// `ceil(loaded / total * 100)`, capped at 100. `None` when the total is unknown.
fn percent(loaded: u64, total: Option<u64>) -> Option<u32> {
    let total = total.filter(|t| *t > 0)? as u128;
    let scaled = (loaded as u128 * 100).div_ceil(total);
    Some(scaled.min(100) as u32)
}
