//! Enqueue-time checks for candidate files

use crate::error::Rejection;
use crate::file::FileEntry;
use crate::settings::UploadPolicy;

/// Run the checks in order (size, type, extension, capacity) and stop at the
/// first failure. `queued` is the current queue length.
pub fn evaluate(file: &FileEntry, queued: usize, policy: &UploadPolicy) -> Result<(), Rejection> {
    if policy.max_file_size > 0 && file.size() > policy.max_file_size {
        return Err(Rejection::FileTooLarge {
            size: file.size(),
            max: policy.max_file_size,
        });
    }

    if let Some(pattern) = &policy.allowed_types {
        if !pattern.is_match(file.mime_type()) {
            return Err(Rejection::DisallowedType {
                mime_type: file.mime_type().to_string(),
            });
        }
    }

    if let Some(allowed) = &policy.ext_filter {
        let extension = file.extension();
        if !allowed.contains(&extension) {
            return Err(Rejection::DisallowedExtension { extension });
        }
    }

    if policy.max_files > 0 && queued >= policy.max_files {
        return Err(Rejection::QueueFull {
            max: policy.max_files,
        });
    }

    Ok(())
}
