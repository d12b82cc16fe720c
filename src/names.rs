//! Remote file name generation

use uuid::Uuid;

/// Image types that get an extension appended to the generated name.
const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("image/gif", "gif"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/tiff", "tiff"),
    ("image/x-icon", "ico"),
];

/// Random v4 UUID, plus an extension for the known image types.
/// No collision detection.
pub fn generate(mime_type: &str) -> String {
    let token = Uuid::new_v4().to_string();
    match extension_for(mime_type) {
        Some(ext) => format!("{}.{}", token, ext),
        None => token,
    }
}

pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    IMAGE_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}
