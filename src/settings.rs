//! Uploader settings and the upload policy compiled from them

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Value of `allowedTypes` that disables the type check.
pub const ANY_TYPE: &str = "*";

/// How the file travels in the request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Raw file bytes with `Content-Type` set to the file's MIME type.
    #[default]
    Binary,
    /// `multipart/form-data` with the file under `fileName` and one text part per extra field.
    Multipart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Upload endpoint; the generated name is appended verbatim.
    pub url: String,
    pub method: String,
    pub api_key: String,
    pub app_id: String,
    pub extra_data: BTreeMap<String, String>,
    /// Bytes; 0 = unlimited.
    pub max_file_size: u64,
    /// 0 = unlimited.
    pub max_files: usize,
    pub allowed_types: String,
    /// Semicolon-delimited extensions, `None` = unlimited.
    pub ext_filter: Option<String>,
    /// Form field the file is attached under in multipart mode.
    pub file_name: String,
    pub payload: PayloadFormat,
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            api_key: String::new(),
            app_id: String::new(),
            extra_data: BTreeMap::new(),
            max_file_size: 0,
            max_files: 0,
            allowed_types: ANY_TYPE.to_string(),
            ext_filter: None,
            file_name: "file".to_string(),
            payload: PayloadFormat::Binary,
            timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// Compile the enqueue-time checks.
    pub fn policy(&self) -> Result<UploadPolicy> {
        let allowed_types = if self.allowed_types == ANY_TYPE {
            None
        } else {
            Some(Regex::new(&self.allowed_types)?)
        };

        let ext_filter = self.ext_filter.as_deref().map(|filter| {
            filter
                .to_lowercase()
                .split(';')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect::<HashSet<_>>()
        });

        Ok(UploadPolicy {
            max_file_size: self.max_file_size,
            allowed_types,
            ext_filter,
            max_files: self.max_files,
        })
    }
}

/// Snapshot of the limits a candidate file is checked against.
#[derive(Debug, Clone, Default)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub allowed_types: Option<Regex>,
    pub ext_filter: Option<HashSet<String>>,
    pub max_files: usize,
}
