//! Upload transport: the request handed to it and the reqwest implementation

use crate::error::{TransportError, UploaderError};
use crate::file::{FileEntry, FilePayload, OCTET_STREAM};
use crate::settings::{PayloadFormat, Settings};
use futures_util::{stream, Stream, StreamExt};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

pub const APP_ID_HEADER: &str = "X-Parse-Application-Id";
pub const API_KEY_HEADER: &str = "X-Parse-REST-API-Key";

const USER_AGENT: &str = concat!("dm-uploader/", env!("CARGO_PKG_VERSION"));

/// Body chunk size; one progress report per chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Receives `(bytes sent, total bytes if known)` while a body is written.
///
/// Counts are taken when the HTTP client pulls a chunk from the body, not
/// when it reaches the socket, so 100% can be reported before the request
/// has fully gone out.
pub type ProgressSink = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Everything needed to upload one queue entry.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Endpoint with the generated name already appended.
    pub url: String,
    pub method: String,
    pub app_id: String,
    pub api_key: String,
    /// Form field for the file in multipart bodies.
    pub field_name: String,
    pub extra_data: BTreeMap<String, String>,
    pub file: FileEntry,
}

impl UploadRequest {
    pub fn content_type(&self) -> &str {
        match self.file.mime_type() {
            "" => OCTET_STREAM,
            mime => mime,
        }
    }
}

/// Sends one file and resolves once the request has finished, successfully or not.
pub trait Transport: Send + Sync + 'static {
    /// Whether uploads can work at all in this environment.
    fn check_environment(&self) -> Result<(), String> {
        Ok(())
    }

    fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressSink,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// HTTP transport built on reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    payload: PayloadFormat,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> crate::error::Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self::with_client(builder.build()?, settings)
    }

    pub fn with_client(client: Client, settings: &Settings) -> crate::error::Result<Self> {
        parse_method(&settings.method)
            .map_err(|_| UploaderError::InvalidMethod(settings.method.clone()))?;

        Ok(Self {
            client,
            base_url: settings.url.clone(),
            payload: settings.payload,
        })
    }

    async fn build_body(
        file: &FileEntry,
        progress: ProgressSink,
    ) -> Result<reqwest::Body, TransportError> {
        // Progress totals use the payload's real length, not the declared size.
        let body = match file.payload() {
            FilePayload::Memory(data) => {
                let data = data.clone();
                let total = data.len() as u64;
                let chunks = stream::iter((0..data.len()).step_by(CHUNK_SIZE).map(move |start| {
                    let end = (start + CHUNK_SIZE).min(data.len());
                    Ok::<_, std::io::Error>(data[start..end].to_vec())
                }));
                reqwest::Body::wrap_stream(with_progress(chunks, total, progress))
            }
            FilePayload::Path(path) => {
                let reader = File::open(path).await?;
                let total = reader.metadata().await?.len();
                let chunks = ReaderStream::with_capacity(reader, CHUNK_SIZE)
                    .map(|chunk| chunk.map(|bytes| bytes.to_vec()));
                reqwest::Body::wrap_stream(with_progress(chunks, total, progress))
            }
        };
        Ok(body)
    }
}

impl Transport for HttpTransport {
    fn check_environment(&self) -> Result<(), String> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| format!("Upload URL '{}' is not usable: {}", self.base_url, e))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(format!("Unsupported upload URL scheme: {}", scheme)),
        }
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressSink,
    ) -> Result<Value, TransportError> {
        let method = parse_method(&request.method)?;
        let body = Self::build_body(&request.file, progress).await?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .header(APP_ID_HEADER, &request.app_id)
            .header(API_KEY_HEADER, &request.api_key);

        builder = match self.payload {
            PayloadFormat::Binary => builder
                .header(reqwest::header::CONTENT_TYPE, request.content_type())
                .body(body),
            PayloadFormat::Multipart => {
                // No length: the declared size may not match the bytes actually sent.
                let part = reqwest::multipart::Part::stream(body)
                    .file_name(request.file.name().to_string())
                    .mime_str(request.content_type())?;
                let mut form =
                    reqwest::multipart::Form::new().part(request.field_name.clone(), part);
                for (key, value) in &request.extra_data {
                    form = form.text(key.clone(), value.clone());
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status { status, body: text });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

fn parse_method(method: &str) -> Result<Method, TransportError> {
    Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| TransportError::Other(format!("Invalid HTTP method: {}", method)))
}

/// Report the running byte count as each chunk is pulled by the client.
fn with_progress<S>(
    chunks: S,
    total: u64,
    progress: ProgressSink,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static
where
    S: Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static,
{
    let mut sent = 0u64;
    chunks.inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            sent += chunk.len() as u64;
            progress(sent, Some(total));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{
        body_bytes, body_string_contains, header, header_regex, method, path, path_regex,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(url: &str) -> Settings {
        Settings {
            url: url.to_string(),
            method: "PUT".to_string(),
            app_id: "app-123".to_string(),
            api_key: "key-456".to_string(),
            ..Settings::default()
        }
    }

    fn request(url: String, file: FileEntry) -> UploadRequest {
        UploadRequest {
            url,
            method: "PUT".to_string(),
            app_id: "app-123".to_string(),
            api_key: "key-456".to_string(),
            field_name: "file".to_string(),
            extra_data: BTreeMap::new(),
            file,
        }
    }

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<(u64, Option<u64>)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: ProgressSink = Arc::new(move |sent, total| {
            sink_seen.lock().unwrap().push((sent, total));
        });
        (sink, seen)
    }

    #[tokio::test]
    async fn binary_upload_sends_headers_and_raw_body() {
        let server = MockServer::start().await;
        let data = vec![7u8; CHUNK_SIZE + 10];

        Mock::given(method("PUT"))
            .and(path_regex(r"^/files/[0-9a-f-]{36}\.png$"))
            .and(header(APP_ID_HEADER, "app-123"))
            .and(header(API_KEY_HEADER, "key-456"))
            .and(header("content-type", "image/png"))
            .and(body_bytes(data.clone()))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"name": "stored"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/files/", server.uri());
        let transport = HttpTransport::new(&settings(&base)).unwrap();
        let url = format!("{}{}", base, crate::names::generate("image/png"));
        let (sink, seen) = recording_sink();

        let data_len = data.len() as u64;
        let result = transport
            .upload(
                request(url, FileEntry::from_bytes("a.png", "image/png", data)),
                sink,
            )
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!({"name": "stored"}));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last(), Some(&(data_len, Some(data_len))));
    }

    #[tokio::test]
    async fn multipart_upload_carries_file_field_and_extra_data() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/doc"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(header(APP_ID_HEADER, "app-123"))
            .and(body_string_contains("name=\"attachment\"; filename=\"notes.txt\""))
            .and(body_string_contains("name=\"folder\""))
            .and(body_string_contains("avatars"))
            .and(body_string_contains("hello multipart"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = settings(&server.uri());
        config.method = "POST".to_string();
        config.payload = PayloadFormat::Multipart;
        let transport = HttpTransport::new(&config).unwrap();

        let mut req = request(
            format!("{}/upload/doc", server.uri()),
            FileEntry::from_bytes("notes.txt", "text/plain", b"hello multipart".to_vec()),
        );
        req.method = "POST".to_string();
        req.field_name = "attachment".to_string();
        req.extra_data
            .insert("folder".to_string(), "avatars".to_string());

        let (sink, _) = recording_sink();
        let result = transport.upload(req, sink).await.unwrap();
        assert_eq!(result, Value::String("ok".to_string()));
    }

    #[tokio::test]
    async fn multipart_sends_actual_payload_when_declared_size_differs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("filename=\"notes.txt\""))
            .and(body_string_contains("0123456789"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = settings(&server.uri());
        config.method = "POST".to_string();
        config.payload = PayloadFormat::Multipart;
        let transport = HttpTransport::new(&config).unwrap();

        let entry = FileEntry::with_declared(
            "notes.txt",
            "text/plain",
            1000,
            FilePayload::Memory(Arc::from(b"0123456789".to_vec())),
        );
        let mut req = request(format!("{}/doc", server.uri()), entry);
        req.method = "POST".to_string();

        let (sink, seen) = recording_sink();
        let result = transport.upload(req, sink).await.unwrap();
        assert_eq!(result, Value::String("ok".to_string()));
        assert_eq!(seen.lock().unwrap().last(), Some(&(10, Some(10))));
    }

    #[tokio::test]
    async fn error_status_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&settings(&server.uri())).unwrap();
        let (sink, _) = recording_sink();
        let err = transport
            .upload(
                request(
                    format!("{}/x", server.uri()),
                    FileEntry::from_bytes("a.bin", "", vec![1u8]),
                ),
                sink,
            )
            .await
            .unwrap_err();

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "disk full");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn path_payload_is_streamed_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("report.pdf");
        std::fs::write(&file_path, b"%PDF-1.4 test").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("content-type", "application/pdf"))
            .and(body_bytes(b"%PDF-1.4 test".to_vec()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&settings(&server.uri())).unwrap();
        let entry = FileEntry::from_path(&file_path).await.unwrap();
        let (sink, seen) = recording_sink();

        let result = transport
            .upload(request(format!("{}/r", server.uri()), entry), sink)
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
        assert_eq!(seen.lock().unwrap().last(), Some(&(13, Some(13))));
    }

    #[test]
    fn environment_check_requires_http_url() {
        assert!(HttpTransport::new(&settings("https://api.example.com/files/"))
            .unwrap()
            .check_environment()
            .is_ok());
        assert!(HttpTransport::new(&settings(""))
            .unwrap()
            .check_environment()
            .is_err());
        assert!(HttpTransport::new(&settings("ftp://example.com/"))
            .unwrap()
            .check_environment()
            .is_err());
    }

    #[test]
    fn invalid_method_is_rejected_at_construction() {
        let mut config = settings("http://localhost/");
        config.method = "NOT A METHOD".to_string();
        assert!(matches!(
            HttpTransport::new(&config),
            Err(UploaderError::InvalidMethod(_))
        ));
    }

    #[test]
    fn empty_mime_type_falls_back_to_octet_stream() {
        let req = request(
            "http://localhost/".to_string(),
            FileEntry::from_bytes("a", "", vec![0u8]),
        );
        assert_eq!(req.content_type(), OCTET_STREAM);
    }
}
