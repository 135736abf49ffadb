//! Test doubles shared by the upload tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use super::transfer::{TransferStrategy, UploadRequest};
use super::{ConflictReport, ProgressSnapshot, TransferOutcome, UploadError, UploadService};
use crate::notify::{Level, Notifier};

/// A captured HTTP request
#[derive(Debug)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

/// One-connection-per-response HTTP server answering with canned bodies
pub struct CannedServer {
    pub url: String,
    requests: mpsc::UnboundedReceiver<CapturedRequest>,
}

impl CannedServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                let _ = tx.send(request);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { url, requests: rx }
    }

    pub async fn next_request(&mut self) -> CapturedRequest {
        self.requests.recv().await.unwrap()
    }
}

async fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let lower = head.to_lowercase();
    let chunked = lower.contains("transfer-encoding: chunked");
    let content_length = lower
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    if chunked {
        while find(&body, b"0\r\n\r\n").is_none() {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body = dechunk(&body);
    } else {
        while body.len() < content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    CapturedRequest { head, body }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn dechunk(mut raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(raw, b"\r\n") {
        let size_str = String::from_utf8_lossy(&raw[..line_end]).to_string();
        let size = usize::from_str_radix(size_str.trim(), 16).unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&raw[start..start + size]);
        raw = &raw[start + size + 2..];
    }
    out
}

/// Scripted [`UploadService`]
#[derive(Default)]
pub struct FakeService {
    pub check: Mutex<Option<Result<ConflictReport, UploadError>>>,
    pub progress: Mutex<VecDeque<ProgressSnapshot>>,
    pub checked_names: Mutex<Vec<Vec<String>>>,
    pub cancel_calls: AtomicUsize,
}

impl FakeService {
    pub fn with_report(report: ConflictReport) -> Self {
        let service = Self::default();
        *service.check.lock().unwrap() = Some(Ok(report));
        service
    }

    pub fn failing_check() -> Self {
        let service = Self::default();
        *service.check.lock().unwrap() = Some(Err(UploadError::Status {
            url: "http://cms.local/check".into(),
            status: 503,
            body: String::new(),
        }));
        service
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadService for FakeService {
    async fn check_upload_files(
        &self,
        names: &[String],
        _target_folder: &str,
    ) -> Result<ConflictReport, UploadError> {
        self.checked_names.lock().unwrap().push(names.to_vec());
        self.check
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(ConflictReport::default()))
    }

    async fn get_upload_progress_info(&self) -> Result<ProgressSnapshot, UploadError> {
        Ok(self
            .progress
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn cancel_upload(&self) -> Result<(), UploadError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`TransferStrategy`] that records requests and returns a fixed outcome
#[derive(Default)]
pub struct FakeStrategy {
    pub outcome: Mutex<Option<TransferOutcome>>,
    /// Never finish, so tests can drive events by hand
    pub hold: bool,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl FakeStrategy {
    pub fn succeeding() -> Self {
        Self {
            outcome: Mutex::new(Some(TransferOutcome {
                success: true,
                message: String::new(),
                stacktrace: String::new(),
                request_size: 0,
            })),
            ..Self::default()
        }
    }

    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }

    pub fn uploaded_names(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferStrategy for FakeStrategy {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn upload(
        &self,
        request: UploadRequest,
        _on_loading: &(dyn Fn(bool) + Send + Sync),
    ) -> Result<TransferOutcome, UploadError> {
        self.requests
            .lock()
            .unwrap()
            .push(request.files.iter().map(|f| f.name.clone()).collect());
        if self.hold {
            std::future::pending::<()>().await;
        }
        Ok(self.outcome.lock().unwrap().clone().unwrap_or_default())
    }
}

/// [`Notifier`] that keeps every message
#[derive(Default)]
pub struct CapturingNotifier {
    pub messages: Mutex<Vec<(Level, String)>>,
}

impl CapturingNotifier {
    pub fn of_level(&self, level: Level) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for CapturingNotifier {
    fn notify(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
