//! HTTP backend.
//!
//! Talks to a WebDAV-style file server: `HEAD` for sizes, `GET` to download,
//! `PUT` to upload, `DELETE` to remove, and an nginx `autoindex_format json`
//! index for directory listings.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::config::HttpRemoteConfig;
use super::error::TransferError;
use super::traits::{RemoteEntry, TransferGateway};
use crate::config::join_remote;

/// Transfer backend over HTTP.
pub struct HttpTransfer {
    client: Client,
    config: HttpRemoteConfig,
}

/// One row of an nginx JSON autoindex.
#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

impl HttpTransfer {
    /// Create a new HTTP transfer backend.
    pub fn new(config: HttpRemoteConfig) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransferError::transport(format!("failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Builds the URL of a remote path, percent-encoding each segment.
    fn url_for(&self, remote: &str, directory: bool) -> String {
        let encoded: Vec<String> = remote
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let mut url = format!("{}/{}", self.base_url(), encoded.join("/"));
        if directory && !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), password) => request.basic_auth(user, password.as_ref()),
            _ => request,
        }
    }

    /// Sends a request and maps non-success statuses to errors.
    async fn send(&self, request: RequestBuilder, remote: &str) -> Result<Response, TransferError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TransferError::transport(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(TransferError::not_found(remote)),
            s => Err(TransferError::Status {
                path: remote.to_string(),
                status: s.as_u16(),
            }),
        }
    }
}

/// Parses an nginx `autoindex_format json` body into entries under `prefix`.
fn parse_index(prefix: &str, body: &str) -> Result<Vec<RemoteEntry>, TransferError> {
    let rows: Vec<IndexEntry> =
        serde_json::from_str(body).map_err(|e| TransferError::InvalidListing {
            path: prefix.to_string(),
            reason: e.to_string(),
        })?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let is_dir = row.kind == "directory";
            RemoteEntry {
                path: join_remote(prefix, &row.name),
                size: if is_dir { 0 } else { row.size.unwrap_or(0) },
                is_dir,
            }
        })
        .collect())
}

#[async_trait]
impl TransferGateway for HttpTransfer {
    fn name(&self) -> &str {
        "http"
    }

    async fn remote_size(&self, remote: &str) -> Result<u64, TransferError> {
        let url = self.url_for(remote, false);
        let response = self.send(self.client.head(&url), remote).await?;

        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| TransferError::transport(format!("no Content-Length for {}", remote)))
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let url = self.url_for(remote, false);
        let mut response = self.send(self.client.get(&url), remote).await?;

        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut writer = BufWriter::new(File::create(local).await?);
        let mut total_bytes = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransferError::transport(e.to_string()))?
        {
            writer.write_all(&chunk).await?;
            total_bytes += chunk.len() as u64;
        }

        writer.flush().await?;
        debug!(remote = %remote, bytes = total_bytes, "HTTP download finished");
        Ok(total_bytes)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let file = match File::open(local).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::LocalNotFound {
                    path: local.to_path_buf(),
                })
            }
            Err(e) => return Err(TransferError::Io(e)),
        };
        let length = file.metadata().await?.len();

        let url = self.url_for(remote, false);
        let request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(reqwest::Body::from(file));
        self.send(request, remote).await?;

        debug!(remote = %remote, bytes = length, "HTTP upload finished");
        Ok(length)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        let url = self.url_for(prefix, true);
        let response = self.send(self.client.get(&url), prefix).await?;
        let body = response
            .text()
            .await
            .map_err(|e| TransferError::transport(e.to_string()))?;

        parse_index(prefix, &body)
    }

    async fn delete(&self, remote: &str) -> Result<(), TransferError> {
        let url = self.url_for(remote, false);
        self.send(self.client.delete(&url), remote).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    /// A request seen by the test server: method, path and body.
    type Seen = Arc<Mutex<Vec<(String, String, Vec<u8>)>>>;

    /// Serves canned raw responses keyed by `(method, path)`; anything else is a 404.
    async fn serve(routes: Vec<(&'static str, &'static str, String)>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::default();
        let routes = Arc::new(routes);

        let recorded = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    respond(stream, &routes, &recorded).await;
                });
            }
        });

        (format!("http://{}", addr), seen)
    }

    async fn respond(
        mut stream: TcpStream,
        routes: &[(&'static str, &'static str, String)],
        seen: &Seen,
    ) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut request_line = head.lines().next().unwrap_or("").split_whitespace();
        let method = request_line.next().unwrap_or("").to_string();
        let path = request_line.next().unwrap_or("").to_string();
        let length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + length {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        let body = buf[header_end..].to_vec();
        seen.lock().unwrap().push((method.clone(), path.clone(), body));

        let response = routes
            .iter()
            .find(|(m, p, _)| *m == method && *p == path)
            .map(|(_, _, r)| r.clone())
            .unwrap_or_else(|| {
                "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    .to_string()
            });
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    fn ok(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn transfer(url: &str) -> HttpTransfer {
        HttpTransfer::new(HttpRemoteConfig {
            url: url.to_string(),
            username: None,
            password: None,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let http = transfer("https://media.example.org/root/");
        assert_eq!(
            http.url_for("Resources/Videos/Originals/my clip.mov", false),
            "https://media.example.org/root/Resources/Videos/Originals/my%20clip.mov"
        );
        assert_eq!(
            http.url_for("Resources/Thumbnails", true),
            "https://media.example.org/root/Resources/Thumbnails/"
        );
    }

    #[test]
    fn test_parse_index() {
        let body = r#"[
            { "name": "Originals", "type": "directory", "mtime": "Mon, 01 Jan 2024 00:00:00 GMT" },
            { "name": "abc_0.png", "type": "file", "mtime": "Mon, 01 Jan 2024 00:00:00 GMT", "size": 2048 }
        ]"#;
        let entries = parse_index("Resources/Thumbnails", body).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].path, "Resources/Thumbnails/abc_0.png");
        assert_eq!(entries[1].size, 2048);
    }

    #[test]
    fn test_parse_index_rejects_html() {
        let err = parse_index("x", "<html>Index of /x</html>").unwrap_err();
        assert!(matches!(err, TransferError::InvalidListing { .. }));
    }

    #[tokio::test]
    async fn test_remote_size_reads_content_length() {
        let (url, _) = serve(vec![(
            "HEAD",
            "/Videos/a.mov",
            "HTTP/1.1 200 OK\r\nContent-Length: 42\r\nConnection: close\r\n\r\n".to_string(),
        )])
        .await;
        assert_eq!(transfer(&url).remote_size("Videos/a.mov").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_missing_content_length_is_transport_error() {
        let (url, _) = serve(vec![(
            "HEAD",
            "/Videos/a.mov",
            "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string(),
        )])
        .await;
        let err = transfer(&url).remote_size("Videos/a.mov").await.unwrap_err();
        assert!(matches!(err, TransferError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_not_found_and_server_errors_are_mapped() {
        let (url, _) = serve(vec![(
            "GET",
            "/Videos/broken.mov",
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        )])
        .await;
        let temp = TempDir::new().unwrap();
        let http = transfer(&url);

        let err = http
            .download("Videos/missing.mov", &temp.path().join("m.mov"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NotFound { .. }));
        assert!(!err.is_retryable());

        let err = http
            .download("Videos/broken.mov", &temp.path().join("b.mov"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_download_streams_body_to_file() {
        let (url, _) = serve(vec![("GET", "/Videos/a.mov", ok("0123456789"))]).await;
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("nested/a.mov");

        let bytes = transfer(&url).download("Videos/a.mov", &local).await.unwrap();
        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&local).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_upload_puts_file_body() {
        let (url, seen) = serve(vec![(
            "PUT",
            "/Videos/Compressed/a.mp4",
            "HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        )])
        .await;
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("a.mp4");
        std::fs::write(&local, b"compressed-bytes").unwrap();

        let sent = transfer(&url)
            .upload(&local, "Videos/Compressed/a.mp4")
            .await
            .unwrap();
        assert_eq!(sent, 16);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "PUT");
        assert_eq!(seen[0].2, b"compressed-bytes");
    }

    #[tokio::test]
    async fn test_upload_of_missing_local_file() {
        let (url, seen) = serve(vec![]).await;
        let err = transfer(&url)
            .upload(Path::new("/nonexistent/a.mp4"), "Videos/a.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::LocalNotFound { .. }));
        assert!(seen.lock().unwrap().is_empty());
    }
}
