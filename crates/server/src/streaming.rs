use std::io::{self, SeekFrom};
use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::range::RangeRequest;
use crate::utils::json_error_response;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub enum StreamError {
    NotFound,
    Io(io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NotFound => write!(f, "file not found"),
            StreamError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            StreamError::NotFound
        } else {
            StreamError::Io(err)
        }
    }
}

/// An opened regular file together with the size every range is checked against.
pub struct StreamSource {
    file: File,
    size: u64,
}

impl StreamSource {
    pub async fn open(path: &Path) -> Result<Self, StreamError> {
        let file = File::open(path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StreamError::NotFound);
        }
        Ok(Self {
            file,
            size: meta.len(),
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 200 with the whole file, or 206 with just the requested slice. The body
    /// reads the file in bounded chunks; dropping it closes the file.
    pub async fn into_response(
        self,
        request: RangeRequest,
        content_type: &str,
    ) -> Result<Response, StreamError> {
        let Self { mut file, size } = self;
        let (status, length, content_range) = match request {
            RangeRequest::Full => (StatusCode::OK, size, None),
            RangeRequest::Partial(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                (
                    StatusCode::PARTIAL_CONTENT,
                    range.len(),
                    Some(format!("bytes {}-{}/{}", range.start, range.end, size)),
                )
            }
        };

        let stream = ReaderStream::with_capacity(file.take(length), CHUNK_SIZE);
        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .unwrap_or(HeaderValue::from_static("application/octet-stream")),
        );
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Some(value) = content_range {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(header::CONTENT_RANGE, value);
            }
        }
        Ok(response)
    }
}

pub fn range_not_satisfiable(size: u64) -> Response {
    let mut response =
        json_error_response(StatusCode::RANGE_NOT_SATISFIABLE, "Range not satisfiable");
    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
        response.headers_mut().insert(header::CONTENT_RANGE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};

    use super::{range_not_satisfiable, StreamError, StreamSource};
    use crate::range::{parse_range, ByteRange, RangeRequest};

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn full_request_streams_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        let data = sample(200_000);
        std::fs::write(&path, &data).unwrap();

        let source = StreamSource::open(&path).await.unwrap();
        assert_eq!(source.size(), 200_000);
        let response = source
            .into_response(RangeRequest::Full, "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "200000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn partial_request_streams_exact_slice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        let data = sample(1000);
        std::fs::write(&path, &data).unwrap();

        let source = StreamSource::open(&path).await.unwrap();
        let response = source
            .into_response(
                RangeRequest::Partial(ByteRange { start: 100, end: 199 }),
                "audio/mpeg",
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(body_bytes(response).await, &data[100..200]);
    }

    #[tokio::test]
    async fn consecutive_ranges_rebuild_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.flac");
        let data = sample(10_007);
        std::fs::write(&path, &data).unwrap();

        let mut rebuilt = Vec::new();
        let mut start = 0u64;
        while start < data.len() as u64 {
            let header = format!("bytes={}-{}", start, start + 999);
            let source = StreamSource::open(&path).await.unwrap();
            let request = parse_range(Some(&header), source.size()).unwrap();
            let response = source.into_response(request, "audio/flac").await.unwrap();
            rebuilt.extend(body_bytes(response).await);
            start += 1000;
        }
        assert_eq!(rebuilt, data);
    }

    #[tokio::test]
    async fn missing_file_and_directory_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StreamSource::open(&dir.path().join("nope.mp3")).await,
            Err(StreamError::NotFound)
        ));
        assert!(matches!(
            StreamSource::open(dir.path()).await,
            Err(StreamError::NotFound)
        ));
    }

    #[cfg(target_os = "linux")]
    fn open_handles_to(path: &std::path::Path) -> usize {
        std::fs::read_dir("/proc/self/fd")
            .unwrap()
            .filter_map(|entry| std::fs::read_link(entry.ok()?.path()).ok())
            .filter(|target| target == path)
            .count()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropped_body_releases_file() {
        use std::pin::Pin;

        use axum::body::HttpBody;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.mp3");
        std::fs::write(&path, sample(4 * 1024 * 1024)).unwrap();
        let path = path.canonicalize().unwrap();

        let source = StreamSource::open(&path).await.unwrap();
        let response = source
            .into_response(
                RangeRequest::Partial(ByteRange { start: 10, end: 3_999_999 }),
                "audio/mpeg",
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

        let mut body = response.into_body();
        let frame = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx))
            .await
            .unwrap()
            .unwrap();
        let chunk = frame.into_data().unwrap();
        assert!(!chunk.is_empty() && chunk.len() < 3_999_990);
        assert_eq!(open_handles_to(&path), 1);

        drop(body);
        let mut open = open_handles_to(&path);
        for _ in 0..50 {
            if open == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            open = open_handles_to(&path);
        }
        assert_eq!(open, 0);
    }

    #[test]
    fn unsatisfiable_response_reports_size() {
        let response = range_not_satisfiable(1000);
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }
}
