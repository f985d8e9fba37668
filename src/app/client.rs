//! HTTP client that reads through the response cache
//!
//! [`CachingClient`] is the network layer the cache sits in front of. A GET
//! first consults the cache; on a miss the response streams from the network
//! into a cache write handle while it is collected for the caller. Caching
//! is best-effort: a declined or failed cache write never fails the request.
//!
//! Cache file I/O runs on the blocking pool. Body chunks reach the write
//! handle through a bounded channel, so closing the handle and running the
//! completion listeners never happen on a runtime worker.

use std::io::{Read, Write};
use std::sync::Arc;

use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::cache::{HeaderRecord, ResponseCache, WriteHandle, WriteOutcome};
use crate::constants::{cache, http};
use crate::errors::{FetchError, FetchResult};

/// A response body together with the headers it was served with
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub headers: HeaderRecord,
    /// Raw body bytes, still content-encoded
    pub bytes: Vec<u8>,
    /// True when served from the cache without a network round trip
    pub from_cache: bool,
}

/// HTTP client backed by a [`ResponseCache`]
#[derive(Debug, Clone)]
pub struct CachingClient {
    client: Client,
    cache: Arc<ResponseCache>,
}

impl CachingClient {
    /// Create a client with the default HTTP settings
    pub fn new(cache: Arc<ResponseCache>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(http::DEFAULT_TIMEOUT)
            .connect_timeout(http::CONNECT_TIMEOUT)
            .user_agent(http::USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(http::MAX_REDIRECTS))
            .build()?;
        Ok(Self::with_client(client, cache))
    }

    /// Create a client around an existing reqwest client
    pub fn with_client(client: Client, cache: Arc<ResponseCache>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// GET `url`, from the cache when possible
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the request fails or the server answers with
    /// a non-success status. Cache failures are never reported here.
    pub async fn get(&self, url: &Url) -> FetchResult<FetchedBody> {
        if let Some(hit) = self.read_cached(url).await {
            info!("Served {} from cache ({} bytes)", url, hit.bytes.len());
            return Ok(hit);
        }

        let response = self.client.get(url.as_str()).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::ServerError {
                status: response.status().as_u16(),
            });
        }

        self.fetch_and_store(response).await
    }

    /// Look up `url` and read the stored body on the blocking pool
    async fn read_cached(&self, url: &Url) -> Option<FetchedBody> {
        let cache = Arc::clone(&self.cache);
        let uri = url.clone();
        let read = tokio::task::spawn_blocking(move || {
            let mut hit = cache.lookup(&uri)?;
            let mut bytes = Vec::new();
            match hit.body.read_to_end(&mut bytes) {
                Ok(_) => Some(FetchedBody {
                    headers: hit.headers,
                    bytes,
                    from_cache: true,
                }),
                Err(e) => {
                    warn!("Failed to read cached body for {}: {}", uri, e);
                    None
                }
            }
        });

        match read.await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache lookup for {} failed: {}", url, e);
                None
            }
        }
    }

    async fn fetch_and_store(&self, response: Response) -> FetchResult<FetchedBody> {
        // Redirects change the URI the body belongs to
        let final_url = response.url().clone();
        let headers = header_record(&response);

        let mut writer = self.begin_body_write(&final_url, &headers).await;

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Some(writer) = writer {
                        writer.finish().await;
                    }
                    return Err(e.into());
                }
            };
            if let Some(writer) = writer.as_mut() {
                writer.send(&chunk).await;
            }
            bytes.extend_from_slice(&chunk);
        }

        if let Some(writer) = writer {
            match writer.finish().await {
                Some(WriteOutcome::Committed) => {
                    info!("Cached {} ({} bytes)", final_url, bytes.len())
                }
                Some(WriteOutcome::Discarded) => {
                    debug!("Discarded cache entry for {}", final_url)
                }
                None => {}
            }
        }

        Ok(FetchedBody {
            headers,
            bytes,
            from_cache: false,
        })
    }

    /// Admit a cache write on the blocking pool and start its body writer
    async fn begin_body_write(&self, uri: &Url, headers: &HeaderRecord) -> Option<BodyWriter> {
        let cache = Arc::clone(&self.cache);
        let target = uri.clone();
        let record = headers.clone();
        let admitted =
            tokio::task::spawn_blocking(move || cache.begin_store_response(&target, &record));

        match admitted.await {
            Ok(Some(handle)) => Some(BodyWriter::spawn(handle)),
            Ok(None) => {
                debug!("Fetching {} without caching", uri);
                None
            }
            Err(e) => {
                warn!("Cache admission for {} failed: {}", uri, e);
                None
            }
        }
    }
}

/// Feeds response chunks to a write handle owned by a blocking task
///
/// The handle is closed on the blocking pool once the sender side is
/// dropped. A failed write drops the handle there, which discards the entry,
/// and later chunks are ignored.
struct BodyWriter {
    uri: Url,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    task: JoinHandle<Option<WriteOutcome>>,
}

impl BodyWriter {
    fn spawn(mut handle: WriteHandle) -> Self {
        let uri = handle.uri().clone();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(cache::WRITE_CHANNEL_CAPACITY);

        let task = tokio::task::spawn_blocking(move || {
            while let Some(chunk) = rx.blocking_recv() {
                if let Err(e) = handle.write_all(&chunk) {
                    warn!(
                        "Cache write failed for {}, continuing uncached: {}",
                        handle.uri(),
                        e
                    );
                    return None;
                }
            }
            Some(handle.close())
        });

        Self {
            uri,
            tx: Some(tx),
            task,
        }
    }

    async fn send(&mut self, chunk: &[u8]) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(chunk.to_vec()).await.is_err() {
            self.tx = None;
        }
    }

    /// Close the channel and wait for the handle to be finalized
    async fn finish(mut self) -> Option<WriteOutcome> {
        self.tx.take();
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Cache writer for {} failed: {}", self.uri, e);
                None
            }
        }
    }
}

/// Convert a response's status line and headers into a header record
pub fn header_record(response: &Response) -> HeaderRecord {
    let status_line = format!("{:?} {}", response.version(), response.status());
    let mut pairs: Vec<(Option<&str>, Vec<String>)> = vec![(None, vec![status_line])];
    pairs.extend(header_pairs(response.headers()));
    HeaderRecord::from_response(pairs)
}

fn header_pairs(map: &HeaderMap) -> Vec<(Option<&str>, Vec<String>)> {
    map.keys()
        .map(|name| {
            let values = map
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (Some(name.as_str()), values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::CacheConfig;
    use reqwest::header::{HeaderValue, CONTENT_LENGTH, SET_COOKIE, TRANSFER_ENCODING};
    use std::thread::{self, ThreadId};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn cache(dir: &TempDir) -> Arc<ResponseCache> {
        Arc::new(
            ResponseCache::new(CacheConfig::with_cache_root(dir.path().to_path_buf())).unwrap(),
        )
    }

    /// Serve one canned HTTP response on a local port
    async fn serve_once(body: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{}/resource", addr)).unwrap()
    }

    #[test]
    fn test_header_pairs_keep_every_value() {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_LENGTH, HeaderValue::from_static("4"));
        map.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        map.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        map.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let record = HeaderRecord::from_response(header_pairs(&map));
        assert_eq!(record.get("content-length"), Some("4"));
        assert_eq!(record.get_all("set-cookie").unwrap().len(), 2);
        assert!(record.get("transfer-encoding").is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        // Unroutable host: any network access would fail the test
        let url = Url::parse("http://cache-only.invalid/resource").unwrap();

        let mut headers = HeaderRecord::new();
        headers.append(Some("content-length"), "5");
        let mut handle = cache.begin_store(&url, &headers, 5).unwrap();
        handle.write_all(b"hello").unwrap();
        handle.close();

        let client = CachingClient::new(Arc::clone(&cache)).unwrap();
        let fetched = client.get(&url).await.unwrap();
        assert!(fetched.from_cache);
        assert_eq!(fetched.bytes, b"hello");
        assert_eq!(fetched.headers.get("content-length"), Some("5"));
    }

    #[tokio::test]
    async fn test_miss_streams_into_cache() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let url = serve_once(b"hello").await;
        let client = CachingClient::with_client(
            Client::builder().no_proxy().build().unwrap(),
            Arc::clone(&cache),
        );

        let fetched = client.get(&url).await.unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(fetched.bytes, b"hello");
        assert!(cache.peek(&url));

        // The server is gone; this must come from disk
        let again = client.get(&url).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(again.bytes, b"hello");
    }

    #[tokio::test]
    async fn test_body_writer_finalizes_off_the_runtime_thread() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let url = Url::parse("http://x/streamed").unwrap();
        let runtime_thread = thread::current().id();

        let listener_thread = Arc::new(parking_lot::Mutex::new(None::<ThreadId>));
        let slot = Arc::clone(&listener_thread);
        cache.add_complete_listener(&url, move |_| {
            *slot.lock() = Some(thread::current().id());
        });

        let mut headers = HeaderRecord::new();
        headers.append(Some("content-length"), "6");
        let handle = cache.begin_store_response(&url, &headers).unwrap();
        let mut writer = BodyWriter::spawn(handle);
        writer.send(b"abc").await;
        writer.send(b"def").await;

        assert_eq!(writer.finish().await, Some(WriteOutcome::Committed));
        let finished_on = (*listener_thread.lock()).unwrap();
        assert_ne!(finished_on, runtime_thread);
        assert!(cache.peek(&url));
    }

    #[tokio::test]
    async fn test_body_writer_short_body_discards() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let url = Url::parse("http://x/short").unwrap();

        let mut headers = HeaderRecord::new();
        headers.append(Some("content-length"), "6");
        let handle = cache.begin_store_response(&url, &headers).unwrap();
        let mut writer = BodyWriter::spawn(handle);
        writer.send(b"abc").await;

        assert_eq!(writer.finish().await, Some(WriteOutcome::Discarded));
        assert!(!cache.peek(&url));
    }
}
