//! Integration tests for the response cache public API

use std::fs;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use url::Url;

use http_response_cache::app::cache::{CacheConfig, CacheKey, HeaderRecord, ResponseCache};
use http_response_cache::app::WriteOutcome;

fn open_cache(dir: &TempDir) -> ResponseCache {
    ResponseCache::new(CacheConfig::with_cache_root(dir.path().to_path_buf())).unwrap()
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn content_length(len: usize) -> HeaderRecord {
    let mut headers = HeaderRecord::new();
    headers.append(Some("Content-Length"), len.to_string());
    headers
}

fn store(cache: &ResponseCache, uri: &Url, headers: &HeaderRecord, body: &[u8]) -> WriteOutcome {
    let mut handle = cache
        .begin_store(uri, headers, body.len() as u64)
        .expect("store should be admitted");
    handle.write_all(body).unwrap();
    handle.close()
}

fn read_all(mut reader: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).unwrap();
    buf
}

#[test]
fn stored_response_is_served_back() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let uri = url("http://x/y");

    assert!(cache.lookup(&uri).is_none());
    assert_eq!(store(&cache, &uri, &content_length(4), b"abcd"), WriteOutcome::Committed);

    let hit = cache.lookup(&uri).expect("entry should be cached");
    assert_eq!(hit.headers.get_all("content-length").unwrap(), ["4"]);
    assert_eq!(read_all(hit.body), b"abcd");
    assert!(cache.peek(&uri));

    let hex = CacheKey::for_url(&uri).to_hex();
    let header_file = fs::read_to_string(dir.path().join(format!("{}.hdr", hex))).unwrap();
    assert!(header_file.lines().any(|line| line == "content-length=4"));
    assert_eq!(fs::read(dir.path().join(format!("{}.bdy", hex))).unwrap(), b"abcd");
}

#[test]
fn entries_survive_reopening() {
    let dir = TempDir::new().unwrap();
    let uri = url("http://x/persisted");
    {
        let cache = open_cache(&dir);
        store(&cache, &uri, &content_length(3), b"abc");
    }

    let cache = open_cache(&dir);
    let hit = cache.lookup(&uri).unwrap();
    assert_eq!(read_all(hit.body), b"abc");
}

#[test]
fn no_store_responses_are_not_cached() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let uri = url("http://x/private");

    let mut headers = content_length(4);
    headers.append(Some("Cache-Control"), "private, no-store");

    assert!(cache.begin_store(&uri, &headers, 4).is_none());
    assert!(!cache.peek(&uri));
    assert_eq!(cache.stats().unwrap().entry_count, 0);
}

#[test]
fn gzip_bodies_are_decoded_by_open_stream() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let uri = url("http://x/compressed");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"hello, compressed world").unwrap();
    let compressed = encoder.finish().unwrap();

    let mut headers = content_length(compressed.len());
    headers.append(Some("Content-Encoding"), "gzip");
    store(&cache, &uri, &headers, &compressed);

    let stream = cache.open_stream(&uri).unwrap();
    assert_eq!(read_all(stream), b"hello, compressed world");

    // lookup hands back the stored bytes untouched
    let hit = cache.lookup(&uri).unwrap();
    assert_eq!(read_all(hit.body), compressed);
}

#[test]
fn concurrent_stores_admit_a_single_writer() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open_cache(&dir));
    let uri = url("http://x/contended");
    let barrier = Arc::new(Barrier::new(8));
    let admitted = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let uri = uri.clone();
            let barrier = Arc::clone(&barrier);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                barrier.wait();
                if let Some(mut handle) = cache.begin_store(&uri, &content_length(4), 4) {
                    admitted.fetch_add(1, Ordering::SeqCst);
                    handle.write_all(b"once").unwrap();
                    handle.close();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert_eq!(read_all(cache.lookup(&uri).unwrap().body), b"once");
}

#[test]
fn in_flight_entry_is_invisible_until_committed() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let uri = url("http://x/slow");

    let mut handle = cache.begin_store(&uri, &content_length(4), 4).unwrap();
    handle.write_all(b"ab").unwrap();

    assert!(cache.lookup(&uri).is_none());
    assert!(!cache.peek(&uri));
    assert!(cache.open_stream(&uri).is_none());
    assert!(cache.begin_store(&uri, &content_length(4), 4).is_none());
    assert_eq!(cache.stats().unwrap().in_flight_writes, 1);

    handle.write_all(b"cd").unwrap();
    assert_eq!(handle.close(), WriteOutcome::Committed);
    assert!(cache.peek(&uri));
}

#[test]
fn short_and_long_bodies_are_discarded() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);

    let short = url("http://x/short");
    let mut handle = cache.begin_store(&short, &content_length(10), 10).unwrap();
    handle.write_all(b"12345").unwrap();
    assert_eq!(handle.close(), WriteOutcome::Discarded);

    let long = url("http://x/long");
    let mut handle = cache.begin_store(&long, &content_length(3), 3).unwrap();
    handle.write_all(b"12345").unwrap();
    assert_eq!(handle.close(), WriteOutcome::Discarded);

    assert!(!cache.peek(&short));
    assert!(!cache.peek(&long));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    // A discarded write leaves the key free for a retry
    assert_eq!(store(&cache, &short, &content_length(5), b"12345"), WriteOutcome::Committed);
}

#[test]
fn dropped_handle_is_finalized() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let complete = url("http://x/complete");
    let partial = url("http://x/partial");

    {
        let mut handle = cache.begin_store(&complete, &content_length(2), 2).unwrap();
        handle.write_all(b"ok").unwrap();
    }
    {
        let mut handle = cache.begin_store(&partial, &content_length(8), 8).unwrap();
        handle.write_all(b"cut").unwrap();
    }

    assert!(cache.peek(&complete));
    assert!(!cache.peek(&partial));
}

#[test]
fn oversized_responses_are_rejected() {
    let dir = TempDir::new().unwrap();
    let cache = ResponseCache::new(
        CacheConfig::with_cache_root(dir.path().to_path_buf()).with_max_size_kb(1),
    )
    .unwrap();
    let uri = url("http://x/huge");

    assert!(cache.begin_store(&uri, &content_length(4096), 4096).is_none());
    assert!(!cache.peek(&uri));
}

#[test]
fn excluded_media_bypasses_the_cache() {
    let dir = TempDir::new().unwrap();
    let cache = ResponseCache::new(
        CacheConfig::with_cache_root(dir.path().to_path_buf()).with_exclude_media(true),
    )
    .unwrap();

    assert!(cache
        .begin_store(&url("http://x/movie.MP4"), &content_length(1), 1)
        .is_none());
    assert_eq!(
        store(&cache, &url("http://x/poster.png"), &content_length(1), b"p"),
        WriteOutcome::Committed
    );
}

#[test]
fn sweep_evicts_least_recently_used() {
    let dir = TempDir::new().unwrap();
    let cache = ResponseCache::new(
        CacheConfig::with_cache_root(dir.path().to_path_buf()).with_max_size_kb(1),
    )
    .unwrap();
    let body = vec![b'x'; 300];
    let uris: Vec<Url> = (0..4).map(|i| url(&format!("http://x/{}", i))).collect();

    for uri in &uris {
        store(&cache, uri, &content_length(body.len()), &body);
        thread::sleep(Duration::from_millis(20));
    }
    // Reading the oldest entry makes it the most recently used
    assert!(cache.lookup(&uris[0]).is_some());

    // Each entry is 319 bytes: three fit in 1024, the fourth overflows
    let report = cache.sweep_now().unwrap();
    assert_eq!(report.evicted, 1);
    assert!(report.retained_bytes <= cache.budget());

    assert!(cache.peek(&uris[0]));
    assert!(!cache.peek(&uris[1]));
    assert!(cache.peek(&uris[2]));
    assert!(cache.peek(&uris[3]));
}

#[test]
fn complete_listeners_fire_once_per_write() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    let uri = url("http://x/watched");
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let expected = uri.clone();
    cache.add_complete_listener(&uri, move |done| {
        assert_eq!(done, &expected);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store(&cache, &uri, &content_length(1), b"1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Removed after firing
    store(&cache, &url("http://x/other"), &content_length(1), b"2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wait_for_resolves_when_write_finishes() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open_cache(&dir));
    let uri = url("http://x/awaited");

    let mut handle = cache.begin_store(&uri, &content_length(2), 2).unwrap();
    let done = cache.wait_for(&uri);

    let writer = tokio::task::spawn_blocking(move || {
        handle.write_all(b"hi").unwrap();
        handle.close()
    });

    tokio::time::timeout(Duration::from_secs(5), done)
        .await
        .expect("write should complete")
        .unwrap();
    assert_eq!(writer.await.unwrap(), WriteOutcome::Committed);
    assert!(cache.peek(&uri));
}

fn config(dir: &TempDir) -> CacheConfig {
    CacheConfig::with_cache_root(dir.path().to_path_buf())
}

#[tokio::test]
async fn reopening_removes_incomplete_entries() {
    let dir = TempDir::new().unwrap();
    let truncated = url("http://x/truncated");
    let orphan = url("http://x/orphan");

    let truncated_hex = CacheKey::for_url(&truncated).to_hex();
    fs::write(
        dir.path().join(format!("{}.hdr", truncated_hex)),
        "content-length=100\n",
    )
    .unwrap();
    fs::write(dir.path().join(format!("{}.bdy", truncated_hex)), b"only part").unwrap();

    let orphan_hex = CacheKey::for_url(&orphan).to_hex();
    fs::write(dir.path().join(format!("{}.bdy", orphan_hex)), b"").unwrap();

    // Maintenance instances never recover
    let maintenance = open_cache(&dir);
    assert_eq!(maintenance.stats().unwrap().entry_count, 1);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);

    let cache = ResponseCache::open(config(&dir)).await.unwrap();
    assert!(!cache.peek(&truncated));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(store(&cache, &orphan, &content_length(1), b"o"), WriteOutcome::Committed);
    cache.shutdown().await;
}

#[tokio::test]
async fn second_instance_leaves_in_flight_write_alone() {
    let dir = TempDir::new().unwrap();
    let uri = url("http://x/shared");
    let writer = open_cache(&dir);

    let mut handle = writer.begin_store(&uri, &content_length(4), 4).unwrap();
    handle.write_all(b"ab").unwrap();
    handle.flush().unwrap();

    // Opening runs recovery, which must not touch the locked body
    let other = ResponseCache::open(config(&dir)).await.unwrap();
    assert!(!other.peek(&uri));
    assert!(other.lookup(&uri).is_none());
    assert!(other.open_stream(&uri).is_none());
    assert!(other.begin_store(&uri, &content_length(4), 4).is_none());
    assert_eq!(other.clear().unwrap(), 0);
    assert_eq!(other.sweep_now().unwrap().in_flight, 1);

    // Maintenance instances see the same
    let maintenance = open_cache(&dir);
    assert!(!maintenance.peek(&uri));

    handle.write_all(b"cd").unwrap();
    assert_eq!(handle.close(), WriteOutcome::Committed);

    assert!(writer.peek(&uri));
    assert!(other.peek(&uri));
    assert_eq!(read_all(other.lookup(&uri).unwrap().body), b"abcd");
    other.shutdown().await;
}

#[test]
fn clear_removes_every_entry() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir);
    for i in 0..3 {
        store(&cache, &url(&format!("http://x/{}", i)), &content_length(1), b"z");
    }

    // Header temp file left by a write that died before its rename
    let leftover = dir
        .path()
        .join(format!("{}.hdr.tmp", CacheKey::for_uri("http://x/died").to_hex()));
    fs::write(&leftover, "content-length=1\n").unwrap();
    fs::File::options()
        .write(true)
        .open(&leftover)
        .unwrap()
        .set_modified(std::time::SystemTime::now() - Duration::from_secs(3600))
        .unwrap();

    assert_eq!(cache.stats().unwrap().entry_count, 3);
    assert_eq!(cache.clear().unwrap(), 3);
    assert!(!leftover.exists());

    let stats = cache.stats().unwrap();
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_bytes, 0);
}
