//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use vnet_core::checksum::sha256_bytes;
use vnet_core::config::VnetConfig;
use vnet_core::protocol::ContentId;
use vnet_core::sim::SimNetwork;
use vnet_core::{
    DoneCallback, DownloadResult, SessionSummary, Slice, SliceDownloader, TransportContext,
};

pub const SLICE_ID: u16 = 3;

pub fn context() -> Arc<TransportContext> {
    Arc::new(TransportContext::new(
        ContentId::parse("movie0000000000000000042").unwrap(),
    ))
}

pub fn slice(size: u32) -> Slice {
    Slice { id: SLICE_ID, size }
}

/// Callback that records every result it is invoked with.
pub fn recorder() -> (DoneCallback, Arc<Mutex<Vec<DownloadResult>>>) {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let done: DoneCallback = Box::new(
        move |result: DownloadResult, ctx: &TransportContext, slice: &Slice| {
            assert_eq!(slice.id, SLICE_ID);
            assert_eq!(ctx.content.as_str(), "movie0000000000000000042");
            sink.lock().unwrap().push(result);
        },
    );
    (done, results)
}

pub struct Run {
    pub summary: SessionSummary,
    pub results: Vec<DownloadResult>,
}

/// Download a slice of `size` bytes from `net` and wait for the session.
pub async fn download(net: &SimNetwork, cfg: VnetConfig, size: u32, deadline_ms: i64) -> Run {
    let downloader = SliceDownloader::new(cfg, net.collaborators()).unwrap();
    let (done, results) = recorder();
    let handle = downloader
        .download_slice(context(), slice(size), done, deadline_ms)
        .unwrap();
    assert!(
        results.lock().unwrap().is_empty(),
        "callback must not run inside download_slice"
    );
    let summary = handle.finished().await.unwrap();
    let results = results.lock().unwrap().clone();
    Run { summary, results }
}

/// The store holds exactly the bytes the network serves for the slice.
pub fn assert_assembled(net: &SimNetwork, run: &Run, size: u32) {
    let ctx = context();
    let expected = net.expected_slice(&ctx, &slice(size));
    let stored = net.store().contents(&ctx, &slice(size)).expect("slice stored");
    assert_eq!(stored, expected, "assembled slice must match served bytes");
    assert_eq!(run.summary.bytes, size as u64);
    assert_eq!(run.summary.chunks_completed, run.summary.chunks_total);
    assert_eq!(run.summary.sha256.as_deref(), Some(sha256_bytes(&expected).as_str()));
}
