#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bridge_native::{MemoryHost, MemoryHostConfig};
use core_fileapi::{
    Blob, BlobPart, BlobPropertyBag, EventListener, FileApi, FileReader, ProgressEventKind,
    ReaderEventStream,
};
use parking_lot::Mutex;

pub fn remote_api() -> (Arc<MemoryHost>, FileApi) {
    api_with(MemoryHostConfig::remote().with_chunk_size(4))
}

pub fn direct_api() -> (Arc<MemoryHost>, FileApi) {
    api_with(MemoryHostConfig::direct().with_chunk_size(4))
}

pub fn api_with(config: MemoryHostConfig) -> (Arc<MemoryHost>, FileApi) {
    let host = Arc::new(MemoryHost::new(config));
    let api = FileApi::new(host.clone());
    (host, api)
}

pub async fn text_blob(api: &FileApi, text: &str, media_type: &str) -> Blob {
    Blob::new(
        api,
        vec![BlobPart::from(text)],
        BlobPropertyBag::default().with_type(media_type),
    )
    .await
    .unwrap()
}

/// Records every event kind the reader fires, in delivery order.
pub fn record_events(reader: &FileReader) -> Arc<Mutex<Vec<ProgressEventKind>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in ProgressEventKind::ALL {
        let seen = seen.clone();
        reader.add_event_listener(
            kind,
            EventListener::sync(move |event| {
                seen.lock().push(event.kind());
                Ok(())
            }),
        );
    }
    seen
}

pub async fn wait_for_loadend(events: &mut ReaderEventStream) {
    tokio::time::timeout(Duration::from_secs(5), events.until(ProgressEventKind::LoadEnd))
        .await
        .expect("loadend not delivered in time")
        .expect("reader event stream closed");
}
