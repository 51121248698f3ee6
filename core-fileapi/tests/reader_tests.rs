mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use core_fileapi::{
    Blob, BlobPart, BlobPropertyBag, EventListener, EventPhase, FileApiError, FileReader,
    ProgressEventKind, ReadyState, ResultType,
};
use parking_lot::Mutex;

use bridge_native::MemoryHostConfig;

use common::{
    api_with, direct_api, record_events, remote_api, text_blob, wait_for_loadend,
};

use ProgressEventKind::{Abort, Error, Load, LoadEnd, LoadStart, Progress};

fn counter() -> (Arc<AtomicUsize>, EventListener) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let listener = EventListener::sync(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (count, listener)
}

#[tokio::test]
async fn test_successful_read_sequence() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "hello", "text/plain").await;
    let reader = FileReader::new(&api).await.unwrap();
    let seen = record_events(&reader);
    let mut events = reader.subscribe();

    assert_eq!(reader.ready_state().await.unwrap(), ReadyState::Empty);
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(
        *seen.lock(),
        vec![LoadStart, Progress, Progress, Load, LoadEnd]
    );
    assert_eq!(reader.ready_state().await.unwrap(), ReadyState::Done);
    assert_eq!(reader.result_as_string().await.unwrap().as_deref(), Some("hello"));
    assert_eq!(reader.result_type().await.unwrap(), Some(ResultType::Text));
    assert!(reader.error().await.unwrap().is_none());
}

#[tokio::test]
async fn test_progress_snapshots_count_up() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "0123456789", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let mut events = reader.subscribe();

    reader.read_as_array_buffer(&blob).await.unwrap();

    let start = events.recv().await.unwrap();
    assert_eq!((start.kind, start.loaded, start.total), (LoadStart, 0, 10));
    let mut loaded = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        if event.kind != Progress {
            assert_eq!(event.kind, Load);
            assert_eq!(event.loaded, 10);
            break;
        }
        assert!(event.length_computable);
        loaded.push(event.loaded);
    }
    assert_eq!(loaded, vec![4, 8, 10]);
}

#[tokio::test]
async fn test_array_buffer_result() {
    let (host, api) = remote_api();
    let blob = Blob::new(&api, vec![BlobPart::from(vec![1u8, 2, 3])], BlobPropertyBag::default())
        .await
        .unwrap();
    let reader = FileReader::new(&api).await.unwrap();
    let mut events = reader.subscribe();

    reader.read_as_array_buffer(&blob).await.unwrap();
    wait_for_loadend(&mut events).await;
    let live = host.live_objects();

    assert_eq!(reader.result_type().await.unwrap(), Some(ResultType::ArrayBuffer));
    assert_eq!(
        reader.result_as_byte_array().await.unwrap(),
        Some(Bytes::from_static(&[1, 2, 3]))
    );
    assert_eq!(reader.result_as_string().await.unwrap(), None);
    assert_eq!(host.live_objects(), live);
}

#[tokio::test]
async fn test_text_encodings_and_formats() {
    let (_host, api) = remote_api();
    let utf16 = Blob::new(
        &api,
        vec![BlobPart::from(vec![0x68u8, 0x00, 0x69, 0x00])],
        BlobPropertyBag::default(),
    )
    .await
    .unwrap();
    let hello = text_blob(&api, "hello", "text/plain").await;
    let reader = FileReader::new(&api).await.unwrap();

    let mut events = reader.subscribe();
    reader.read_as_text(&utf16, Some("utf-16le")).await.unwrap();
    wait_for_loadend(&mut events).await;
    assert_eq!(reader.result_as_string().await.unwrap().as_deref(), Some("hi"));

    reader.read_as_data_url(&hello).await.unwrap();
    wait_for_loadend(&mut events).await;
    assert_eq!(
        reader.result_as_string().await.unwrap().as_deref(),
        Some("data:text/plain;base64,aGVsbG8=")
    );

    reader.read_as_binary_string(&utf16).await.unwrap();
    wait_for_loadend(&mut events).await;
    assert_eq!(
        reader.result_as_string().await.unwrap().as_deref(),
        Some("h\u{0}i\u{0}")
    );
}

#[tokio::test]
async fn test_abort_sequence() {
    let (_host, api) = direct_api();
    let big = Blob::new(&api, vec![BlobPart::from(vec![7u8; 4096])], BlobPropertyBag::default())
        .await
        .unwrap();
    let reader = FileReader::new(&api).await.unwrap();
    let seen = record_events(&reader);
    let mut events = reader.subscribe();

    reader.read_as_array_buffer(&big).await.unwrap();
    assert_eq!(reader.ready_state_now().unwrap(), ReadyState::Loading);
    reader.abort().await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(*seen.lock(), vec![LoadStart, Abort, LoadEnd]);
    assert_eq!(reader.ready_state().await.unwrap(), ReadyState::Done);
    assert_eq!(reader.result_as_byte_array().await.unwrap(), None);
}

#[tokio::test]
async fn test_unreadable_blob_sequence() {
    let (host, api) = remote_api();
    let blob = text_blob(&api, "vanishing", "").await;
    host.invalidate(&blob.reference().host_ref()).unwrap();
    let reader = FileReader::new(&api).await.unwrap();
    let seen = record_events(&reader);
    let mut events = reader.subscribe();

    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(*seen.lock(), vec![LoadStart, Error, LoadEnd]);
    assert_eq!(reader.ready_state().await.unwrap(), ReadyState::Done);
    assert_eq!(reader.result_as_string().await.unwrap(), None);

    let error = reader.error().await.unwrap().expect("error recorded");
    assert_eq!(error.name().await.unwrap(), "NotReadableError");
    assert!(!error.message().await.unwrap().is_empty());
    error.dispose().await.unwrap();
}

#[tokio::test]
async fn test_read_while_loading_is_rejected() {
    let (_host, api) = direct_api();
    let blob = text_blob(&api, "abc", "").await;
    let reader = FileReader::new(&api).await.unwrap();

    reader.read_as_text(&blob, None).await.unwrap();
    let err = reader.read_as_text(&blob, None).await.unwrap_err();

    let message = err.host_message().unwrap_or_default();
    assert!(message.starts_with("InvalidStateError"), "{message}");
}

#[tokio::test]
async fn test_fan_out_survives_failing_listener() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "0123456789ab", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let first = calls.clone();
    let failures = Arc::new(AtomicUsize::new(0));
    let failed = failures.clone();
    reader.add_event_listener(
        Progress,
        EventListener::sync(move |_| {
            first.lock().push("first");
            if failed.fetch_add(1, Ordering::SeqCst) == 1 {
                anyhow::bail!("listener failure");
            }
            Ok(())
        }),
    );
    let second = calls.clone();
    reader.add_event_listener(
        Progress,
        EventListener::sync(move |_| {
            second.lock().push("second");
            Ok(())
        }),
    );

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(
        *calls.lock(),
        vec!["first", "second", "first", "second", "first", "second"]
    );
}

#[tokio::test]
async fn test_fan_out_survives_panicking_listener() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "abc", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let (count, listener) = counter();

    reader.add_event_listener(Load, EventListener::sync(|_| panic!("listener panic")));
    reader.add_event_listener(Load, listener);

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remove_during_dispatch_skips_listener() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "0123456789", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let (removed_count, removed) = counter();

    let target = reader.clone();
    let victim = removed.clone();
    reader.add_event_listener(
        Progress,
        EventListener::sync(move |_| {
            target.remove_event_listener(Progress, &victim);
            Ok(())
        }),
    );
    reader.add_event_listener(Progress, removed);

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(removed_count.load(Ordering::SeqCst), 0);
    assert_eq!(reader.listener_count(Progress), 1);
    reader.dispose().await.unwrap();
}

#[tokio::test]
async fn test_listener_added_during_dispatch_waits_for_next_event() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "0123456789", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let (late_count, late) = counter();

    let target = reader.clone();
    reader.add_event_listener(
        Progress,
        EventListener::sync(move |_| {
            target.add_event_listener(Progress, late.clone());
            Ok(())
        }),
    );

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    // Three progress events; the late listener misses only the first.
    assert_eq!(late_count.load(Ordering::SeqCst), 2);
    reader.dispose().await.unwrap();
}

#[tokio::test]
async fn test_removing_unknown_listener_is_noop() {
    let (_host, api) = remote_api();
    let reader = FileReader::new(&api).await.unwrap();
    let (_count, listener) = counter();

    assert!(!reader.remove_event_listener(Load, &listener));
    assert!(reader.add_event_listener(Load, listener.clone()));
    assert!(!reader.add_event_listener(Load, listener.clone()));
    assert!(reader.remove_event_listener(Load, &listener));
    assert!(!reader.remove_event_listener(Load, &listener));
}

#[tokio::test]
async fn test_event_handler_slot_fires_once() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "abc", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let (replaced_count, replaced) = counter();
    let (handler_count, handler) = counter();
    let (plain_count, plain) = counter();

    reader.set_event_handler(Load, Some(replaced));
    reader.add_event_listener(Load, plain);
    reader.set_event_handler(Load, Some(handler.clone()));
    reader.set_event_handler(Load, Some(handler));

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(replaced_count.load(Ordering::SeqCst), 0);
    assert_eq!(handler_count.load(Ordering::SeqCst), 1);
    assert_eq!(plain_count.load(Ordering::SeqCst), 1);

    reader.set_event_handler(Load, None);
    assert!(reader.event_handler(Load).is_none());
    assert_eq!(reader.listener_count(Load), 1);
}

#[tokio::test]
async fn test_stop_immediate_propagation() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "abc", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let (count, later) = counter();

    reader.add_event_listener(
        Load,
        EventListener::new(|event| async move {
            event.stop_immediate_propagation().await?;
            Ok::<(), anyhow::Error>(())
        }),
    );
    reader.add_event_listener(Load, later);

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_progress_event_contract() {
    let (_host, api) = direct_api();
    let blob = text_blob(&api, "abc", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let observed = Arc::new(Mutex::new(None));

    let slot = observed.clone();
    reader.add_event_listener(
        Load,
        EventListener::new(move |event| {
            let slot = slot.clone();
            async move {
                let target = event.target().await?;
                let has_target = target.is_some();
                if let Some(target) = target {
                    target.dispose().await?;
                }
                event.prevent_default().await?;
                let observation = (
                    event.event_type().await?,
                    event.event_phase().await?,
                    event.is_trusted().await?,
                    event.bubbles().await?,
                    event.cancelable().await?,
                    event.default_prevented().await?,
                    event.time_stamp().await?,
                    has_target,
                    event.snapshot_now()?,
                );
                *slot.lock() = Some(observation);
                Ok::<(), anyhow::Error>(())
            }
        }),
    );

    let mut events = reader.subscribe();
    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    let (event_type, phase, trusted, bubbles, cancelable, prevented, time_stamp, has_target, snapshot) =
        observed.lock().take().expect("load listener ran");
    assert_eq!(event_type, "load");
    assert_eq!(phase, EventPhase::AtTarget);
    assert!(trusted);
    assert!(!bubbles);
    assert!(!cancelable);
    assert!(!prevented);
    assert!(time_stamp >= 0.0);
    assert!(has_target);
    assert!(snapshot.length_computable);
    assert_eq!((snapshot.loaded, snapshot.total), (3, 3));
}

#[tokio::test]
async fn test_direct_result_accessors() {
    let (_host, api) = direct_api();
    let blob = text_blob(&api, "direct", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let mut events = reader.subscribe();

    assert_eq!(reader.ready_state_now().unwrap(), ReadyState::Empty);
    assert_eq!(reader.result_as_string_now().unwrap(), None);

    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(reader.ready_state_now().unwrap(), ReadyState::Done);
    assert_eq!(reader.result_as_string_now().unwrap().as_deref(), Some("direct"));
}

#[tokio::test]
async fn test_disposed_reader_stops_receiving_events() {
    let (_host, api) = direct_api();
    let blob = text_blob(&api, "0123456789", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let (count, listener) = counter();
    for kind in ProgressEventKind::ALL {
        reader.add_event_listener(kind, listener.clone());
    }

    reader.read_as_text(&blob, None).await.unwrap();
    reader.dispose().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(matches!(
        reader.read_as_text(&blob, None).await,
        Err(FileApiError::Disposed(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sequential_reads_on_multi_thread_runtime() {
    let (_host, api) = remote_api();
    let first = text_blob(&api, "first read", "").await;
    let second = text_blob(&api, "second", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let seen = record_events(&reader);
    let mut events = reader.subscribe();

    reader.read_as_text(&first, None).await.unwrap();
    wait_for_loadend(&mut events).await;
    reader.read_as_text(&second, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    let seen = seen.lock().clone();
    let loadends = seen.iter().filter(|kind| **kind == LoadEnd).count();
    assert_eq!(loadends, 2);
    assert_eq!(seen.first(), Some(&LoadStart));
    assert_eq!(seen.last(), Some(&LoadEnd));
    assert_eq!(reader.result_as_string().await.unwrap().as_deref(), Some("second"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_subscriber_still_sees_loadend() {
    let (_host, api) = api_with(MemoryHostConfig::remote().with_chunk_size(1));
    let blob = text_blob(&api, &"x".repeat(500), "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let mut events = reader.subscribe();

    reader.read_as_text(&blob, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let loadend = tokio::time::timeout(Duration::from_secs(5), events.until(LoadEnd))
        .await
        .expect("loadend not delivered in time")
        .unwrap();
    assert_eq!(loadend.loaded, 500);
    assert_eq!(reader.result_as_string().await.unwrap().map(|text| text.len()), Some(500));
}
