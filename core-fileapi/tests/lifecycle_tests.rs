mod common;

use std::sync::Arc;

use bridge_native::{MemoryHost, MemoryHostConfig};
use bridge_traits::{AccessMode, HostRef};
use core_fileapi::{
    Blob, BlobPart, BlobPropertyBag, FileApi, FileApiError, FileReader, JsReference,
};
use core_runtime::config::FileApiOptions;
use futures::future::join_all;

use common::{api_with, direct_api, remote_api, text_blob, wait_for_loadend};

#[tokio::test]
async fn test_helper_import_is_single_flight() {
    let (host, api) = remote_api();

    let blobs = join_all((0..8).map(|i| {
        let api = api.clone();
        async move {
            Blob::new(&api, vec![BlobPart::from(format!("blob {i}"))], BlobPropertyBag::default())
                .await
        }
    }))
    .await;

    assert!(blobs.iter().all(Result::is_ok));
    assert_eq!(host.import_count(), 1);
}

#[tokio::test]
async fn test_concurrent_readers_share_helper() {
    let (host, api) = remote_api();

    let readers = join_all((0..4).map(|_| FileReader::new(&api))).await;

    assert!(readers.iter().all(Result::is_ok));
    assert_eq!(host.import_count(), 1);
}

#[tokio::test]
async fn test_owner_disposal_releases_helper() {
    let (host, api) = remote_api();
    let owner = text_blob(&api, "owner", "").await;
    let other = text_blob(&api, "other", "").await;
    assert!(api.is_helper_loaded().await);

    other.dispose().await.unwrap();
    assert!(api.is_helper_loaded().await);

    owner.dispose().await.unwrap();
    assert!(!api.is_helper_loaded().await);
    assert_eq!(host.live_objects(), 0);

    let next = text_blob(&api, "next", "").await;
    assert_eq!(next.size().await.unwrap(), 4);
    assert_eq!(host.import_count(), 2);
}

#[tokio::test]
async fn test_helper_path_comes_from_options() {
    let host = Arc::new(MemoryHost::remote());
    let options = FileApiOptions::builder()
        .base_path("/assets")
        .script_path("js/fileapi.js")
        .build()
        .unwrap();
    let api = FileApi::with_options(host.clone(), options);

    assert_eq!(api.options().full_script_path(), "/assets/js/fileapi.js");
    api.helper().await.unwrap();
    assert_eq!(host.import_count(), 1);
}

#[tokio::test]
async fn test_disposal_is_idempotent() {
    let (host, api) = remote_api();
    api.helper().await.unwrap();
    let baseline = host.live_objects();
    let blob = text_blob(&api, "data", "").await;
    let alias = blob.clone();

    blob.dispose().await.unwrap();
    blob.dispose().await.unwrap();
    alias.dispose().await.unwrap();

    assert_eq!(host.live_objects(), baseline);
    assert!(blob.reference().is_disposed());
}

#[tokio::test]
async fn test_disposed_handle_is_a_usage_error() {
    let (_host, api) = remote_api();
    let blob = text_blob(&api, "data", "").await;
    blob.dispose().await.unwrap();

    let err = blob.text().await.unwrap_err();
    assert!(matches!(err, FileApiError::Disposed(_)));
    assert!(err.is_usage_error());

    let err = blob.slice(None, None, None).await.unwrap_err();
    assert!(matches!(err, FileApiError::Disposed(_)));
}

#[tokio::test]
async fn test_shared_view_does_not_release() {
    let (host, api) = remote_api();
    let blob = text_blob(&api, "data", "").await;
    let view = blob.reference().share();
    let live = host.live_objects();

    view.dispose().await.unwrap();
    assert_eq!(host.live_objects(), live);
    assert!(!view.is_disposed());

    blob.dispose().await.unwrap();
    assert!(view.is_disposed());
    assert!(matches!(view.ensure_live(), Err(FileApiError::Disposed(_))));
}

#[tokio::test]
async fn test_reader_disposal_releases_everything() {
    let (host, api) = remote_api();
    let reader = FileReader::new(&api).await.unwrap();
    assert_eq!(host.live_objects(), 2);

    reader.dispose().await.unwrap();
    reader.dispose().await.unwrap();

    assert_eq!(host.live_objects(), 0);
    assert!(!api.is_helper_loaded().await);
}

#[tokio::test]
async fn test_shutdown_releases_detached_helper() {
    let (host, api) = remote_api();
    api.helper().await.unwrap();
    assert_eq!(host.live_objects(), 1);

    api.shutdown().await.unwrap();

    assert_eq!(host.live_objects(), 0);
    assert!(!api.is_helper_loaded().await);
}

#[tokio::test]
async fn test_run_direct_reports_suspension() {
    let (_host, api) = direct_api();
    assert_eq!(api.access_mode(), AccessMode::Direct);
    let handle = JsReference::new(api.bridge().clone(), HostRef::new(99), false);

    let result = handle.run_direct("pending", futures::future::pending::<core_fileapi::Result<()>>());
    assert!(matches!(result, Err(FileApiError::WouldSuspend("pending"))));

    let ready = handle.run_direct("ready", async { Ok(7) });
    assert_eq!(ready.unwrap(), 7);
}

#[tokio::test]
async fn test_unknown_host_object_surfaces_host_error() {
    let (_host, api) = remote_api();
    let blob = Blob::from_reference(&api, HostRef::new(4242), Default::default());

    let err = blob.size().await.unwrap_err();
    assert!(matches!(err, FileApiError::Host(_)));
    assert!(!err.is_usage_error());
}

#[tokio::test]
async fn test_readers_get_distinct_callback_tokens() {
    let (_host, api) = remote_api();
    let first = FileReader::new(&api).await.unwrap();
    let second = FileReader::new(&api).await.unwrap();

    assert_ne!(first.callback_token(), second.callback_token());
    assert_eq!(first.clone().callback_token(), first.callback_token());
}

#[tokio::test]
async fn test_reads_complete_without_simulated_latency() {
    let (_host, api) = api_with(MemoryHostConfig::remote().with_latency(false));
    let blob = text_blob(&api, "no yield", "").await;
    let reader = FileReader::new(&api).await.unwrap();
    let mut events = reader.subscribe();

    reader.read_as_text(&blob, None).await.unwrap();
    wait_for_loadend(&mut events).await;

    assert_eq!(reader.result_as_string().await.unwrap().as_deref(), Some("no yield"));
}
