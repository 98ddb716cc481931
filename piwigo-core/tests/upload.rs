mod common;

use common::{FakeServer, album, cache, ids, image};
use piwigo_core::model::{
    AlbumId, ImageId, ImageScope, ImageSort, UploadLocalId, UploadRequest, UploadState,
};
use piwigo_core::{CacheError, CacheEvent, ClientError};

fn request(local: &str, file: &str, bytes: usize, album: i32) -> UploadRequest {
    UploadRequest::new(local, file, vec![7u8; bytes], AlbumId(album))
}

#[tokio::test]
async fn uploads_run_in_order_and_in_chunks() {
    let server = FakeServer::new();
    let cache = cache(&server, 10);
    let queue = cache.uploads();
    assert_eq!(queue.chunk_size(), 1024);

    queue.enqueue(request("a", "a.jpg", 2500, 5)).expect("queued");
    queue.enqueue(request("b", "b.jpg", 10, 5)).expect("queued");
    assert_eq!(queue.pending_count(), 2);

    let handled = queue.process().await;
    assert_eq!(
        handled,
        vec![
            (UploadLocalId::new("a"), UploadState::Finished),
            (UploadLocalId::new("b"), UploadState::Finished),
        ]
    );
    assert_eq!(
        server.chunks(),
        vec![
            ("a.jpg".to_string(), 0, 3, 1024),
            ("a.jpg".to_string(), 1, 3, 1024),
            ("a.jpg".to_string(), 2, 3, 452),
            ("b.jpg".to_string(), 0, 1, 10),
        ]
    );

    let status = queue.status(&UploadLocalId::new("a")).expect("status");
    assert_eq!(status.chunks_sent, 3);
    assert_eq!(status.chunk_count, 3);
}

#[tokio::test]
async fn known_checksums_are_skipped() {
    let server = FakeServer::new();
    let data = vec![7u8; 100];
    server.known_checksum(&format!("{:x}", md5::compute(&data)), ImageId(3));
    let cache = cache(&server, 10);

    cache
        .uploads()
        .enqueue(UploadRequest::new("dup", "dup.jpg", data, AlbumId(5)))
        .expect("queued");
    let handled = cache.uploads().process().await;

    assert_eq!(handled, vec![(UploadLocalId::new("dup"), UploadState::Skipped)]);
    assert!(server.chunks().is_empty());
}

#[tokio::test]
async fn a_failure_does_not_stop_the_queue_and_can_be_retried() {
    let server = FakeServer::new();
    server.fail_uploads_of("bad.jpg", ClientError::network("timed out", true));
    let cache = cache(&server, 10);
    let queue = cache.uploads();

    queue.enqueue(request("bad", "bad.jpg", 10, 5)).expect("queued");
    queue.enqueue(request("good", "good.jpg", 10, 5)).expect("queued");
    let handled = queue.process().await;

    assert!(matches!(
        handled[0],
        (_, UploadState::Failed { retriable: true, .. })
    ));
    assert_eq!(handled[1], (UploadLocalId::new("good"), UploadState::Finished));

    server.allow_uploads_of("bad.jpg");
    assert_eq!(queue.retry_failed(), 1);
    assert_eq!(
        queue.status(&UploadLocalId::new("bad")).map(|s| s.state),
        Some(UploadState::Waiting)
    );
    let handled = queue.process().await;
    assert_eq!(handled, vec![(UploadLocalId::new("bad"), UploadState::Finished)]);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let server = FakeServer::new();
    server.fail_uploads_of(
        "big.jpg",
        ClientError::Server {
            code: 413,
            message: "File too large".into(),
        },
    );
    let cache = cache(&server, 10);
    let queue = cache.uploads();

    queue.enqueue(request("big", "big.jpg", 10, 5)).expect("queued");
    let handled = queue.process().await;
    assert_eq!(
        handled,
        vec![(
            UploadLocalId::new("big"),
            UploadState::Failed {
                message: "File too large".into(),
                retriable: false
            }
        )]
    );
    assert_eq!(queue.retry_failed(), 0);
}

#[tokio::test]
async fn finished_upload_appears_in_the_album_store() {
    let server = FakeServer::new();
    server.set_albums(vec![album(1, 0, 0, 1), album(5, 1, 1, 1)]);
    server.set_images(ImageScope::Album(AlbumId(5)), vec![image(1, 5)]);
    let cache = cache(&server, 10);
    cache.refresh_albums().await.expect("tree");
    let store = cache.store_with_sort(ImageScope::Album(AlbumId(5)), ImageSort::IdAscending);
    store.reload().await.expect("load");

    cache
        .uploads()
        .enqueue(request("new", "new.jpg", 10, 5).with_title("New"))
        .expect("queued");
    cache.uploads().process().await;

    assert_eq!(ids(&store.images()), vec![1, 1001]);
    assert_eq!(store.image(ImageId(1001)).map(|r| r.title), Some("New".into()));
    let five = cache.registry().get(AlbumId(5)).expect("album");
    assert_eq!((five.nb_images, five.total_nb_images), (2, 2));
    assert_eq!(cache.registry().get(AlbumId(1)).map(|a| a.total_nb_images), Some(2));
}

#[tokio::test]
async fn queue_rules_for_ids_and_targets() {
    let server = FakeServer::new();
    let cache = cache(&server, 10);
    let queue = cache.uploads();

    assert!(matches!(
        queue.enqueue(request("x", "x.jpg", 1, -6)),
        Err(CacheError::InvalidState(_))
    ));

    queue.enqueue(request("x", "x.jpg", 1, 5)).expect("queued");
    assert!(matches!(
        queue.enqueue(request("x", "x.jpg", 1, 5)),
        Err(CacheError::InvalidState(_))
    ));

    assert!(queue.cancel(&UploadLocalId::new("x")));
    assert!(!queue.cancel(&UploadLocalId::new("x")));
    assert!(queue.statuses().is_empty());
    assert!(queue.process().await.is_empty());
}

#[tokio::test]
async fn progress_is_broadcast() {
    let server = FakeServer::new();
    let cache = cache(&server, 10);
    let mut events = cache.subscribe();

    cache
        .uploads()
        .enqueue(request("p", "p.jpg", 2048, 5))
        .expect("queued");
    cache.uploads().process().await;

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CacheEvent::UploadProgress {
            state, chunks_sent, ..
        } = event
        {
            states.push((state, chunks_sent));
        }
    }
    assert_eq!(
        states,
        vec![
            (UploadState::Waiting, 0),
            (UploadState::Uploading, 0),
            (UploadState::Uploading, 1),
            (UploadState::Finishing, 2),
            (UploadState::Finished, 2),
        ]
    );

    assert_eq!(cache.uploads().clear_completed(), 1);
}
