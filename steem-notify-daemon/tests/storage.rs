use steem_notify_connector::{
    events::{Delivery, Notification},
    storage::{feed_key, FeedBatch, FeedStore, StoreError, CURSOR_KEY},
};
use steem_notify_daemon::storage::SledFeedStore;
use tempfile::TempDir;

fn open_store() -> (TempDir, sled::Db, SledFeedStore) {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open(dir.path()).unwrap();
    let store = SledFeedStore::new(db.clone());
    (dir, db, store)
}

fn transfer(to: &str, from: &str, block: u64) -> Delivery {
    Delivery {
        recipient: to.to_string(),
        notification: Notification::Transfer {
            from: from.to_string(),
            amount: "1.000 STEEM".to_string(),
            memo: format!("payment {block}"),
            timestamp: 1_500_000_000 + block as i64,
            block,
        },
    }
}

#[tokio::test]
async fn fresh_store_has_no_cursor_and_empty_feeds() {
    let (_dir, _db, store) = open_store();

    assert_eq!(store.last_block().await.unwrap(), None);
    assert!(store.feed("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn block_batch_stores_feeds_and_cursor_together() {
    let (_dir, _db, store) = open_store();
    let deliveries = vec![transfer("bob", "alice", 10), transfer("carol", "alice", 10)];

    store
        .execute(FeedBatch::for_block(10, &deliveries, 100).unwrap())
        .await
        .unwrap();

    assert_eq!(store.last_block().await.unwrap(), Some(10));
    assert_eq!(
        store.notifications("bob").await.unwrap(),
        vec![deliveries[0].notification.clone()]
    );
    assert_eq!(
        store.notifications("carol").await.unwrap(),
        vec![deliveries[1].notification.clone()]
    );
}

#[tokio::test]
async fn feeds_keep_only_the_newest_entries() {
    let (_dir, _db, store) = open_store();

    for block in 1..=150 {
        let batch = FeedBatch::for_block(block, &[transfer("bob", "alice", block)], 100).unwrap();
        store.execute(batch).await.unwrap();
    }

    let feed = store.notifications("bob").await.unwrap();
    assert_eq!(feed.len(), 100);
    assert_eq!(feed.first().unwrap().block(), 150);
    assert_eq!(feed.last().unwrap().block(), 51);
    assert_eq!(store.last_block().await.unwrap(), Some(150));
}

#[tokio::test]
async fn pushes_within_one_batch_are_newest_first() {
    let (_dir, _db, store) = open_store();
    let deliveries = vec![transfer("bob", "alice", 3), transfer("bob", "dave", 3)];

    store
        .execute(FeedBatch::for_block(3, &deliveries, 100).unwrap())
        .await
        .unwrap();

    let feed = store.notifications("bob").await.unwrap();
    assert_eq!(feed.len(), 2);
    assert!(matches!(&feed[0], Notification::Transfer { from, .. } if from == "dave"));
    assert!(matches!(&feed[1], Notification::Transfer { from, .. } if from == "alice"));
}

#[tokio::test]
async fn cursor_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = SledFeedStore::open(dir.path().to_str().unwrap()).unwrap();
        store
            .execute(FeedBatch::for_block(20_000_000, &[], 100).unwrap())
            .await
            .unwrap();
    }

    let store = SledFeedStore::open(dir.path().to_str().unwrap()).unwrap();
    assert_eq!(store.last_block().await.unwrap(), Some(20_000_000));
}

#[tokio::test]
async fn non_numeric_cursor_is_reported_as_malformed() {
    let (_dir, db, store) = open_store();
    db.insert(CURSOR_KEY, "not-a-number".as_bytes()).unwrap();

    let err = store.last_block().await.unwrap_err();
    assert!(matches!(err, StoreError::MalformedCursor(raw) if raw == "not-a-number"));
}

#[tokio::test]
async fn corrupt_feed_aborts_the_whole_batch() {
    let (_dir, db, store) = open_store();
    store
        .execute(FeedBatch::for_block(5, &[], 100).unwrap())
        .await
        .unwrap();
    db.insert(feed_key("carol"), "{not json".as_bytes()).unwrap();

    let deliveries = vec![transfer("bob", "alice", 6), transfer("carol", "alice", 6)];
    let result = store
        .execute(FeedBatch::for_block(6, &deliveries, 100).unwrap())
        .await;

    assert!(matches!(result, Err(StoreError::Backend(_))));
    assert_eq!(store.last_block().await.unwrap(), Some(5));
    assert!(store.feed("bob").await.unwrap().is_empty());
}
