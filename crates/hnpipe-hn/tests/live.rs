//! Live API tests for hnpipe-hn
//!
//! These tests require network access and are marked #[ignore] by default.
//! Run with: cargo test -p hnpipe-hn --test live -- --ignored

use hnpipe_core::{HttpConfig, ItemId, ItemKind, Source};
use hnpipe_hn::{DEFAULT_BASE_URL, Feed, HnClient};

fn client(feed: Feed) -> HnClient {
    HnClient::new(DEFAULT_BASE_URL, feed, &HttpConfig::default()).expect("client builds")
}

#[tokio::test]
#[ignore]
async fn top_stories_are_listed() {
    let ids = client(Feed::Top).fetch_batch().await.expect("feed fetch");
    // The top feed is capped at 500 ids
    assert!(!ids.is_empty() && ids.len() <= 500, "got {} ids", ids.len());
}

#[tokio::test]
#[ignore]
async fn known_story_is_fetched() {
    let item = client(Feed::Top)
        .fetch_record(ItemId(8863))
        .await
        .expect("item fetch");
    assert_eq!(item.kind, ItemKind::Story);
    assert_eq!(item.created_by, "dhouston");
    assert!(item.is_live());
}

#[tokio::test]
#[ignore]
async fn unknown_id_is_tombstone() {
    let item = client(Feed::Top)
        .fetch_record(ItemId(u64::MAX >> 12))
        .await
        .expect("null body is not an error");
    assert!(item.deleted);
}
