//! Hacker News wire format and its mapping onto [`Item`]

use chrono::DateTime;
use hnpipe_core::{Item, ItemId, ItemKind, SourceError};
use serde::Deserialize;

/// Item as served by `/item/{id}.json`. Every field except `id` may be absent.
#[derive(Debug, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub by: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl HnItem {
    pub fn into_item(self) -> Item {
        let kind = self
            .kind
            .as_deref()
            .and_then(ItemKind::from_name)
            .unwrap_or_default();
        Item {
            id: ItemId(self.id),
            kind,
            text: self.text.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            score: self.score.unwrap_or(0),
            title: self.title.unwrap_or_default(),
            created_at: self
                .time
                .and_then(|t| DateTime::from_timestamp(t, 0))
                .unwrap_or_default(),
            created_by: self.by.unwrap_or_default(),
            dead: self.dead,
            deleted: self.deleted,
        }
    }
}

/// Decode an item body. A `null` body becomes a tombstone for `id`.
pub fn decode_item(id: ItemId, body: &str) -> Result<Item, SourceError> {
    let parsed: Option<HnItem> =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    match parsed {
        Some(hn) if hn.id != id.0 => Err(SourceError::Decode(format!(
            "asked for item {id}, got {}",
            hn.id
        ))),
        Some(hn) => Ok(hn.into_item()),
        None => {
            log::debug!("item {id}: unknown upstream, treating as deleted");
            Ok(Item::tombstone(id))
        }
    }
}

/// Decode a feed body (a JSON array of ids).
pub fn decode_feed(body: &str) -> Result<Vec<ItemId>, SourceError> {
    serde_json::from_str::<Vec<u64>>(body)
        .map(|ids| ids.into_iter().map(ItemId).collect())
        .map_err(|e| SourceError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_decodes() {
        let body = r#"{
            "by": "dhouston", "descendants": 71, "id": 8863, "kids": [8952, 9224],
            "score": 111, "time": 1175714200, "title": "My YC app: Dropbox",
            "type": "story", "url": "http://www.getdropbox.com/u/2/screencast.html"
        }"#;
        let item = decode_item(ItemId(8863), body).unwrap();
        assert_eq!(item.kind, ItemKind::Story);
        assert_eq!(item.created_by, "dhouston");
        assert_eq!(item.score, 111);
        assert_eq!(item.created_at.timestamp(), 1175714200);
        assert!(item.is_live());
    }

    #[test]
    fn comment_maps_to_other() {
        let body = r#"{"id": 2921983, "by": "norvig", "parent": 2921506, "time": 1314211127,
            "text": "Aw shucks", "type": "comment"}"#;
        let item = decode_item(ItemId(2921983), body).unwrap();
        assert_eq!(item.kind, ItemKind::Other);
        assert_eq!(item.text, "Aw shucks");
        assert!(item.url.is_empty());
    }

    #[test]
    fn flags_are_carried() {
        let body = r#"{"id": 5, "deleted": true, "time": 1}"#;
        let item = decode_item(ItemId(5), body).unwrap();
        assert!(item.deleted);
        assert_eq!(item.kind, ItemKind::Other);

        let body = r#"{"id": 6, "dead": true, "type": "job"}"#;
        let item = decode_item(ItemId(6), body).unwrap();
        assert!(item.dead);
        assert_eq!(item.kind, ItemKind::Job);
    }

    #[test]
    fn null_is_tombstone() {
        let item = decode_item(ItemId(42), "null").unwrap();
        assert_eq!(item.id, ItemId(42));
        assert!(!item.is_live());
    }

    #[test]
    fn mismatched_id_rejected() {
        let err = decode_item(ItemId(1), r#"{"id": 2}"#).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            decode_item(ItemId(1), "<html>"),
            Err(SourceError::Decode(_))
        ));
        assert!(matches!(decode_feed("{}"), Err(SourceError::Decode(_))));
    }

    #[test]
    fn feed_decodes() {
        let ids = decode_feed("[9129911, 9129199, 9127761]").unwrap();
        assert_eq!(ids, vec![ItemId(9129911), ItemId(9129199), ItemId(9127761)]);
    }
}
