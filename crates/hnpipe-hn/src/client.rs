//! Hacker News Firebase API client

use hnpipe_core::{HttpConfig, Item, ItemId, Source, SourceError};

use crate::item::{decode_feed, decode_item};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Id list used as the batch for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Feed {
    #[default]
    Top,
    New,
    Best,
    Ask,
    Show,
    Job,
}

impl Feed {
    /// Parse config name, with or without the `stories` suffix
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim_end_matches("stories") {
            "top" => Some(Self::Top),
            "new" => Some(Self::New),
            "best" => Some(Self::Best),
            "ask" => Some(Self::Ask),
            "show" => Some(Self::Show),
            "job" => Some(Self::Job),
            _ => None,
        }
    }

    /// Endpoint name without the `.json` suffix
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Top => "topstories",
            Self::New => "newstories",
            Self::Best => "beststories",
            Self::Ask => "askstories",
            Self::Show => "showstories",
            Self::Job => "jobstories",
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// [`Source`] backed by the public HN API.
#[derive(Clone, Debug)]
pub struct HnClient {
    http: reqwest::Client,
    base_url: String,
    feed: Feed,
}

impl HnClient {
    /// Client with its own connection pool built from `config`.
    pub fn new(base_url: &str, feed: Feed, config: &HttpConfig) -> Result<Self, SourceError> {
        Ok(Self::with_client(config.build_client()?, base_url, feed))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, feed: Feed) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            feed,
        }
    }

    pub fn feed_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.feed.endpoint())
    }

    pub fn item_url(&self, id: ItemId) -> String {
        format!("{}/item/{id}.json", self.base_url)
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(SourceError::from_reqwest)?;
        resp.text().await.map_err(SourceError::from_reqwest)
    }
}

impl Source for HnClient {
    async fn fetch_batch(&self) -> Result<Vec<ItemId>, SourceError> {
        let body = self.get_text(&self.feed_url()).await?;
        let ids = decode_feed(&body)?;
        log::debug!("{}: {} ids", self.feed, ids.len());
        Ok(ids)
    }

    async fn fetch_record(&self, id: ItemId) -> Result<Item, SourceError> {
        let body = self.get_text(&self.item_url(id)).await?;
        decode_item(id, &body)
    }
}
