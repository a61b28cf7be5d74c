//! News normalization: `NewsItem`. Dedup and sort already happened in the
//! HTML extractor; this stage just attaches canonical provenance.

use chrono::{DateTime, Utc};

use crate::html::endpoints::NewsItemDto;
use crate::normalize::Meta;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub tickers: Vec<String>,
    pub body: Option<String>,
    pub meta: Meta,
}

pub fn normalize_news(items: Vec<NewsItemDto>, run_id: &str, producer: &str) -> Vec<NewsItem> {
    let meta = Meta::new(run_id, producer);
    items
        .into_iter()
        .map(|item| NewsItem {
            headline: item.headline,
            url: item.url,
            source: item.source,
            published_at: item.published_at,
            tickers: item.tickers,
            body: None,
            meta: meta.clone(),
        })
        .collect()
}
