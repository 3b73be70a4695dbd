//! Goodreads shelf feed provider.
//!
//! The feed lives at `/review/list_rss/{reader_id}?page={n}&shelf={shelf}`
//! and serves up to 100 items per page; a short page ends pagination. Items
//! carry the book id both as a `<book_id>` text element and as the `id`
//! attribute of a nested `<book>` element (which also holds `num_pages`);
//! the attribute wins when both are present.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::fetch::types::{RawBookRecord, Shelf, ShelfProvider};
use crate::fetch::{author_key, ensure_metrics_described, normalize_author, normalize_text};

/// Items per feed page; a shorter page is the last one.
pub const PAGE_SIZE: usize = 100;
/// Hard pagination stop for pathological feeds.
const MAX_PAGES: usize = 50;

const DEFAULT_BASE_URL: &str = "https://www.goodreads.com";
pub const ENV_BASE_URL: &str = "GOODREADS_BASE_URL";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    author_name: Option<String>,
    book_id: Option<String>,
    user_shelves: Option<String>,
    user_rating: Option<String>,
    user_read_at: Option<String>,
    book_published: Option<String>,
    book: Option<BookElem>,
}
#[derive(Debug, Deserialize)]
struct BookElem {
    #[serde(rename = "@id")]
    id: Option<String>,
    num_pages: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

/// A `user_shelves` value is a comma-separated list; an absent or empty value
/// means the book sits on the implicit `read` shelf.
fn parse_shelves(raw: Option<&str>) -> Vec<String> {
    let shelves: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if shelves.is_empty() {
        vec!["read".to_string()]
    } else {
        shelves
    }
}

/// The feed reports `0` for unrated books; absence is structural, not zero.
fn parse_rating(raw: Option<&str>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|r| *r > 0.0)
}

pub struct GoodreadsRssProvider {
    mode: Mode,
}

enum Mode {
    /// Pre-rendered feed pages, in page order.
    Fixture(Vec<String>),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl GoodreadsRssProvider {
    pub fn from_fixture_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: Mode::Fixture(pages.into_iter().map(Into::into).collect()),
        }
    }

    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("book-blend/0.1")
            .connect_timeout(std::time::Duration::from_secs(4))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                client,
            },
        }
    }

    /// Base URL from $GOODREADS_BASE_URL, defaulting to the public site.
    pub fn from_env() -> Self {
        let base = std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::from_base_url(base)
    }

    fn parse_page(xml: &str) -> Result<Vec<RawBookRecord>> {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(xml).context("parsing goodreads shelf rss")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let book_id = it
                .book
                .as_ref()
                .and_then(|b| b.id.clone())
                .or(it.book_id)
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty());

            let title = it
                .title
                .as_deref()
                .map(normalize_text)
                .filter(|t| !t.is_empty());
            let author_name = it
                .author_name
                .as_deref()
                .map(normalize_author)
                .filter(|a| !a.is_empty());
            let author_id = author_name.as_deref().map(author_key);

            out.push(RawBookRecord {
                book_id,
                title,
                author_name,
                author_id,
                shelves: parse_shelves(it.user_shelves.as_deref()),
                rating: parse_rating(it.user_rating.as_deref()),
                pages: it
                    .book
                    .as_ref()
                    .and_then(|b| b.num_pages.as_deref())
                    .and_then(|p| p.trim().parse::<u32>().ok())
                    .filter(|p| *p > 0),
                pub_year: it
                    .book_published
                    .as_deref()
                    .and_then(|y| y.trim().parse::<i32>().ok()),
                read_at: it.user_read_at.as_deref().and_then(parse_rfc2822_to_unix),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("fetch_parse_ms").record(ms);
        counter!("fetch_records_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl ShelfProvider for GoodreadsRssProvider {
    async fn fetch_shelf(&self, reader_id: &str, shelf: &Shelf) -> Result<Vec<RawBookRecord>> {
        let records = match &self.mode {
            Mode::Fixture(pages) => {
                let mut out = Vec::new();
                for page in pages {
                    let recs = Self::parse_page(page)?;
                    let last = recs.len() < PAGE_SIZE;
                    out.extend(recs);
                    if last {
                        break;
                    }
                }
                out
            }
            Mode::Http { base_url, client } => {
                let mut out = Vec::new();
                for page_num in 1..=MAX_PAGES {
                    let url = format!(
                        "{base_url}/review/list_rss/{reader_id}?page={page_num}&shelf={shelf}"
                    );
                    let body = match client.get(&url).send().await {
                        Ok(resp) => resp
                            .error_for_status()
                            .with_context(|| format!("shelf feed status for {reader_id}"))?
                            .text()
                            .await
                            .context("shelf feed .text()")?,
                        Err(e) => {
                            tracing::warn!(error = ?e, provider = "GoodreadsRss", "provider http error");
                            counter!("fetch_provider_errors_total").increment(1);
                            return Err(e).context("shelf feed get()");
                        }
                    };
                    let recs = Self::parse_page(&body)?;
                    let last = recs.len() < PAGE_SIZE;
                    out.extend(recs);
                    if last {
                        break;
                    }
                }
                out
            }
        };

        gauge!("fetch_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "GoodreadsRss"
    }
}
