// src/fetch/types.rs
use anyhow::Result;
use std::fmt;
use std::str::FromStr;

/// One raw record from a shelf feed, before profile normalization.
/// Everything except `shelves` is optional; missing identities are handled
/// (dropped and counted) by the normalizer, not here.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RawBookRecord {
    pub book_id: Option<String>,
    pub title: Option<String>,
    pub author_name: Option<String>,
    /// Opaque author key derived from the normalized author name.
    pub author_id: Option<String>,
    pub shelves: Vec<String>,
    pub rating: Option<f32>,
    pub pages: Option<u32>,
    pub pub_year: Option<i32>,
    /// Unix seconds; passthrough only.
    pub read_at: Option<u64>,
}

/// Shelf filter understood by the feed. Custom shelf names pass through
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shelf {
    All,
    Read,
    ToRead,
    CurrentlyReading,
    Custom(String),
}

impl Default for Shelf {
    fn default() -> Self {
        Shelf::All
    }
}

impl FromStr for Shelf {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Shelf::All,
            "read" => Shelf::Read,
            "to-read" => Shelf::ToRead,
            "currently-reading" => Shelf::CurrentlyReading,
            other => Shelf::Custom(other.to_string()),
        })
    }
}

impl fmt::Display for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shelf::All => f.write_str("all"),
            Shelf::Read => f.write_str("read"),
            Shelf::ToRead => f.write_str("to-read"),
            Shelf::CurrentlyReading => f.write_str("currently-reading"),
            Shelf::Custom(name) => f.write_str(name),
        }
    }
}

#[async_trait::async_trait]
pub trait ShelfProvider: Send + Sync {
    /// Fetch every record on the given shelf for one reader, following
    /// pagination to the end of the feed.
    async fn fetch_shelf(&self, reader_id: &str, shelf: &Shelf) -> Result<Vec<RawBookRecord>>;
    fn name(&self) -> &'static str;
}
