//! Normalized per-reader profiles and their derived stats.
//!
//! The normalizer is the only place raw feed records are reconciled: records
//! sharing a `book_id` merge into one [`Book`] (shelf sets union, the most
//! recently seen non-absent scalar wins), and records without a `book_id` are
//! dropped and counted. Everything downstream assumes one `Book` per id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::fetch::types::RawBookRecord;

/// Shelf tag that marks a book as actually read.
pub const READ_SHELF: &str = "read";

/// Fixed, ordered era buckets for the reading-era distribution.
pub const ERA_BUCKET_COUNT: usize = 4;
pub const ERA_BUCKET_LABELS: [&str; ERA_BUCKET_COUNT] =
    ["pre-1950", "1950-1999", "2000-2009", "2010-present"];

fn era_bucket(year: i32) -> usize {
    if year < 1950 {
        0
    } else if year < 2000 {
        1
    } else if year < 2010 {
        2
    } else {
        3
    }
}

/// One shelved book for one reader.
///
/// `book_id` is the sole basis for "same book" comparisons; `author_id` is an
/// opaque key derived at the fetch boundary. Titles and author names ride
/// along for display and for the classifier prompt only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub author_id: String,
    pub title: String,
    pub author_name: String,
    pub shelves: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_year: Option<i32>,
    /// Unix seconds; passthrough only, never scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<u64>,
}

impl Book {
    pub fn is_read(&self) -> bool {
        self.shelves.contains(READ_SHELF)
    }
}

/// Canonical in-memory profile for one reader, keyed by `book_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReaderProfile {
    pub books: BTreeMap<String, Book>,
    /// Raw records discarded for lacking a book identifier.
    pub dropped_records: usize,
}

impl ReaderProfile {
    /// Build a profile from raw feed records.
    ///
    /// Duplicate ids are expected when a book sits on several shelves; their
    /// shelf sets union and scalars take the last non-absent value seen.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RawBookRecord>,
    {
        let mut books: BTreeMap<String, Book> = BTreeMap::new();
        let mut dropped = 0usize;

        for rec in records {
            let Some(book_id) = rec.book_id.filter(|id| !id.is_empty()) else {
                dropped += 1;
                continue;
            };

            let shelves: BTreeSet<String> = rec.shelves.into_iter().collect();

            match books.get_mut(&book_id) {
                Some(existing) => {
                    existing.shelves.extend(shelves);
                    if let Some(t) = rec.title.filter(|t| !t.is_empty()) {
                        existing.title = t;
                    }
                    if let Some(a) = rec.author_name.filter(|a| !a.is_empty()) {
                        existing.author_name = a;
                    }
                    if let Some(a) = rec.author_id.filter(|a| !a.is_empty()) {
                        existing.author_id = a;
                    }
                    if rec.rating.is_some() {
                        existing.rating = rec.rating;
                    }
                    if rec.pages.is_some() {
                        existing.pages = rec.pages;
                    }
                    if rec.pub_year.is_some() {
                        existing.pub_year = rec.pub_year;
                    }
                    if rec.read_at.is_some() {
                        existing.read_at = rec.read_at;
                    }
                }
                None => {
                    books.insert(
                        book_id.clone(),
                        Book {
                            book_id,
                            author_id: rec.author_id.unwrap_or_default(),
                            title: rec.title.unwrap_or_default(),
                            author_name: rec.author_name.unwrap_or_default(),
                            shelves,
                            rating: rec.rating,
                            pages: rec.pages,
                            pub_year: rec.pub_year,
                            read_at: rec.read_at,
                        },
                    );
                }
            }
        }

        Self {
            books,
            dropped_records: dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Books on any shelf, by id.
    pub fn book_ids(&self) -> BTreeSet<&str> {
        self.books.keys().map(String::as_str).collect()
    }

    pub fn read_books(&self) -> impl Iterator<Item = &Book> {
        self.books.values().filter(|b| b.is_read())
    }

    pub fn read_ids(&self) -> BTreeSet<&str> {
        self.read_books().map(|b| b.book_id.as_str()).collect()
    }

    /// Distinct author keys across all shelves. Unknown authors are skipped.
    pub fn author_pool(&self) -> BTreeSet<&str> {
        self.books
            .values()
            .map(|b| b.author_id.as_str())
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// Median page count over read books with pages present.
    pub fn median_pages(&self) -> Option<f32> {
        let mut pages: Vec<u32> = self.read_books().filter_map(|b| b.pages).collect();
        if pages.is_empty() {
            return None;
        }
        pages.sort_unstable();
        let n = pages.len();
        let median = if n % 2 == 1 {
            pages[n / 2] as f32
        } else {
            (pages[n / 2 - 1] as f32 + pages[n / 2] as f32) / 2.0
        };
        Some(median)
    }

    /// Mean rating over read books the reader actually rated.
    pub fn mean_rating(&self) -> Option<f32> {
        mean(self.read_books().filter_map(|b| b.rating))
    }

    /// Mean publication year over read books with a year present.
    pub fn mean_pub_year(&self) -> Option<f32> {
        mean(self.read_books().filter_map(|b| b.pub_year.map(|y| y as f32)))
    }

    /// Normalized frequency distribution of read books across era buckets.
    /// `None` when the reader has no dated read books (undated books are
    /// excluded, never defaulted into a bucket).
    pub fn era_distribution(&self) -> Option<[f32; ERA_BUCKET_COUNT]> {
        let mut counts = [0usize; ERA_BUCKET_COUNT];
        let mut total = 0usize;
        for year in self.read_books().filter_map(|b| b.pub_year) {
            counts[era_bucket(year)] += 1;
            total += 1;
        }
        if total == 0 {
            return None;
        }
        let mut dist = [0.0f32; ERA_BUCKET_COUNT];
        for (d, c) in dist.iter_mut().zip(counts) {
            *d = c as f32 / total as f32;
        }
        Some(dist)
    }
}

fn mean<I: Iterator<Item = f32>>(iter: I) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut n = 0usize;
    for v in iter {
        sum += v;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f32)
    }
}
