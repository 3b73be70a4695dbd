//! Canonical genre vocabulary and alias resolution.
//!
//! The taxonomy is a fixed, UI-facing contract: the frontend and the genre
//! component both rely on these exact strings. The classifier is prompted to
//! answer within the taxonomy, but model output drifts, so everything that
//! crosses the classifier boundary goes through [`resolve`] before it is
//! allowed into a [`GenreProfile`]. The scoring components never see a label
//! outside this list.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Canonical genre taxonomy (balanced, compressed, UI-friendly).
pub const GENRE_TAXONOMY: [&str; 30] = [
    // Core - Fiction
    "Literary Fiction",
    "Contemporary Fiction",
    "Classics",
    "Historical Fiction",
    "Science Fiction",
    "Fantasy",
    "Mystery",
    "Thriller & Crime",
    "Horror",
    "Romance",
    // Core - Nonfiction
    "Memoir",
    "Biography",
    "History",
    "Philosophy",
    "Psychology",
    "Self-Help",
    "Business & Economics",
    "Science & Technology",
    "Poetry",
    "Religion & Spirituality",
    // Flexible - Audience/Form
    "Young Adult",
    "New Adult",
    "Middle Grade",
    "Children’s",
    "Short Stories & Essays",
    "Graphic Novels & Comics",
    // Flexible - Identity/Theme
    "LGBTQ+",
    "Cultural & Regional Literature",
    "True Crime",
    "Health, Food & Lifestyle",
];

/// Per-reader cap; keeps classifier output tight and the genre component stable.
pub const MAX_GENRES_PER_READER: usize = 8;

/// Display cap for the shared-genre list in pair responses. Scoring uses the
/// full intersection; only the reported list is truncated.
pub const MAX_SHARED_GENRES: usize = 5;

/// Direct alias table, lowercased keys. Checked after an exact
/// case-insensitive taxonomy match and before the substring heuristics.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("sci-fi", "Science Fiction"),
        ("scifi", "Science Fiction"),
        ("sf", "Science Fiction"),
        ("science-fiction", "Science Fiction"),
        ("ya", "Young Adult"),
        ("mg", "Middle Grade"),
        ("memoirs", "Memoir"),
        ("self help", "Self-Help"),
        ("selfhelp", "Self-Help"),
        ("graphic novel", "Graphic Novels & Comics"),
        ("graphic novels", "Graphic Novels & Comics"),
        ("comics", "Graphic Novels & Comics"),
        ("lgbt", "LGBTQ+"),
        ("lgbtq", "LGBTQ+"),
        ("queer", "LGBTQ+"),
        ("children", "Children’s"),
        ("childrens", "Children’s"),
        ("children's", "Children’s"),
        ("kids", "Children’s"),
        ("short stories", "Short Stories & Essays"),
        ("essays", "Short Stories & Essays"),
        ("religion", "Religion & Spirituality"),
        ("spirituality", "Religion & Spirituality"),
        ("tech", "Science & Technology"),
        ("technology", "Science & Technology"),
        ("true crime", "True Crime"),
        ("crime", "Thriller & Crime"),
        ("thrillers", "Thriller & Crime"),
        ("suspense", "Thriller & Crime"),
        ("cooking", "Health, Food & Lifestyle"),
        ("food", "Health, Food & Lifestyle"),
        ("health", "Health, Food & Lifestyle"),
        ("classic", "Classics"),
        ("literary", "Literary Fiction"),
        ("historical", "Historical Fiction"),
    ])
});

/// Ordered substring heuristics, applied after the alias table. Order matters:
/// "science fiction" never reaches this stage (exact match wins), so a bare
/// "science" here safely means nonfiction.
const CONTAINS_RULES: [(&str, &str); 13] = [
    ("science", "Science & Technology"),
    ("philosophy", "Philosophy"),
    ("business", "Business & Economics"),
    ("history", "History"),
    ("memoir", "Memoir"),
    ("biograph", "Biography"),
    ("romance", "Romance"),
    ("thriller", "Thriller & Crime"),
    ("mystery", "Mystery"),
    ("poetry", "Poetry"),
    ("horror", "Horror"),
    ("fantasy", "Fantasy"),
    ("fiction", "Contemporary Fiction"),
];

/// Minimum normalized Levenshtein similarity for the fuzzy fallback. 0.85
/// admits a single-character slip in a seven-letter label ("Mistery") while
/// keeping distinct taxonomy labels well apart.
const FUZZY_THRESHOLD: f64 = 0.85;

/// Map a free-form label to the canonical taxonomy if possible.
///
/// Resolution order: exact case-insensitive match, alias table, substring
/// heuristics, conservative fuzzy match. Returns `None` for anything that
/// cannot be mapped; callers discard those labels.
pub fn resolve(label: &str) -> Option<&'static str> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }
    let low = trimmed.to_lowercase();

    if let Some(g) = GENRE_TAXONOMY.iter().find(|g| g.to_lowercase() == low) {
        return Some(*g);
    }

    if let Some(g) = ALIASES.get(low.as_str()) {
        return Some(*g);
    }

    for (needle, canonical) in CONTAINS_RULES {
        if low.contains(needle) {
            return Some(canonical);
        }
    }

    // Fuzzy fallback absorbs near-misses like "Fantassy" or "Mistery".
    let mut best: Option<(&'static str, f64)> = None;
    for g in GENRE_TAXONOMY {
        let sim = strsim::normalized_levenshtein(&low, &g.to_lowercase());
        if sim >= FUZZY_THRESHOLD && best.map_or(true, |(_, b)| sim > b) {
            best = Some((g, sim));
        }
    }
    best.map(|(g, _)| g)
}

/// Ordered, deduplicated set of canonical genres for one reader.
/// Order is classifier rank; only membership is scored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenreProfile {
    labels: Vec<&'static str>,
}

impl GenreProfile {
    /// Build from arbitrary labels: each is resolved against the taxonomy,
    /// unresolvable labels are dropped, duplicates collapse to their first
    /// (highest-ranked) occurrence, and the list is capped.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<&'static str> = Vec::new();
        for raw in labels {
            if out.len() >= MAX_GENRES_PER_READER {
                break;
            }
            if let Some(canonical) = resolve(raw.as_ref()) {
                if !out.contains(&canonical) {
                    out.push(canonical);
                }
            }
        }
        Self { labels: out }
    }

    pub fn labels(&self) -> &[&'static str] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|g| *g == label)
    }

    /// Labels present in both profiles, in `self`'s rank order.
    pub fn shared_with(&self, other: &GenreProfile) -> Vec<&'static str> {
        self.labels
            .iter()
            .copied()
            .filter(|g| other.contains(g))
            .collect()
    }
}
