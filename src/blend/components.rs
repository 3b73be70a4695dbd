//! The seven similarity components, each a stateless function of the two
//! normalized profiles (plus genre profiles) returning a score in [0,1].
//!
//! Every formula is symmetric in its two arguments, and every undefined case
//! (no books, no rated books, no dated books, empty genre lists) scores 0
//! rather than erroring, so a blend is always computable.

use crate::blend::profile::ReaderProfile;
use crate::genres::GenreProfile;

/// Full width of the 1-5 rating scale.
pub const RATING_SCALE_SPAN: f32 = 4.0;
/// Reference span for median page-count differences.
pub const LENGTH_SPAN_PAGES: f32 = 400.0;
/// Reference span for mean publication-year differences.
pub const YEAR_SPAN_YEARS: f32 = 50.0;

/// Shared-library overlap with partial credit.
///
/// Books both readers have read count in full; books both have shelved but at
/// most one has read count at half. The sum is normalized by the combined
/// library size, so the same overlap means more for small libraries.
pub fn common_books(a: &ReaderProfile, b: &ReaderProfile) -> f32 {
    let all_a = a.book_ids();
    let all_b = b.book_ids();
    let union = all_a.union(&all_b).count();
    if union == 0 {
        return 0.0;
    }

    let read_a = a.read_ids();
    let read_b = b.read_ids();
    let full = read_a.intersection(&read_b).count();
    let shelved = all_a.intersection(&all_b).count();
    let partial = shelved - full;

    ((full as f32 + 0.5 * partial as f32) / union as f32).clamp(0.0, 1.0)
}

/// Jaccard similarity of the two author pools (any shelf).
pub fn common_authors(a: &ReaderProfile, b: &ReaderProfile) -> f32 {
    let pool_a = a.author_pool();
    let pool_b = b.author_pool();
    let union = pool_a.union(&pool_b).count();
    if union == 0 {
        return 0.0;
    }
    let inter = pool_a.intersection(&pool_b).count();
    (inter as f32 / union as f32).clamp(0.0, 1.0)
}

/// Genre overlap normalized by the smaller profile, so a short genre list
/// fully contained in the other's scores 1.0.
pub fn genre(a: &GenreProfile, b: &GenreProfile) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.shared_with(b).len();
    let min_len = a.len().min(b.len());
    (shared as f32 / min_len as f32).clamp(0.0, 1.0)
}

/// One minus half the total-variation distance between the two era
/// distributions. Identical distributions score 1, disjoint ones 0; a reader
/// with no dated read books scores the pair 0.
pub fn era(a: &ReaderProfile, b: &ReaderProfile) -> f32 {
    let (Some(da), Some(db)) = (a.era_distribution(), b.era_distribution()) else {
        return 0.0;
    };
    let tv: f32 = da.iter().zip(db.iter()).map(|(x, y)| (x - y).abs()).sum();
    (1.0 - 0.5 * tv).clamp(0.0, 1.0)
}

/// Closeness of mean ratings over rated read books.
pub fn rating(a: &ReaderProfile, b: &ReaderProfile) -> f32 {
    span_score(a.mean_rating(), b.mean_rating(), RATING_SCALE_SPAN)
}

/// Closeness of median page counts over paged read books.
pub fn length(a: &ReaderProfile, b: &ReaderProfile) -> f32 {
    span_score(a.median_pages(), b.median_pages(), LENGTH_SPAN_PAGES)
}

/// Closeness of mean publication years over dated read books.
pub fn year(a: &ReaderProfile, b: &ReaderProfile) -> f32 {
    span_score(a.mean_pub_year(), b.mean_pub_year(), YEAR_SPAN_YEARS)
}

/// `1 - |a - b| / span`, clamped; 0 when either side has no evidence.
fn span_score(a: Option<f32>, b: Option<f32>, span: f32) -> f32 {
    match (a, b) {
        (Some(x), Some(y)) => (1.0 - (x - y).abs() / span).clamp(0.0, 1.0),
        _ => 0.0,
    }
}
