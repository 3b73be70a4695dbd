//! Blend scoring engine: two normalized reader profiles plus two genre
//! profiles in, one calibrated compatibility score out.
//!
//! The engine is a pure function of its arguments. No I/O, no shared state,
//! no suspension points; concurrency around it (fetching two libraries, two
//! classifications) is entirely the caller's concern.

pub mod components;
pub mod profile;
pub mod weights;

use serde::Serialize;

pub use profile::{Book, ReaderProfile, ERA_BUCKET_LABELS, READ_SHELF};
pub use weights::{BlendConfig, BlendWeights, Calibration, HotReloadBlendConfig};

use crate::genres::GenreProfile;

/// Seven named component scores, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub common_books: f32,
    pub common_authors: f32,
    pub genre: f32,
    pub era: f32,
    pub rating: f32,
    pub length: f32,
    pub year: f32,
}

/// Final blend outcome. Both the raw and the calibrated score are always
/// present so consumers can audit the calibration independently of the
/// weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendResult {
    pub score: f32,
    pub score_raw: f32,
    pub components: ScoreComponents,
}

/// Compute all seven components for a profile pair.
pub fn score_components(
    a: &ReaderProfile,
    b: &ReaderProfile,
    genres_a: &GenreProfile,
    genres_b: &GenreProfile,
) -> ScoreComponents {
    ScoreComponents {
        common_books: components::common_books(a, b),
        common_authors: components::common_authors(a, b),
        genre: components::genre(genres_a, genres_b),
        era: components::era(a, b),
        rating: components::rating(a, b),
        length: components::length(a, b),
        year: components::year(a, b),
    }
}

/// Weighted aggregate of the components, scaled to [0,100].
/// Normalized by the weight sum so configured weights cannot overflow the range.
pub fn aggregate(c: &ScoreComponents, w: &BlendWeights) -> f32 {
    let weighted = c.common_books * w.common_books
        + c.common_authors * w.common_authors
        + c.genre * w.genre
        + c.era * w.era
        + c.rating * w.rating
        + c.length * w.length
        + c.year * w.year;
    let denom = w.sum().max(1e-6);
    (100.0 * weighted / denom).clamp(0.0, 100.0)
}

/// Blend two readers with explicit weights and calibration.
pub fn compute_blend_with(
    a: &ReaderProfile,
    b: &ReaderProfile,
    genres_a: &GenreProfile,
    genres_b: &GenreProfile,
    config: &BlendConfig,
) -> BlendResult {
    let components = score_components(a, b, genres_a, genres_b);
    let score_raw = aggregate(&components, &config.weights);
    let score = config.calibration.apply(score_raw);
    BlendResult {
        score,
        score_raw,
        components,
    }
}

/// Blend two readers with the compiled default weights and calibration.
pub fn compute_blend(
    a: &ReaderProfile,
    b: &ReaderProfile,
    genres_a: &GenreProfile,
    genres_b: &GenreProfile,
) -> BlendResult {
    compute_blend_with(a, b, genres_a, genres_b, &BlendConfig::default())
}
