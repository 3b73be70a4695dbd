// tests/blend_properties.rs
//
// Property-level checks for the blend engine: range, symmetry, identity,
// disjointness, monotonicity, calibration boundaries, idempotence, and one
// fully worked scenario with exact expected numbers.

use rand::{rngs::StdRng, Rng, SeedableRng};

use book_blend::blend::{self, BlendConfig, ReaderProfile};
use book_blend::fetch::types::RawBookRecord;
use book_blend::genres::{GenreProfile, GENRE_TAXONOMY};

fn raw(
    id: &str,
    author: &str,
    shelf: &str,
    rating: Option<f32>,
    pages: Option<u32>,
    year: Option<i32>,
) -> RawBookRecord {
    RawBookRecord {
        book_id: Some(id.to_string()),
        title: Some(format!("Book {id}")),
        author_name: Some(format!("Author {author}")),
        author_id: Some(format!("author-{author}")),
        shelves: vec![shelf.to_string()],
        rating,
        pages,
        pub_year: year,
        read_at: None,
    }
}

fn random_profile(rng: &mut StdRng) -> ReaderProfile {
    let n = rng.random_range(0..30);
    let records = (0..n)
        .map(|_| {
            let id = rng.random_range(0..40u32);
            let author = rng.random_range(0..15u32);
            let shelf = ["read", "to-read", "currently-reading", "favorites"]
                [rng.random_range(0..4)];
            let rating = rng
                .random_bool(0.5)
                .then(|| rng.random_range(1..=5) as f32);
            let pages = rng.random_bool(0.5).then(|| rng.random_range(40..1200u32));
            let year = rng.random_bool(0.5).then(|| rng.random_range(1900..2026));
            raw(&id.to_string(), &author.to_string(), shelf, rating, pages, year)
        })
        .collect::<Vec<_>>();
    ReaderProfile::from_records(records)
}

fn random_genres(rng: &mut StdRng) -> GenreProfile {
    let n = rng.random_range(0..6);
    let labels: Vec<&str> = (0..n)
        .map(|_| GENRE_TAXONOMY[rng.random_range(0..GENRE_TAXONOMY.len())])
        .collect();
    GenreProfile::from_labels(labels)
}

#[test]
fn range_invariant_holds_for_random_pairs() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let a = random_profile(&mut rng);
        let b = random_profile(&mut rng);
        let ga = random_genres(&mut rng);
        let gb = random_genres(&mut rng);

        let r = blend::compute_blend(&a, &b, &ga, &gb);
        assert!((0.0..=100.0).contains(&r.score_raw), "raw out of range: {}", r.score_raw);
        assert!((40.0..=100.0).contains(&r.score), "score out of range: {}", r.score);
        for c in [
            r.components.common_books,
            r.components.common_authors,
            r.components.genre,
            r.components.era,
            r.components.rating,
            r.components.length,
            r.components.year,
        ] {
            assert!((0.0..=1.0).contains(&c), "component out of range: {c}");
        }
    }
}

#[test]
fn blend_is_symmetric_in_its_arguments() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let a = random_profile(&mut rng);
        let b = random_profile(&mut rng);
        let ga = random_genres(&mut rng);
        let gb = random_genres(&mut rng);

        let ab = blend::compute_blend(&a, &b, &ga, &gb);
        let ba = blend::compute_blend(&b, &a, &gb, &ga);
        assert_eq!(ab, ba);
    }
}

#[test]
fn identical_profiles_score_a_perfect_blend() {
    let records = vec![
        raw("1", "x", "read", Some(4.0), Some(300), Some(2015)),
        raw("2", "y", "read", Some(5.0), Some(450), Some(1985)),
        raw("3", "z", "read", None, None, None),
    ];
    let a = ReaderProfile::from_records(records.clone());
    let b = ReaderProfile::from_records(records);
    let g = GenreProfile::from_labels(["Fantasy", "History"]);

    let r = blend::compute_blend(&a, &b, &g, &g);
    assert_eq!(r.components.common_books, 1.0);
    assert_eq!(r.components.common_authors, 1.0);
    assert_eq!(r.components.genre, 1.0);
    assert_eq!(r.components.era, 1.0);
    assert_eq!(r.components.rating, 1.0);
    assert_eq!(r.components.length, 1.0);
    assert_eq!(r.components.year, 1.0);
    assert!((r.score_raw - 100.0).abs() < 1e-4);
    assert_eq!(r.score, 100.0);
}

#[test]
fn disjoint_readers_zero_the_overlap_components() {
    let a = ReaderProfile::from_records(vec![
        raw("1", "x", "read", Some(4.0), Some(300), Some(2015)),
        raw("2", "y", "read", Some(3.0), Some(200), Some(2018)),
    ]);
    let b = ReaderProfile::from_records(vec![
        raw("3", "p", "read", Some(4.0), Some(310), Some(2016)),
        raw("4", "q", "read", Some(5.0), Some(250), Some(2019)),
    ]);
    let ga = GenreProfile::from_labels(["Fantasy"]);
    let gb = GenreProfile::from_labels(["History"]);

    let r = blend::compute_blend(&a, &b, &ga, &gb);
    assert_eq!(r.components.common_books, 0.0);
    assert_eq!(r.components.common_authors, 0.0);
    assert_eq!(r.components.genre, 0.0);
    // The remaining components alone determine the score.
    assert!(r.components.era > 0.0);
    assert!(r.components.rating > 0.0);
    let w = BlendConfig::default().weights;
    let expected_raw = 100.0
        * (w.era * r.components.era
            + w.rating * r.components.rating
            + w.length * r.components.length
            + w.year * r.components.year)
        / w.sum();
    assert!((r.score_raw - expected_raw).abs() < 1e-4);
}

#[test]
fn adding_a_shared_read_book_never_decreases_common_books() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..50 {
        let mut records_a: Vec<RawBookRecord> = (0..rng.random_range(1..15))
            .map(|i| raw(&format!("a{i}"), "x", "read", None, None, None))
            .collect();
        let mut records_b: Vec<RawBookRecord> = (0..rng.random_range(1..15))
            .map(|i| raw(&format!("b{i}"), "y", "read", None, None, None))
            .collect();

        let before = blend::compute_blend(
            &ReaderProfile::from_records(records_a.clone()),
            &ReaderProfile::from_records(records_b.clone()),
            &GenreProfile::default(),
            &GenreProfile::default(),
        );

        records_a.push(raw("shared", "s", "read", None, None, None));
        records_b.push(raw("shared", "s", "read", None, None, None));
        let after = blend::compute_blend(
            &ReaderProfile::from_records(records_a),
            &ReaderProfile::from_records(records_b),
            &GenreProfile::default(),
            &GenreProfile::default(),
        );

        assert!(
            after.components.common_books >= before.components.common_books,
            "common_books decreased: {} -> {}",
            before.components.common_books,
            after.components.common_books
        );
    }
}

#[test]
fn calibration_pins_the_floor_and_ceiling() {
    // Empty pair: raw 0 -> floor.
    let empty = ReaderProfile::default();
    let g = GenreProfile::default();
    let r = blend::compute_blend(&empty, &empty, &g, &g);
    assert_eq!(r.score_raw, 0.0);
    assert_eq!(r.score, 40.0);

    // A pair engineered to raw <= 20 still shows the floor.
    let a = ReaderProfile::from_records(vec![raw("1", "x", "read", None, None, None)]);
    let b = ReaderProfile::from_records(vec![raw("2", "y", "read", None, None, None)]);
    let low = blend::compute_blend(&a, &b, &g, &g);
    assert!(low.score_raw <= 20.0);
    assert_eq!(low.score, 40.0);
}

#[test]
fn repeated_invocation_is_bitwise_identical() {
    let a = ReaderProfile::from_records(vec![
        raw("1", "x", "read", Some(4.0), Some(300), Some(2015)),
        raw("2", "y", "to-read", None, Some(500), None),
    ]);
    let b = ReaderProfile::from_records(vec![
        raw("1", "x", "read", Some(5.0), Some(320), Some(2018)),
    ]);
    let ga = GenreProfile::from_labels(["Fantasy", "Mystery"]);
    let gb = GenreProfile::from_labels(["Mystery"]);

    let r1 = blend::compute_blend(&a, &b, &ga, &gb);
    let r2 = blend::compute_blend(&a, &b, &ga, &gb);
    assert_eq!(r1, r2);
    assert_eq!(r1.score.to_bits(), r2.score.to_bits());
    assert_eq!(r1.score_raw.to_bits(), r2.score_raw.to_bits());
}

#[test]
fn worked_example_matches_the_formulas_exactly() {
    // Reader A: read {1..5}, all rated 4, ~300 pages, 2015; genres {Fantasy, SF}.
    let a = ReaderProfile::from_records(
        (1..=5)
            .map(|i| raw(&i.to_string(), &i.to_string(), "read", Some(4.0), Some(300), Some(2015)))
            .collect::<Vec<_>>(),
    );
    // Reader B: read {3..7}, rated 5, ~320 pages, 2018; genres {Fantasy}.
    let b = ReaderProfile::from_records(
        (3..=7)
            .map(|i| raw(&i.to_string(), &i.to_string(), "read", Some(5.0), Some(320), Some(2018)))
            .collect::<Vec<_>>(),
    );
    let ga = GenreProfile::from_labels(["Fantasy", "Science Fiction"]);
    let gb = GenreProfile::from_labels(["Fantasy"]);

    let r = blend::compute_blend(&a, &b, &ga, &gb);

    let three_sevenths = 3.0f32 / 7.0;
    assert!((r.components.common_books - three_sevenths).abs() < 1e-6);
    assert!((r.components.common_authors - three_sevenths).abs() < 1e-6);
    assert_eq!(r.components.genre, 1.0);
    assert_eq!(r.components.era, 1.0); // all books in 2010-present
    assert!((r.components.rating - 0.75).abs() < 1e-6); // 1 - 1/4
    assert!((r.components.length - 0.95).abs() < 1e-6); // 1 - 20/400
    assert!((r.components.year - 0.94).abs() < 1e-6); // 1 - 3/50

    // raw = 100*(0.35*(3/7) + 0.25 + 0.15 + 0.075 + 0.095 + 0.047) = 76.7
    assert!((r.score_raw - 76.7).abs() < 1e-3, "raw = {}", r.score_raw);
    // 16 + 1.2*76.7 = 108.04, clamped to the ceiling.
    assert_eq!(r.score, 100.0);
}
