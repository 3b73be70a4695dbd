// tests/feed_to_profile.rs
//
// End-to-end over the offline half of the pipeline: fixture feed pages in,
// normalized ReaderProfile out.

use book_blend::blend::ReaderProfile;
use book_blend::fetch::providers::GoodreadsRssProvider;
use book_blend::fetch::types::{Shelf, ShelfProvider};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Reader&apos;s bookshelf</title>
    <item>
      <title>The Dispossessed</title>
      <author_name>Ursula K. Le Guin</author_name>
      <book_id>13651</book_id>
      <book id="13651"><num_pages>387</num_pages></book>
      <user_shelves></user_shelves>
      <user_rating>5</user_rating>
      <user_read_at>Sat, 01 Jul 2023 00:00:00 +0000</user_read_at>
      <book_published>1974</book_published>
    </item>
    <item>
      <title>The Dispossessed</title>
      <author_name>Ursula K. Le Guin</author_name>
      <book_id>13651</book_id>
      <book id="13651"><num_pages>387</num_pages></book>
      <user_shelves>favorites, sci-fi</user_shelves>
      <user_rating>0</user_rating>
      <book_published>1974</book_published>
    </item>
    <item>
      <title>Piranesi</title>
      <author_name>Susanna Clarke*</author_name>
      <book_id>50202953</book_id>
      <book id="50202953"><num_pages>245</num_pages></book>
      <user_shelves>to-read</user_shelves>
      <user_rating>0</user_rating>
      <book_published>2020</book_published>
    </item>
    <item>
      <title>Mystery record with no identity</title>
      <author_name>Nobody</author_name>
      <user_shelves>read</user_shelves>
    </item>
  </channel>
</rss>
"#;

#[tokio::test]
async fn fixture_feed_normalizes_into_a_profile() {
    let provider = GoodreadsRssProvider::from_fixture_pages([FEED.to_string()]);
    let records = provider.fetch_shelf("1", &Shelf::All).await.unwrap();
    assert_eq!(records.len(), 4);

    let profile = ReaderProfile::from_records(records);

    // The no-identity record is dropped, the duplicate merges.
    assert_eq!(profile.len(), 2);
    assert_eq!(profile.dropped_records, 1);

    let dispossessed = &profile.books["13651"];
    // First record's implicit `read` shelf unions with the custom shelves.
    assert!(dispossessed.shelves.contains("read"));
    assert!(dispossessed.shelves.contains("favorites"));
    assert!(dispossessed.shelves.contains("sci-fi"));
    // The second record's absent rating must not erase the first one's.
    assert_eq!(dispossessed.rating, Some(5.0));
    assert_eq!(dispossessed.pages, Some(387));
    assert_eq!(dispossessed.pub_year, Some(1974));
    assert_eq!(dispossessed.read_at, Some(1_688_169_600));
    assert!(dispossessed.is_read());

    let piranesi = &profile.books["50202953"];
    assert_eq!(piranesi.author_name, "Susanna Clarke");
    assert_eq!(piranesi.author_id, "susanna clarke");
    assert!(!piranesi.is_read());

    // Derived stats come from the single read book.
    assert_eq!(profile.median_pages(), Some(387.0));
    assert_eq!(profile.mean_rating(), Some(5.0));
    assert_eq!(profile.mean_pub_year(), Some(1974.0));
    let dist = profile.era_distribution().unwrap();
    assert_eq!(dist[1], 1.0); // 1950-1999
}
