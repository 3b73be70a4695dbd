// src/fetch/mod.rs
pub mod providers;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_records_total", "Total records parsed from shelf feeds.");
        describe_counter!(
            "fetch_dropped_total",
            "Records dropped during normalization for lacking a book id."
        );
        describe_counter!("fetch_provider_errors_total", "Provider fetch/parse errors.");
        describe_histogram!("fetch_parse_ms", "Feed page parse time in milliseconds.");
        describe_gauge!(
            "fetch_last_run_ts",
            "Unix ts when a shelf fetch last completed."
        );
    });
}

/// Normalize feed text: decode HTML entities, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Author names additionally lose the feed's trailing `*` marker.
pub fn normalize_author(s: &str) -> String {
    let mut out = normalize_text(s);
    while out.ends_with('*') {
        out.pop();
    }
    out.trim_end().to_string()
}

/// Opaque author key: case-folded normalized name. Only ever compared for
/// equality downstream.
pub fn author_key(author_name: &str) -> String {
    normalize_author(author_name).to_lowercase()
}
