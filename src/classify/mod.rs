//! Genre classifier: provider abstraction + file cache + daily limit.
//!
//! The blend engine never calls this module; it only consumes the resulting
//! [`GenreProfile`]s. Keeping the classifier behind a trait keeps the whole
//! pipeline testable with a deterministic fake, and keeps alias resolution at
//! this boundary: no scoring component ever sees a non-canonical label.

use std::fs;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ai::AiConfig;
use crate::genres::{self, GENRE_TAXONOMY, MAX_GENRES_PER_READER};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Ranked canonical genre labels for one reader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedGenres {
    pub labels: Vec<String>,
}

/// Trait object used by the HTTP layer and tests.
pub trait GenreClassifier: Send + Sync {
    /// Classify a reader's read books ("Title by Author" lines) into ranked
    /// canonical genres. `None` means no classification is available; the
    /// genre component then scores 0 for the pair.
    fn classify<'a>(
        &'a self,
        reader_id: &'a str,
        read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<ClassifiedGenres>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynGenreClassifier = Arc<dyn GenreClassifier>;

/// Factory: build a classifier according to config and environment.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock wrapped in the
///   caching client.
/// * Else if `config.enabled==false`, returns a disabled classifier.
/// * Else builds the real provider (OpenAI) wrapped with caching + daily limit.
pub fn build_classifier_from_config(config: &AiConfig) -> DynGenreClassifier {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = MockProvider {
            fixed: vec!["Fantasy".to_string(), "Science Fiction".to_string()],
        };
        let client = CachingClassifier::new(mock, default_cache_dir(), config.daily_limit);
        return Arc::new(client);
    }

    if !config.enabled {
        return Arc::new(DisabledClassifier);
    }

    match config.provider.as_str() {
        "openai" => {
            let provider = OpenAiProvider::new(config);
            let client = CachingClassifier::new(provider, default_cache_dir(), config.daily_limit);
            Arc::new(client)
        }
        _ => Arc::new(DisabledClassifier),
    }
}

/// Reads `config/ai.json` and builds a classifier.
pub fn build_classifier() -> DynGenreClassifier {
    let cfg = AiConfig::load_default();
    build_classifier_from_config(&cfg)
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does a *real* remote call and returns raw labels.
/// Separated from the trait object so the same caching wrapper serves
/// production and tests.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        reader_id: &'a str,
        read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<Vec<String>>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

/// OpenAI provider (Chat Completions API). Requires an API key.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("book-blend/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn system_prompt() -> String {
        format!(
            "You are an expert literary analyst. Given a list of books a reader has read, \
             identify the reader's top genres. Choose ONLY from this taxonomy, ranked by \
             confidence, at most {MAX_GENRES_PER_READER}: {}. \
             Return ONLY a JSON object of the form {{\"genres\": [\"...\"]}} with no other text.",
            GENRE_TAXONOMY.join("; ")
        )
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(
        &'a self,
        _reader_id: &'a str,
        read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<Vec<String>>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() || read_books.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Format<'a> {
                #[serde(rename = "type")]
                kind: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
                response_format: Format<'a>,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }
            #[derive(Deserialize)]
            struct GenresOut {
                genres: Vec<String>,
            }

            let sys = Self::system_prompt();
            let user = format!("Read books:\n{}", read_books.join("\n"));
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: &sys,
                    },
                    Msg {
                        role: "user",
                        content: &user,
                    },
                ],
                temperature: 0.0,
                max_tokens: 300,
                response_format: Format { kind: "json_object" },
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .ok()?;

            if !resp.status().is_success() {
                tracing::warn!(status = %resp.status(), "genre classifier http error");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or("");
            let parsed: GenresOut = serde_json::from_str(content).ok()?;
            Some(parsed.genres)
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `None` always; used when the classifier is disabled.
pub struct DisabledClassifier;

impl GenreClassifier for DisabledClassifier {
    fn classify<'a>(
        &'a self,
        _reader_id: &'a str,
        _read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<ClassifiedGenres>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Simple mock provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: Vec<String>,
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        _reader_id: &'a str,
        _read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<Vec<String>>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Some(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Cache-free classifier with a fixed answer; handy for router tests.
#[derive(Clone)]
pub struct FixedClassifier {
    pub labels: Vec<String>,
}

impl GenreClassifier for FixedClassifier {
    fn classify<'a>(
        &'a self,
        _reader_id: &'a str,
        _read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<ClassifiedGenres>> + Send + 'a>> {
        let labels = sanitize_labels(&self.labels);
        Box::pin(async move { Some(ClassifiedGenres { labels }) })
    }
    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

/// Keep only labels that resolve into the canonical taxonomy, deduplicated in
/// rank order and capped.
pub fn sanitize_labels(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in raw {
        if out.len() >= MAX_GENRES_PER_READER {
            break;
        }
        if let Some(canonical) = genres::resolve(label) {
            if !out.iter().any(|g| g == canonical) {
                out.push(canonical.to_string());
            }
        }
    }
    out
}

// ------------------------------------------------------------
// Caching classifier wrapper (file cache + daily limit)
// ------------------------------------------------------------

/// Counter state is guarded by a `Mutex` to keep it simple and safe.
pub struct CachingClassifier<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Arc<Mutex<DailyCounter>>,
}

impl<P: Provider> CachingClassifier<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir); // best-effort
        let counter = Arc::new(Mutex::new(
            load_daily_counter(&cache_dir).unwrap_or_default(),
        ));
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    async fn classify_impl(&self, reader_id: &str, read_books: &[String]) -> Option<ClassifiedGenres> {
        // 1) Cache lookup; hits never touch the daily budget.
        let key = cache_key(reader_id, read_books);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Some(hit);
        }

        // 2) Check daily limit (only real API calls increment it).
        {
            let mut g = self.counter.lock().expect("poisoned counter");
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit_max {
                return None;
            }
        }

        // 3) Real call.
        if let Some(raw) = self.inner.fetch(reader_id, read_books).await {
            let labels = sanitize_labels(&raw);
            if !labels.is_empty() {
                let fresh = ClassifiedGenres { labels };
                let _ = write_cache_file(&self.cache_dir, &key, &fresh);
                // Increment after a successful real call.
                let mut g = self.counter.lock().expect("poisoned counter");
                g.count = g.count.saturating_add(1);
                let _ = save_daily_counter(&self.cache_dir, &g);
                return Some(fresh);
            }
        }
        None
    }
}

impl<P: Provider> GenreClassifier for CachingClassifier<P> {
    fn classify<'a>(
        &'a self,
        reader_id: &'a str,
        read_books: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Option<ClassifiedGenres>> + Send + 'a>> {
        Box::pin(self.classify_impl(reader_id, read_books))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/genres")
}

fn cache_key(reader_id: &str, read_books: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reader_id.as_bytes());
    for book in read_books {
        hasher.update(b"\n");
        hasher.update(book.as_bytes());
    }
    let digest = hasher.finalize();
    // 16 bytes of the digest is plenty for a filename.
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<ClassifiedGenres> {
    let path = cache_path(dir, key);
    let mut file = fs::File::open(path).ok()?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).ok()?;
    serde_json::from_str(&buf).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &ClassifiedGenres) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}
impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}
impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let p = counter_path(dir);
    let s = fs::read_to_string(p)?;
    let dc: DailyCounter =
        serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(dc)
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).unwrap_or_else(|_| "{}".to_string());
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)?;
    Ok(())
}
