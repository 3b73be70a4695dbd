//! Runtime-calibrated blend weights and calibration constants.
//!
//! File shape (JSON, TOML equivalent also accepted):
//! {
//!   "weights": { "common_books": 0.25, "common_authors": 0.10, "genre": 0.25,
//!                "era": 0.15, "rating": 0.10, "length": 0.10, "year": 0.05 },
//!   "calibration": { "floor": 40.0, "offset": 16.0, "slope": 1.2, "ceiling": 100.0 }
//! }
//!
//! Path resolution: $BLEND_WEIGHTS_PATH, then config/blend_weights.json, then
//! config/blend_weights.toml. On each `current()` call we check the file's
//! modified time and reload if changed; a missing or invalid file keeps the
//! compiled defaults.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

pub const ENV_BLEND_WEIGHTS_PATH: &str = "BLEND_WEIGHTS_PATH";

/// Per-component weights. They need not sum to 1.0 in the file; the
/// aggregator normalizes by the sum, so a reconfigured file cannot push the
/// raw score out of [0,100].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub common_books: f32,
    pub common_authors: f32,
    pub genre: f32,
    pub era: f32,
    pub rating: f32,
    pub length: f32,
    pub year: f32,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            common_books: 0.25,
            common_authors: 0.10,
            genre: 0.25,
            era: 0.15,
            rating: 0.10,
            length: 0.10,
            year: 0.05,
        }
    }
}

impl BlendWeights {
    pub fn sum(&self) -> f32 {
        self.common_books
            + self.common_authors
            + self.genre
            + self.era
            + self.rating
            + self.length
            + self.year
    }
}

/// Affine clamp applied to the raw score: `clamp(floor, offset + slope*raw, ceiling)`.
/// The floor keeps low-overlap pairs from reading as a failing grade; the
/// slope stretches mid/high raw scores into the displayed 80-95 band.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub floor: f32,
    pub offset: f32,
    pub slope: f32,
    pub ceiling: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            floor: 40.0,
            offset: 16.0,
            slope: 1.2,
            ceiling: 100.0,
        }
    }
}

impl Calibration {
    pub fn apply(&self, raw: f32) -> f32 {
        (self.offset + self.slope * raw).clamp(self.floor, self.ceiling)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    pub weights: BlendWeights,
    pub calibration: Calibration,
}

/// Load a blend config directly (no caching). Public for tests/tools.
pub fn load_config_file(path: &Path) -> Result<BlendConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading blend config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, &ext)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<BlendConfig> {
    if hint_ext == "toml" {
        if let Ok(cfg) = toml::from_str::<BlendConfig>(s) {
            return Ok(cfg);
        }
    }
    if let Ok(cfg) = serde_json::from_str::<BlendConfig>(s) {
        return Ok(cfg);
    }
    if hint_ext != "toml" {
        if let Ok(cfg) = toml::from_str::<BlendConfig>(s) {
            return Ok(cfg);
        }
    }
    Err(anyhow!("unsupported blend config format"))
}

fn default_config_path() -> PathBuf {
    if let Ok(p) = std::env::var(ENV_BLEND_WEIGHTS_PATH) {
        return PathBuf::from(p);
    }
    let json = PathBuf::from("config/blend_weights.json");
    if json.exists() {
        return json;
    }
    PathBuf::from("config/blend_weights.toml")
}

/// Hot-reload wrapper: reloads when the config file mtime changes.
#[derive(Debug)]
pub struct HotReloadBlendConfig {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: BlendConfig,
    last_modified: Option<SystemTime>,
}

impl HotReloadBlendConfig {
    /// Create with a path; `None` resolves via env var and fallbacks.
    pub fn new(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        Self {
            path,
            inner: RwLock::new(State {
                config: BlendConfig::default(),
                last_modified: None,
            }),
        }
    }

    /// Get the latest config, reloading if the file changed.
    pub fn current(&self) -> BlendConfig {
        let needs_reload = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                let guard = self.inner.read().expect("blend config lock poisoned");
                guard.last_modified != Some(mtime)
            }
            // If the file isn't there, we keep defaults; no reload.
            Err(_) => false,
        };

        if !needs_reload {
            return self.inner.read().expect("blend config lock poisoned").config;
        }

        let mut guard = self.inner.write().expect("blend config lock poisoned");
        // Double-check in case of races.
        if let Ok(mtime) = fs::metadata(&self.path).and_then(|m| m.modified()) {
            if guard.last_modified != Some(mtime) {
                if let Ok(cfg) = load_config_file(&self.path) {
                    guard.config = cfg;
                    guard.last_modified = Some(mtime);
                }
            }
        }
        guard.config
    }
}
