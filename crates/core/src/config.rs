use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(lookup: &dyn Fn(&str) -> Option<String>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = lookup(&prefixed) {
            return Some(v);
        }
    }
    lookup(key)
}

fn profiled_parse<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    profile: &str,
    key: &str,
    default: T,
) -> T {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_bool(lookup: &dyn Fn(&str) -> Option<String>, profile: &str, key: &str, default: bool) -> bool {
    match profiled_opt(lookup, profile, key).as_deref().map(str::trim) {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

/// What happens to a category whose run fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailedCategoryPolicy {
    /// Release the single-flight lock and leave the category `loading`.
    #[default]
    Stuck,
    /// Resolve the category as `empty` so later categories can be prepared.
    Skip,
}

impl FromStr for FailedCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stuck" => Ok(Self::Stuck),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown failed-category policy: {other}")),
        }
    }
}

impl fmt::Display for FailedCategoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stuck => write!(f, "stuck"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

// ── Prefetch runtime config ───────────────────────────────────

/// Runtime knobs for one prefetch scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Categories requested right after a generation starts.
    pub initial_categories: usize,
    /// Margin advertised to the proximity sensor, in pixels.
    pub proximity_margin_px: u32,
    pub failed_category_policy: FailedCategoryPolicy,
    /// Re-arm pacing when preparation catches up while the signal stays high.
    pub rearm_on_progress: bool,
    /// Item fetches in flight inside one category run. 1 = sequential.
    pub fetch_concurrency: usize,
    pub fetch_timeout_ms: u64,
    /// Base URL that relative data-source templates are joined onto.
    pub base_url: Option<String>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            initial_categories: 2,
            proximity_margin_px: 200,
            failed_category_policy: FailedCategoryPolicy::Stuck,
            rearm_on_progress: false,
            fetch_concurrency: 1,
            fetch_timeout_ms: 10_000,
            base_url: None,
        }
    }
}

impl PrefetchConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FEEDSHELF_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("FEEDSHELF_PROFILE").unwrap_or_default().to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        Self::from_lookup(profile, &env_opt)
    }

    fn from_lookup(profile: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let defaults = Self::default();
        Self {
            profile: p.to_string(),
            initial_categories: profiled_parse(lookup, p, "FEEDSHELF_INITIAL_CATEGORIES", defaults.initial_categories),
            proximity_margin_px: profiled_parse(
                lookup,
                p,
                "FEEDSHELF_PROXIMITY_MARGIN_PX",
                defaults.proximity_margin_px,
            ),
            failed_category_policy: profiled_parse(
                lookup,
                p,
                "FEEDSHELF_FAILED_CATEGORY_POLICY",
                defaults.failed_category_policy,
            ),
            rearm_on_progress: profiled_bool(lookup, p, "FEEDSHELF_REARM_ON_PROGRESS", defaults.rearm_on_progress),
            fetch_concurrency: profiled_parse(lookup, p, "FEEDSHELF_FETCH_CONCURRENCY", defaults.fetch_concurrency)
                .max(1),
            fetch_timeout_ms: profiled_parse(lookup, p, "FEEDSHELF_FETCH_TIMEOUT_MS", defaults.fetch_timeout_ms),
            base_url: profiled_opt(lookup, p, "FEEDSHELF_BASE_URL"),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Prefetch config loaded (profile: {}):", self.profile_label());
        tracing::info!("  window:      initial={}, margin={}px", self.initial_categories, self.proximity_margin_px);
        tracing::info!(
            "  pacing:      rearm_on_progress={}, failed_category={}",
            self.rearm_on_progress,
            self.failed_category_policy
        );
        tracing::info!(
            "  fetch:       concurrency={}, timeout={}ms, base_url={}",
            self.fetch_concurrency,
            self.fetch_timeout_ms,
            self.base_url.as_deref().unwrap_or("(none)")
        );
    }
}
