//! Evaluation configuration
//!
//! Switches that steer the assignment path: whether vectorized and parallel
//! loops may be used, from which size parallel evaluation pays off, and what
//! to do when a backend routine fails.
//!
//! Resolution order: `with_config` override on the current thread, then the
//! process default (`set_default_config`), then `EvalConfig::from_env()` which
//! is read once on first use.
//!
//! # Environment Variables
//!
//! - `LAZR_VECTORIZE`: enable batch evaluation (default on)
//! - `LAZR_PARALLEL`: enable rayon evaluation (default on)
//! - `LAZR_PARALLEL_THRESHOLD`: minimum element count for parallel evaluation
//! - `LAZR_BACKEND_FALLBACK`: `propagate` or `generic`
//! - `LAZR_VECTOR_MODE`: force a vector mode (`scalar`, `sse3`, `avx`, ...)

use crate::simd::{VectorMode, detect_vector_mode};
use parking_lot::RwLock;
use std::cell::Cell;
use std::env;
use std::sync::OnceLock;

/// Element count below which the rayon path is skipped
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// What an operator does when its backend routine fails
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendFallback {
    /// Return the failure as `Error::Backend`
    #[default]
    Propagate,
    /// Log the failure and run the generic implementation instead
    Generic,
}

/// Configuration of the assignment path
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EvalConfig {
    /// Evaluate vectorizable expressions in lane batches
    pub vectorize_expr: bool,
    /// Evaluate large thread-safe expressions with rayon
    pub parallel: bool,
    /// Minimum element count for parallel evaluation
    pub parallel_threshold: usize,
    /// Policy for failed backend dispatches
    pub backend_fallback: BackendFallback,
    /// Vector mode override, `None` means detect
    pub vector_mode: Option<VectorMode>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            vectorize_expr: true,
            parallel: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            backend_fallback: BackendFallback::Propagate,
            vector_mode: None,
        }
    }
}

impl EvalConfig {
    /// Build a configuration from `LAZR_*` environment variables
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_flag("LAZR_VECTORIZE") {
            cfg.vectorize_expr = v;
        }
        if let Some(v) = env_flag("LAZR_PARALLEL") {
            cfg.parallel = v;
        }
        if let Some(n) = env_value("LAZR_PARALLEL_THRESHOLD").and_then(|s| s.parse().ok()) {
            cfg.parallel_threshold = n;
        }
        if let Some(policy) = env_value("LAZR_BACKEND_FALLBACK") {
            match policy.to_ascii_lowercase().as_str() {
                "generic" | "fallback" => cfg.backend_fallback = BackendFallback::Generic,
                "propagate" | "error" => cfg.backend_fallback = BackendFallback::Propagate,
                other => log::warn!("ignoring LAZR_BACKEND_FALLBACK={other}"),
            }
        }
        if let Some(mode) = env_value("LAZR_VECTOR_MODE") {
            match VectorMode::parse(&mode) {
                Some(m) => cfg.vector_mode = Some(m),
                None => log::warn!("ignoring LAZR_VECTOR_MODE={mode}"),
            }
        }
        cfg
    }

    /// Set whether batch evaluation is allowed
    pub fn with_vectorize(mut self, enabled: bool) -> Self {
        self.vectorize_expr = enabled;
        self
    }

    /// Set whether parallel evaluation is allowed
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Set the minimum element count for parallel evaluation
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set the backend failure policy
    pub fn with_backend_fallback(mut self, policy: BackendFallback) -> Self {
        self.backend_fallback = policy;
        self
    }

    /// Force a vector mode instead of detecting it
    pub fn with_vector_mode(mut self, mode: VectorMode) -> Self {
        self.vector_mode = Some(mode);
        self
    }

    /// The vector mode evaluation should target
    pub fn effective_vector_mode(&self) -> VectorMode {
        if !self.vectorize_expr {
            return VectorMode::Scalar;
        }
        self.vector_mode.unwrap_or_else(detect_vector_mode)
    }
}

fn env_value(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env_value(name).map(|value| {
        let normalized = value.to_ascii_lowercase();
        matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
    })
}

// ============================================================================
// Process default and per-thread override
// ============================================================================

static DEFAULT_CONFIG: OnceLock<RwLock<EvalConfig>> = OnceLock::new();

thread_local! {
    static OVERRIDE: Cell<Option<EvalConfig>> = const { Cell::new(None) };
}

fn default_cell() -> &'static RwLock<EvalConfig> {
    DEFAULT_CONFIG.get_or_init(|| RwLock::new(EvalConfig::from_env()))
}

/// Replace the process-wide default configuration
pub fn set_default_config(cfg: EvalConfig) {
    *default_cell().write() = cfg;
}

/// The configuration in effect on the current thread
pub fn current() -> EvalConfig {
    OVERRIDE
        .with(Cell::get)
        .unwrap_or_else(|| *default_cell().read())
}

/// Run `f` with `cfg` in effect on the current thread
///
/// Overrides nest; the previous value is restored when `f` returns or unwinds.
pub fn with_config<R>(cfg: EvalConfig, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<EvalConfig>);
    impl Drop for Restore {
        fn drop(&mut self) {
            OVERRIDE.with(|o| o.set(self.0));
        }
    }

    let previous = OVERRIDE.with(|o| o.replace(Some(cfg)));
    let _restore = Restore(previous);
    f()
}
