//! RRSM engine - Sleep insight and score engine for the RRSM app
//!
//! The engine turns a short series of nightly sleep logs into one actionable
//! insight and a bounded composite score through a deterministic pipeline:
//! row adaptation → summary statistics → rule classification / scoring →
//! JSON encoding.
//!
//! ## Modules
//!
//! - **Statistics**: Linear summaries and circular clock-time statistics
//! - **Classifier**: Ordered rule table mapping a window of nights to a pattern
//! - **Score**: Composite quality, duration and bedtime-consistency score

pub mod adapter;
pub mod circular;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod score;
pub mod stats;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use adapter::{NightAdapter, NightRow, RowIssue};
pub use circular::{circular_mean, circular_std_dev, format_clock};
pub use classifier::InsightClassifier;
pub use config::EngineConfig;
pub use error::ComputeError;
pub use pipeline::{nights_to_dashboard, nights_to_insights, InsightEngine};
pub use score::compute_score;
pub use types::{
    Confidence, ContextHints, DashboardResponse, Insight, InsightRequest, InsightResponse,
    NightObservation, Pattern, ScoreResult,
};

/// Engine version reported by the CLI and FFI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
