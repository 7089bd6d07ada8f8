//! Feature-engineering pipeline for flight records.
//!
//! A pipeline is an ordered list of [`Stage`]s, each wrapping a
//! [`Preprocessor`]. The [`PipelineRunner`] applies them strictly in order,
//! handing each stage the dataset produced by the previous one.
//!
//! # Caching
//!
//! Stages are cached by default. The cache key is derived from the stage
//! name, its constructor parameters and a fingerprint of the input dataset,
//! so a hit returns exactly what `process` would have produced. Stages with
//! side effects or cheap bodies opt out with [`Stage::no_cache`]. Entries live
//! on disk in a [`PreprocessingCache`] that evicts least-recently-used
//! entries once its byte limit is exceeded.
//!
//! # Reference data
//!
//! Airport, aircraft and fuel-price stages join against keyed CSV tables
//! ([`ReferenceTable`]). A missing reference file is a configuration error;
//! an unknown key only yields missing values for that row and a warning.
//! Per-key work (airport codes, weather stations) is spread over a
//! [`WorkerPool`]; remote fetches go through [`with_retries`].

pub mod cache;
pub mod pipeline;
pub mod pool;
pub mod reference;
pub mod retry;
pub mod stages;
pub mod traits;

pub use cache::{cache_key, content_fingerprint, CacheStats, PreprocessingCache, DEFAULT_BYTES_LIMIT};
pub use pipeline::{run, PipelineRunner, Stage};
pub use pool::WorkerPool;
pub use reference::{Lookup, ReferenceTable};
pub use retry::{or_placeholder, with_retries, RetryPolicy};
pub use stages::*;
pub use traits::Preprocessor;
