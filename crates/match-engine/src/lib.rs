//!
//! # Match Engine
//!
//! Vigil's match engine runs descriptor matching across a fixed pool of
//! isolated execution workers, keeping the CPU-bound scans off the request
//! path.
//!
//! Submit a match or batch request and the pool handles dispatching, FIFO
//! queueing when every worker is busy, per-task deadlines with real
//! cancellation of the losing computation, and in-place replacement of
//! crashed workers. Candidate snapshots are moved into the worker with the
//! request, so no candidate data is ever shared by reference across
//! execution contexts.
//!
//!
//! ## Basic example
//!
//! ```
//! use vigil_match_engine::{MatchPool, MatchRequest, PoolConfig};
//! use vigil_matcher::{Candidate, RiskLevel};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = MatchPool::new(PoolConfig::default());
//!
//!     let candidates = vec![Candidate {
//!         id: Uuid::new_v4(),
//!         name: "John Doe".to_string(),
//!         crime_type: "fraud".to_string(),
//!         risk_level: RiskLevel::Medium,
//!         image_url: None,
//!         descriptor: Some(vec![0.0; 128]),
//!     }];
//!
//!     let handle = pool
//!         .submit(MatchRequest::new(vec![0.0; 128], candidates))
//!         .await
//!         .expect("pool is accepting requests");
//!
//!     let hit = handle.await.expect("match task completed");
//!     assert!(hit.is_some());
//!
//!     pool.shutdown().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod error;
mod message;
mod pool;
mod scan;
mod task;
mod worker;

pub use config::PoolConfig;
pub use error::Error;
pub use pool::{MatchPool, PoolStatus};
pub use task::{
	BatchItem, BatchItemOutcome, BatchRequest, MatchRequest, RequestId, TaskHandle,
};
pub use worker::{WorkerId, WorkerStatus};
