//! Batch pipeline components.
//!
//! - **queue**: per-stage FIFO with a completion barrier
//! - **stage**: the per-item transform trait
//! - **pool**: fixed-size worker pool driving one stage
//! - **fetch**: network fetch primitive
//! - **codec**: image decode/resize/encode
//! - **download**, **resize**, **reformat**: the three stage transforms
//! - **orchestrator**: sequences the stages for one process record
//! - **validate**: submission checks

pub mod codec;
pub mod download;
pub mod fetch;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod reformat;
pub mod resize;
pub mod stage;
pub mod validate;

// Re-exports for convenient access
pub use codec::{DecodedImage, ImageCodec};
pub use download::Downloader;
pub use fetch::{Fetcher, HttpFetcher};
pub use orchestrator::Orchestrator;
pub use pool::{StagePool, StageSummary};
pub use queue::WorkQueue;
pub use reformat::{Reformatter, CANONICAL_FORMAT};
pub use resize::Resizer;
pub use stage::StageTransform;
pub use validate::Validator;
