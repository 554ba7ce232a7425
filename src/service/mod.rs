//! Service layer
//!
//! Everything around the pipeline: a bounded worker pool, where audio comes
//! from, where it is stored, and the request façade that ties them together.

pub mod facade;
pub mod pool;
pub mod source;
pub mod store;

pub use facade::{
    ErrorResponse, ExtractRequest, ExtractResponse, LofiService, ProcessRequest, ProcessResponse,
};
pub use pool::{PendingJob, WorkerPool};
pub use source::{AudioSource, FileSource, SourceAudio, SourceLocator};
pub use store::{AudioSink, StoredAudio, WavStore, PROCESSED_PREFIX, UPLOADS_PREFIX};
