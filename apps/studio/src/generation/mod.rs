// Card generation pipeline
// Implements: dataset intake, request/prompt building, the HTTP client, and the bounded worker pool.
// All calls to the card service go through client::ImageGenerator.

pub mod bulk;
pub mod client;
pub mod prompts;
pub mod request;
pub mod scheduler;

pub use client::{GenerationError, HttpImageGenerator, ImageGenerator};
pub use request::{build_request, CustomModel, GenerationParams, GenerationRequest, ServerVersion};
pub use scheduler::{
    Completion, GenerationBatch, GenerationJob, JobTarget, Scheduler, WorkerPool,
    MAX_CONCURRENT_REQUESTS,
};
