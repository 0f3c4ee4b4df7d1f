//! Async client for the fal.ai image generation API.
//!
//! [`GenerationClient`] takes a typed [`GenerationRequest`], pre-processes any uploaded
//! images, builds the model-specific JSON body, submits it to the direct or queue
//! surface, polls until the job settles and hands back a normalized
//! [`GenerationResult`]. Every failure is a classified [`GenerationError`].

pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod preprocess;

pub use client::GenerationClient;
pub use config::{FalConfig, PreprocessConfig};
pub use error::{ErrorKind, GenerationError, Phase, Result};
pub use models::{
    EditOptions, EditType, GenerationRequest, GenerationResult, ImageInput, ImageRef, JobHandle,
    JobStatus, ModelInfo, Operation, OperationKind, ProductFormat, ProductResolution,
    ProductShootOptions, ProviderMetadata, QueueStatus, ReferenceOptions, TextToImageOptions,
    VideoOptions,
};
pub use tokio_util::sync::CancellationToken;
