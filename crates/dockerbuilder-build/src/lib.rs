//! dockerbuilder build pipeline
//!
//! This crate retrieves the application artifact, stages the build context,
//! builds the image through the Docker Engine and pushes it to the target
//! registry, streaming engine progress to the job log.

pub mod auth;
pub mod builder;
pub mod context;
pub mod docker;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod pipeline;
pub mod pusher;
pub mod retriever;
pub mod stager;
pub mod storage;
pub mod stream;

pub use auth::RegistryAuth;
pub use builder::ImageBuilder;
pub use context::ContextBuilder;
pub use docker::DockerEngine;
pub use engine::{BuildRequest, ImageEngine};
pub use error::{BuildError, BuildResult};
pub use interpreter::{JobOutcome, StreamInterpreter};
pub use pipeline::Pipeline;
pub use pusher::ImagePusher;
pub use retriever::ArtifactRetriever;
pub use stager::Stager;
pub use storage::{ObjectStore, object_store_for};
pub use stream::{ProgressEvent, ProgressMessage, StreamChunk};
