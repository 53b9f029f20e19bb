//! Attribute extraction, copy generation, image-to-copy composition and bulk runs
//! over a pluggable generative backend.

pub mod backend;
pub mod bulk;
pub mod config;
pub mod engine;
pub mod extractor;
pub mod generator;
pub mod mapper;
pub mod persistence;
pub mod pipeline;
mod text;

#[cfg(test)]
mod test_support;

pub use backend::{
    default_backend_registry, BackendRegistry, ContentPart, DryrunBackend, GeminiBackend,
    GenerativeBackend, StructuredCall,
};
pub use bulk::{BulkItemReport, BulkReport, BulkRunner};
pub use config::EngineConfig;
pub use engine::{Recorded, VistritaEngine};
pub use extractor::AttributeExtractor;
pub use generator::CopyGenerator;
pub use mapper::map_request;
pub use pipeline::{Composition, CompositionPipeline, PipelineError};
