//! Readguide engine: batch orchestration, per-document pipeline and the streaming client.
mod classify;
mod client;
mod decode;
mod extract;
mod filename;
mod frontmatter;
mod generate;
mod orchestrator;
mod persist;
mod runner;
mod sink;
mod types;

pub use classify::{fallback_classification, parse_classification, truncate_chars};
pub use client::{
    BatchClient, BatchRequest, EventStream, BATCH_IMPORT_PATH, FILES_FIELD, MODEL_FIELD,
    PROFILE_FIELD,
};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use extract::{docx_to_text, html_to_text, ExtractSettings, ExtractionError, Extractor, FileExtractor};
pub use filename::artifact_stem;
pub use frontmatter::build_guide_document;
pub use generate::{
    available_profiles, GenerationError, Generator, GeneratorSettings, ModelEndpoint, OpenAiGenerator,
};
pub use orchestrator::{BatchOrchestrator, BatchSettings, FrameStream};
pub use persist::{ensure_output_dir, AtomicFileWriter, FileGuideStore, GuideStore, PersistError};
pub use runner::{JobError, JobRunner};
pub use sink::{ChannelProgressSink, FrameSink, ProgressSink};
pub use types::{
    Artifact, ArtifactId, BatchError, BatchSummary, Classification, GenerationParams, JobOutcome,
    SourceDescriptor, Stage, TransportError,
};
