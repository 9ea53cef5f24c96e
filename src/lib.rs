//! Synheart Focus - On-device cognitive focus estimation from heart rate
//!
//! Focus turns a live heart-rate stream into a continuous focus score through a
//! deterministic pipeline: sliding window → artifact rejection → adaptive
//! baseline → HRV feature extraction → external classifier → score fusion.
//!
//! ## Modules
//!
//! - **Signal Pipeline**: window, artifact filter, baselines and feature extraction
//! - **Engine**: classifier boundary, fusion strategies, smoothing and subscriptions

pub mod artifact;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod fusion;
pub mod pipeline;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use baseline::{AdaptiveBaseline, BaselineState, BaselineStats, SubjectBaseline};
pub use config::{FocusConfig, ScoringConfig};
pub use engine::{Classifier, EngineState, FnClassifier, FocusEngine};
pub use error::{ClassifierError, FocusError};
pub use features::{HrvFeatureExtractor, LegacyFeatureExtractor};
pub use fusion::{FusionStrategy, ScoreFusion};
pub use pipeline::{PreparedCycle, SignalPipeline};
pub use types::{
    ClassProbabilities, FeatureSchema, FeatureVector, FocusLabel, FocusLevel, FocusResult,
    ModelDescriptor, Sample,
};

/// Focus version embedded in result metadata
pub const FOCUS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for result metadata
pub const PRODUCER_NAME: &str = "synheart-focus";
