//! Focus engine
//!
//! Owns one subject's signal pipeline, the classifier and the fusion state.
//! Every call is synchronous; `&mut self` on ingestion guarantees a single
//! classifier call in flight per engine.

use crate::config::FocusConfig;
use crate::error::{ClassifierError, FocusError};
use crate::fusion::ScoreFusion;
use crate::pipeline::{PreparedCycle, SignalPipeline};
use crate::types::{
    ClassProbabilities, FeatureSchema, FocusLabel, FocusResult, ModelDescriptor, ModelMetadata,
    Sample,
};
use crate::{FOCUS_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use crate::pipeline::EngineState;

/// The external inference backend.
///
/// Implementations receive features in the descriptor's order and return one
/// probability per known label.
pub trait Classifier {
    fn descriptor(&self) -> &ModelDescriptor;

    fn predict(&mut self, features: &[f64]) -> Result<ClassProbabilities, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn descriptor(&self) -> &ModelDescriptor {
        (**self).descriptor()
    }

    fn predict(&mut self, features: &[f64]) -> Result<ClassProbabilities, ClassifierError> {
        (**self).predict(features)
    }
}

/// Classifier backed by a closure
pub struct FnClassifier<F> {
    descriptor: ModelDescriptor,
    predict: F,
}

impl<F> FnClassifier<F>
where
    F: FnMut(&[f64]) -> Result<ClassProbabilities, ClassifierError>,
{
    pub fn new(descriptor: ModelDescriptor, predict: F) -> Self {
        Self {
            descriptor,
            predict,
        }
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: FnMut(&[f64]) -> Result<ClassProbabilities, ClassifierError>,
{
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn predict(&mut self, features: &[f64]) -> Result<ClassProbabilities, ClassifierError> {
        (self.predict)(features)
    }
}

/// Real-time focus estimator for one subject
pub struct FocusEngine<C: Classifier> {
    engine_id: String,
    pipeline: SignalPipeline,
    fusion: ScoreFusion,
    classifier: C,
    /// Class order of the classifier output, when the descriptor lists it
    class_labels: Option<Vec<FocusLabel>>,
    behavior_score: Option<f64>,
    last_result: Option<FocusResult>,
    subscribers: Vec<Sender<FocusResult>>,
}

impl<C: Classifier> FocusEngine<C> {
    /// Create an engine; the descriptor's feature names must match a known schema
    pub fn new(config: FocusConfig, classifier: C) -> Result<Self, FocusError> {
        let descriptor = classifier.descriptor();
        let schema = descriptor.schema()?;
        let class_labels = descriptor.class_labels()?;
        let fusion = ScoreFusion::from_config(&config);
        let pipeline = SignalPipeline::new(config, schema)?;
        let engine_id = Uuid::new_v4().to_string();

        info!(
            engine_id = %engine_id,
            model_id = %descriptor.id,
            schema = ?schema,
            strategy = fusion.strategy_name(),
            "focus engine created"
        );

        Ok(Self {
            engine_id,
            pipeline,
            fusion,
            classifier,
            class_labels,
            behavior_score: None,
            last_result: None,
            subscribers: Vec::new(),
        })
    }

    /// Ingest a heart-rate sample without motion data
    pub fn ingest(
        &mut self,
        heart_rate_bpm: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<FocusResult>, FocusError> {
        self.ingest_with_motion(heart_rate_bpm, timestamp, 0.0)
    }

    /// Ingest a sample and run inference when the cadence fires.
    ///
    /// Returns `Ok(None)` while collecting, for rejected samples and for
    /// windows with too few valid intervals. Only classifier failures are
    /// errors; they leave the smoothing memory and baselines untouched.
    pub fn ingest_with_motion(
        &mut self,
        heart_rate_bpm: f64,
        timestamp: DateTime<Utc>,
        motion_g: f64,
    ) -> Result<Option<FocusResult>, FocusError> {
        let sample = Sample::new(timestamp, heart_rate_bpm).with_motion(motion_g);
        let cycle = match self.pipeline.push(sample) {
            Ok(Some(cycle)) => cycle,
            Ok(None) => return Ok(None),
            Err(FocusError::InvalidInput(reason)) => {
                warn!(%reason, "dropping sample");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let result = self.infer(&cycle).map_err(|e| {
            warn!(error = %e, timestamp = %cycle.timestamp, "classifier failed");
            e
        })?;

        self.pipeline.commit(&cycle);
        self.publish(&result);
        self.last_result = Some(result.clone());
        Ok(Some(result))
    }

    fn infer(&mut self, cycle: &PreparedCycle) -> Result<FocusResult, FocusError> {
        let features = cycle.features.as_slice();
        let expected = self.classifier.descriptor().feature_names.len();
        if features.len() != expected {
            return Err(FocusError::InvalidInput(format!(
                "feature vector has {} values, model expects {expected}",
                features.len()
            )));
        }

        let output = self.classifier.predict(features)?;
        let probabilities = self.align_classes(output)?;
        let fused = self.fusion.fuse(&probabilities, self.behavior_score)?;

        debug!(
            dominant = %fused.dominant,
            raw = fused.raw_score,
            score = fused.score,
            "inference cycle complete"
        );

        let descriptor = self.classifier.descriptor();
        Ok(FocusResult {
            timestamp: cycle.timestamp,
            dominant_label: fused.dominant,
            focus_score: fused.score,
            raw_score: fused.raw_score,
            confidence: fused.confidence,
            probabilities,
            features: cycle.features.clone(),
            quality_score: cycle.quality_score,
            valid_intervals: cycle.valid_intervals,
            focus_level: fused.level,
            baseline: cycle.baseline,
            model: ModelMetadata {
                model_id: descriptor.id.clone(),
                checksum: descriptor.checksum.clone(),
                feature_schema: self.pipeline.schema(),
                strategy: self.fusion.strategy_name().to_string(),
                engine_id: self.engine_id.clone(),
                producer: PRODUCER_NAME.to_string(),
                version: FOCUS_VERSION.to_string(),
            },
        })
    }

    /// Drop probabilities for labels the descriptor does not declare
    fn align_classes(
        &self,
        output: ClassProbabilities,
    ) -> Result<ClassProbabilities, ClassifierError> {
        let Some(labels) = &self.class_labels else {
            return Ok(output);
        };
        let aligned = ClassProbabilities::from_pairs(labels.iter().map(|l| (*l, output.get(*l))));
        if aligned.sum() <= 0.0 && output.sum() > 0.0 {
            return Err(ClassifierError::MalformedOutput(
                "classifier output covers none of the declared classes".to_string(),
            ));
        }
        Ok(aligned)
    }

    fn publish(&mut self, result: &FocusResult) {
        self.subscribers.retain(|tx| tx.send(result.clone()).is_ok());
    }

    /// Receive every subsequent result in order
    pub fn subscribe(&mut self) -> Receiver<FocusResult> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> EngineState {
        self.pipeline.state()
    }

    pub fn last_result(&self) -> Option<&FocusResult> {
        self.last_result.as_ref()
    }

    /// Return to Idle: clears the window, baseline history and smoothing
    /// memory. Learned baselines survive.
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.fusion.reset();
        self.last_result = None;
        info!(engine_id = %self.engine_id, "engine reset");
    }

    /// Behaviour score (0-1) for the dual-modality strategy
    pub fn set_behavior_score(&mut self, score: f64) -> Result<(), FocusError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(FocusError::InvalidInput(format!(
                "behavior score {score} outside [0, 1]"
            )));
        }
        self.behavior_score = Some(score);
        Ok(())
    }

    pub fn clear_behavior_score(&mut self) {
        self.behavior_score = None;
    }

    pub fn behavior_score(&self) -> Option<f64> {
        self.behavior_score
    }

    /// Persist the learned baselines as JSON
    pub fn save_baseline(&self) -> Result<String, FocusError> {
        self.pipeline.baseline().to_json()
    }

    pub fn load_baseline(&mut self, json: &str) -> Result<(), FocusError> {
        self.pipeline.baseline_mut().load_json(json)?;
        info!(engine_id = %self.engine_id, "baseline loaded");
        Ok(())
    }

    pub fn reset_baseline_to_population(&mut self) {
        self.pipeline.baseline_mut().reset_to_population();
        info!(engine_id = %self.engine_id, "baseline reset to population defaults");
    }

    /// Recalibrate both baselines now; returns true if either changed
    pub fn force_baseline_update(&mut self, at: DateTime<Utc>) -> bool {
        self.pipeline.baseline_mut().force_update(at)
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.classifier.descriptor()
    }

    pub fn schema(&self) -> FeatureSchema {
        self.pipeline.schema()
    }

    pub fn config(&self) -> &FocusConfig {
        self.pipeline.config()
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }
}
