//! End-to-end scenarios through the public engine API

use chrono::{DateTime, Duration, TimeZone, Utc};
use synheart_focus::{
    ClassProbabilities, ClassifierError, EngineState, FeatureSchema, FnClassifier, FocusConfig,
    FocusEngine, FocusLabel, ModelDescriptor,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap()
}

fn scripted(
    probs: ClassProbabilities,
) -> FnClassifier<impl FnMut(&[f64]) -> Result<ClassProbabilities, ClassifierError>> {
    let descriptor = ModelDescriptor::for_schema("focus-hrv24", "sha256:test", FeatureSchema::Hrv24)
        .with_class_names(&FocusLabel::ALL);
    FnClassifier::new(descriptor, move |features: &[f64]| {
        assert_eq!(features.len(), 24);
        Ok(probs)
    })
}

fn mostly_focused() -> ClassProbabilities {
    ClassProbabilities::from_pairs([
        (FocusLabel::Focused, 0.9),
        (FocusLabel::Bored, 0.05),
        (FocusLabel::Anxious, 0.03),
        (FocusLabel::Overload, 0.02),
    ])
}

#[test]
fn test_constant_heart_rate_yields_single_result_at_window_span() {
    let mut engine = FocusEngine::new(FocusConfig::default(), scripted(mostly_focused())).unwrap();

    let mut results = Vec::new();
    for s in 0..65 {
        if let Some(result) = engine.ingest(70.0, t0() + Duration::seconds(s)).unwrap() {
            results.push(result);
        }
    }

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.timestamp, t0() + Duration::seconds(60));

    let mean_rr = result.features.get("mean_rr").unwrap();
    assert!((mean_rr - 60_000.0 / 70.0).abs() < 1e-3, "mean_rr = {mean_rr}");
    assert!(result.features.get("std_rr").unwrap().abs() < 1e-9);
    assert!(result.features.get("rmssd").unwrap().abs() < 1e-9);
    assert!(result.focus_score >= 0.0 && result.focus_score <= 100.0);
}

#[test]
fn test_excess_motion_suppresses_results() {
    let mut engine = FocusEngine::new(FocusConfig::default(), scripted(mostly_focused())).unwrap();

    for s in 0..=90 {
        let result = engine
            .ingest_with_motion(70.0, t0() + Duration::seconds(s), 3.0)
            .unwrap();
        assert!(result.is_none());
    }
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(engine.last_result().is_none());
}

#[test]
fn test_probability_banding_score() {
    let mut engine = FocusEngine::new(FocusConfig::default(), scripted(mostly_focused())).unwrap();

    let mut result = None;
    for s in 0..=60 {
        result = engine.ingest(70.0, t0() + Duration::seconds(s)).unwrap().or(result);
    }
    let result = result.unwrap();

    assert_eq!(result.dominant_label, FocusLabel::Focused);
    assert!((result.confidence - 0.9).abs() < 1e-12);
    assert!((result.raw_score - 97.0).abs() < 1e-9);
    assert!((result.probabilities.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn test_result_json_shape() {
    let mut engine = FocusEngine::new(FocusConfig::default(), scripted(mostly_focused())).unwrap();
    let rx = engine.subscribe();

    for s in 0..=60 {
        engine.ingest(70.0, t0() + Duration::seconds(s)).unwrap();
    }
    let result = rx.try_recv().unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["dominant_label"], "focused");
    assert_eq!(value["probabilities"]["focused"], 0.9);
    assert_eq!(value["model"]["model_id"], "focus-hrv24");
    assert_eq!(value["model"]["producer"], "synheart-focus");
    assert!(value.get("focus_level").is_none());
    assert_eq!(value["baseline"]["hr_state"], "personalizing");
}
