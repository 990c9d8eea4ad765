//! End-to-end tests for the partspec pipeline.
//!
//! These run whole descriptions through extraction, arbitration and
//! validation, with the language-model backend replaced by scripted doubles.

use std::sync::Arc;
use std::time::Duration;

use partspec_config::AppConfig;
use partspec_core::{
    Anchor, Error, ExtractionError, ExtractionMode, GeometryRule, Message, ParameterSet,
    Placement, Provider, ProviderError, ProviderRequest, ProviderResponse, ShapeArchetype, Source,
};
use partspec_extract::{LlmExtractor, RuleExtractor, normalize};
use partspec_geometry::ValidatedParameterSet;
use partspec_pipeline::{Pipeline, Processed};

// ── Mock Providers ───────────────────────────────────────────────────────

/// Replies with the same text to every request and counts calls.
struct ScriptedProvider {
    reply: String,
    calls: std::sync::Mutex<usize>,
}

impl ScriptedProvider {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            calls: std::sync::Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Ok(ProviderResponse {
            message: Message::assistant(self.reply.clone()),
            usage: None,
            model: request.model,
        })
    }
}

/// Never answers.
struct StalledProvider;

#[async_trait::async_trait]
impl Provider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

fn rule_only() -> Pipeline {
    Pipeline::new(RuleExtractor::new())
}

fn with_backend(provider: Arc<dyn Provider>) -> Pipeline {
    rule_only().with_llm(LlmExtractor::new(provider, "e2e-model"))
}

async fn validated(pipeline: &Pipeline, text: &str) -> ValidatedParameterSet {
    match pipeline.process(text, ExtractionMode::Auto, true).await {
        Ok(Processed::Validated(v)) => v,
        other => panic!("expected a validated set for {text:?}, got {other:?}"),
    }
}

const SCENARIO_A: &str = "square plate 150mm by 150mm with center hole 30mm diameter";
const SCENARIO_B: &str =
    "rectangular plate 200mm by 100mm with 4 holes 10mm diameter at 20mm from corners";
const SCENARIO_C: &str = "circular flange outer diameter 200mm inner diameter 100mm with 8 bolt holes 15mm diameter on 150mm pitch circle";

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_square_plate_with_center_hole() {
    let set = validated(&rule_only(), SCENARIO_A).await;

    assert_eq!(set.archetype, ShapeArchetype::SquarePlate);
    assert_eq!(set.dimensions.len(), 1);
    assert_eq!(set.dimension("side"), Some(150.0));
    assert_eq!(set.holes.len(), 1);
    assert_eq!(set.holes[0].diameter, 30.0);
    assert_eq!(
        set.holes[0].placement,
        Placement::Offset {
            from: Anchor::Center,
            dx: 0.0,
            dy: 0.0
        }
    );
    assert_eq!(set.metadata.raw_text, SCENARIO_A);
}

#[tokio::test]
async fn scenario_b_rectangular_plate_with_corner_holes() {
    let set = validated(&rule_only(), SCENARIO_B).await;

    assert_eq!(set.archetype, ShapeArchetype::RectangularPlate);
    assert_eq!(set.dimension("width"), Some(200.0));
    assert_eq!(set.dimension("height"), Some(100.0));
    assert_eq!(set.holes.len(), 4);

    let anchors: Vec<Anchor> = set
        .holes
        .iter()
        .map(|h| match h.placement {
            Placement::Offset { from, dx, dy } => {
                assert_eq!((dx, dy), (20.0, 20.0));
                from
            }
            Placement::Polar { .. } => panic!("corner holes are offset-placed"),
        })
        .collect();
    assert_eq!(anchors, Anchor::CORNERS.to_vec());
    assert!(set.holes.iter().all(|h| h.diameter == 10.0));
}

#[tokio::test]
async fn scenario_c_flange_and_inverted_diameters() {
    let set = validated(&rule_only(), SCENARIO_C).await;
    assert_eq!(set.archetype, ShapeArchetype::CircularFlange);
    assert_eq!(set.holes.len(), 8);
    assert_eq!(set.groups[0].count, 8);

    let inverted = SCENARIO_C.replace("inner diameter 100mm", "inner diameter 250mm");
    let err = rule_only()
        .process(&inverted, ExtractionMode::Auto, true)
        .await
        .unwrap_err();
    let Error::Geometry(geometry) = err else {
        panic!("expected a geometry error, got {err:?}");
    };
    assert_eq!(geometry.rule, GeometryRule::FlangeGeometry);
    assert!(geometry.reason.contains("inner ≥ outer"), "{}", geometry.reason);
}

#[tokio::test]
async fn scenario_d_malformed_model_output_falls_back_to_rules() {
    let provider = ScriptedProvider::new(r#"Sure! {"archetype": "square_plate", "dimensions": {"side": 150"#);
    let pipeline = with_backend(provider.clone());

    let set = validated(&pipeline, SCENARIO_A).await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(set.metadata.source, Source::RuleBased);
    assert_eq!(set.dimension("side"), Some(150.0));

    let err = pipeline
        .process(SCENARIO_A, ExtractionMode::ForceLlm, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::ForcedUnavailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stalled_backend_times_out_to_rule_candidate() {
    let llm = LlmExtractor::new(Arc::new(StalledProvider), "e2e-model")
        .with_timeout(Duration::from_secs(2));
    let pipeline = rule_only().with_llm(llm);

    let set = validated(&pipeline, SCENARIO_B).await;
    assert_eq!(set.metadata.source, Source::RuleBased);
}

#[tokio::test]
async fn llm_fills_what_the_rules_missed() {
    let provider = ScriptedProvider::new(
        r#"```json
{"archetype": "rectangular_plate",
 "dimensions": {"width": 200, "height": 100, "thickness": "0.25in"},
 "hole_patterns": [{"layout": "corners", "count": 4, "diameter": 10, "offset": 20}]}
```"#,
    );
    let pipeline = with_backend(provider);

    let set = validated(&pipeline, "rectangular plate 200mm wide, 100mm tall, a quarter inch thick, four 10mm holes 20mm in from the corners").await;
    assert_eq!(set.metadata.source, Source::Merged);
    assert_eq!(set.dimension("thickness"), Some(6.35));
    assert_eq!(set.holes.len(), 4);
}

#[tokio::test]
async fn llm_wins_archetype_conflict_when_more_confident() {
    let provider = ScriptedProvider::new(
        r#"{"archetype": "circular_flange", "dimensions": {"outer_diameter": 120, "inner_diameter": 40}}"#,
    );
    let pipeline = with_backend(provider);

    // The rules see a plate but capture no dimensions.
    let set = validated(&pipeline, "a round plate, 120mm across with a 40mm bore").await;
    assert_eq!(set.archetype, ShapeArchetype::CircularFlange);
    assert_eq!(set.metadata.source, Source::Llm);
}

// ── Properties ───────────────────────────────────────────────────────────

fn without_text(mut set: ParameterSet) -> ParameterSet {
    set.metadata.raw_text.clear();
    set
}

#[test]
fn rule_extraction_is_idempotent_over_normalization() {
    let extractor = RuleExtractor::new();
    for text in [
        SCENARIO_A,
        SCENARIO_B,
        SCENARIO_C,
        "rectangular plate 20 x 10cm, 0.25in thick with center hole 1in diameter",
        "circular flange OD 8in ID 4in with six 0.5in bolt holes on 6in PCD",
    ] {
        let original = extractor.extract(text).parameters.map(without_text);
        let normalized = extractor
            .extract(&normalize(text).text)
            .parameters
            .map(without_text);
        assert!(original.is_some(), "{text}");
        assert_eq!(original, normalized, "{text}");
    }
}

#[test]
fn rule_extraction_is_deterministic() {
    let extractor = RuleExtractor::new();
    for text in [SCENARIO_A, SCENARIO_B, SCENARIO_C] {
        let first = extractor.extract(text);
        for _ in 0..10 {
            assert_eq!(extractor.extract(text), first);
        }
    }
}

#[tokio::test]
async fn corner_offset_bound_decides_plate_validity() {
    let pipeline = rule_only();
    let text = |offset: u32| {
        format!("rectangular plate 200mm by 100mm with 4 holes 10mm diameter at {offset}mm from corners")
    };

    for offset in [15, 20, 30, 40] {
        assert!(
            pipeline.process(&text(offset), ExtractionMode::Auto, true).await.is_ok(),
            "offset {offset}"
        );
    }
    for offset in [50, 60, 80] {
        let err = pipeline
            .process(&text(offset), ExtractionMode::Auto, true)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Geometry(g) if g.rule == GeometryRule::PlateBounds),
            "offset {offset}: {err}"
        );
    }
}

#[tokio::test]
async fn flanges_reject_inner_not_below_outer() {
    let pipeline = rule_only();
    for inner in [200, 250, 300] {
        let text = SCENARIO_C.replace("inner diameter 100mm", &format!("inner diameter {inner}mm"));
        let err = pipeline
            .process(&text, ExtractionMode::Auto, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inner ≥ outer"), "inner {inner}: {err}");
    }
}

#[tokio::test]
async fn validated_json_roundtrips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flange.json");

    let set = validated(&rule_only(), SCENARIO_C).await;
    std::fs::write(&path, set.to_json().unwrap()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let parsed = ValidatedParameterSet::from_json(&content).unwrap();
    assert_eq!(parsed, set);
}

#[tokio::test]
async fn interchange_form_matches_documented_shape() {
    let set = validated(&rule_only(), SCENARIO_A).await;
    let value: serde_json::Value = serde_json::from_str(&set.to_json().unwrap()).unwrap();

    assert_eq!(value["archetype"], "square_plate");
    assert_eq!(value["dimensions"]["side"], 150.0);
    assert_eq!(value["holes"][0]["diameter"], 30.0);
    assert_eq!(value["holes"][0]["placement"]["type"], "offset");
    assert!(value["holes"][0]["group_id"].is_null());
    assert_eq!(value["metadata"]["source"], "rule-based");
    assert_eq!(value["metadata"]["confidence"], 1.0);
    assert_eq!(value["metadata"]["raw_text"], SCENARIO_A);
}

#[tokio::test]
async fn config_file_controls_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "api_key = \"sk-test\"\n\n[extraction]\nmode = \"force_rule\"\nllm_enabled = false\nstrict_units = true\n",
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    let pipeline = Pipeline::from_config(&config);
    assert!(!pipeline.has_llm());

    let mode = config.extraction.mode;
    assert_eq!(mode, ExtractionMode::ForceRule);
    assert!(pipeline.process(SCENARIO_A, mode, true).await.is_ok());

    // Strict units turn a unit-less description into no candidate at all.
    let err = pipeline
        .process("square plate 150 by 150", mode, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
}
