use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use buildmyskincare::analyzer::{has_changed, AnalysisState, RoutineAnalyzer};
use buildmyskincare::llm::{GenerationRequest, TextGenerator, ROUTINE_ANALYSIS_CONFIG};
use buildmyskincare::{Product, Result, RoutineRecord, RoutineStore, SkincareError, SqliteRoutineStore};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

/// Generator that records every request and replays a fixed response.
struct RecordingGenerator {
    response: Result<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    fn new(response: Result<String>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone()
    }
}

async fn store_with(dir: &TempDir, record: RoutineRecord) -> SqliteRoutineStore {
    let store = SqliteRoutineStore::new(dir.path().join("community_builds.db"));
    store.insert(record).await.expect("Failed to insert routine");
    store
}

fn fresh_routine() -> RoutineRecord {
    let mut record = RoutineRecord::new("Morning basics");
    record.day_products = vec![
        Product {
            id: "p1".to_string(),
            brand: "CeraVe".to_string(),
            name: "Hydrating Cleanser".to_string(),
            product_type: "cleanser".to_string(),
            ingredients: vec!["ceramides".to_string()],
        },
        Product {
            id: "p2".to_string(),
            brand: "EltaMD".to_string(),
            name: "UV Clear".to_string(),
            product_type: "sunscreen".to_string(),
            ingredients: vec![],
        },
    ];
    record.skin_type = vec!["combination".to_string()];
    record.skin_concerns = vec!["acne".to_string()];
    record.climate = vec!["humid".to_string()];
    record
}

#[tokio::test]
async fn test_first_analysis_persists_snapshot_and_result() {
    let dir = TempDir::new().unwrap();
    let record = fresh_routine();
    let id = record.shareable_id.clone();
    let expected_snapshot = record.snapshot();
    let store = store_with(&dir, record).await;

    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Ok(fixture("fenced_analysis.txt"))),
    );

    let before = Utc::now();
    let state = analyzer.analyze(&id, false).await;
    let after = Utc::now();

    let analysis = match state {
        AnalysisState::Completed { analysis } => analysis,
        other => panic!("expected completed analysis, got {:?}", other),
    };
    assert_eq!(analysis.summary, "Balanced routine; add a moisturizer at night.");
    assert_eq!(analysis.scientific_sources.as_ref().map(Vec::len), Some(1));

    let requests = analyzer.generator().requests();
    assert_eq!(requests.len(), 1, "exactly one generation call per analysis");
    assert_eq!(requests[0].config, ROUTINE_ANALYSIS_CONFIG);
    assert!(requests[0].prompt.contains("Climate: humid"));

    let stored = analyzer.store().fetch_one(&id).await.unwrap();
    let record = stored.analysis.expect("analysis should be persisted");
    assert_eq!(record.routine_snapshot, expected_snapshot);
    assert_eq!(record.analysis, analysis);
    assert!(record.timestamp >= before && record.timestamp <= after);
}

#[tokio::test]
async fn test_legacy_routine_requires_confirmation() {
    let dir = TempDir::new().unwrap();
    let record: RoutineRecord = serde_json::from_str(&fixture("legacy_routine.json")).unwrap();
    let id = record.shareable_id.clone();

    // Ingredient lists differ from the stored snapshot, but only identity counts.
    assert!(!has_changed(&record.snapshot(), record.previous_snapshot()));
    let previous_timestamp = record.analysis.as_ref().unwrap().timestamp;

    let store = store_with(&dir, record).await;
    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Ok(fixture("fenced_analysis.txt"))),
    );

    let mut run = analyzer.begin(id.clone());
    match run.request().await {
        AnalysisState::AwaitingConfirmation { last_analyzed } => {
            assert_eq!(*last_analyzed, previous_timestamp)
        }
        other => panic!("expected confirmation gate, got {:?}", other),
    }
    assert!(analyzer.generator().requests().is_empty());

    assert_eq!(run.confirm().await.name(), "completed");
    assert_eq!(analyzer.generator().requests().len(), 1);

    let stored = analyzer.store().fetch_one(&id).await.unwrap();
    assert!(stored.analysis.unwrap().timestamp > previous_timestamp);
}

#[tokio::test]
async fn test_unconfirmed_rerun_makes_no_service_call() {
    let dir = TempDir::new().unwrap();
    let record: RoutineRecord = serde_json::from_str(&fixture("legacy_routine.json")).unwrap();
    let id = record.shareable_id.clone();
    let store = store_with(&dir, record).await;
    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Ok(fixture("fenced_analysis.txt"))),
    );

    let state = analyzer.analyze(&id, false).await;
    assert_eq!(state.name(), "awaiting_confirmation");
    assert!(state.analysis().is_none());
    assert!(analyzer.generator().requests().is_empty());
}

#[tokio::test]
async fn test_edited_routine_skips_confirmation() {
    let dir = TempDir::new().unwrap();
    let mut record: RoutineRecord = serde_json::from_str(&fixture("legacy_routine.json")).unwrap();
    record.night_products.reverse();
    record.night_products.push(Product {
        id: "p4".to_string(),
        brand: "Aquaphor".to_string(),
        name: "Healing Ointment".to_string(),
        product_type: "occlusive".to_string(),
        ingredients: vec![],
    });
    let id = record.shareable_id.clone();
    let store = store_with(&dir, record).await;
    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Ok(fixture("fenced_analysis.txt"))),
    );

    assert_eq!(analyzer.analyze(&id, false).await.name(), "completed");
    assert_eq!(analyzer.generator().requests().len(), 1);
}

#[tokio::test]
async fn test_schema_failure_keeps_previous_analysis() {
    let dir = TempDir::new().unwrap();
    let record: RoutineRecord = serde_json::from_str(&fixture("legacy_routine.json")).unwrap();
    let id = record.shareable_id.clone();
    let previous = record.analysis.clone();
    let store = store_with(&dir, record).await;

    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Ok(
            r#"{"summary": "incomplete", "routineAnalysis": {}}"#.to_string(),
        )),
    );

    let state = analyzer.analyze(&id, true).await;
    match &state {
        AnalysisState::Failed { error, analysis } => {
            assert!(matches!(error, SkincareError::InvalidAnalysisSchema(_)));
            assert!(analysis.summary.starts_with("Analysis failed"));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let stored = analyzer.store().fetch_one(&id).await.unwrap();
    assert_eq!(stored.analysis, previous);
}

#[tokio::test]
async fn test_service_failure_shows_generic_message() {
    let dir = TempDir::new().unwrap();
    let record = fresh_routine();
    let id = record.shareable_id.clone();
    let store = store_with(&dir, record).await;

    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Err(SkincareError::ServiceInvocation(
            "LLM API error: 429 Too Many Requests from gemini".to_string(),
        ))),
    );

    let state = analyzer.analyze(&id, false).await;
    let analysis = state.analysis().expect("failure placeholder");
    assert_eq!(
        analysis.summary,
        SkincareError::ServiceInvocation(String::new()).user_summary()
    );
    assert!(!analysis.summary.contains("429"));
    assert!(analysis.routine_analysis.day_products.products.is_empty());
    assert_eq!(analyzer.generator().requests().len(), 1, "no retry");

    let stored = analyzer.store().fetch_one(&id).await.unwrap();
    assert!(stored.analysis.is_none());
}

#[tokio::test]
async fn test_unparseable_response_is_format_error() {
    let dir = TempDir::new().unwrap();
    let record = fresh_routine();
    let id = record.shareable_id.clone();
    let store = store_with(&dir, record).await;

    let analyzer = RoutineAnalyzer::new(
        store,
        RecordingGenerator::new(Ok("I'm sorry, I can't help with that.".to_string())),
    );

    match analyzer.analyze(&id, false).await {
        AnalysisState::Failed { error, .. } => {
            assert_eq!(error.kind(), "invalid_response_format")
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_legacy_import_normalizes_comments() {
    let dir = TempDir::new().unwrap();
    let record: RoutineRecord = serde_json::from_str(&fixture("legacy_routine.json")).unwrap();
    let id = record.shareable_id.clone();
    let store = store_with(&dir, record).await;

    let stored = store.fetch_one(&id).await.unwrap();
    let ids: Vec<&str> = stored.comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c000000000001", "c000000000002"]);
    assert_eq!(
        stored.comments[0].avatar_url.as_deref(),
        Some("https://cdn.example.com/rin.png")
    );
    assert!(stored.climate.is_empty());
}
