use async_trait::async_trait;
use tracing_test::traced_test;
use uuid::Uuid;

use vigil_detection::{
	CandidateProvider, DetectionConfig, DetectionError, DetectionService, ProviderError,
};
use vigil_match_engine::{BatchItem, MatchPool, PoolConfig};
use vigil_matcher::{Candidate, RiskLevel, ShapeError, DESCRIPTOR_DIMENSIONS};

struct StubProvider(Vec<Candidate>);

#[async_trait]
impl CandidateProvider for StubProvider {
	async fn load_candidates(&self) -> Result<Vec<Candidate>, ProviderError> {
		Ok(self.0.clone())
	}
}

struct FailingProvider;

#[async_trait]
impl CandidateProvider for FailingProvider {
	async fn load_candidates(&self) -> Result<Vec<Candidate>, ProviderError> {
		Err("database is down".into())
	}
}

fn zero_descriptor() -> Vec<f64> {
	vec![0.0; DESCRIPTOR_DIMENSIONS]
}

fn descriptor_at(first_dim: f64) -> Vec<f64> {
	let mut descriptor = vec![0.0; DESCRIPTOR_DIMENSIONS];
	descriptor[0] = first_dim;
	descriptor
}

fn candidate(name: &str, first_dim: f64) -> Candidate {
	Candidate {
		id: Uuid::new_v4(),
		name: name.to_string(),
		crime_type: "fraud".to_string(),
		risk_level: RiskLevel::Medium,
		image_url: Some(format!("/images/{name}.jpg")),
		descriptor: Some(descriptor_at(first_dim)),
	}
}

fn service_with(candidates: Vec<Candidate>) -> DetectionService<StubProvider> {
	DetectionService::new(
		StubProvider(candidates),
		MatchPool::new(PoolConfig::default()),
		DetectionConfig::default(),
	)
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn direct_path_finds_the_best_match() {
	let service = service_with(vec![candidate("close", 0.3), candidate("closer", 0.1)]);

	let response = service.detect_face(zero_descriptor(), false).await.unwrap();

	assert!(response.matched);
	let person = response.result.unwrap();
	assert_eq!(person.name, "closer");
	assert!(person.confidence > 80.0);

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn worker_path_agrees_with_the_direct_path() {
	let candidates = vec![candidate("exact", 0.0), candidate("far", 0.9)];
	let service = service_with(candidates);

	let direct = service.detect_face(zero_descriptor(), false).await.unwrap();
	let pooled = service.detect_face(zero_descriptor(), true).await.unwrap();

	assert_eq!(direct, pooled);
	assert_eq!(pooled.result.unwrap().confidence, 100.0);

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn malformed_descriptor_is_rejected_before_any_work() {
	let service = service_with(vec![candidate("anyone", 0.1)]);

	let err = service.detect_face(vec![0.0; 127], false).await.unwrap_err();

	assert!(matches!(
		err,
		DetectionError::Shape(ShapeError::Dimensions { got: 127 })
	));
	assert_eq!(
		err.to_string(),
		"Descriptor must have 128 dimensions, got 127"
	);

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn empty_snapshot_is_a_successful_no_match() {
	let service = service_with(Vec::new());

	let response = service.detect_face(zero_descriptor(), true).await.unwrap();

	assert!(!response.matched);
	assert_eq!(response.result, None);
	assert_eq!(response.message.as_deref(), Some("No candidates in database"));

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn nothing_under_threshold_is_a_no_match() {
	let service = service_with(vec![candidate("far", 0.8)]);

	let response = service.detect_face(zero_descriptor(), false).await.unwrap();

	assert!(!response.matched);
	assert_eq!(response.message.as_deref(), Some("No match found"));

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn provider_failure_surfaces() {
	let service = DetectionService::new(
		FailingProvider,
		MatchPool::new(PoolConfig::default()),
		DetectionConfig::default(),
	);

	let err = service.detect_face(zero_descriptor(), false).await.unwrap_err();

	assert!(matches!(err, DetectionError::Provider(_)));
	assert!(err.to_string().contains("database is down"));

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn pool_failure_falls_back_to_direct_matching() {
	let service = service_with(vec![candidate("resilient", 0.2)]);

	// Kill the pool path; submission now fails outright.
	service.shutdown().await;

	let response = service.detect_face(zero_descriptor(), true).await.unwrap();

	assert!(response.matched);
	assert_eq!(response.result.unwrap().name, "resilient");
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn batch_validation_cites_the_offending_index() {
	let service = service_with(vec![candidate("anyone", 0.1)]);

	let items = vec![
		BatchItem {
			index: 0,
			descriptor: zero_descriptor(),
		},
		BatchItem {
			index: 1,
			descriptor: vec![0.0; 3],
		},
	];

	let err = service.detect_batch(items).await.unwrap_err();

	assert!(matches!(
		err,
		DetectionError::BatchItemShape { index: 1, .. }
	));
	assert!(err.to_string().starts_with("invalid descriptor at index 1"));

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn batch_entries_mirror_the_submitted_items() {
	let service = service_with(vec![candidate("known", 0.1)]);

	let items = vec![
		BatchItem {
			index: 0,
			descriptor: zero_descriptor(),
		},
		BatchItem {
			index: 1,
			descriptor: descriptor_at(3.0),
		},
	];

	let entries = service.detect_batch(items).await.unwrap();

	assert_eq!(entries.len(), 2);

	assert!(entries[0].success);
	assert_eq!(entries[0].result.as_ref().unwrap().name, "known");

	assert!(entries[1].success);
	assert_eq!(entries[1].result, None);
	assert_eq!(entries[1].error, None);

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn similarity_listing_is_sorted_and_capped() {
	let service = DetectionService::new(
		StubProvider(vec![
			candidate("third", 0.5),
			candidate("first", 0.1),
			candidate("second", 0.3),
			candidate("nowhere", 0.9),
		]),
		MatchPool::new(PoolConfig::default()),
		DetectionConfig {
			max_results: 2,
			..DetectionConfig::default()
		},
	);

	let hits = service.find_similar(zero_descriptor()).await.unwrap();

	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].candidate.name, "first");
	assert_eq!(hits[1].candidate.name, "second");

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn status_passthrough_reports_the_pool_shape() {
	let service = service_with(Vec::new());

	let status = service.worker_status().await.unwrap();

	assert_eq!(status.total_workers, 2);
	assert_eq!(status.available_workers, 2);
	assert_eq!(status.queued_requests, 0);
	assert_eq!(status.pending_requests, 0);

	service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn responses_serialize_with_the_api_field_names() {
	let service = service_with(vec![candidate("serialized", 0.0)]);

	let response = service.detect_face(zero_descriptor(), false).await.unwrap();
	let json = serde_json::to_value(&response).unwrap();

	assert_eq!(json["match"], true);
	assert_eq!(json["result"]["name"], "serialized");
	assert_eq!(json["result"]["risk_level"], "medium");
	assert_eq!(json["result"]["confidence"], 100.0);
	assert!(json.get("message").is_none());

	service.shutdown().await;
}
