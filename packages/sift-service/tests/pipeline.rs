use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use sift_domain::QuestionType;
use sift_service::{
	Backend, ClassificationMethod, ClassifierStats, Diagnostic, Error, Outcome, QueryResponse,
	SiftService, Stores, build_answer_prompt,
};
use sift_storage::MemoryStore;
use sift_testkit::{
	CountingParents, FailingEmbedding, FailingKeywords, FailingRerank, FixedRerank,
	PendingEmbedding, ScriptedLlm, SlowEmbedding, default_providers, fixture_records,
	fixture_service, fixture_store,
	fixtures::{OLED_BLACK_LEVELS, OLED_PARENT},
	llm_provider, service_with, test_config,
};

fn ids(response: &QueryResponse) -> Vec<String> {
	response.sources().iter().map(|candidate| candidate.chunk.id.clone()).collect()
}

#[tokio::test]
async fn short_value_question_uses_narrow_single_query_profile() {
	let service = fixture_service();
	let response = service
		.query("kFRET 값은?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert_eq!(response.classification.question_type, QuestionType::Simple);
	assert_eq!(response.classification.method, ClassificationMethod::Rule);
	assert_eq!(response.classification.tuning.fan_out_width, 30);
	assert!(!response.classification.tuning.multi_query_enabled);
	assert_eq!(response.queries, vec!["kFRET 값은?".to_string()]);
	assert_eq!(ids(&response)[0], "kfret-1");
	assert!(response.sources().len() <= 5);
}

#[tokio::test]
async fn gray_zone_comparison_consults_model_and_rewrites() {
	let llm = Arc::new(ScriptedLlm::new(
		Some(serde_json::json!({
			"type": "complex",
			"confidence": 0.9,
			"reasoning": "Compares two display technologies."
		})),
		Some(serde_json::json!({ "queries": ["OLED 특징", "QLED 특징"] })),
	));
	let mut providers = default_providers();

	providers.llm = llm.clone();

	let mut cfg = test_config();

	cfg.providers.llm = Some(llm_provider("classifier"));

	let stores = Stores::from_memory(Arc::new(fixture_store()));
	let service = SiftService::new(cfg, stores, providers);
	let stats = ClassifierStats::new();
	let response = service
		.query("OLED와 QLED의 차이는?", &CancellationToken::new(), Some(&stats))
		.await
		.expect("Query failed.");

	assert_eq!(response.classification.question_type, QuestionType::Complex);
	assert_eq!(response.classification.method, ClassificationMethod::Model);
	assert!((response.classification.confidence - 0.9).abs() < 1e-6);
	assert_eq!(response.classification.tuning.fan_out_width, 80);
	assert_eq!(response.queries, vec!["OLED와 QLED의 차이는?", "OLED 특징", "QLED 특징"]);
	assert_eq!(llm.count(), 2);
	assert!(response.has_evidence());

	let snapshot = stats.snapshot();

	assert_eq!(snapshot.total, 1);
	assert_eq!(snapshot.model_invoked, 1);
	assert_eq!(snapshot.model_adopted, 1);
	assert_eq!(snapshot.model_failed, 0);
}

#[tokio::test]
async fn failing_classifier_keeps_rule_result() {
	let mut providers = default_providers();

	providers.llm = Arc::new(ScriptedLlm::default());

	let mut cfg = test_config();

	cfg.providers.llm = Some(llm_provider("classifier"));

	let stores = Stores::from_memory(Arc::new(fixture_store()));
	let service = SiftService::new(cfg, stores, providers);
	let stats = ClassifierStats::new();
	let response = service
		.query("OLED와 QLED의 차이는?", &CancellationToken::new(), Some(&stats))
		.await
		.expect("Query failed.");

	assert_eq!(response.classification.question_type, QuestionType::Complex);
	assert_eq!(response.classification.method, ClassificationMethod::Rule);
	assert!(response.diagnostics.iter().any(|d| d.is_backend_unavailable(Backend::Llm)));
	assert_eq!(stats.snapshot().model_failed, 1);
	assert_eq!(response.queries, vec!["OLED와 QLED의 차이는?"]);
}

#[tokio::test]
async fn enumeration_returns_ranked_file_table() {
	let service = fixture_service();
	let response = service
		.query("List every OLED lifetime note", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert_eq!(response.classification.question_type, QuestionType::Exhaustive);
	assert!(matches!(response.outcome, Outcome::Files(_)));
	assert!(response.sources().is_empty());

	let files = response.files();

	assert_eq!(files[0].file_name, "oled.pdf");
	assert!(files[0].matching_chunk_count >= 2);
	assert!(files[0].page_numbers.contains(&1));
	assert!(files.windows(2).all(|pair| pair[0].aggregate_score >= pair[1].aggregate_score));
}

#[tokio::test]
async fn korean_enumeration_skips_passages() {
	let service = fixture_service();
	let response = service
		.query("모든 OLED 논문을 찾아줘", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert!(response.classification.is_exhaustive());
	assert!(!response.files().is_empty());
	assert!(response.sources().is_empty());
}

#[tokio::test]
async fn embedding_outage_degrades_to_lexical_retrieval() {
	let mut providers = default_providers();

	providers.embedding = Arc::new(FailingEmbedding);

	let service = service_with(Arc::new(fixture_store()), providers);
	let response = service
		.query("kFRET 값은?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert!(response.diagnostics.iter().any(|d| d.is_backend_unavailable(Backend::Embedding)));
	assert_eq!(ids(&response), vec!["kfret-1".to_string()]);
}

#[tokio::test]
async fn both_retrieval_paths_down_is_an_error() {
	let store = Arc::new(fixture_store());
	let mut providers = default_providers();

	providers.embedding = Arc::new(FailingEmbedding);

	let stores = Stores::new(store.clone(), Arc::new(FailingKeywords), store);
	let service = SiftService::new(test_config(), stores, providers);
	let err = service
		.query("kFRET 값은?", &CancellationToken::new(), None)
		.await
		.expect_err("Query should fail.");

	assert!(matches!(err, Error::BackendExhausted { .. }));
}

#[tokio::test]
async fn rewritten_queries_run_concurrently_within_the_limit() {
	let embedding = Arc::new(SlowEmbedding::new(Duration::from_millis(50)));
	let mut providers = default_providers();

	providers.embedding = embedding.clone();

	let service = service_with(Arc::new(fixture_store()), providers);
	let queries: Vec<String> =
		["OLED lifetime", "QLED emission", "OLED black levels", "kFRET value"]
			.into_iter()
			.map(String::from)
			.collect();
	let (merged, _) = service
		.retrieve_many(&queries, 30, &CancellationToken::new())
		.await
		.expect("Retrieval failed.");

	assert!(embedding.peak() > 1);
	assert!(embedding.peak() <= service.cfg.service.max_concurrency as usize);
	assert!(!merged.is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected() {
	let service = fixture_service();
	let err = service
		.query("   ", &CancellationToken::new(), None)
		.await
		.expect_err("Query should fail.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn cancelled_token_stops_before_work() {
	let service = fixture_service();
	let cancel = CancellationToken::new();

	cancel.cancel();

	let err = service.query("kFRET 값은?", &cancel, None).await.expect_err("Query should fail.");

	assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn cancellation_interrupts_a_hanging_backend() {
	let mut providers = default_providers();

	providers.embedding = Arc::new(PendingEmbedding);

	let service = service_with(Arc::new(fixture_store()), providers);
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(20)).await;

		trigger.cancel();
	});

	let query = service.query("kFRET 값은?", &cancel, None);
	let err = tokio::time::timeout(Duration::from_secs(5), query)
		.await
		.expect("Cancellation did not interrupt the query.")
		.expect_err("Query should fail.");

	assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn reranker_outage_passes_candidates_through() {
	let mut providers = default_providers();

	providers.rerank = Arc::new(FailingRerank);

	let service = service_with(Arc::new(fixture_store()), providers);
	let response = service
		.query("kFRET 값은?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert!(response.diagnostics.iter().any(|d| d.is_backend_unavailable(Backend::Rerank)));
	assert!(response.has_evidence());
	assert!(response.sources().iter().all(|c| (0.0..=1.0).contains(&c.score)));
}

#[tokio::test]
async fn malformed_rerank_scores_are_clipped_and_reported() {
	let mut providers = default_providers();

	providers.rerank = Arc::new(FixedRerank(vec![1.7, f32::NAN, 0.3]));

	let service = service_with(Arc::new(fixture_store()), providers);
	let response = service
		.query("kFRET 값은?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert!(
		response
			.diagnostics
			.iter()
			.any(|d| matches!(d, Diagnostic::MalformedScore { count } if *count > 0))
	);
	assert!(response.sources().iter().all(|c| c.score.is_finite() && c.score <= 1.0));
}

#[tokio::test]
async fn expansion_adds_parent_excerpt_and_caches_parent() {
	let records = fixture_records().into_iter().filter(|record| record.chunk.id != "oled-3");
	let store = Arc::new(MemoryStore::from_records(records).expect("Fixture corpus is invalid."));
	let parents = Arc::new(CountingParents::new(store.clone()));
	let stores = Stores::new(store.clone(), store, parents.clone());
	let mut cfg = test_config();

	cfg.expansion.partial_context_chars = 40;

	let service = SiftService::new(cfg, stores, default_providers());
	let cancel = CancellationToken::new();
	let question = "What limits OLED lifetime?";
	let first = service.query(question, &cancel, None).await.expect("Query failed.");
	let excerpt = first
		.sources()
		.iter()
		.find(|candidate| candidate.is_partial_parent)
		.expect("No parent excerpt was added.");

	assert_eq!(excerpt.chunk.id, "oled-parent#partial:oled-1");
	assert_eq!(excerpt.origin_chunk_id.as_deref(), Some("oled-1"));
	assert!(excerpt.chunk.text.contains("OLED lifetime depends on blue emitter degradation"));
	assert!(excerpt.chunk.text.chars().count() < OLED_PARENT.chars().count());
	assert_eq!(parents.count(), 1);

	service.query(question, &cancel, None).await.expect("Query failed.");

	assert_eq!(parents.count(), 1);
	assert_eq!(parents.distinct(), 1);
}

#[tokio::test]
async fn missing_parent_is_reported_not_fatal() {
	let service = fixture_service();
	let response = service
		.query("When does OLED burn-in appear?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert!(response.diagnostics.iter().any(|d| matches!(
		d,
		Diagnostic::ParentNotFound { parent_chunk_id } if parent_chunk_id == "missing-parent"
	)));
	assert!(ids(&response).contains(&"oled-3".to_string()));
}

#[tokio::test]
async fn duplicate_texts_are_returned_once() {
	let service = fixture_service();
	let response = service
		.query("Why do OLED panels reach perfect black levels?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");
	let copies = response
		.sources()
		.iter()
		.filter(|c| c.chunk.text == OLED_BLACK_LEVELS)
		.count();

	assert_eq!(copies, 1);
}

#[tokio::test]
async fn empty_corpus_yields_no_evidence() {
	let service = service_with(Arc::new(MemoryStore::default()), default_providers());
	let response = service
		.query("kFRET 값은?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert!(matches!(response.outcome, Outcome::NoEvidence));
	assert!(!response.has_evidence());

	let err = match service.answer(&response, &CancellationToken::new()).await {
		Ok(_) => panic!("Answering without evidence should fail."),
		Err(err) => err,
	};

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn low_confidence_rule_result_is_flagged_ambiguous() {
	let service = fixture_service();
	let response = service
		.query("What limits OLED lifetime?", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");

	assert_eq!(response.classification.question_type, QuestionType::Normal);
	assert!(
		response
			.diagnostics
			.iter()
			.any(|d| matches!(d, Diagnostic::ClassificationAmbiguous { .. }))
	);
}

#[tokio::test]
async fn answer_streams_generator_tokens() {
	let service = fixture_service();
	let cancel = CancellationToken::new();
	let response = service.query("kFRET 값은?", &cancel, None).await.expect("Query failed.");
	let prompt = build_answer_prompt(&response.question, &response);

	assert!(prompt.starts_with("Answer the question using only the numbered passages"));
	assert!(prompt.contains("[1] (assay.pdf, page 5)"));
	assert!(prompt.ends_with("Question: kFRET 값은?\nAnswer:"));

	let Ok(stream) = service.answer(&response, &cancel).await else {
		panic!("Answer stream failed to start.");
	};
	let tokens: Vec<String> =
		stream.map(|token| token.expect("Token failed.")).collect::<Vec<_>>().await;

	assert_eq!(tokens.concat(), "Answer text.");
}

#[tokio::test]
async fn file_table_prompt_lists_files_in_order() {
	let service = fixture_service();
	let response = service
		.query("List every OLED lifetime note", &CancellationToken::new(), None)
		.await
		.expect("Query failed.");
	let prompt = build_answer_prompt(&response.question, &response);

	assert!(prompt.contains("complete listing"));
	assert!(prompt.contains("1. oled.pdf"));
}
