use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::{Method::POST, MockServer};
use serde_json::json;
use tc_analyzer::{
    jobs::{AnalysisJob, JobError},
    oracle::{ClauseOracle, OllamaClauseOracle, OracleError, OracleInput},
    parsing::{ChapterDetector, DocumentLayout, ParserSettings},
    processing::{
        AnalyzerService, AnalyzerSettings, ClauseAnalysis, ClauseAnalyzer, PipelineError,
        RiskLevel, Segmentation,
    },
    rate_limit::InMemoryRateLimiter,
    storage::{
        AnalysisSink, DocumentStatus, JsonlAnalysisSink, SinkError, StatusReporter, StoredClause,
    },
};
use tempfile::tempdir;

#[derive(Default)]
struct RecordingStatus {
    transitions: Mutex<Vec<(String, DocumentStatus)>>,
    reject: Option<DocumentStatus>,
}

impl RecordingStatus {
    fn rejecting(status: DocumentStatus) -> Self {
        Self {
            reject: Some(status),
            ..Self::default()
        }
    }

    fn statuses(&self) -> Vec<DocumentStatus> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl StatusReporter for RecordingStatus {
    async fn update(&self, document_id: &str, status: DocumentStatus) -> Result<(), SinkError> {
        self.transitions
            .lock()
            .unwrap()
            .push((document_id.to_string(), status));
        if self.reject == Some(status) {
            return Err(SinkError::Backend(format!("cannot record {status}")));
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<StoredClause>>,
    calls: Mutex<usize>,
}

#[async_trait]
impl AnalysisSink for MemorySink {
    async fn insert_many(&self, records: &[StoredClause]) -> Result<(), SinkError> {
        *self.calls.lock().unwrap() += 1;
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl AnalysisSink for FailingSink {
    async fn insert_many(&self, _records: &[StoredClause]) -> Result<(), SinkError> {
        Err(SinkError::Backend("database offline".into()))
    }
}

struct DownOracle;

#[async_trait]
impl ClauseOracle for DownOracle {
    async fn invoke(&self, _input: &OracleInput) -> Result<ClauseAnalysis, OracleError> {
        Err(OracleError::Unavailable("connection refused".into()))
    }
}

struct EchoOracle;

#[async_trait]
impl ClauseOracle for EchoOracle {
    async fn invoke(&self, input: &OracleInput) -> Result<ClauseAnalysis, OracleError> {
        Ok(ClauseAnalysis {
            category: vec![],
            risk_level: RiskLevel::Low,
            reason: None,
            key_points: vec![],
            conclusion: input.text.chars().take(20).collect(),
            is_valid: true,
        })
    }
}

fn service(oracle: Arc<dyn ClauseOracle>) -> Arc<AnalyzerService> {
    let analyzer = ClauseAnalyzer::new(
        oracle,
        Arc::new(InMemoryRateLimiter::per_minute(1_000)),
        AnalyzerSettings {
            max_retries: 2,
            backoff_base_secs: 0.0,
            ..AnalyzerSettings::default()
        },
    );
    Arc::new(AnalyzerService::new(
        ChapterDetector::new(ParserSettings::default()),
        analyzer,
    ))
}

fn chaptered_layout() -> DocumentLayout {
    let body = "By creating an account you accept these terms. We may change the service, \
                suspend accounts, and update prices at our sole discretion without notice.";
    DocumentLayout::from_page_texts([
        format!("INTRODUCTION\n{body}"),
        format!("LIMITATION OF LIABILITY\n{body}"),
    ])
}

#[tokio::test]
async fn analyses_chapters_through_ollama_into_jsonl() {
    let server = MockServer::start_async().await;
    let answer = json!({
        "category": ["liability_limitation"],
        "risk_level": "high",
        "reason": "Unilateral changes without notice.",
        "key_points": ["Prices may change without notice"],
        "conclusion": "Review before accepting.",
        "is_valid": true
    });
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({
                "response": answer.to_string(),
                "done": true
            }));
        })
        .await;
    let oracle = OllamaClauseOracle::new(
        server.base_url(),
        "llama3.1",
        0.2,
        Duration::from_secs(5),
    )
    .expect("oracle");

    let dir = tempdir().unwrap();
    let sink = JsonlAnalysisSink::new(dir.path().join("analysis.jsonl"));
    let status = Arc::new(RecordingStatus::default());
    let job = AnalysisJob::new(
        service(Arc::new(oracle)),
        Arc::new(sink.clone()),
        status.clone(),
    );

    let summary = job
        .run_layout("doc-42", &chaptered_layout(), "I run a small shop")
        .await
        .expect("job succeeds");

    assert_eq!(summary.document_id, "doc-42");
    assert_eq!(summary.segmentation, Segmentation::Chapters);
    assert_eq!(summary.stored, 2);
    assert_eq!(mock.hits_async().await, 2);
    assert_eq!(
        status.statuses(),
        vec![DocumentStatus::Processing, DocumentStatus::Analyzed]
    );

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    let rows: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["document_id"], "doc-42");
    assert_eq!(rows[0]["chapter_name"], "INTRODUCTION");
    assert_eq!(rows[0]["page_start"], 1);
    assert_eq!(rows[1]["chapter_name"], "LIMITATION OF LIABILITY");
    assert_eq!(rows[1]["page_start"], 2);
    assert_eq!(rows[1]["risk_level"], "high");
}

#[tokio::test]
async fn empty_analysis_still_marks_document_analyzed() {
    let sink = Arc::new(MemorySink::default());
    let status = Arc::new(RecordingStatus::default());
    let job = AnalysisJob::new(service(Arc::new(DownOracle)), sink.clone(), status.clone());
    let layout = DocumentLayout::from_page_texts([
        "Welcome. These rules apply to everyone.",
        "Contact us with any questions.",
    ]);

    let summary = job
        .run_layout("doc-7", &layout, "")
        .await
        .expect("no-signal completion is not an error");

    assert_eq!(summary.segmentation, Segmentation::Pages);
    assert_eq!(summary.stored, 0);
    assert_eq!(*sink.calls.lock().unwrap(), 0);
    assert_eq!(
        status.statuses(),
        vec![DocumentStatus::Processing, DocumentStatus::Analyzed]
    );
}

#[tokio::test]
async fn unreadable_pdf_marks_document_failed() {
    let sink = Arc::new(MemorySink::default());
    let status = Arc::new(RecordingStatus::default());
    let job = AnalysisJob::new(service(Arc::new(DownOracle)), sink.clone(), status.clone());

    let error = job
        .run("doc-9", Path::new("/nonexistent/terms.pdf"), "")
        .await
        .expect_err("missing file");

    assert!(matches!(error, JobError::Pipeline(PipelineError::Parse(_))));
    assert!(sink.records.lock().unwrap().is_empty());
    let transitions = status.transitions.lock().unwrap().clone();
    assert_eq!(
        transitions,
        vec![
            ("doc-9".to_string(), DocumentStatus::Processing),
            ("doc-9".to_string(), DocumentStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn sink_failure_marks_document_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({
                "response": json!({
                    "category": [],
                    "risk_level": "low",
                    "key_points": [],
                    "conclusion": "Fine.",
                    "is_valid": true
                })
                .to_string(),
                "done": true
            }));
        })
        .await;
    let oracle =
        OllamaClauseOracle::new(server.base_url(), "llama3.1", 0.2, Duration::from_secs(5))
            .expect("oracle");
    let status = Arc::new(RecordingStatus::default());
    let job = AnalysisJob::new(
        service(Arc::new(oracle)),
        Arc::new(FailingSink),
        status.clone(),
    );

    let error = job
        .run_layout("doc-3", &chaptered_layout(), "")
        .await
        .expect_err("sink offline");

    assert!(matches!(error, JobError::Storage(SinkError::Backend(_))));
    assert_eq!(
        status.statuses(),
        vec![DocumentStatus::Processing, DocumentStatus::Failed]
    );
}

#[tokio::test]
async fn unbroken_cjk_page_is_analysed_to_completion() {
    let sink = Arc::new(MemorySink::default());
    let status = Arc::new(RecordingStatus::default());
    let job = AnalysisJob::new(service(Arc::new(EchoOracle)), sink.clone(), status.clone());
    let page = "本条款适用于所有用户。我们可能随时更改服务内容，恕不另行通知。".repeat(400);
    let layout = DocumentLayout::from_page_texts([page]);

    let summary = job
        .run_layout("doc-cjk", &layout, "")
        .await
        .expect("multibyte text is analysed");

    assert_eq!(summary.segmentation, Segmentation::Pages);
    assert!(summary.stored >= 2);
    assert_eq!(
        status.statuses(),
        vec![DocumentStatus::Processing, DocumentStatus::Analyzed]
    );
}

#[tokio::test]
async fn unrecorded_processing_status_marks_document_failed() {
    let sink = Arc::new(MemorySink::default());
    let status = Arc::new(RecordingStatus::rejecting(DocumentStatus::Processing));
    let job = AnalysisJob::new(service(Arc::new(EchoOracle)), sink.clone(), status.clone());

    let error = job
        .run_layout("doc-5", &chaptered_layout(), "")
        .await
        .expect_err("status store offline");

    assert!(matches!(error, JobError::Storage(SinkError::Backend(_))));
    assert_eq!(*sink.calls.lock().unwrap(), 0);
    assert_eq!(
        status.statuses(),
        vec![DocumentStatus::Processing, DocumentStatus::Failed]
    );
}

#[tokio::test]
async fn unrecorded_completion_marks_document_failed() {
    let sink = Arc::new(MemorySink::default());
    let status = Arc::new(RecordingStatus::rejecting(DocumentStatus::Analyzed));
    let job = AnalysisJob::new(service(Arc::new(EchoOracle)), sink.clone(), status.clone());

    let error = job
        .run_layout("doc-6", &chaptered_layout(), "")
        .await
        .expect_err("status store offline");

    assert!(matches!(error, JobError::Storage(SinkError::Backend(_))));
    assert_eq!(sink.records.lock().unwrap().len(), 2);
    assert_eq!(
        status.statuses(),
        vec![
            DocumentStatus::Processing,
            DocumentStatus::Analyzed,
            DocumentStatus::Failed
        ]
    );
}
