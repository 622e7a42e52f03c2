//! Ingestion and question-answering orchestration.
//!
//! Ingestion is best effort per fragment: a fragment that fails to embed or
//! store is tallied and skipped. Question answering is all or nothing: any
//! failing stage aborts the call with a single error.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::conversation::assemble;
use super::embedding::EmbeddingService;
use super::generation::GenerationService;
use super::records::{DocumentRecord, QaRecord, RecordStore};
use super::splitter::{DocumentSplitter, check_format};
use super::vector_store::VectorStore;
use crate::error::{PipelineError, RecordError};
use crate::models::{
    Answer, DocumentFormat, Fragment, FragmentFailure, GenerationOutcome, GenerationParams,
    GenerationRequest, IngestReport, Language, Persona, PipelineConfig, PromptTable, Rating,
    RecordStatus, SearchResult, dedup_by_filename,
};
use crate::utils::{RetryConfig, collapse_blank_lines, with_retry};

#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Where the uploaded bytes were saved
    pub path: PathBuf,
    pub declared_format: String,
    /// Display name recorded with every fragment
    pub filename: String,
    pub collection: String,
    pub document_id: Uuid,
    pub tags: serde_json::Value,
}

impl IngestRequest {
    /// Request for `path` with a fresh document id and the file name as display name.
    pub fn new(
        path: impl Into<PathBuf>,
        declared_format: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            declared_format: declared_format.into(),
            filename,
            collection: collection.into(),
            document_id: Uuid::new_v4(),
            tags: serde_json::Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub chat_id: Uuid,
    /// Username recorded as the sender
    pub sent_by: String,
    /// One entry on the first turn; otherwise the alternating transcript,
    /// whose last entry is the question being asked
    pub history: Vec<String>,
    pub collection: String,
    pub language: Language,
    pub persona: Persona,
    pub top_k: Option<u64>,
}

impl QuestionRequest {
    pub fn first_turn(question: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            chat_id: Uuid::new_v4(),
            sent_by: String::new(),
            history: vec![question.into()],
            collection: collection.into(),
            language: Language::default(),
            persona: Persona::default(),
            top_k: None,
        }
    }

    pub fn question(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }
}

/// A generated answer that has not been recorded yet.
struct Draft {
    question: String,
    text: String,
    prompt_token_count: u64,
    fragments: Vec<SearchResult>,
}

pub struct Pipeline {
    splitter: DocumentSplitter,
    embedding: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    generation: Arc<GenerationService>,
    prompts: Arc<PromptTable>,
    records: Option<Arc<dyn RecordStore>>,
    config: PipelineConfig,
    params: GenerationParams,
    default_top_k: u64,
}

impl Pipeline {
    pub fn new(
        splitter: DocumentSplitter,
        embedding: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        generation: Arc<GenerationService>,
        prompts: Arc<PromptTable>,
    ) -> Self {
        Self {
            splitter,
            embedding,
            vector_store,
            generation,
            prompts,
            records: None,
            config: PipelineConfig::default(),
            params: GenerationParams::default(),
            default_top_k: 5,
        }
    }

    #[must_use]
    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_generation_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_default_top_k(mut self, top_k: u64) -> Self {
        self.default_top_k = top_k;
        self
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    pub fn embedding(&self) -> &Arc<EmbeddingService> {
        &self.embedding
    }

    pub fn generation(&self) -> &Arc<GenerationService> {
        &self.generation
    }

    pub fn has_records(&self) -> bool {
        self.records.is_some()
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.config)
    }

    /// Split a document and index every fragment.
    ///
    /// A format error fails the whole call before anything is stored.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestReport, PipelineError> {
        let start = Instant::now();
        let format = check_format(&request.path, &request.declared_format)?;

        let texts = self.split(request).await?;
        let total = texts.len();
        info!(
            document_id = %request.document_id,
            collection = %request.collection,
            fragments = total,
            "document split, indexing fragments"
        );

        let retry = self.retry_config();
        let retry = &retry;
        let concurrency = self.config.ingest_concurrency.max(1);

        let outcomes: Vec<Option<FragmentFailure>> = stream::iter(texts.into_iter().enumerate())
            .map(|(index, text)| {
                let fragment = Fragment::new(
                    text,
                    request.document_id,
                    request.filename.as_str(),
                    request.collection.as_str(),
                );
                async move {
                    match self.store_fragment(&fragment, index, retry).await {
                        Ok(()) => None,
                        Err(e) => {
                            warn!(
                                document_id = %fragment.source_document_id,
                                fragment_index = index,
                                error = %e,
                                "fragment skipped"
                            );
                            Some(FragmentFailure {
                                index,
                                reason: e.to_string(),
                            })
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut failures: Vec<FragmentFailure> = outcomes.into_iter().flatten().collect();
        failures.sort_by_key(|f| f.index);

        let registration_error = self.register(request, format).await;

        let report = IngestReport {
            document_id: request.document_id,
            filename: request.filename.clone(),
            collection: request.collection.clone(),
            total,
            inserted: total - failures.len(),
            failures,
            registration_error,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if report.is_complete() {
            info!(
                document_id = %report.document_id,
                inserted = report.inserted,
                duration_ms = report.duration_ms,
                "document indexed"
            );
        } else {
            warn!(
                document_id = %report.document_id,
                inserted = report.inserted,
                failed = report.failed(),
                "document partially indexed"
            );
        }
        Ok(report)
    }

    async fn split(&self, request: &IngestRequest) -> Result<Vec<String>, PipelineError> {
        let splitter = self.splitter.clone();
        let path = request.path.clone();
        let declared = request.declared_format.clone();

        let texts = tokio::task::spawn_blocking(move || splitter.split(&path, &declared))
            .await
            .map_err(|e| PipelineError::TaskError(e.to_string()))??;
        Ok(texts)
    }

    async fn store_fragment(
        &self,
        fragment: &Fragment,
        index: usize,
        retry: &RetryConfig,
    ) -> Result<(), PipelineError> {
        let vector = with_retry(retry, "embed fragment", || {
            self.embedding.embed(&fragment.text)
        })
        .await
        .into_result()?;

        with_retry(retry, "insert fragment", || {
            self.vector_store.insert(vector.clone(), fragment, index)
        })
        .await
        .into_result()?;

        debug!(
            document_id = %fragment.source_document_id,
            fragment_index = index,
            "fragment stored"
        );
        Ok(())
    }

    async fn register(&self, request: &IngestRequest, format: DocumentFormat) -> Option<String> {
        let records = self.records.as_ref()?;
        let document = DocumentRecord {
            document_id: request.document_id,
            filename: request.filename.clone(),
            collection: request.collection.clone(),
            format,
            tags: request.tags.clone(),
        };

        match records.register_document(&document).await {
            Ok(()) => None,
            Err(e) => {
                warn!(document_id = %request.document_id, error = %e, "document not registered");
                Some(e.to_string())
            }
        }
    }

    /// Answer the last entry of `request.history`.
    ///
    /// The question timeout bounds embedding, search and generation. Once an
    /// answer exists it is returned even if recording it fails or times out.
    pub async fn answer(&self, request: &QuestionRequest) -> Result<Answer, PipelineError> {
        let draft = self.bounded_draft(request).await?;
        Ok(self.finish(request, draft).await)
    }

    /// Like [`Pipeline::answer`], but abandons the call as soon as `cancel`
    /// completes. Once the answer is generated, cancellation has no effect.
    pub async fn answer_until<C>(
        &self,
        request: &QuestionRequest,
        cancel: C,
    ) -> Result<Answer, PipelineError>
    where
        C: Future<Output = ()>,
    {
        let draft = tokio::select! {
            result = self.bounded_draft(request) => result?,
            _ = cancel => {
                info!(chat_id = %request.chat_id, "question cancelled");
                return Err(PipelineError::Cancelled);
            }
        };
        Ok(self.finish(request, draft).await)
    }

    async fn bounded_draft(&self, request: &QuestionRequest) -> Result<Draft, PipelineError> {
        let timeout = Duration::from_secs(self.config.question_timeout_secs);
        match tokio::time::timeout(timeout, self.draft(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(chat_id = %request.chat_id, ?timeout, "question timed out");
                Err(PipelineError::Timeout(timeout))
            }
        }
    }

    /// Embed, search and generate.
    async fn draft(&self, request: &QuestionRequest) -> Result<Draft, PipelineError> {
        let question = request
            .question()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| PipelineError::InvalidQuestion("question is empty".to_string()))?;

        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(PipelineError::InvalidQuestion(
                "top_k must be at least 1".to_string(),
            ));
        }

        let retry = self.retry_config();
        let query_vector = with_retry(&retry, "embed question", || self.embedding.embed(question))
            .await
            .into_result()?;

        let fragments = with_retry(&retry, "search fragments", || {
            self.vector_store
                .search(query_vector.clone(), &request.collection, top_k)
        })
        .await
        .into_result()?;

        debug!(
            chat_id = %request.chat_id,
            collection = %request.collection,
            retrieved = fragments.len(),
            "fragments retrieved"
        );

        let conversation = assemble(
            &self.prompts,
            request.persona,
            request.language,
            &fragments,
            &request.history,
        );
        let generation_request = GenerationRequest::new(conversation, &self.params);

        let result = match self.generation.generate(&generation_request).await? {
            GenerationOutcome::Generated(result) => result,
            GenerationOutcome::Malformed { reason } => {
                return Err(PipelineError::MalformedGeneration(reason));
            }
        };

        Ok(Draft {
            question: question.to_string(),
            text: collapse_blank_lines(&result.text),
            prompt_token_count: result.prompt_token_count,
            fragments,
        })
    }

    /// Attach sources and record the exchange. Never fails.
    async fn finish(&self, request: &QuestionRequest, draft: Draft) -> Answer {
        let sources = dedup_by_filename(&draft.fragments);
        let file_ids: Vec<Uuid> = draft
            .fragments
            .iter()
            .map(|f| f.source_document_id)
            .collect();
        let answer_id = Uuid::new_v4();

        let record_status = match &self.records {
            None => RecordStatus::Skipped,
            Some(records) => {
                let record = QaRecord {
                    chat_id: request.chat_id,
                    answer_id,
                    question: draft.question,
                    answer: draft.text.clone(),
                    prompt_token_count: draft.prompt_token_count,
                    sent_by: request.sent_by.clone(),
                    file_ids: file_ids.clone(),
                };
                self.record(records.as_ref(), &record).await
            }
        };

        info!(
            chat_id = %request.chat_id,
            answer_id = %answer_id,
            prompt_tokens = draft.prompt_token_count,
            sources = sources.len(),
            "question answered"
        );

        Answer {
            answer_id,
            chat_id: request.chat_id,
            text: draft.text,
            prompt_token_count: draft.prompt_token_count,
            sources,
            file_ids,
            record_status,
        }
    }

    async fn record(&self, records: &dyn RecordStore, record: &QaRecord) -> RecordStatus {
        let timeout = Duration::from_secs(self.config.record_timeout_secs);
        let reason = match tokio::time::timeout(timeout, records.record_answer(record)).await {
            Ok(Ok(())) => return RecordStatus::Recorded,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("record store timed out after {:?}", timeout),
        };
        warn!(answer_id = %record.answer_id, error = %reason, "answer generated but not recorded");
        RecordStatus::NotRecorded { reason }
    }

    fn require_records(&self) -> Result<&Arc<dyn RecordStore>, PipelineError> {
        self.records.as_ref().ok_or_else(|| {
            PipelineError::Record(RecordError::StoreUnavailable(
                "no record store configured".to_string(),
            ))
        })
    }

    pub async fn rate_answer(&self, answer_id: Uuid, rating: Rating) -> Result<(), PipelineError> {
        self.require_records()?
            .update_rating(answer_id, rating)
            .await?;
        Ok(())
    }

    pub async fn document_filename(&self, document_id: Uuid) -> Result<String, PipelineError> {
        Ok(self
            .require_records()?
            .document_filename(document_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, GenerationError};
    use crate::models::GenerationResult;
    use crate::services::embedding::EmbeddingBackend;
    use crate::services::generation::GenerationBackend;
    use crate::services::vector_store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIMENSION: usize = 8;

    struct CharBackend;

    #[async_trait]
    impl EmbeddingBackend for CharBackend {
        fn name(&self) -> &'static str {
            "chars"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("FAIL") {
                return Err(EmbeddingError::ProviderResponse("rejected".to_string()));
            }
            let mut v = vec![0.0; 4];
            for (i, c) in text.chars().enumerate() {
                v[i % 4] += c as u32 as f32;
            }
            Ok(v)
        }
    }

    struct StubGeneration {
        calls: AtomicUsize,
        malformed: bool,
    }

    #[async_trait]
    impl GenerationBackend for StubGeneration {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResult, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.malformed {
                return Err(GenerationError::ProviderResponse("missing text".to_string()));
            }
            Ok(GenerationResult {
                text: "**GDP**\n\nis output".to_string(),
                prompt_token_count: request.conversation.len() as u64,
            })
        }
    }

    fn pipeline(malformed: bool) -> (Pipeline, Arc<StubGeneration>) {
        let backend = Arc::new(StubGeneration {
            calls: AtomicUsize::new(0),
            malformed,
        });
        let embedding =
            Arc::new(EmbeddingService::with_backend(Arc::new(CharBackend), DIMENSION).unwrap());
        let generation = Arc::new(GenerationService::with_backend(backend.clone()));
        let pipeline = Pipeline::new(
            DocumentSplitter::new("."),
            embedding,
            Arc::new(InMemoryStore::new(DIMENSION)),
            generation,
            Arc::new(PromptTable::builtin().unwrap()),
        )
        .with_config(PipelineConfig {
            retry_initial_delay_ms: 1,
            ..Default::default()
        });
        (pipeline, backend)
    }

    #[tokio::test]
    async fn test_ingest_reports_partial_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "alpha one.beta FAIL two.gamma three.").unwrap();

        let (pipeline, _) = pipeline(false);
        let request = IngestRequest::new(&path, "txt", "econ");
        let report = pipeline.ingest(&request).await.unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(!report.is_complete());
        assert_eq!(pipeline.vector_store().count("econ").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_format_mismatch_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, "some text.").unwrap();

        let (pipeline, _) = pipeline(false);
        let request = IngestRequest::new(&path, "docx", "econ");
        let err = pipeline.ingest(&request).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Split(crate::error::SplitError::FormatMismatch { .. })
        ));
        assert_eq!(pipeline.vector_store().count("econ").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_answer_strips_markup_and_collapses_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gdp.txt");
        std::fs::write(&path, "GDP measures output.GDP is gross.").unwrap();

        let (pipeline, backend) = pipeline(false);
        pipeline
            .ingest(&IngestRequest::new(&path, "txt", "econ"))
            .await
            .unwrap();

        let answer = pipeline
            .answer(&QuestionRequest::first_turn("What is GDP?", "econ"))
            .await
            .unwrap();

        assert_eq!(answer.text, "GDP\nis output");
        assert_eq!(answer.prompt_token_count, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].filename, "gdp.txt");
        assert_eq!(answer.file_ids.len(), 2);
        assert_eq!(answer.record_status, RecordStatus::Skipped);
    }

    #[tokio::test]
    async fn test_malformed_generation_is_terminal() {
        let (pipeline, _) = pipeline(true);
        let err = pipeline
            .answer(&QuestionRequest::first_turn("What is GDP?", "econ"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedGeneration(_)));
    }

    #[tokio::test]
    async fn test_empty_history_is_rejected() {
        let (pipeline, backend) = pipeline(false);
        let mut request = QuestionRequest::first_turn("", "econ");
        request.history.clear();
        assert!(matches!(
            pipeline.answer(&request).await,
            Err(PipelineError::InvalidQuestion(_))
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    struct SlowGeneration;

    #[async_trait]
    impl GenerationBackend for SlowGeneration {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResult, GenerationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(GenerationResult::default())
        }
    }

    #[tokio::test]
    async fn test_answer_until_cancelled() {
        let (pipeline, _) = pipeline(false);
        pipeline
            .generation()
            .replace_backend(Arc::new(SlowGeneration))
            .await;

        let request = QuestionRequest::first_turn("What is GDP?", "econ");
        let cancel = tokio::time::sleep(Duration::from_millis(20));
        assert!(matches!(
            pipeline.answer_until(&request, cancel).await,
            Err(PipelineError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_answer_times_out() {
        let (pipeline, _) = pipeline(false);
        let pipeline = pipeline.with_config(PipelineConfig {
            question_timeout_secs: 1,
            ..Default::default()
        });
        pipeline
            .generation()
            .replace_backend(Arc::new(SlowGeneration))
            .await;

        let request = QuestionRequest::first_turn("What is GDP?", "econ");
        assert!(matches!(
            pipeline.answer(&request).await,
            Err(PipelineError::Timeout(_))
        ));
    }

    struct SlowRecords;

    #[async_trait]
    impl RecordStore for SlowRecords {
        async fn record_answer(&self, _record: &QaRecord) -> Result<(), RecordError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }

        async fn document_filename(&self, document_id: Uuid) -> Result<String, RecordError> {
            Err(RecordError::NotFound(document_id.to_string()))
        }

        async fn update_rating(&self, _answer_id: Uuid, _rating: Rating) -> Result<(), RecordError> {
            Ok(())
        }

        async fn register_document(&self, _document: &DocumentRecord) -> Result<(), RecordError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_record_store_keeps_answer() {
        let (pipeline, _) = pipeline(false);
        let pipeline = pipeline
            .with_records(Arc::new(SlowRecords))
            .with_config(PipelineConfig {
                question_timeout_secs: 1,
                record_timeout_secs: 1,
                ..Default::default()
            });

        let answer = pipeline
            .answer(&QuestionRequest::first_turn("What is GDP?", "econ"))
            .await
            .unwrap();

        assert_eq!(answer.text, "GDP\nis output");
        assert!(matches!(
            answer.record_status,
            RecordStatus::NotRecorded { ref reason } if reason.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_cancel_after_generation_keeps_answer() {
        let (pipeline, _) = pipeline(false);
        let pipeline = pipeline.with_records(Arc::new(SlowRecords)).with_config(PipelineConfig {
            record_timeout_secs: 1,
            ..Default::default()
        });

        let request = QuestionRequest::first_turn("What is GDP?", "econ");
        let cancel = tokio::time::sleep(Duration::from_millis(200));
        let answer = pipeline.answer_until(&request, cancel).await.unwrap();
        assert!(!answer.is_recorded());
    }

    #[tokio::test]
    async fn test_rate_without_records_fails() {
        let (pipeline, _) = pipeline(false);
        assert!(matches!(
            pipeline.rate_answer(Uuid::new_v4(), Rating::Up).await,
            Err(PipelineError::Record(RecordError::StoreUnavailable(_)))
        ));
    }
}
