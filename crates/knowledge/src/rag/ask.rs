//! Answer orchestration.

use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::rag::types::{ConversationExchange, RequestState, SourceRef};
use crate::types::{CollectionSchema, RetrievalResult, SearchParams};
use grounded_core::{AppError, AppResult};
use grounded_llm::{LlmClient, LlmRequest};
use grounded_prompt::{build_prompt, PromptDefinition};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Separator between retrieved passages in the prompt context.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Retrieval and generation settings of an [`Answerer`].
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub collection: CollectionSchema,
    pub search: SearchParams,
    pub model: String,
    pub temperature: Option<f32>,
}

/// Answers questions against one collection.
///
/// Built once and shared; it holds no per-request state.
pub struct Answerer {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: AnswerSettings,
}

impl Answerer {
    /// Wire the services together and make sure the collection exists.
    pub async fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        mut settings: AnswerSettings,
    ) -> AppResult<Self> {
        if embedder.dimensions() != settings.collection.dimension {
            return Err(AppError::Validation(format!(
                "Dimension mismatch: embedding model '{}' produces {}, collection '{}' expects {}",
                embedder.model_name(),
                embedder.dimensions(),
                settings.collection.name,
                settings.collection.dimension
            )));
        }

        settings.collection = index.ensure_collection(&settings.collection).await?;

        Ok(Self {
            embedder,
            index,
            llm,
            prompt,
            settings,
        })
    }

    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    /// Answer with the configured retrieval parameters.
    pub async fn answer(&self, question: &str) -> AppResult<ConversationExchange> {
        self.answer_with(question, &self.settings.search).await
    }

    /// Answer with explicit retrieval parameters.
    #[instrument(skip(self, question, params), fields(request_id = %Uuid::new_v4()))]
    pub async fn answer_with(
        &self,
        question: &str,
        params: &SearchParams,
    ) -> AppResult<ConversationExchange> {
        transition(RequestState::Received);

        match self.run(question, params).await {
            Ok(exchange) => {
                transition(RequestState::Completed);
                info!(sources = exchange.sources.len(), "Answered question");
                Ok(exchange)
            }
            Err(e) => {
                debug!(state = %RequestState::Failed, error = %e, "Request state");
                Err(e)
            }
        }
    }

    async fn run(&self, question: &str, params: &SearchParams) -> AppResult<ConversationExchange> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Query must not be empty".to_string()));
        }

        transition(RequestState::Embedding);
        let query_vector = self.embedder.embed_query(question).await?;

        transition(RequestState::Retrieving);
        let results = self
            .index
            .search(&self.settings.collection.name, &query_vector, params)
            .await?;
        debug!(
            retrieved = results.len(),
            top_score = results.first().map(|r| r.similarity_score),
            "Retrieved passages"
        );

        let context = build_context(&results);
        let prompt = build_prompt(&self.prompt, question, &context)?;

        transition(RequestState::Generating);
        let mut request = LlmRequest::new(prompt.user, self.settings.model.clone());
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        let response = self.llm.complete(&request).await?;

        Ok(ConversationExchange {
            question: question.to_string(),
            answer: response.content,
            sources: results.iter().map(SourceRef::from_result).collect(),
        })
    }
}

fn transition(state: RequestState) {
    debug!(state = %state, "Request state");
}

/// Passage texts in result order, blank-line separated. Empty when nothing
/// was retrieved.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashingBackend;
    use crate::embeddings::EmbeddingBackend;
    use crate::index::{CollectionLookup, MemoryIndex};
    use crate::types::{Chunk, DistanceMetric};
    use async_trait::async_trait;
    use grounded_llm::{LlmResponse, LlmUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const DIM: usize = 128;

    /// Hashing backend that counts calls.
    #[derive(Debug)]
    struct CountingBackend {
        inner: HashingBackend,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingBackend for CountingBackend {
        fn provider_name(&self) -> &str {
            "counting"
        }
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }
    }

    /// Records prompts and replies with a fixed answer or error.
    struct FakeLlm {
        requests: Mutex<Vec<LlmRequest>>,
        fail: bool,
    }

    impl FakeLlm {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.prompt.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        fn provider_name(&self) -> &str {
            "fake"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(AppError::unavailable("fake-llm", "timed out"));
            }
            Ok(LlmResponse {
                content: "Cats sleep a lot.".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
                done: true,
            })
        }
    }

    struct Fixture {
        backend: Arc<CountingBackend>,
        index: Arc<MemoryIndex>,
        llm: Arc<FakeLlm>,
        answerer: Answerer,
    }

    async fn fixture(llm_fails: bool, passages: &[(&str, &str)]) -> Fixture {
        let backend = Arc::new(CountingBackend {
            inner: HashingBackend::new(DIM),
            calls: AtomicUsize::new(0),
        });
        let embedder = Embedder::new(backend.clone(), 32).unwrap();
        let index = Arc::new(MemoryIndex::new());
        let llm = FakeLlm::new(llm_fails);

        let answerer = Answerer::new(
            embedder.clone(),
            index.clone(),
            llm.clone(),
            PromptDefinition::default(),
            AnswerSettings {
                collection: CollectionSchema::new("docs", DIM, DistanceMetric::Cosine),
                search: SearchParams::default(),
                model: "mistral".to_string(),
                temperature: None,
            },
        )
        .await
        .unwrap();

        if !passages.is_empty() {
            let chunks: Vec<Chunk> = passages
                .iter()
                .enumerate()
                .map(|(i, (source, text))| Chunk::new(*text, *source, i as u32))
                .collect();
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_passages(&texts).await.unwrap();
            index.upsert("docs", &chunks, &vectors).await.unwrap();
        }
        backend.calls.store(0, Ordering::SeqCst);

        Fixture {
            backend,
            index,
            llm,
            answerer,
        }
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_downstream_calls() {
        let f = fixture(false, &[("cats", "Cats sleep sixteen hours a day.")]).await;

        for query in ["", "   \n"] {
            let err = f.answerer.answer(query).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(f.backend.calls.load(Ordering::SeqCst), 0);
        assert!(f.llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_answer_with_sources() {
        let f = fixture(
            false,
            &[
                ("cats", "Cats sleep sixteen hours a day."),
                ("ships", "Container ships cross oceans with cargo."),
            ],
        )
        .await;

        let exchange = f.answerer.answer("How long do cats sleep?").await.unwrap();

        assert_eq!(exchange.answer, "Cats sleep a lot.");
        assert_eq!(exchange.question, "How long do cats sleep?");
        assert_eq!(exchange.sources.len(), 2);
        assert_eq!(exchange.sources[0].source, "cats");
        assert_eq!(f.backend.calls.load(Ordering::SeqCst), 1);

        let prompts = f.llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Question: How long do cats sleep?"));
        assert!(prompts[0].contains(
            "Context:\nCats sleep sixteen hours a day.\n\nContainer ships cross oceans with cargo.\n\nAnswer:"
        ));
    }

    #[tokio::test]
    async fn test_empty_collection_still_generates() {
        let f = fixture(false, &[]).await;

        let exchange = f.answerer.answer("Anything there?").await.unwrap();

        assert!(exchange.sources.is_empty());
        let prompts = f.llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Context:\n\n\nAnswer:"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let f = fixture(true, &[("cats", "Cats sleep sixteen hours a day.")]).await;

        let err = f.answerer.answer("How long do cats sleep?").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_sources_are_not_deduplicated() {
        let long = "word ".repeat(100);
        let f = fixture(
            false,
            &[("book", "Cats purr when content."), ("book", long.trim())],
        )
        .await;

        let exchange = f.answerer.answer("cats purr").await.unwrap();

        assert_eq!(exchange.sources.len(), 2);
        assert!(exchange.sources.iter().all(|s| s.source == "book"));
        let truncated = exchange
            .sources
            .iter()
            .find(|s| s.snippet.starts_with("word"))
            .unwrap();
        assert!(truncated.snippet.ends_with("..."));
        assert_eq!(truncated.snippet.chars().count(), 303);
    }

    #[tokio::test]
    async fn test_construction_creates_collection() {
        let f = fixture(false, &[]).await;
        assert!(matches!(
            f.index.collection_info("docs").await.unwrap(),
            CollectionLookup::Found(_)
        ));
        assert_eq!(f.answerer.settings().collection.dimension, DIM);
    }

    #[tokio::test]
    async fn test_construction_rejects_dimension_mismatch() {
        let embedder = Embedder::new(Arc::new(HashingBackend::new(16)), 32).unwrap();
        let result = Answerer::new(
            embedder,
            Arc::new(MemoryIndex::new()),
            FakeLlm::new(false),
            PromptDefinition::default(),
            AnswerSettings {
                collection: CollectionSchema::new("docs", 768, DistanceMetric::Cosine),
                search: SearchParams::default(),
                model: "mistral".to_string(),
                temperature: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_build_context() {
        let results = vec![
            RetrievalResult {
                chunk: Chunk::new("first", "a", 0),
                similarity_score: 0.9,
            },
            RetrievalResult {
                chunk: Chunk::new("second", "b", 0),
                similarity_score: 0.5,
            },
        ];
        assert_eq!(build_context(&results), "first\n\nsecond");
        assert_eq!(build_context(&[]), "");
    }
}
