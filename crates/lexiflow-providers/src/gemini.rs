//! Gemini generative language API backend.

use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

use lexiflow_core::content::{normalize_test, RawQuestion};
use lexiflow_core::model::{
    CefrLevel, Question, Vocabulary, WordCategory, WordPool, WordPoolItem,
};
use lexiflow_core::traits::{ContentService, TestRequest, VocabularyRequest, WordPoolRequest};

use crate::error::ProviderError;
use crate::prompts;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;
const TEST_THINKING_BUDGET: u32 = 2048;

/// Content service backed by the Gemini `generateContent` endpoint.
pub struct GeminiContentService {
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl GeminiContentService {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        model: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            client,
        })
    }

    /// Output token cap for test generation.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct TopicSuggestion {
    #[serde(default)]
    topic: String,
}

#[derive(Deserialize)]
struct TermBatch {
    #[serde(default)]
    items: Vec<BatchItem>,
}

/// Batch entries are objects, but bare strings turn up too.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchItem {
    Term { term: String },
    Bare(String),
}

impl BatchItem {
    fn into_term(self) -> String {
        match self {
            BatchItem::Term { term } | BatchItem::Bare(term) => term,
        }
    }
}

impl GeminiContentService {
    /// Send one prompt and parse the JSON text of the first candidate.
    async fn generate_json<T: DeserializeOwned>(
        &self,
        prompt: String,
        generation_config: GenerationConfig,
    ) -> anyhow::Result<T> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            }
            .into());
        }
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(error_message(body)).into());
        }
        if status == 404 {
            return Err(ProviderError::ModelNotFound(self.model.clone()).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status,
                message: error_message(body),
            }
            .into());
        }

        let api_response: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            })?;

        let text: String = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse("no data returned".into()).into());
        }

        let parsed = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(parsed)
    }

    async fn suggest_topic(&self, level: CefrLevel) -> anyhow::Result<String> {
        let suggestion: TopicSuggestion = self
            .generate_json(prompts::topic_prompt(level), json_config(None))
            .await?;
        let topic = suggestion.topic.trim();
        Ok(if topic.is_empty() {
            prompts::FALLBACK_TOPIC.to_string()
        } else {
            topic.to_string()
        })
    }

    /// One pool column. Failures are logged and yield an empty column.
    async fn fetch_batch(&self, level: CefrLevel, topic: &str, label: &str) -> Vec<String> {
        let prompt = prompts::batch_prompt(level, topic, label, prompts::BATCH_SIZE);
        match self
            .generate_json::<TermBatch>(prompt, json_config(Some(prompts::batch_schema())))
            .await
        {
            Ok(batch) => batch
                .items
                .into_iter()
                .map(BatchItem::into_term)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Err(e) => {
                warn!(label, error = %e, "word pool batch failed");
                Vec::new()
            }
        }
    }
}

fn json_config(schema: Option<Value>) -> GenerationConfig {
    GenerationConfig {
        response_mime_type: "application/json",
        response_schema: schema,
        ..GenerationConfig::default()
    }
}

fn error_message(body: String) -> String {
    serde_json::from_str::<GeminiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[async_trait]
impl ContentService for GeminiContentService {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %self.model, level = %request.level))]
    async fn fetch_word_pool(&self, request: &WordPoolRequest) -> anyhow::Result<WordPool> {
        let topic = match request.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic.to_string(),
            _ => self.suggest_topic(request.level).await?,
        };

        let fifth = prompts::fifth_column_label(&topic);
        let columns = [
            (WordCategory::Nouns, "Nouns"),
            (WordCategory::Verbs, "Verbs"),
            (WordCategory::Adjectives, "Adjectives"),
            (WordCategory::Adverbs, "Adverbs"),
            (WordCategory::Other, fifth),
        ];
        let batches = join_all(
            columns
                .iter()
                .map(|(_, label)| self.fetch_batch(request.level, &topic, label)),
        )
        .await;

        let pool = columns
            .iter()
            .zip(batches)
            .flat_map(|((category, _), terms)| {
                terms.into_iter().map(|term| WordPoolItem {
                    term,
                    category: *category,
                })
            })
            .collect();

        Ok(WordPool { topic, pool })
    }

    #[instrument(skip(self, request), fields(model = %self.model, count = request.count))]
    async fn fetch_vocabulary(&self, request: &VocabularyRequest) -> anyhow::Result<Vocabulary> {
        self.generate_json(
            prompts::vocabulary_prompt(request),
            json_config(Some(prompts::vocabulary_schema())),
        )
        .await
    }

    #[instrument(skip(self, request), fields(model = %self.model, words = request.words.len()))]
    async fn fetch_test(&self, request: &TestRequest) -> anyhow::Result<Vec<Question>> {
        let config = GenerationConfig {
            max_output_tokens: Some(self.max_output_tokens),
            thinking_config: Some(ThinkingConfig {
                thinking_budget: TEST_THINKING_BUDGET,
            }),
            ..json_config(Some(prompts::question_schema()))
        };
        let raw: Vec<RawQuestion> = self
            .generate_json(prompts::test_prompt(request.level, &request.words), config)
            .await?;
        Ok(normalize_test(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexiflow_core::model::{BloomLevel, Word};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    fn candidate(payload: Value) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": payload.to_string() }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn service(server: &MockServer) -> GeminiContentService {
        GeminiContentService::new("test-key", Some(server.uri()), None).unwrap()
    }

    #[tokio::test]
    async fn vocabulary_generation() {
        let server = MockServer::start().await;
        let payload = json!({
            "topic": "Sea",
            "words": [{
                "term": "ocean",
                "partOfSpeech": "noun",
                "meaning": "a very big sea",
                "pronunciation": "/ˈəʊʃn/",
                "examples": ["We **crossed the ocean**.", "The **deep ocean** is dark.", "I **swam in the ocean**."],
                "termVi": "đại dương",
                "meaningVi": "biển rất lớn",
                "examplesVi": ["a", "b", "c"]
            }]
        });

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_string_contains("responseSchema"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(payload)))
            .mount(&server)
            .await;

        let vocabulary = service(&server)
            .fetch_vocabulary(&VocabularyRequest {
                level: CefrLevel::B1,
                topic: Some("Sea".into()),
                target_words: vec!["ocean".into()],
                count: 1,
            })
            .await
            .unwrap();
        assert_eq!(vocabulary.topic, "Sea");
        assert_eq!(vocabulary.words[0].term_translated.as_deref(), Some("đại dương"));
        assert_eq!(vocabulary.words[0].examples.len(), 3);
    }

    #[tokio::test]
    async fn test_generation_is_normalized() {
        let server = MockServer::start().await;
        let payload = json!([
            {
                "id": "q1", "wordTerm": "ocean", "level": "Remember",
                "questionText": "What is an ocean?", "questionTextVi": "Đại dương là gì?",
                "options": ["a big sea", "a small pond", "a tall hill"],
                "correctOption": "a big sea"
            },
            {
                "id": "q2", "level": "Apply",
                "questionText": "Match", "questionTextVi": "Nối",
                "matchingPairs": [{ "id": "x", "questionText": "The _____ is wide.", "correctAnswer": " ocean " }]
            }
        ]);

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("thinkingBudget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(payload)))
            .mount(&server)
            .await;

        let word: Word = serde_json::from_value(json!({"term": "ocean", "meaning": "a big sea"})).unwrap();
        let questions = service(&server)
            .fetch_test(&TestRequest {
                level: CefrLevel::B1,
                words: vec![word],
            })
            .await
            .unwrap();

        assert_eq!(questions.len(), 2);
        let matching = questions
            .iter()
            .find(|q| q.level() == BloomLevel::Apply)
            .unwrap();
        assert_eq!(matching.id, "level-3-master");
        let pair = &matching.matching().unwrap().pairs[0];
        assert_eq!(pair.correct_term, "ocean");
        assert!(pair.sentence.ends_with("[[GAP]]"));
    }

    #[tokio::test]
    async fn word_pool_resolves_topic_and_survives_failed_batch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("Suggest ONE specific"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(candidate(json!({"topic": "Ocean Life"}))),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("**Adverbs**"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("EXACTLY 10 distinct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
                json!({"items": [{"term": "whale"}, "tide", {"term": "  "}]}),
            )))
            .mount(&server)
            .await;

        let pool = service(&server)
            .fetch_word_pool(&WordPoolRequest {
                level: CefrLevel::A2,
                topic: None,
            })
            .await
            .unwrap();

        assert_eq!(pool.topic, "Ocean Life");
        assert_eq!(pool.pool.len(), 8);
        assert!(pool
            .pool
            .iter()
            .all(|item| item.category != WordCategory::Adverbs));
        assert_eq!(
            pool.pool
                .iter()
                .filter(|item| item.category == WordCategory::Other)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
            })))
            .mount(&server)
            .await;

        let err = service(&server)
            .fetch_vocabulary(&VocabularyRequest {
                level: CefrLevel::B1,
                topic: None,
                target_words: vec![],
                count: 5,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authentication"));
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&server)
            .await;

        let err = service(&server)
            .fetch_test(&TestRequest {
                level: CefrLevel::B1,
                words: vec![],
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn non_json_candidate_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Sure! Here are some words" }] } }]
            })))
            .mount(&server)
            .await;

        let err = service(&server)
            .fetch_vocabulary(&VocabularyRequest {
                level: CefrLevel::B1,
                topic: None,
                target_words: vec![],
                count: 5,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }
}
