//! Scoring collaborators: the remote ML service, the local rule-based
//! fallback, and the decorators that compose them.

use crate::circuit_breaker::{create_scoring_circuit_breaker, ScoringBreaker};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{CandidateRecord, FeatureImpact, Lead, ScoreResult};
use futures::future::{BoxFuture, FutureExt};
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Anything that can turn a candidate into a score with an explanation.
pub trait LeadScorer: Send + Sync {
    fn score<'a>(
        &'a self,
        candidate: &'a CandidateRecord,
    ) -> BoxFuture<'a, Result<ScoreResult, AppError>>;
}

impl<T: LeadScorer + ?Sized> LeadScorer for Arc<T> {
    fn score<'a>(
        &'a self,
        candidate: &'a CandidateRecord,
    ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
        (**self).score(candidate)
    }
}

/// Request body of `POST /score`. Keys match the model's training columns.
#[derive(Debug, Serialize)]
pub struct ScoreRequest<'a> {
    #[serde(rename = "Title")]
    pub title: &'a str,
    #[serde(rename = "Industry")]
    pub industry: &'a str,
    #[serde(rename = "Company Size")]
    pub company_size: &'a str,
    #[serde(rename = "Page Views")]
    pub page_views: u32,
    #[serde(rename = "Downloads")]
    pub downloads: u32,
    #[serde(rename = "Webinar Attended")]
    pub webinar_attended: u8,
}

impl<'a> From<&'a CandidateRecord> for ScoreRequest<'a> {
    fn from(candidate: &'a CandidateRecord) -> Self {
        Self {
            title: &candidate.title,
            industry: &candidate.industry,
            company_size: &candidate.company_size,
            page_views: candidate.page_views,
            downloads: candidate.downloads,
            webinar_attended: u8::from(candidate.webinar_attended),
        }
    }
}

/// Joins `path` onto `base`, keeping any path prefix the base already has.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, AppError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| AppError::Internal(format!("Invalid scoring endpoint '{}': {}", path, e)))
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::ExternalApi(format!("Failed to create scoring client: {}", e)))
}

/// Validates a `/score` response body.
///
/// The score must be a finite number and is clamped to `[0, 1]`. A non-null
/// `error` field fails the call. Explanation entries without a string
/// `feature` or numeric `impact` are skipped.
pub fn parse_score_response(body: &Value) -> Result<ScoreResult, AppError> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        return Err(AppError::Scoring(format!(
            "Scoring service reported an error: {}",
            err
        )));
    }

    let score = body
        .get("score")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .ok_or_else(|| AppError::Scoring("Response has no numeric 'score'".to_string()))?;

    let explanation = body
        .get("explanation")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let feature = entry.get("feature")?.as_str()?;
                    let impact = entry.get("impact")?.as_f64()?;
                    Some(FeatureImpact {
                        feature: feature.to_string(),
                        impact,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ScoreResult {
        score: score.clamp(0.0, 1.0),
        explanation,
    })
}

// ============ Remote ML Service ============

/// Client for the ML scoring service.
#[derive(Clone)]
pub struct MlScoringClient {
    client: reqwest::Client,
    score_url: Url,
    breaker: ScoringBreaker,
}

impl MlScoringClient {
    /// Creates a new `MlScoringClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the scoring service.
    /// * `timeout` - Per-request timeout. A timed out call counts as a failure.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            score_url: endpoint(base_url, "score")?,
            breaker: create_scoring_circuit_breaker(),
        })
    }

    pub fn score_url(&self) -> &Url {
        &self.score_url
    }

    /// Scores one candidate through the circuit breaker.
    ///
    /// # Returns
    ///
    /// * `Result<ScoreResult, AppError>` - The score, or `AppError::Scoring` when
    ///   the call failed, the body was unusable, or the breaker is open.
    pub async fn score_candidate(
        &self,
        candidate: &CandidateRecord,
    ) -> Result<ScoreResult, AppError> {
        if !self.breaker.is_call_permitted() {
            return Err(AppError::Scoring(
                "Scoring service circuit is open, call rejected".to_string(),
            ));
        }

        match self.request_score(candidate).await {
            Ok(result) => {
                self.breaker.on_success();
                Ok(result)
            }
            Err(e) => {
                self.breaker.on_error();
                Err(e)
            }
        }
    }

    async fn request_score(&self, candidate: &CandidateRecord) -> Result<ScoreResult, AppError> {
        let response = self
            .client
            .post(self.score_url.clone())
            .json(&ScoreRequest::from(candidate))
            .send()
            .await
            .map_err(|e| AppError::Scoring(format!("Scoring request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Scoring(format!(
                "Scoring service returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::Scoring(format!("Failed to parse scoring response: {}", e))
        })?;

        parse_score_response(&body)
    }
}

impl LeadScorer for MlScoringClient {
    fn score<'a>(
        &'a self,
        candidate: &'a CandidateRecord,
    ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
        self.score_candidate(candidate).boxed()
    }
}

// ============ Local Fallback ============

const HIGH_VALUE_INDUSTRIES: [&str; 3] = ["Technology", "Finance", "Healthcare"];
const SENIOR_TITLES: [&str; 5] = ["CEO", "CTO", "VP", "Director", "Manager"];

/// Heuristic score used when the ML service is unreachable.
pub fn rule_based_score(candidate: &CandidateRecord) -> ScoreResult {
    let mut score = 0.3;

    if candidate.page_views > 10 {
        score += 0.2;
    } else if candidate.page_views > 5 {
        score += 0.1;
    }

    if candidate.downloads > 2 {
        score += 0.2;
    } else if candidate.downloads > 0 {
        score += 0.1;
    }

    if candidate.webinar_attended {
        score += 0.15;
    }

    match candidate.company_size.as_str() {
        "Enterprise" => score += 0.1,
        "Mid-Market" => score += 0.05,
        _ => {}
    }

    let high_value_industry = HIGH_VALUE_INDUSTRIES.contains(&candidate.industry.as_str());
    if high_value_industry {
        score += 0.1;
    }

    if SENIOR_TITLES.iter().any(|t| candidate.title.contains(t)) {
        score += 0.1;
    }

    let impact = |hit: bool, value: f64| if hit { value } else { 0.0 };
    let explanation = vec![
        FeatureImpact {
            feature: "Page Views".to_string(),
            impact: impact(candidate.page_views > 5, 0.1),
        },
        FeatureImpact {
            feature: "Downloads".to_string(),
            impact: impact(candidate.downloads > 0, 0.1),
        },
        FeatureImpact {
            feature: "Webinar Attendance".to_string(),
            impact: impact(candidate.webinar_attended, 0.15),
        },
        FeatureImpact {
            feature: "Company Size".to_string(),
            impact: if candidate.company_size == "Enterprise" {
                0.1
            } else {
                0.05
            },
        },
        FeatureImpact {
            feature: "Industry".to_string(),
            impact: impact(high_value_industry, 0.1),
        },
    ];

    ScoreResult {
        score: f64::min(score, 1.0),
        explanation,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl LeadScorer for RuleBasedScorer {
    fn score<'a>(
        &'a self,
        candidate: &'a CandidateRecord,
    ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
        futures::future::ready(Ok(rule_based_score(candidate))).boxed()
    }
}

// ============ Decorators ============

/// Tries `primary`, and on any error scores with `fallback` instead.
pub struct FallbackScorer<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackScorer<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: LeadScorer, F: LeadScorer> LeadScorer for FallbackScorer<P, F> {
    fn score<'a>(
        &'a self,
        candidate: &'a CandidateRecord,
    ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
        async move {
            match self.primary.score(candidate).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    tracing::warn!(
                        "Primary scorer failed for '{}', using fallback: {}",
                        candidate.contact,
                        e
                    );
                    self.fallback.score(candidate).await
                }
            }
        }
        .boxed()
    }
}

/// Cache key: the signals the scoring service actually sees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScoringKey {
    title: String,
    industry: String,
    company_size: String,
    page_views: u32,
    downloads: u32,
    webinar_attended: bool,
}

impl From<&CandidateRecord> for ScoringKey {
    fn from(candidate: &CandidateRecord) -> Self {
        Self {
            title: candidate.title.clone(),
            industry: candidate.industry.clone(),
            company_size: candidate.company_size.clone(),
            page_views: candidate.page_views,
            downloads: candidate.downloads,
            webinar_attended: candidate.webinar_attended,
        }
    }
}

/// Memoizes successful scores (1 hour TTL, 10k entries).
pub struct CachedScorer<S> {
    inner: S,
    cache: Cache<ScoringKey, ScoreResult>,
}

impl<S> CachedScorer<S> {
    pub fn new(inner: S) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600)) // 1 hour
            .max_capacity(10_000)
            .build();
        Self { inner, cache }
    }
}

impl<S: LeadScorer> LeadScorer for CachedScorer<S> {
    fn score<'a>(
        &'a self,
        candidate: &'a CandidateRecord,
    ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
        async move {
            let key = ScoringKey::from(candidate);
            if let Some(cached) = self.cache.get(&key).await {
                tracing::debug!("Score cache HIT for '{}'", candidate.contact);
                return Ok(cached);
            }

            let result = self.inner.score(candidate).await?;
            self.cache.insert(key, result.clone()).await;
            Ok(result)
        }
        .boxed()
    }
}

/// The production composition: cached ML scoring, falling back to the rules.
pub fn build_scorer(config: &Config) -> Result<Arc<dyn LeadScorer>, AppError> {
    let remote = MlScoringClient::new(
        &config.scoring_api_url,
        Duration::from_secs(config.scoring_timeout_secs),
    )
    .context("initializing ML scoring client")?;
    tracing::info!("✓ ML scoring client initialized: {}", remote.score_url());

    Ok(Arc::new(FallbackScorer::new(
        CachedScorer::new(remote),
        RuleBasedScorer,
    )))
}

// ============ Feedback ============

/// Sends "was this score accurate?" votes to the scoring service.
#[derive(Clone)]
pub struct FeedbackClient {
    client: reqwest::Client,
    feedback_url: Url,
}

impl FeedbackClient {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            feedback_url: endpoint(base_url, "feedback")?,
        })
    }

    /// Posts the lead plus `correct` in the background.
    ///
    /// The outcome never reaches the caller; the handle exists so tests can
    /// wait for delivery.
    pub fn submit(&self, lead: &Lead, correct: bool) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = self.feedback_url.clone();
        let lead_id = lead.id;
        let body = feedback_body(lead, correct);

        tokio::spawn(async move {
            match client.post(url).json(&body).send().await {
                Ok(response) => tracing::debug!(
                    "Feedback for lead {} delivered with status {}",
                    lead_id,
                    response.status()
                ),
                Err(e) => tracing::debug!("Feedback for lead {} not delivered: {}", lead_id, e),
            }
        })
    }
}

fn feedback_body(lead: &Lead, correct: bool) -> Value {
    let mut body = serde_json::to_value(lead).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(map) = &mut body {
        map.insert("correct".to_string(), Value::Bool(correct));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScorer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingScorer {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl LeadScorer for CountingScorer {
        fn score<'a>(
            &'a self,
            _candidate: &'a CandidateRecord,
        ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(AppError::Scoring("boom".to_string()))
            } else {
                Ok(ScoreResult {
                    score: 0.9,
                    explanation: vec![],
                })
            };
            futures::future::ready(result).boxed()
        }
    }

    fn candidate() -> CandidateRecord {
        CandidateRecord {
            contact: "Jane Doe".to_string(),
            company: "Acme".to_string(),
            title: "CTO".to_string(),
            industry: "Technology".to_string(),
            company_size: "Enterprise".to_string(),
            page_views: 12,
            downloads: 3,
            webinar_attended: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_score_request_keys() {
        let c = candidate();
        let body = serde_json::to_value(ScoreRequest::from(&c)).unwrap();
        assert_eq!(body["Company Size"], "Enterprise");
        assert_eq!(body["Page Views"], 12);
        assert_eq!(body["Webinar Attended"], 1);
    }

    #[test]
    fn test_parse_score_response() {
        let ok = parse_score_response(&json!({
            "score": 1.4,
            "explanation": [
                {"feature": "Page Views", "impact": 0.2},
                {"feature": "broken"},
                {"feature": "Industry", "impact": -0.1}
            ]
        }))
        .unwrap();
        assert_eq!(ok.score, 1.0);
        assert_eq!(ok.explanation.len(), 2);

        assert!(parse_score_response(&json!({"score": 0.5, "error": "model down"})).is_err());
        assert!(parse_score_response(&json!({"score": "0.5"})).is_err());
        assert!(parse_score_response(&json!({"explanation": []})).is_err());
        assert!(parse_score_response(&json!({"score": 0.5, "error": null})).is_ok());
    }

    #[test]
    fn test_endpoint_keeps_prefix() {
        let base = Url::parse("http://localhost:5000/ml").unwrap();
        assert_eq!(endpoint(&base, "score").unwrap().as_str(), "http://localhost:5000/ml/score");
        let root = Url::parse("http://localhost:5000").unwrap();
        assert_eq!(endpoint(&root, "feedback").unwrap().as_str(), "http://localhost:5000/feedback");
    }

    #[test]
    fn test_rule_based_score() {
        assert_eq!(rule_based_score(&candidate()).score, 1.0);

        let minimal = CandidateRecord::default();
        let result = rule_based_score(&minimal);
        assert!((result.score - 0.3).abs() < 1e-9);
        assert_eq!(result.explanation.len(), 5);
        assert_eq!(result.explanation[3].impact, 0.05);

        let mid = CandidateRecord {
            page_views: 6,
            company_size: "Mid-Market".to_string(),
            ..Default::default()
        };
        assert!((rule_based_score(&mid).score - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fallback_scorer_uses_fallback_on_error() {
        let scorer = FallbackScorer::new(CountingScorer::new(true), RuleBasedScorer);
        let result = scorer.score(&CandidateRecord::default()).await.unwrap();
        assert!((result.score - 0.3).abs() < 1e-9);
        assert_eq!(scorer.primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_scorer_caches_successes_only() {
        let cached = CachedScorer::new(CountingScorer::new(false));
        let c = candidate();
        cached.score(&c).await.unwrap();
        cached.score(&c).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        let failing = CachedScorer::new(CountingScorer::new(true));
        assert!(failing.score(&c).await.is_err());
        assert!(failing.score(&c).await.is_err());
        assert_eq!(failing.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_feedback_body_adds_correct_flag() {
        let lead = crate::store::seed_leads().remove(0);
        let body = feedback_body(&lead, false);
        assert_eq!(body["correct"], false);
        assert_eq!(body["intentScore"], 92);
    }
}
