//! Import runs: score candidates in bounded batches, synthesize the text shown
//! on each lead, and commit the whole run to the store at once.

use crate::csv_import::{build_candidates, parse_csv, validate_mapping, ColumnMapping};
use crate::dashboard::Dashboard;
use crate::errors::AppError;
use crate::models::{to_intent_score, CandidateRecord, FeatureImpact, LeadId, ScoreResult, ScoredLead};
use crate::scoring::LeadScorer;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

pub const DEGRADED_INSIGHT: &str = "Unable to score this lead due to a technical issue.";
pub const DEGRADED_ACTION: &str = "Please try importing this lead again later or contact support.";
pub const DEGRADED_REASONING: &str = "Lead could not be scored due to an API error.";
const GENERIC_REASONING: &str = "Score is based on available engagement and company attributes.";

/// Progress of the most recently updated import run.
///
/// One value is shared by every run: when imports overlap, each batch
/// overwrites the last, and `run_id` says which run the numbers belong to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub run_id: Option<Uuid>,
    pub processed: usize,
    pub total: usize,
    pub in_progress: bool,
    pub message: String,
}

/// Everything a scoring pass produced, before anything is committed.
#[derive(Debug, Clone, Default)]
pub struct ScoringOutcome {
    /// One record per settled task, in input order.
    pub records: Vec<ScoredLead>,
    pub batches: usize,
    /// Tasks that panicked or were cancelled. No record exists for them.
    pub hard_failures: usize,
}

impl ScoringOutcome {
    pub fn degraded_count(&self) -> usize {
        self.records.iter().filter(|r| r.degraded).count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub run_id: Uuid,
    pub batches: usize,
    pub scored: usize,
    pub degraded: usize,
    pub lead_ids: Vec<LeadId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub message: String,
}

// ============ Text Synthesis ============

pub fn build_insights(candidate: &CandidateRecord, explanation: &[FeatureImpact]) -> Vec<String> {
    let mut insights = Vec::new();
    if candidate.page_views > 0 {
        insights.push(format!("Visited the website {} times.", candidate.page_views));
    }
    if candidate.downloads > 0 {
        insights.push(format!("Downloaded {} resources.", candidate.downloads));
    }
    if candidate.webinar_attended {
        insights.push("Attended a recent webinar.".to_string());
    }
    for entry in explanation {
        if entry.impact > 0.0 {
            insights.push(format!("Strong positive: {}.", entry.feature));
        } else if entry.impact < 0.0 {
            insights.push(format!("Negative: {}.", entry.feature));
        }
    }
    insights
}

fn explanation_phrase(candidate: &CandidateRecord, entry: &FeatureImpact) -> Option<String> {
    match entry.feature.as_str() {
        "Page Views" if candidate.page_views > 0 => Some(format!(
            "High website engagement ({} page views)",
            candidate.page_views
        )),
        "Downloads" if candidate.downloads > 0 => Some(format!(
            "Interest in resources ({} downloads)",
            candidate.downloads
        )),
        "Webinar Attendance" if candidate.webinar_attended => {
            Some("Participation in a recent webinar".to_string())
        }
        "Company Size" if !candidate.company_size.is_empty() => {
            Some(format!("Company size: {}", candidate.company_size))
        }
        "Industry" if !candidate.industry.is_empty() => {
            Some(format!("Industry: {}", candidate.industry))
        }
        _ => None,
    }
}

fn signal_reasoning(candidate: &CandidateRecord) -> String {
    let mut reasons = Vec::new();
    if candidate.page_views > 0 {
        reasons.push(format!(
            "high website engagement ({} page views)",
            candidate.page_views
        ));
    }
    if candidate.downloads > 0 {
        reasons.push(format!(
            "interest in resources ({} downloads)",
            candidate.downloads
        ));
    }
    if candidate.webinar_attended {
        reasons.push("participation in a recent webinar".to_string());
    }
    if !candidate.company_size.is_empty() {
        reasons.push(format!("company size: {}", candidate.company_size));
    }
    if !candidate.industry.is_empty() {
        reasons.push(format!("industry: {}", candidate.industry));
    }

    if reasons.is_empty() {
        GENERIC_REASONING.to_string()
    } else {
        format!("Score is based on {}.", reasons.join(", "))
    }
}

/// Explains a score in one sentence.
///
/// Prefers the collaborator's explanation; falls back to the candidate's own
/// signals when the explanation is empty or only carries error entries.
pub fn compose_reasoning(candidate: &CandidateRecord, explanation: &[FeatureImpact]) -> String {
    let valid: Vec<&FeatureImpact> = explanation
        .iter()
        .filter(|e| !e.feature.is_empty() && e.feature != "API Error")
        .collect();

    if valid.is_empty() {
        return signal_reasoning(candidate);
    }

    let phrases: Vec<String> = valid
        .iter()
        .filter_map(|e| explanation_phrase(candidate, e))
        .collect();

    if phrases.is_empty() {
        GENERIC_REASONING.to_string()
    } else {
        format!("This score reflects {}.", phrases.join(", "))
    }
}

pub fn recommended_action(candidate: &CandidateRecord, score: f64) -> String {
    let mut action;
    if score >= 0.85 {
        action = "Assign to a senior SDR for immediate follow-up. Consider a personalized demo or proposal."
            .to_string();
        if candidate.webinar_attended {
            action.push_str(" Leverage their recent webinar attendance.");
        }
        if candidate.downloads > 2 {
            action.push_str(" Highlight downloaded resources in outreach.");
        }
    } else if score >= 0.6 {
        action = "Nurture with targeted content and schedule a discovery call.".to_string();
        if candidate.page_views > 5 {
            action.push_str(" Reference their high website engagement.");
        }
    } else {
        action = "Add to a long-term nurture campaign and monitor for future engagement.".to_string();
        if candidate.page_views == 0 && candidate.downloads == 0 {
            action.push_str(" Encourage initial engagement.");
        }
    }
    action
}

/// Builds the scored record for a successful collaborator call.
pub fn synthesize(candidate: CandidateRecord, result: &ScoreResult) -> ScoredLead {
    ScoredLead {
        intent_score: to_intent_score(result.score),
        insights: build_insights(&candidate, &result.explanation),
        recommended_action: recommended_action(&candidate, result.score),
        reasoning: compose_reasoning(&candidate, &result.explanation),
        candidate,
        degraded: false,
    }
}

/// Builds the placeholder record for a candidate whose scoring failed.
pub fn degraded(candidate: CandidateRecord) -> ScoredLead {
    ScoredLead {
        candidate,
        intent_score: 0,
        insights: vec![DEGRADED_INSIGHT.to_string()],
        recommended_action: DEGRADED_ACTION.to_string(),
        reasoning: DEGRADED_REASONING.to_string(),
        degraded: true,
    }
}

// ============ Orchestrator ============

pub struct ImportOrchestrator {
    scorer: Arc<dyn LeadScorer>,
    concurrency: usize,
    progress: watch::Sender<ImportProgress>,
}

impl ImportOrchestrator {
    pub fn new(scorer: Arc<dyn LeadScorer>, concurrency: usize) -> Self {
        let (progress, _) = watch::channel(ImportProgress::default());
        Self {
            scorer,
            concurrency: concurrency.max(1),
            progress,
        }
    }

    pub fn progress(&self) -> ImportProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ImportProgress> {
        self.progress.subscribe()
    }

    fn report_progress(&self, run_id: Uuid, processed: usize, total: usize, in_progress: bool, message: String) {
        self.progress.send_replace(ImportProgress {
            run_id: Some(run_id),
            processed,
            total,
            in_progress,
            message,
        });
    }

    /// Scores candidates in batches of `concurrency`.
    ///
    /// Each batch runs as spawned tasks and fully settles before the next one
    /// starts. A scoring error yields a degraded record; a task that panics is
    /// counted as a hard failure.
    pub async fn score_candidates(&self, candidates: Vec<CandidateRecord>) -> ScoringOutcome {
        self.score_run(Uuid::new_v4(), candidates).await
    }

    async fn score_run(&self, run_id: Uuid, candidates: Vec<CandidateRecord>) -> ScoringOutcome {
        let total = candidates.len();
        let mut outcome = ScoringOutcome {
            records: Vec::with_capacity(total),
            ..Default::default()
        };

        for batch in candidates.chunks(self.concurrency) {
            let handles: Vec<_> = batch
                .iter()
                .cloned()
                .map(|candidate| {
                    let scorer = Arc::clone(&self.scorer);
                    tokio::spawn(async move {
                        let result = scorer.score(&candidate).await;
                        match result {
                            Ok(score) => synthesize(candidate, &score),
                            Err(e) => {
                                tracing::warn!(
                                    "Scoring failed for '{}', storing degraded record: {}",
                                    candidate.contact,
                                    e
                                );
                                degraded(candidate)
                            }
                        }
                    })
                })
                .collect();

            for joined in join_all(handles).await {
                match joined {
                    Ok(record) => outcome.records.push(record),
                    Err(e) => {
                        tracing::error!("Scoring task did not complete: {}", e);
                        outcome.hard_failures += 1;
                    }
                }
            }
            outcome.batches += 1;

            let message = format!("Imported {} of {} leads...", outcome.records.len(), total);
            tracing::info!("{}", message);
            self.report_progress(run_id, outcome.records.len(), total, true, message);
        }

        outcome
    }

    /// Runs a complete import: parse, map, score, then commit in one step.
    ///
    /// The dashboard lock is only taken for the commit. When any task failed
    /// hard the store is left untouched.
    pub async fn run_import(
        &self,
        dashboard: &Mutex<Dashboard>,
        csv_text: &str,
        mapping: &ColumnMapping,
    ) -> Result<ImportReport, AppError> {
        let table = parse_csv(csv_text)?;
        validate_mapping(mapping)?;

        let candidates = build_candidates(&table, mapping);
        if candidates.is_empty() {
            return Err(AppError::BadRequest(
                "No leads were imported. Please check your CSV file and mapping.".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = candidates.len();
        tracing::info!("Import {} started: {} lead(s) to score", run_id, total);
        self.report_progress(run_id, 0, total, true, "Processing leads...".to_string());

        let outcome = self.score_run(run_id, candidates).await;

        if outcome.hard_failures > 0 {
            let message =
                "Some leads could not be imported. Please check the data and try again.".to_string();
            self.report_progress(run_id, outcome.records.len(), total, false, message);
            return Err(AppError::ImportAborted(format!(
                "run {}: {} scoring task(s) failed, nothing committed",
                run_id, outcome.hard_failures
            )));
        }

        let degraded = outcome.degraded_count();
        let scored = outcome.records.len() - degraded;
        let batches = outcome.batches;
        let imported = outcome.records.len();

        let committed = dashboard.lock().await.append_scored(outcome.records);
        let lead_ids = match committed {
            Ok(ids) => ids,
            Err(e) => {
                let message =
                    "Some leads could not be imported. Please check the data and try again."
                        .to_string();
                self.report_progress(run_id, imported, total, false, message);
                return Err(e);
            }
        };

        let message = format!("Successfully imported {} leads!", imported);
        self.report_progress(run_id, imported, total, false, message.clone());

        let finished_at = Utc::now();
        tracing::info!(
            "Import {} finished in {}ms: {} scored, {} degraded, {} batch(es)",
            run_id,
            (finished_at - started_at).num_milliseconds(),
            scored,
            degraded,
            batches
        );

        Ok(ImportReport {
            run_id,
            batches,
            scored,
            degraded,
            lead_ids,
            started_at,
            finished_at,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreResult;
    use futures::future::{BoxFuture, FutureExt};

    struct PanickyScorer;

    impl LeadScorer for PanickyScorer {
        fn score<'a>(
            &'a self,
            candidate: &'a CandidateRecord,
        ) -> BoxFuture<'a, Result<ScoreResult, AppError>> {
            async move {
                if candidate.contact == "panic" {
                    panic!("scorer blew up");
                }
                if candidate.contact == "fail" {
                    return Err(AppError::Scoring("unavailable".to_string()));
                }
                Ok(ScoreResult {
                    score: 0.7,
                    explanation: vec![],
                })
            }
            .boxed()
        }
    }

    fn named(contact: &str) -> CandidateRecord {
        CandidateRecord {
            contact: contact.to_string(),
            ..Default::default()
        }
    }

    fn impact(feature: &str, impact: f64) -> FeatureImpact {
        FeatureImpact {
            feature: feature.to_string(),
            impact,
        }
    }

    #[test]
    fn test_insights_order() {
        let candidate = CandidateRecord {
            page_views: 4,
            downloads: 1,
            webinar_attended: true,
            ..Default::default()
        };
        let insights = build_insights(
            &candidate,
            &[impact("Industry", 0.1), impact("Title", 0.0), impact("Company Size", -0.2)],
        );
        assert_eq!(
            insights,
            vec![
                "Visited the website 4 times.",
                "Downloaded 1 resources.",
                "Attended a recent webinar.",
                "Strong positive: Industry.",
                "Negative: Company Size.",
            ]
        );
    }

    #[test]
    fn test_reasoning_from_explanation() {
        let candidate = CandidateRecord {
            page_views: 12,
            industry: "Finance".to_string(),
            ..Default::default()
        };
        let reasoning = compose_reasoning(
            &candidate,
            &[impact("Page Views", 0.2), impact("Downloads", 0.1), impact("Industry", 0.1)],
        );
        assert_eq!(
            reasoning,
            "This score reflects High website engagement (12 page views), Industry: Finance."
        );

        // Valid entries but no present signals.
        assert_eq!(
            compose_reasoning(&CandidateRecord::default(), &[impact("Downloads", 0.1)]),
            GENERIC_REASONING
        );
    }

    #[test]
    fn test_reasoning_from_signals() {
        let candidate = CandidateRecord {
            downloads: 2,
            company_size: "Enterprise".to_string(),
            ..Default::default()
        };
        assert_eq!(
            compose_reasoning(&candidate, &[impact("API Error", 0.0)]),
            "Score is based on interest in resources (2 downloads), company size: Enterprise."
        );
        assert_eq!(compose_reasoning(&CandidateRecord::default(), &[]), GENERIC_REASONING);
    }

    #[test]
    fn test_action_tiers() {
        let hot = CandidateRecord {
            webinar_attended: true,
            downloads: 3,
            ..Default::default()
        };
        assert!(recommended_action(&hot, 0.9).ends_with(
            "Leverage their recent webinar attendance. Highlight downloaded resources in outreach."
        ));
        let warm = CandidateRecord {
            page_views: 6,
            ..Default::default()
        };
        assert!(recommended_action(&warm, 0.6).ends_with("Reference their high website engagement."));
        assert!(recommended_action(&CandidateRecord::default(), 0.2)
            .ends_with("Encourage initial engagement."));
    }

    #[test]
    fn test_synthesize_and_degraded() {
        let record = synthesize(
            named("Jane"),
            &ScoreResult {
                score: 0.846,
                explanation: vec![],
            },
        );
        assert_eq!(record.intent_score, 85);
        assert!(!record.degraded);

        let failed = degraded(named("Bob"));
        assert_eq!(failed.intent_score, 0);
        assert_eq!(failed.insights, vec![DEGRADED_INSIGHT]);
        assert!(failed.degraded);
    }

    #[tokio::test]
    async fn test_batches_keep_input_order() {
        let orchestrator = ImportOrchestrator::new(Arc::new(PanickyScorer), 2);
        let candidates: Vec<_> = ["a", "fail", "c", "d", "e"].iter().map(|n| named(n)).collect();
        let outcome = orchestrator.score_candidates(candidates).await;

        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.hard_failures, 0);
        let names: Vec<&str> = outcome.records.iter().map(|r| r.candidate.contact.as_str()).collect();
        assert_eq!(names, vec!["a", "fail", "c", "d", "e"]);
        assert_eq!(outcome.degraded_count(), 1);
        assert_eq!(orchestrator.progress().processed, 5);
    }

    #[tokio::test]
    async fn test_panicking_task_is_hard_failure() {
        let orchestrator = ImportOrchestrator::new(Arc::new(PanickyScorer), 20);
        let outcome = orchestrator
            .score_candidates(vec![named("a"), named("panic"), named("c")])
            .await;
        assert_eq!(outcome.hard_failures, 1);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_reports_latest_run() {
        let orchestrator = ImportOrchestrator::new(Arc::new(PanickyScorer), 20);
        let dashboard = memory_dashboard();
        let rx = orchestrator.subscribe_progress();

        let first = orchestrator
            .run_import(&dashboard, "N\na\nb\n", &single_column_mapping())
            .await
            .unwrap();
        assert_eq!(rx.borrow().run_id, Some(first.run_id));

        let second = orchestrator
            .run_import(&dashboard, "N\nc\n", &single_column_mapping())
            .await
            .unwrap();
        assert_ne!(first.run_id, second.run_id);

        let progress = rx.borrow().clone();
        assert_eq!(progress.run_id, Some(second.run_id));
        assert_eq!(progress.total, 1);
        assert_eq!(progress.message, "Successfully imported 1 leads!");
    }

    fn single_column_mapping() -> ColumnMapping {
        crate::csv_import::REQUIRED_FIELDS
            .iter()
            .fold(ColumnMapping::new(), |mapping, field| mapping.with(field.key, "N"))
    }

    fn memory_dashboard() -> Mutex<Dashboard> {
        Mutex::new(Dashboard::load(
            Arc::new(crate::storage::MemoryKeyValueStore::new()),
            50,
        ))
    }

    #[tokio::test]
    async fn test_hard_failure_aborts_run_without_commit() {
        let orchestrator = ImportOrchestrator::new(Arc::new(PanickyScorer), 20);
        let dashboard = memory_dashboard();

        let result = orchestrator
            .run_import(&dashboard, "N\nok\npanic\n", &single_column_mapping())
            .await;
        assert!(matches!(result, Err(AppError::ImportAborted(_))));

        let guard = dashboard.lock().await;
        assert_eq!(guard.store().len(), 7);
        assert_eq!(guard.revision(), 0);
        assert_eq!(guard.store().next_id(), 8);

        let progress = orchestrator.progress();
        assert!(!progress.in_progress);
        assert_eq!(progress.processed, 1);
        assert_eq!(progress.total, 2);
    }

    #[tokio::test]
    async fn test_commit_failure_clears_in_progress() {
        let kv: Arc<dyn crate::storage::KeyValueStore> =
            Arc::new(crate::storage::MemoryKeyValueStore::new());
        assert!(crate::storage::write_json(
            kv.as_ref(),
            crate::store::NEXT_ID_KEY,
            &LeadId::MAX
        ));
        let dashboard = Mutex::new(Dashboard::load(kv, 50));
        let orchestrator = ImportOrchestrator::new(Arc::new(PanickyScorer), 20);

        let result = orchestrator
            .run_import(&dashboard, "N\nok\n", &single_column_mapping())
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(dashboard.lock().await.store().len(), 7);
        assert!(!orchestrator.progress().in_progress);
    }
}
