use serde::{Deserialize, Serialize};

/// Identifier of a lead inside the store. Always positive.
pub type LeadId = u64;

/// Minimum intent score for a lead to count as hot.
pub const HOT_THRESHOLD: u8 = 85;
/// Minimum intent score for the warm band.
pub const WARM_THRESHOLD: u8 = 60;
/// Upper bound of the intent score scale.
pub const MAX_INTENT_SCORE: u8 = 100;

pub const INDUSTRY_OPTIONS: [&str; 7] = [
    "Technology",
    "Healthcare",
    "Finance",
    "Manufacturing",
    "Education",
    "Retail",
    "Energy",
];

pub const SIZE_OPTIONS: [&str; 3] = ["Enterprise", "Mid-Market", "Small Business"];

// ============ Lead Records ============

/// A lead as held by the store and persisted to storage.
///
/// Field names serialize in camelCase so stored lists stay compatible with
/// the dashboard's browser storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub company_size: String,
    /// Integer score in `0..=100`.
    #[serde(default)]
    pub intent_score: u8,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommended_action: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_views: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webinar_attended: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Lead {
    pub fn is_hot(&self) -> bool {
        is_hot_score(self.intent_score)
    }

    /// Forces the score back into `0..=100`.
    pub fn clamp_score(&mut self) {
        self.intent_score = self.intent_score.min(MAX_INTENT_SCORE);
    }
}

pub fn is_hot_score(score: u8) -> bool {
    score >= HOT_THRESHOLD
}

/// Converts a fractional collaborator score into the 0-100 intent scale.
pub fn to_intent_score(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, f64::from(MAX_INTENT_SCORE)) as u8
}

// ============ Import Pipeline ============

/// Lead-shaped record built from one CSV row, not yet scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub contact: String,
    pub company: String,
    pub title: String,
    pub industry: String,
    pub company_size: String,
    pub email: Option<String>,
    pub website: Option<String>,
    pub page_views: u32,
    pub downloads: u32,
    pub webinar_attended: bool,
}

/// One `(feature, signed impact)` pair from a scoring collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub impact: f64,
}

/// Output of a scoring collaborator: a score in `[0, 1]` plus its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    #[serde(default)]
    pub explanation: Vec<FeatureImpact>,
}

/// A candidate after scoring and text synthesis, waiting for an ID from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredLead {
    pub candidate: CandidateRecord,
    pub intent_score: u8,
    pub insights: Vec<String>,
    pub recommended_action: String,
    pub reasoning: String,
    /// True when scoring failed and generic text was substituted.
    pub degraded: bool,
}

impl ScoredLead {
    pub fn into_lead(self, id: LeadId) -> Lead {
        let candidate = self.candidate;
        Lead {
            id,
            company: candidate.company,
            contact: candidate.contact,
            title: candidate.title,
            industry: candidate.industry,
            company_size: candidate.company_size,
            intent_score: self.intent_score.min(MAX_INTENT_SCORE),
            insights: self.insights,
            recommended_action: self.recommended_action,
            reasoning: self.reasoning,
            page_views: Some(candidate.page_views),
            downloads: Some(candidate.downloads),
            webinar_attended: Some(candidate.webinar_attended),
            email: candidate.email,
            website: candidate.website,
        }
    }
}

// ============ View State ============

/// Top-level dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveView {
    #[default]
    #[serde(rename = "allLeadsView")]
    AllLeads,
    #[serde(rename = "hotLeadsView")]
    HotLeads,
    #[serde(rename = "analyticsView")]
    Analytics,
}

impl ActiveView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveView::AllLeads => "allLeadsView",
            ActiveView::HotLeads => "hotLeadsView",
            ActiveView::Analytics => "analyticsView",
        }
    }

    /// Parses a stored or requested view name. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "allLeadsView" | "all-leads" | "all" => Some(ActiveView::AllLeads),
            "hotLeadsView" | "hot-leads" | "hot" => Some(ActiveView::HotLeads),
            "analyticsView" | "analytics" => Some(ActiveView::Analytics),
            _ => None,
        }
    }
}

/// Card grid or tabular list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Card,
    List,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Card => "card",
            DisplayMode::List => "list",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "card" => Some(DisplayMode::Card),
            "list" => Some(DisplayMode::List),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_score_conversion() {
        assert_eq!(to_intent_score(0.0), 0);
        assert_eq!(to_intent_score(0.845), 85);
        assert_eq!(to_intent_score(1.0), 100);
        assert_eq!(to_intent_score(1.7), 100);
        assert_eq!(to_intent_score(-0.2), 0);
        assert_eq!(to_intent_score(f64::NAN), 0);
    }

    #[test]
    fn test_lead_deserializes_browser_format() {
        let raw = r#"{
            "id": 4,
            "company": "FinTech Innovations",
            "contact": "James Wilson",
            "title": "Head of Digital Transformation",
            "intentScore": 85,
            "industry": "Finance",
            "companySize": "Enterprise",
            "insights": ["Requested custom demo"],
            "recommendedAction": "Prepare demo",
            "reasoning": "Multi-stakeholder engagement"
        }"#;
        let lead: Lead = serde_json::from_str(raw).unwrap();
        assert_eq!(lead.company_size, "Enterprise");
        assert!(lead.is_hot());
        assert_eq!(lead.page_views, None);
    }

    #[test]
    fn test_view_names_roundtrip() {
        for view in [
            ActiveView::AllLeads,
            ActiveView::HotLeads,
            ActiveView::Analytics,
        ] {
            assert_eq!(ActiveView::parse(view.as_str()), Some(view));
        }
        assert_eq!(ActiveView::parse("settingsView"), None);
        assert_eq!(DisplayMode::parse("LIST"), Some(DisplayMode::List));
    }
}
