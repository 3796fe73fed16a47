use crate::models::{Lead, HOT_THRESHOLD, WARM_THRESHOLD};
use serde::Serialize;

/// Intent score band selectable in the all-leads view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentBand {
    #[default]
    Any,
    High,
    Warm,
    Cold,
}

impl IntentBand {
    /// Parses the filter control value. Empty or unknown values mean no constraint.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => IntentBand::High,
            "warm" => IntentBand::Warm,
            "cold" => IntentBand::Cold,
            _ => IntentBand::Any,
        }
    }

    pub fn contains(&self, score: u8) -> bool {
        match self {
            IntentBand::Any => true,
            IntentBand::High => score >= HOT_THRESHOLD,
            IntentBand::Warm => (WARM_THRESHOLD..HOT_THRESHOLD).contains(&score),
            IntentBand::Cold => score < WARM_THRESHOLD,
        }
    }
}

/// Filter criteria for one query. Built fresh per query, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    search: String,
    intent: IntentBand,
    industry: String,
    company_size: String,
    hot_subset: bool,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria for the hot-leads view, where the intent band never applies.
    pub fn hot() -> Self {
        Self {
            hot_subset: true,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into().trim().to_lowercase();
        self
    }

    pub fn with_intent(mut self, band: IntentBand) -> Self {
        self.intent = band;
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into().trim().to_lowercase();
        self
    }

    pub fn with_company_size(mut self, size: impl Into<String>) -> Self {
        self.company_size = size.into().trim().to_lowercase();
        self
    }

    pub fn is_hot_subset(&self) -> bool {
        self.hot_subset
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        let matches_search = self.search.is_empty()
            || lead.contact.to_lowercase().contains(&self.search)
            || lead.company.to_lowercase().contains(&self.search)
            || lead.title.to_lowercase().contains(&self.search);

        // The hot subset is already filtered upstream.
        let matches_intent = self.hot_subset || self.intent.contains(lead.intent_score);

        let matches_industry =
            self.industry.is_empty() || lead.industry.trim().to_lowercase() == self.industry;

        let matches_size = self.company_size.is_empty()
            || lead.company_size.trim().to_lowercase() == self.company_size;

        matches_search && matches_intent && matches_industry && matches_size
    }
}

/// Applies the criteria and sorts by intent score, highest first.
/// Ties keep their order from `source`.
pub fn filter_leads(source: &[Lead], criteria: &FilterCriteria) -> Vec<Lead> {
    let mut filtered: Vec<Lead> = source
        .iter()
        .filter(|lead| criteria.matches(lead))
        .cloned()
        .collect();
    filtered.sort_by(|a, b| b.intent_score.cmp(&a.intent_score));
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed_leads;

    #[test]
    fn test_empty_criteria_returns_everything_sorted() {
        let leads = seed_leads();
        let result = filter_leads(&leads, &FilterCriteria::new());
        let scores: Vec<u8> = result.iter().map(|l| l.intent_score).collect();
        assert_eq!(scores, vec![92, 91, 88, 85, 76, 67, 58]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let leads = seed_leads();
        let by_contact = filter_leads(&leads, &FilterCriteria::new().with_search("  SARAH "));
        assert_eq!(by_contact.len(), 1);
        let by_title = filter_leads(&leads, &FilterCriteria::new().with_search("director"));
        let companies: Vec<&str> = by_title.iter().map(|l| l.company.as_str()).collect();
        assert_eq!(companies, vec!["GreenEnergy Dynamics", "LogiCorp Manufacturing"]);
    }

    #[test]
    fn test_intent_bands() {
        let leads = seed_leads();
        let warm = filter_leads(&leads, &FilterCriteria::new().with_intent(IntentBand::Warm));
        assert!(warm.iter().all(|l| (60..85).contains(&l.intent_score)));
        assert_eq!(warm.len(), 2);
        let cold = filter_leads(&leads, &FilterCriteria::new().with_intent(IntentBand::Cold));
        assert_eq!(cold.len(), 1);
        assert_eq!(IntentBand::parse(""), IntentBand::Any);
    }

    #[test]
    fn test_intent_band_ignored_for_hot_subset() {
        let leads = crate::store::hot_leads(&seed_leads());
        let result = filter_leads(&leads, &FilterCriteria::hot().with_intent(IntentBand::Cold));
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_industry_and_size_trimmed_case_insensitive() {
        let leads = seed_leads();
        let result = filter_leads(
            &leads,
            &FilterCriteria::new()
                .with_industry(" healthcare ")
                .with_company_size("ENTERPRISE"),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].contact, "Dr. Michael Rodriguez");
    }

    #[test]
    fn test_ties_keep_source_order() {
        let mut leads = seed_leads();
        for lead in leads.iter_mut() {
            lead.intent_score = 70;
        }
        let result = filter_leads(&leads, &FilterCriteria::new());
        let ids: Vec<u64> = result.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }
}
