//! Active view, display mode, per-view filter controls and the analytics
//! aggregates shown on the dashboard.

use crate::filter::{filter_leads, FilterCriteria, IntentBand};
use crate::models::{is_hot_score, ActiveView, DisplayMode, Lead};
use crate::pagination::paginate;
use crate::render::{render_leads, DisplayTree};
use crate::storage::{read_json, write_json, KeyValueStore};
use crate::store::LeadStore;
use serde::Serialize;
use std::sync::Arc;

pub const CURRENT_VIEW_KEY: &str = "leadconnect_currentView";
pub const CURRENT_TAB_KEY: &str = "leadconnect_currentTab";
pub const TOP_LEADS_LIMIT: usize = 5;

/// Filter controls of the all-leads view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllLeadsControls {
    pub search: String,
    pub intent: IntentBand,
    pub industry: String,
    pub company_size: String,
}

impl AllLeadsControls {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::new()
            .with_search(self.search.as_str())
            .with_intent(self.intent)
            .with_industry(self.industry.as_str())
            .with_company_size(self.company_size.as_str())
    }
}

/// Filter controls of the hot-leads view. There is no intent band here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotLeadsControls {
    pub search: String,
    pub industry: String,
    pub company_size: String,
}

impl HotLeadsControls {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::hot()
            .with_search(self.search.as_str())
            .with_industry(self.industry.as_str())
            .with_company_size(self.company_size.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total: usize,
    pub hot_count: usize,
    /// Percentage of hot leads, `None` for an empty store.
    pub conversion_rate: Option<u32>,
    /// Mean intent score, `None` for an empty store.
    pub average_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndustryCount {
    pub industry: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLead {
    pub id: u64,
    pub company: String,
    pub intent_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub kpis: Kpis,
    pub industry_breakdown: Vec<IndustryCount>,
    pub top_leads: Vec<TopLead>,
}

/// View-specific part of [`ViewOutput`]. KPIs live on the output itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "content", rename_all = "camelCase")]
pub enum ViewContent {
    Leads {
        display: DisplayTree,
    },
    #[serde(rename_all = "camelCase")]
    Analytics {
        industry_breakdown: Vec<IndustryCount>,
        top_leads: Vec<TopLead>,
    },
}

/// Everything the page needs to draw the current view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutput {
    pub view: ActiveView,
    pub mode: DisplayMode,
    pub page: usize,
    pub kpis: Kpis,
    pub all_leads_controls: AllLeadsControls,
    pub hot_leads_controls: HotLeadsControls,
    #[serde(flatten)]
    pub content: ViewContent,
}

fn rounded_ratio(numerator: u64, denominator: u64) -> u32 {
    (numerator as f64 / denominator as f64).round() as u32
}

pub fn compute_kpis(leads: &[Lead]) -> Kpis {
    let total = leads.len();
    let hot_count = leads.iter().filter(|l| is_hot_score(l.intent_score)).count();

    if total == 0 {
        return Kpis {
            total,
            hot_count,
            conversion_rate: None,
            average_score: None,
        };
    }

    let score_sum: u64 = leads.iter().map(|l| u64::from(l.intent_score)).sum();
    Kpis {
        total,
        hot_count,
        conversion_rate: Some(rounded_ratio(hot_count as u64 * 100, total as u64)),
        average_score: Some(rounded_ratio(score_sum, total as u64)),
    }
}

/// Lead counts per industry, in order of first appearance.
pub fn industry_breakdown(leads: &[Lead]) -> Vec<IndustryCount> {
    let mut counts: Vec<IndustryCount> = Vec::new();
    for lead in leads {
        match counts.iter_mut().find(|c| c.industry == lead.industry) {
            Some(entry) => entry.count += 1,
            None => counts.push(IndustryCount {
                industry: lead.industry.clone(),
                count: 1,
            }),
        }
    }
    counts
}

/// The `n` highest-scoring leads. Ties keep store order.
pub fn top_leads(leads: &[Lead], n: usize) -> Vec<TopLead> {
    let mut sorted: Vec<&Lead> = leads.iter().collect();
    sorted.sort_by(|a, b| b.intent_score.cmp(&a.intent_score));
    sorted
        .into_iter()
        .take(n)
        .map(|l| TopLead {
            id: l.id,
            company: l.company.clone(),
            intent_score: l.intent_score,
        })
        .collect()
}

pub fn analytics_snapshot(leads: &[Lead]) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        kpis: compute_kpis(leads),
        industry_breakdown: industry_breakdown(leads),
        top_leads: top_leads(leads, TOP_LEADS_LIMIT),
    }
}

/// View state of the dashboard. View and display mode survive restarts.
pub struct ViewController {
    kv: Arc<dyn KeyValueStore>,
    view: ActiveView,
    mode: DisplayMode,
    page: usize,
    page_size: usize,
    all_controls: AllLeadsControls,
    hot_controls: HotLeadsControls,
}

impl ViewController {
    /// Restores the last view and display mode. Unknown or missing values
    /// fall back to the all-leads view in card mode.
    pub fn restore(kv: Arc<dyn KeyValueStore>, page_size: usize) -> Self {
        let view = read_json::<String>(kv.as_ref(), CURRENT_VIEW_KEY)
            .and_then(|raw| ActiveView::parse(&raw))
            .unwrap_or_default();
        let mode = read_json::<String>(kv.as_ref(), CURRENT_TAB_KEY)
            .and_then(|raw| DisplayMode::parse(&raw))
            .unwrap_or_default();

        tracing::debug!("Restored view '{}' in {} mode", view.as_str(), mode.as_str());

        Self {
            kv,
            view,
            mode,
            page: 0,
            page_size: page_size.max(1),
            all_controls: AllLeadsControls::default(),
            hot_controls: HotLeadsControls::default(),
        }
    }

    pub fn view(&self) -> ActiveView {
        self.view
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn all_controls(&self) -> &AllLeadsControls {
        &self.all_controls
    }

    pub fn hot_controls(&self) -> &HotLeadsControls {
        &self.hot_controls
    }

    pub fn navigate(&mut self, view: ActiveView) {
        self.view = view;
        self.page = 0;
        write_json(self.kv.as_ref(), CURRENT_VIEW_KEY, view.as_str());
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
        write_json(self.kv.as_ref(), CURRENT_TAB_KEY, mode.as_str());
    }

    /// Sets the page index as given. Out-of-range pages render empty.
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    pub fn set_all_controls(&mut self, controls: AllLeadsControls) {
        if self.all_controls != controls {
            self.all_controls = controls;
            self.page = 0;
        }
    }

    pub fn set_hot_controls(&mut self, controls: HotLeadsControls) {
        if self.hot_controls != controls {
            self.hot_controls = controls;
            self.page = 0;
        }
    }

    pub fn render(&self, store: &LeadStore) -> ViewOutput {
        let content = match self.view {
            ActiveView::AllLeads => self.render_list(store.leads(), &self.all_controls.criteria()),
            ActiveView::HotLeads => self.render_list(store.hot(), &self.hot_controls.criteria()),
            ActiveView::Analytics => ViewContent::Analytics {
                industry_breakdown: industry_breakdown(store.leads()),
                top_leads: top_leads(store.leads(), TOP_LEADS_LIMIT),
            },
        };

        ViewOutput {
            view: self.view,
            mode: self.mode,
            page: self.page,
            kpis: compute_kpis(store.leads()),
            all_leads_controls: self.all_controls.clone(),
            hot_leads_controls: self.hot_controls.clone(),
            content,
        }
    }

    fn render_list(&self, source: &[Lead], criteria: &FilterCriteria) -> ViewContent {
        let filtered = filter_leads(source, criteria);
        let page = paginate(&filtered, self.page_size, self.page);
        ViewContent::Leads {
            display: render_leads(&page, self.mode),
        }
    }
}
