//! Pure projection from leads to a display tree.
//!
//! Nothing here touches a browser: the host serializes the tree and the page
//! script patches the DOM from it.

use crate::models::{DisplayMode, Lead, LeadId, HOT_THRESHOLD, WARM_THRESHOLD};
use crate::pagination::Page;
use serde::Serialize;

pub const AVATAR_COLORS: [&str; 7] = [
    "#1FB8CD", "#FFC185", "#B4413C", "#ECEBD5", "#5D878F", "#DB4545", "#D2BA4C",
];

const LOGO_SERVICE: &str = "https://logo.clearbit.com/";
pub const EMPTY_TITLE: &str = "No leads found";
pub const EMPTY_HINT: &str = "Try adjusting your filters or search terms.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBadge {
    Hot,
    Warm,
    Cold,
}

impl ScoreBadge {
    pub fn for_score(score: u8) -> Self {
        if score >= HOT_THRESHOLD {
            ScoreBadge::Hot
        } else if score >= WARM_THRESHOLD {
            ScoreBadge::Warm
        } else {
            ScoreBadge::Cold
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBadge::Hot => "Hot",
            ScoreBadge::Warm => "Warm",
            ScoreBadge::Cold => "Cold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadCard {
    pub id: LeadId,
    pub initials: String,
    pub avatar_color: &'static str,
    /// Absent when the lead has no http(s) website; show the initials instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub contact: String,
    pub company: String,
    pub title: String,
    pub score: u8,
    pub badge: ScoreBadge,
    pub insights: Vec<String>,
    pub recommended_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRow {
    pub id: LeadId,
    pub contact: String,
    pub company: String,
    pub title: String,
    pub industry: String,
    pub company_size: String,
    pub score: u8,
    pub badge: ScoreBadge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationControls {
    pub current_page: usize,
    pub total_pages: usize,
    pub label: String,
    pub prev_disabled: bool,
    pub next_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayTree {
    Empty {
        title: &'static str,
        hint: &'static str,
    },
    #[serde(rename_all = "camelCase")]
    Cards {
        cards: Vec<LeadCard>,
        total_matches: usize,
        pagination: Option<PaginationControls>,
    },
    #[serde(rename_all = "camelCase")]
    Table {
        rows: Vec<LeadRow>,
        total_matches: usize,
        pagination: Option<PaginationControls>,
    },
}

/// Detail shown when a user asks why a lead got its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningView {
    pub id: LeadId,
    pub initials: String,
    pub avatar_color: &'static str,
    pub contact: String,
    pub headline: String,
    pub score_label: String,
    pub reasoning: String,
    pub insights: Vec<String>,
}

/// Up to two uppercase initials from the company name, or `--` when blank.
pub fn company_initials(company: &str) -> String {
    if company.trim().is_empty() {
        return "--".to_string();
    }
    company
        .split(' ')
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(2)
        .collect()
}

pub fn avatar_color(id: LeadId) -> &'static str {
    let index = (id.saturating_sub(1) % AVATAR_COLORS.len() as u64) as usize;
    AVATAR_COLORS[index]
}

/// Logo image URL for a company website, when the website is an http(s) URL.
pub fn company_logo_url(website: Option<&str>) -> Option<String> {
    let website = website?;
    if !website.starts_with("http") {
        return None;
    }
    let host = website
        .strip_prefix("https://")
        .or_else(|| website.strip_prefix("http://"))
        .unwrap_or(website);
    let host = host.strip_suffix('/').unwrap_or(host);
    Some(format!("{}{}", LOGO_SERVICE, host))
}

fn pagination_controls<T>(page: &Page<T>) -> Option<PaginationControls> {
    if page.total_pages <= 1 {
        return None;
    }
    Some(PaginationControls {
        current_page: page.page,
        total_pages: page.total_pages,
        label: format!("Page {} of {}", page.page + 1, page.total_pages),
        prev_disabled: !page.has_prev(),
        next_disabled: !page.has_next(),
    })
}

pub fn lead_card(lead: &Lead) -> LeadCard {
    LeadCard {
        id: lead.id,
        initials: company_initials(&lead.company),
        avatar_color: avatar_color(lead.id),
        logo_url: company_logo_url(lead.website.as_deref()),
        contact: lead.contact.clone(),
        company: lead.company.clone(),
        title: lead.title.clone(),
        score: lead.intent_score,
        badge: ScoreBadge::for_score(lead.intent_score),
        insights: lead.insights.clone(),
        recommended_action: lead.recommended_action.clone(),
    }
}

pub fn lead_row(lead: &Lead) -> LeadRow {
    LeadRow {
        id: lead.id,
        contact: lead.contact.clone(),
        company: lead.company.clone(),
        title: lead.title.clone(),
        industry: lead.industry.clone(),
        company_size: lead.company_size.clone(),
        score: lead.intent_score,
        badge: ScoreBadge::for_score(lead.intent_score),
    }
}

/// Projects one page of filtered leads into the requested display mode.
pub fn render_leads(page: &Page<Lead>, mode: DisplayMode) -> DisplayTree {
    if page.total_items == 0 {
        return DisplayTree::Empty {
            title: EMPTY_TITLE,
            hint: EMPTY_HINT,
        };
    }

    let pagination = pagination_controls(page);
    match mode {
        DisplayMode::Card => DisplayTree::Cards {
            cards: page.items.iter().map(lead_card).collect(),
            total_matches: page.total_items,
            pagination,
        },
        DisplayMode::List => DisplayTree::Table {
            rows: page.items.iter().map(lead_row).collect(),
            total_matches: page.total_items,
            pagination,
        },
    }
}

pub fn render_reasoning(lead: &Lead) -> ReasoningView {
    ReasoningView {
        id: lead.id,
        initials: company_initials(&lead.company),
        avatar_color: avatar_color(lead.id),
        contact: lead.contact.clone(),
        headline: format!("{} at {}", lead.title, lead.company),
        score_label: format!("{}%", lead.intent_score),
        reasoning: lead.reasoning.clone(),
        insights: lead.insights.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::paginate;
    use crate::store::seed_leads;

    #[test]
    fn test_initials() {
        assert_eq!(company_initials("TechFlow Solutions"), "TS");
        assert_eq!(company_initials("acme"), "A");
        assert_eq!(company_initials("Big  Red Dog Inc"), "BR");
        assert_eq!(company_initials("   "), "--");
    }

    #[test]
    fn test_avatar_color_cycles() {
        assert_eq!(avatar_color(1), "#1FB8CD");
        assert_eq!(avatar_color(8), "#1FB8CD");
        assert_eq!(avatar_color(7), "#D2BA4C");
    }

    #[test]
    fn test_logo_url_from_website() {
        assert_eq!(
            company_logo_url(Some("https://acme.io/")).as_deref(),
            Some("https://logo.clearbit.com/acme.io")
        );
        assert_eq!(
            company_logo_url(Some("http://globex.com")).as_deref(),
            Some("https://logo.clearbit.com/globex.com")
        );
        assert_eq!(company_logo_url(Some("acme.io")), None);
        assert_eq!(company_logo_url(None), None);

        let mut lead = seed_leads().remove(0);
        lead.website = Some("https://northwind.example".to_string());
        let card = lead_card(&lead);
        assert_eq!(card.logo_url.as_deref(), Some("https://logo.clearbit.com/northwind.example"));
        assert_eq!(card.initials, company_initials(&lead.company));

        lead.website = None;
        let json = serde_json::to_value(lead_card(&lead)).unwrap();
        assert!(json.get("logoUrl").is_none());
    }

    #[test]
    fn test_badges() {
        assert_eq!(ScoreBadge::for_score(85), ScoreBadge::Hot);
        assert_eq!(ScoreBadge::for_score(84), ScoreBadge::Warm);
        assert_eq!(ScoreBadge::for_score(60), ScoreBadge::Warm);
        assert_eq!(ScoreBadge::for_score(59).label(), "Cold");
    }

    #[test]
    fn test_empty_list_renders_empty_state() {
        let page = paginate::<Lead>(&[], 50, 0);
        assert!(matches!(
            render_leads(&page, DisplayMode::List),
            DisplayTree::Empty { .. }
        ));
    }

    #[test]
    fn test_card_and_table_modes() {
        let leads = seed_leads();
        let page = paginate(&leads, 50, 0);
        match render_leads(&page, DisplayMode::Card) {
            DisplayTree::Cards {
                cards, pagination, ..
            } => {
                assert_eq!(cards.len(), 7);
                assert_eq!(cards[0].initials, "TS");
                assert!(pagination.is_none());
            }
            other => panic!("expected cards, got {:?}", other),
        }
        match render_leads(&page, DisplayMode::List) {
            DisplayTree::Table { rows, .. } => assert_eq!(rows[1].company_size, "Enterprise"),
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_pagination_controls_on_last_page() {
        let leads: Vec<Lead> = (0..3).flat_map(|_| seed_leads()).collect();
        let page = paginate(&leads, 10, 2);
        match render_leads(&page, DisplayMode::Card) {
            DisplayTree::Cards {
                pagination: Some(controls),
                cards,
                total_matches,
            } => {
                assert_eq!(cards.len(), 1);
                assert_eq!(total_matches, 21);
                assert_eq!(controls.label, "Page 3 of 3");
                assert!(!controls.prev_disabled);
                assert!(controls.next_disabled);
            }
            other => panic!("expected paginated cards, got {:?}", other),
        }
    }

    #[test]
    fn test_reasoning_view() {
        let lead = &seed_leads()[0];
        let view = render_reasoning(lead);
        assert_eq!(view.headline, "VP of Engineering at TechFlow Solutions");
        assert_eq!(view.score_label, "92%");
        assert_eq!(view.insights.len(), 3);
    }
}
