use crate::errors::AppError;
use crate::models::{Lead, LeadId, ScoredLead};
use crate::storage::{read_json, write_json, KeyValueStore};
use std::collections::HashSet;
use std::sync::Arc;

pub const LEADS_KEY: &str = "leadconnect_leads";
pub const NEXT_ID_KEY: &str = "leadconnect_next_id";

/// Authoritative lead list plus its derived hot subset.
///
/// All mutations go through `append`, `delete` and `clear`. Each one
/// recomputes the hot subset from scratch and persists the whole list.
pub struct LeadStore {
    kv: Arc<dyn KeyValueStore>,
    leads: Vec<Lead>,
    hot: Vec<Lead>,
    next_id: LeadId,
}

impl LeadStore {
    /// Restores the lead list from storage, falling back to the seed set when
    /// nothing usable is stored.
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let leads = match read_json::<Vec<Lead>>(kv.as_ref(), LEADS_KEY) {
            Some(leads) => {
                tracing::info!("Restored {} lead(s) from storage", leads.len());
                leads
            }
            None => {
                tracing::info!("No stored leads found, loading default seed set");
                seed_leads()
            }
        };
        let persisted_next = read_json::<LeadId>(kv.as_ref(), NEXT_ID_KEY).unwrap_or(1);

        let mut store = Self {
            kv,
            leads: Vec::new(),
            hot: Vec::new(),
            next_id: persisted_next.max(1),
        };
        store.adopt(leads);
        store
    }

    /// Builds a store around an explicit list without reading storage.
    pub fn with_leads(kv: Arc<dyn KeyValueStore>, leads: Vec<Lead>) -> Self {
        let mut store = Self {
            kv,
            leads: Vec::new(),
            hot: Vec::new(),
            next_id: 1,
        };
        store.adopt(leads);
        store
    }

    /// Takes ownership of a restored list and re-establishes the invariants:
    /// scores within range, unique IDs in `1..LeadId::MAX`, allocator past
    /// every ID.
    fn adopt(&mut self, leads: Vec<Lead>) {
        let max_id = leads
            .iter()
            .map(|l| l.id)
            .filter(|id| *id < LeadId::MAX)
            .max()
            .unwrap_or(0);
        // max_id < LeadId::MAX, so this cannot overflow.
        self.next_id = self.next_id.max(max_id + 1);

        let mut seen = HashSet::with_capacity(leads.len());
        let mut adopted = Vec::with_capacity(leads.len());
        for mut lead in leads {
            lead.clamp_score();
            if lead.id == 0 || lead.id == LeadId::MAX || !seen.insert(lead.id) {
                match self.allocate_ids(1) {
                    Ok(fresh) => {
                        tracing::warn!(
                            "Lead '{}' had an unusable or duplicate id {}, reassigned to {}",
                            lead.contact,
                            lead.id,
                            fresh[0]
                        );
                        lead.id = fresh[0];
                        seen.insert(fresh[0]);
                    }
                    Err(e) => {
                        tracing::warn!("Dropping restored lead '{}': {}", lead.contact, e);
                        continue;
                    }
                }
            }
            adopted.push(lead);
        }

        self.leads = adopted;
        self.refresh_hot();
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    /// Leads scoring 85 or more, in store order.
    pub fn hot(&self) -> &[Lead] {
        &self.hot
    }

    pub fn get(&self, id: LeadId) -> Option<&Lead> {
        self.leads.iter().find(|l| l.id == id)
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    /// The ID the next appended lead will receive.
    pub fn next_id(&self) -> LeadId {
        self.next_id
    }

    /// Persists the full list and the ID counter. Failures are logged only.
    pub fn save(&self) {
        if !write_json(self.kv.as_ref(), LEADS_KEY, &self.leads) {
            tracing::warn!("Lead list was not persisted; continuing with in-memory state");
        }
        write_json(self.kv.as_ref(), NEXT_ID_KEY, &self.next_id);
    }

    /// Appends a whole import run at once and returns the assigned IDs.
    ///
    /// Fails without touching the store when the ID space cannot hold the
    /// whole run.
    pub fn append(&mut self, scored: Vec<ScoredLead>) -> Result<Vec<LeadId>, AppError> {
        let ids = self.allocate_ids(scored.len())?;
        for (record, id) in scored.into_iter().zip(&ids) {
            self.leads.push(record.into_lead(*id));
        }
        self.refresh_hot();
        self.save();
        tracing::info!("Appended {} lead(s), store now holds {}", ids.len(), self.len());
        Ok(ids)
    }

    /// Removes one lead. Returns false when no lead has that ID.
    pub fn delete(&mut self, id: LeadId) -> bool {
        let before = self.leads.len();
        self.leads.retain(|l| l.id != id);
        if self.leads.len() == before {
            return false;
        }
        self.refresh_hot();
        self.save();
        tracing::info!("Deleted lead {}", id);
        true
    }

    /// Drops every lead. The empty list is persisted so the seed set does not
    /// come back on the next load; the ID counter keeps counting.
    pub fn clear(&mut self) {
        self.leads.clear();
        self.refresh_hot();
        self.save();
        tracing::info!("Cleared all leads");
    }

    /// Reserves `count` consecutive IDs. `LeadId::MAX` is never handed out,
    /// and nothing changes when the range does not fit.
    fn allocate_ids(&mut self, count: usize) -> Result<Vec<LeadId>, AppError> {
        let start = self.next_id;
        let end = LeadId::try_from(count)
            .ok()
            .and_then(|n| start.checked_add(n))
            .ok_or_else(|| {
                AppError::Storage(format!(
                    "lead ID space exhausted: cannot allocate {} id(s) after {}",
                    count, start
                ))
            })?;
        self.next_id = end;
        Ok((start..end).collect())
    }

    fn refresh_hot(&mut self) {
        self.hot = hot_leads(&self.leads);
    }
}

/// Hot subset of a lead list (score 85 or more), preserving order.
pub fn hot_leads(leads: &[Lead]) -> Vec<Lead> {
    leads.iter().filter(|l| l.is_hot()).cloned().collect()
}

#[allow(clippy::too_many_arguments)]
fn seed(
    id: LeadId,
    company: &str,
    contact: &str,
    title: &str,
    intent_score: u8,
    industry: &str,
    company_size: &str,
    insights: [&str; 3],
    recommended_action: &str,
    reasoning: &str,
) -> Lead {
    Lead {
        id,
        company: company.to_string(),
        contact: contact.to_string(),
        title: title.to_string(),
        industry: industry.to_string(),
        company_size: company_size.to_string(),
        intent_score,
        insights: insights.iter().map(|s| s.to_string()).collect(),
        recommended_action: recommended_action.to_string(),
        reasoning: reasoning.to_string(),
        page_views: None,
        downloads: None,
        webinar_attended: None,
        email: None,
        website: None,
    }
}

/// Default leads shown on first run.
pub fn seed_leads() -> Vec<Lead> {
    vec![
        seed(
            1,
            "TechFlow Solutions",
            "Sarah Chen",
            "VP of Engineering",
            92,
            "Technology",
            "Mid-Market",
            [
                "Visited pricing page 4 times",
                "Downloaded ROI calculator",
                "Attended webinar on AI integration",
            ],
            "Schedule executive demo - Focus on ROI and integration capabilities",
            "High engagement across multiple touchpoints. Downloaded ROI calculator indicates budget consideration phase. Multiple pricing page visits suggest near-term decision timeline.",
        ),
        seed(
            2,
            "MedCore Healthcare",
            "Dr. Michael Rodriguez",
            "Chief Technology Officer",
            88,
            "Healthcare",
            "Enterprise",
            [
                "Researched HIPAA compliance features",
                "Downloaded security whitepaper",
                "Engaged with compliance-focused email campaign",
            ],
            "Send healthcare compliance case study and schedule security review",
            "Strong focus on compliance and security indicates serious evaluation. Healthcare industry expertise and enterprise size suggest high-value opportunity.",
        ),
        seed(
            3,
            "GreenEnergy Dynamics",
            "Lisa Park",
            "Operations Director",
            76,
            "Energy",
            "Mid-Market",
            [
                "Viewed competitor comparison page",
                "Downloaded sustainability report",
                "Recent company expansion announcement",
            ],
            "Follow up with sustainability-focused value proposition",
            "Competitor research indicates active evaluation phase. Sustainability focus aligns with company values and recent expansion suggests growth capital availability.",
        ),
        seed(
            4,
            "FinTech Innovations",
            "James Wilson",
            "Head of Digital Transformation",
            85,
            "Finance",
            "Enterprise",
            [
                "Multiple team members viewed product pages",
                "Downloaded integration guide",
                "Requested custom demo",
            ],
            "Prepare comprehensive demo focusing on financial services integration",
            "Multi-stakeholder engagement and custom demo request indicate high intent. Financial services background requires specialized approach and compliance focus.",
        ),
        seed(
            5,
            "LogiCorp Manufacturing",
            "Robert Thompson",
            "IT Director",
            67,
            "Manufacturing",
            "Enterprise",
            [
                "Attended industry webinar",
                "Downloaded manufacturing case study",
                "Recently posted job openings for data analysts",
            ],
            "Send manufacturing-specific ROI analysis and schedule discovery call",
            "Industry-specific content engagement and new data analyst hires suggest data modernization initiative. Manufacturing focus requires operational efficiency messaging.",
        ),
        seed(
            6,
            "EduTech Academy",
            "Amanda Foster",
            "Technology Integration Specialist",
            58,
            "Education",
            "Small Business",
            [
                "Viewed education pricing tier",
                "Downloaded getting started guide",
                "Shared content on LinkedIn",
            ],
            "Follow up via LinkedIn with education sector success stories",
            "Education-focused engagement and social sharing indicate interest but budget constraints likely. Small business segment requires value-focused approach.",
        ),
        seed(
            7,
            "RetailMax Solutions",
            "Kevin Chang",
            "Chief Information Officer",
            91,
            "Retail",
            "Enterprise",
            [
                "Requested technical architecture review",
                "Downloaded API documentation",
                "Multiple C-level executives engaged",
            ],
            "Schedule technical deep-dive with architecture team",
            "Technical architecture focus and C-level engagement indicate advanced evaluation stage. Enterprise retail requires scalability and performance emphasis.",
        ),
    ]
}
