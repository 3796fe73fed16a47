use crate::errors::AppError;
use crate::models::{ActiveView, DisplayMode, Lead, LeadId, ScoredLead};
use crate::render::{render_reasoning, ReasoningView};
use crate::storage::KeyValueStore;
use crate::store::LeadStore;
use crate::view::{AllLeadsControls, HotLeadsControls, ViewController, ViewOutput};
use std::sync::Arc;
use tokio::sync::watch;

/// Application state: the lead store plus view state.
///
/// All mutations go through here and bump a revision counter so observers
/// know to re-render.
pub struct Dashboard {
    store: LeadStore,
    view: ViewController,
    revision: watch::Sender<u64>,
}

impl Dashboard {
    pub fn new(store: LeadStore, view: ViewController) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            view,
            revision,
        }
    }

    /// Loads leads and view state from the same key-value store.
    pub fn load(kv: Arc<dyn KeyValueStore>, page_size: usize) -> Self {
        let store = LeadStore::load(Arc::clone(&kv));
        let view = ViewController::restore(kv, page_size);
        tracing::info!(
            "Dashboard ready: {} lead(s), {} hot, view '{}'",
            store.len(),
            store.hot().len(),
            view.view().as_str()
        );
        Self::new(store, view)
    }

    pub fn store(&self) -> &LeadStore {
        &self.store
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    pub fn lead(&self, id: LeadId) -> Option<&Lead> {
        self.store.get(id)
    }

    pub fn reasoning(&self, id: LeadId) -> Option<ReasoningView> {
        self.store.get(id).map(render_reasoning)
    }

    pub fn render(&self) -> ViewOutput {
        self.view.render(&self.store)
    }

    pub fn navigate(&mut self, view: ActiveView) {
        self.view.navigate(view);
        self.bump();
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.view.set_display_mode(mode);
        self.bump();
    }

    pub fn set_page(&mut self, page: usize) {
        self.view.set_page(page);
        self.bump();
    }

    /// Replaces the filter controls of both list views.
    pub fn set_filters(&mut self, all: AllLeadsControls, hot: HotLeadsControls) {
        self.view.set_all_controls(all);
        self.view.set_hot_controls(hot);
        self.bump();
    }

    pub fn delete_lead(&mut self, id: LeadId) -> bool {
        let removed = self.store.delete(id);
        if removed {
            self.bump();
        }
        removed
    }

    pub fn clear_leads(&mut self) {
        self.store.clear();
        self.bump();
    }

    /// Commits one import run. Returns the IDs assigned, in input order.
    pub fn append_scored(&mut self, records: Vec<ScoredLead>) -> Result<Vec<LeadId>, AppError> {
        let ids = self.store.append(records)?;
        self.bump();
        Ok(ids)
    }
}
