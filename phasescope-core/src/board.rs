//! Tabs and the graph instances they own.
//!
//! Each graph keeps the window version its data was computed from. A
//! commit carrying an older version than the one already shown is
//! rejected, so a slow response for an old window can never replace the
//! result of a newer one.

use std::sync::Arc;

use phasescope_analysis::{DerivedSeries, GraphKind};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SessionError;

pub type TabId = Uuid;
pub type GraphId = Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct GraphInstance {
    pub id: GraphId,
    pub kind: GraphKind,
    /// Replaced wholesale on every accepted commit.
    pub data: Arc<DerivedSeries>,
    /// Window version `data` was computed from; `None` until the first commit.
    pub data_version: Option<u64>,
}

impl GraphInstance {
    fn new(kind: GraphKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            data: Arc::new(DerivedSeries::empty_for(kind)),
            data_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    pub graphs: Vec<GraphInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// A newer window's result is already in place.
    Stale { current: u64 },
    /// The graph no longer exists.
    Missing,
}

#[derive(Debug)]
pub struct TabBoard {
    tabs: Vec<Tab>,
    active: TabId,
    created: usize,
}

impl Default for TabBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl TabBoard {
    /// A board with a single active `Tab 1`.
    pub fn new() -> Self {
        let mut board = Self {
            tabs: Vec::new(),
            active: Uuid::nil(),
            created: 0,
        };
        board.add_tab();
        board
    }

    /// Create `Tab N` and make it active.
    pub fn add_tab(&mut self) -> TabId {
        self.created += 1;
        let tab = Tab {
            id: Uuid::new_v4(),
            name: format!("Tab {}", self.created),
            graphs: Vec::new(),
        };
        let id = tab.id;
        self.tabs.push(tab);
        self.active = id;
        id
    }

    pub fn switch_tab(&mut self, id: TabId) -> Result<(), SessionError> {
        if !self.tabs.iter().any(|t| t.id == id) {
            return Err(SessionError::UnknownTab(id));
        }
        self.active = id;
        Ok(())
    }

    pub fn active_id(&self) -> TabId {
        self.active
    }

    pub fn active(&self) -> Option<&Tab> {
        self.tab(self.active)
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn graph(&self, id: GraphId) -> Option<&GraphInstance> {
        self.tabs.iter().flat_map(|t| t.graphs.iter()).find(|g| g.id == id)
    }

    /// Every graph in every tab, active or not.
    pub fn graphs(&self) -> impl Iterator<Item = (GraphId, GraphKind)> + '_ {
        self.tabs
            .iter()
            .flat_map(|t| t.graphs.iter())
            .map(|g| (g.id, g.kind))
    }

    /// Append an empty graph of `kind` to `tab`.
    pub fn add_graph(&mut self, tab: TabId, kind: GraphKind) -> Result<GraphId, SessionError> {
        let tab = self
            .tabs
            .iter_mut()
            .find(|t| t.id == tab)
            .ok_or(SessionError::UnknownTab(tab))?;
        let graph = GraphInstance::new(kind);
        let id = graph.id;
        tab.graphs.push(graph);
        Ok(id)
    }

    /// Replace a graph's data if `version` is newer than what it shows.
    pub fn commit(&mut self, graph: GraphId, version: u64, data: DerivedSeries) -> CommitOutcome {
        let Some(instance) = self.graph_mut(graph) else {
            return CommitOutcome::Missing;
        };

        if let Some(current) = instance.data_version {
            if version <= current {
                return CommitOutcome::Stale { current };
            }
        }

        instance.data = Arc::new(data);
        instance.data_version = Some(version);
        CommitOutcome::Applied
    }

    fn graph_mut(&mut self, id: GraphId) -> Option<&mut GraphInstance> {
        self.tabs
            .iter_mut()
            .flat_map(|t| t.graphs.iter_mut())
            .find(|g| g.id == id)
    }
}
