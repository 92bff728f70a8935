pub mod commands;
pub mod config;
pub mod explore;
pub mod layout;
pub mod selection;
pub mod service;
pub mod session;
pub mod shortcuts;
pub mod state;
pub mod store;
pub mod temporal;

pub use commands::{Command, CommandStack};
pub use config::SessionConfig;
pub use explore::{
    Explorer, Fetched, PendingFetch, PendingSearch, Resolution, SearchResponse, SearchState, Slot, Ticket,
};
pub use layout::{LayoutOrchestrator, LayoutResult, RunStatus};
pub use selection::{SelectionMode, SelectionSet};
pub use service::{GraphService, InMemoryGraphService, Neighbourhood, NeighbourhoodRequest, SearchPage};
pub use session::ExplorerSession;
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use state::{Mutation, RemovedEntities, ViewState};
pub use store::{LayoutState, Snapshot, ViewChange, ViewStore};
pub use temporal::{GraphUpdate, TemporalGraph};
