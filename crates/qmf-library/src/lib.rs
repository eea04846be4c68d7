//! Component library: reusable authored fragments (value-set criteria and
//! composites) with identity matching, diffing, and a draft/approved/
//! archived approval workflow (spec.md §4.6).

pub mod complexity;
pub mod error;
pub mod identity;
pub mod model;
pub mod store;
pub mod validate;
pub mod workflow;

pub use complexity::compute_complexity;
pub use error::{LibraryError, Result};
pub use identity::{compute_component_diff, find_exact_match, find_name_match, find_similar_components, generate_hash, SimilarityMatch};
pub use model::{
    AtomicComponent, ComponentBody, ComponentId, ComponentMetadata, ComponentStatus, CompositeComponent, CompositeOperator, Diff, HistoryEntry, LibraryComponent,
    TimingDescriptor, Usage,
};
pub use store::{upsert_composite, InMemoryLibraryStore, LibraryStore};
pub use validate::validate_measure_components;
pub use workflow::{approve, archive, create_version, default_category, record_usage, recompute_category, set_category};
