//! The component library's own small data model (spec.md §4.6). Distinct
//! from `qmf_ums::DataElement`/`LogicalClause`: a library component is an
//! authored, versioned, reusable fragment, not a specific measure's clause
//! tree — only its *shape* (value set, timing descriptor, negation,
//! composite operator) is shared.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Draft,
    Approved,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeOperator {
    And,
    Or,
    Not,
}

/// A normalized description of an atomic component's timing, independent
/// of whether it originated from a `TimingConstraint` or a legacy
/// `TimingRequirement` (spec.md §4.6's identity tuple only cares about the
/// resolved shape, not which UMS field produced it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimingDescriptor {
    pub operator: Option<String>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub position: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicComponent {
    pub value_set_oid: Option<String>,
    pub value_set_name: Option<String>,
    pub timing: TimingDescriptor,
    pub negation: bool,
}

pub type ComponentId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeComponent {
    pub operator: CompositeOperator,
    pub children: Vec<ComponentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ComponentBody {
    Atomic(AtomicComponent),
    Composite(CompositeComponent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub category: String,
    pub category_auto_assigned: bool,
}

/// Reuse tracking (spec.md §3.2): which measures draw on a component, how
/// often, and when it was last drawn on. Updated by
/// [`crate::workflow::record_usage`], never by the identity/diff machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub measure_ids: Vec<String>,
    pub usage_count: u32,
    pub last_used_at: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub version_id: String,
    pub status: ComponentStatus,
    pub created_at: chrono::NaiveDateTime,
    pub created_by: String,
    pub change_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryComponent {
    pub id: ComponentId,
    pub name: String,
    pub body: ComponentBody,
    pub status: ComponentStatus,
    /// Semver-lite: `major.minor`, bumped in the minor place by
    /// `createVersion` (spec.md §4.6).
    pub version: String,
    pub metadata: ComponentMetadata,
    pub history: Vec<HistoryEntry>,
    pub approved_by: Option<String>,
    pub approved_at: Option<chrono::NaiveDateTime>,
    #[serde(default)]
    pub usage: Usage,
}

impl LibraryComponent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, body: ComponentBody, category: impl Into<String>) -> Self {
        LibraryComponent {
            id: id.into(),
            name: name.into(),
            body,
            status: ComponentStatus::Draft,
            version: "0.1".to_string(),
            metadata: ComponentMetadata {
                category: category.into(),
                category_auto_assigned: true,
            },
            history: Vec::new(),
            approved_by: None,
            approved_at: None,
            usage: Usage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub field: String,
    pub existing: String,
    pub incoming: String,
    pub message: String,
}
