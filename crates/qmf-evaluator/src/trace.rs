//! `PatientTrace` — the authoring-feedback output shape (spec.md §4.7,
//! §6.4). A tree mirroring the clause tree, tagged `pass|partial|fail`,
//! carrying matched facts and a CQL-ish snippet for display.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Pass,
    Partial,
    Fail,
}

impl TraceStatus {
    pub fn from_bool(matched: bool) -> Self {
        if matched {
            TraceStatus::Pass
        } else {
            TraceStatus::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<chrono::NaiveDate>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMatch {
    pub met: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceNode {
    pub id: String,
    pub label: String,
    pub status: TraceStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<Fact>,
    pub cql_snippet: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TraceNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialMatch>,
}

impl TraceNode {
    pub fn leaf(id: impl Into<String>, label: impl Into<String>, matched: bool, cql_snippet: impl Into<String>) -> Self {
        TraceNode {
            id: id.into(),
            label: label.into(),
            status: TraceStatus::from_bool(matched),
            facts: Vec::new(),
            cql_snippet: cql_snippet.into(),
            children: Vec::new(),
            partial: None,
        }
    }

    pub fn with_facts(mut self, facts: Vec<Fact>) -> Self {
        self.facts = facts;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalOutcome {
    NotInPopulation,
    Excluded,
    InNumerator,
    NotInNumerator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientTrace {
    pub empi_id: String,
    pub final_outcome: FinalOutcome,
    pub reason: String,
    #[serde(default)]
    pub population_traces: Vec<(qmf_ums::PopulationType, TraceNode)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub how_close: Vec<String>,
    pub narrative: String,
}
