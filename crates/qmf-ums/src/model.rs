//! The Universal Measure Specification (UMS) data model.
//!
//! A UMS is a tree: [`Measure`] at the root, [`Population`] slots each
//! holding a [`LogicalClause`] whose leaves are [`DataElement`]s. See
//! `SPEC_FULL.md` §3 for the full invariant list; this module only carries
//! the shapes, not the checks (those live in [`crate::validate`] and
//! [`crate::canonicalize`]).

use serde::{Deserialize, Serialize};

/// Review status tracked per authoring node. The pipeline never reads this;
/// it exists purely so authoring tools round-trip it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Flagged,
}

// ---------------------------------------------------------------------
// Measure root
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub metadata: MeasureMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_constraints: Option<GlobalConstraints>,
    #[serde(default)]
    pub populations: Vec<Population>,
    #[serde(default)]
    pub value_sets: Vec<ValueSetReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureMetadata {
    pub measure_id: String,
    pub title: String,
    pub program: Program,
    pub measure_type: MeasureType,
    pub scoring: Scoring,
    pub measurement_period: MeasurementPeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Program {
    #[serde(rename = "MIPS")]
    Mips,
    #[serde(rename = "eCQM")]
    ECqm,
    #[serde(rename = "HEDIS")]
    Hedis,
    #[serde(rename = "QOF")]
    Qof,
    Registry,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureType {
    Process,
    Outcome,
    Structure,
    PatientExperience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Proportion,
    Ratio,
    ContinuousVariable,
    Cohort,
}

/// A calendar-date interval; no time zone, per `SPEC_FULL.md` §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementPeriod {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub inclusive: bool,
}

impl MeasurementPeriod {
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }
}

// ---------------------------------------------------------------------
// Global constraints
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_calculation: Option<AgeCalculation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<GenderConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

/// When in the measurement period an age bound is evaluated.
///
/// `SPEC_FULL.md` §3 promotes this to an explicit enum (shared by
/// [`GlobalConstraints`] and [`DataElement`]) instead of inferring pediatric
/// semantics from `ageMin <= 18`, per `spec.md` §9's open question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeCalculation {
    AtStart,
    AtEnd,
    During,
    TurnsDuring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderConstraint {
    Any,
    Male,
    Female,
    All,
}

// ---------------------------------------------------------------------
// Populations
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Population {
    #[serde(rename = "type")]
    pub population_type: PopulationType,
    pub description: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_requirements: Option<String>,
    pub criteria: LogicalClause,
    /// `spec.md` §9 notes the source keyword-sniffs "equals Initial
    /// Population" from `description`; here it is an explicit flag set
    /// during authoring (or inferred once, in [`crate::canonicalize`]).
    #[serde(default)]
    pub equals_initial_population: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationType {
    InitialPopulation,
    Denominator,
    DenominatorExclusion,
    DenominatorException,
    Numerator,
    NumeratorExclusion,
    MeasurePopulation,
    MeasurePopulationExclusion,
    MeasureObservation,
}

impl PopulationType {
    /// The human-facing display name used for CQL `define` statements and
    /// SQL CTE labels (spec.md §4.2, §4.4).
    pub fn display_name(&self) -> &'static str {
        match self {
            PopulationType::InitialPopulation => "Initial Population",
            PopulationType::Denominator => "Denominator",
            PopulationType::DenominatorExclusion => "Denominator Exclusion",
            PopulationType::DenominatorException => "Denominator Exception",
            PopulationType::Numerator => "Numerator",
            PopulationType::NumeratorExclusion => "Numerator Exclusion",
            PopulationType::MeasurePopulation => "Measure Population",
            PopulationType::MeasurePopulationExclusion => "Measure Population Exclusion",
            PopulationType::MeasureObservation => "Measure Observation",
        }
    }
}

// ---------------------------------------------------------------------
// Logical clauses
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClauseOperator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClauseChild {
    Clause(Box<LogicalClause>),
    Element(Box<DataElement>),
}

impl ClauseChild {
    pub fn id(&self) -> &str {
        match self {
            ClauseChild::Clause(c) => &c.id,
            ClauseChild::Element(e) => &e.id,
        }
    }
}

/// Overrides the default connector between two adjacent children, allowing
/// measures like "A AND (B OR C) AND D" to be expressed flat (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingConnection {
    /// Index of the left child in the pair; the connector sits between
    /// `children[left_index]` and `children[left_index + 1]`.
    pub left_index: usize,
    pub operator: SiblingOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiblingOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClause {
    pub id: String,
    pub operator: ClauseOperator,
    #[serde(default)]
    pub description: String,
    pub children: Vec<ClauseChild>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sibling_connections: Vec<SiblingConnection>,
    #[serde(default)]
    pub review_status: ReviewStatus,
}

impl LogicalClause {
    /// Resolves the connector between `children[index]` and
    /// `children[index + 1]`, consulting `sibling_connections` first and
    /// falling back to the clause's own `operator` (spec.md §4.7, §9).
    pub fn operator_between(&self, index: usize) -> SiblingOperator {
        for connection in &self.sibling_connections {
            if connection.left_index == index {
                return connection.operator;
            }
        }
        match self.operator {
            ClauseOperator::Or => SiblingOperator::Or,
            _ => SiblingOperator::And,
        }
    }

    pub fn empty_and(id: impl Into<String>) -> Self {
        LogicalClause {
            id: id.into(),
            operator: ClauseOperator::And,
            description: String::new(),
            children: Vec::new(),
            sibling_connections: Vec::new(),
            review_status: ReviewStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------
// Data elements (leaves)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataElementType {
    Diagnosis,
    Encounter,
    Procedure,
    Observation,
    Medication,
    Immunization,
    Demographic,
    Assessment,
    Device,
    Allergy,
    Communication,
    Goal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectCode {
    pub code: String,
    pub system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparator: Option<Comparator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Days,
    Weeks,
    Months,
    Years,
    Hours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Before,
    After,
    Within,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingWindow {
    pub value: u32,
    pub unit: TimeUnit,
    pub direction: Direction,
}

/// Legacy timing shape: authoring pre-dates [`TimingConstraint`]; kept on
/// the node even after promotion (spec.md §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRequirement {
    #[serde(default)]
    pub description: String,
    pub relative_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimingWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Anchor {
    MeasurementPeriod,
    #[serde(rename = "IPSD")]
    Ipsd,
    EventDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    BeforeStart,
    AfterStart,
    BeforeEnd,
    AfterEnd,
    During,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offset {
    pub value: u32,
    pub unit: TimeUnit,
}

/// Structured timing shape, authoritative over [`TimingRequirement`] when
/// both are present (spec.md §3.1 invariant 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConstraint {
    pub anchor: Anchor,
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_anchor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElement {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: DataElementType,
    #[serde(default)]
    pub description: String,
    /// Identifier of the referenced [`ValueSetReference`]: its `id`, `oid`,
    /// or `name`, resolved in that precedence (spec.md §3.1 invariant 2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub direct_codes: Vec<DirectCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timing_requirements: Vec<TimingRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_override: Option<TimingConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negation: Option<bool>,
    /// Explicit per spec.md §9's third open question (promoted from the
    /// source's `ageMin <= 18` heuristic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_calculation: Option<AgeCalculation>,
    #[serde(default)]
    pub review_status: ReviewStatus,
}

impl DataElement {
    /// The timing form that actually governs this element: `timing_override`
    /// wins when present, per spec.md §3.1 invariant 3.
    pub fn effective_timing(&self) -> EffectiveTiming<'_> {
        if let Some(constraint) = &self.timing_override {
            EffectiveTiming::Structured(constraint)
        } else if !self.timing_requirements.is_empty() {
            EffectiveTiming::Legacy(&self.timing_requirements)
        } else {
            EffectiveTiming::Unspecified
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negation.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectiveTiming<'a> {
    Structured(&'a TimingConstraint),
    Legacy(&'a [TimingRequirement]),
    Unspecified,
}

// ---------------------------------------------------------------------
// Value sets
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntry {
    pub code: String,
    pub system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetReference {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codes: Option<Vec<CodeEntry>>,
}

impl Measure {
    /// Resolves a `DataElement.value_set` reference against
    /// `measure.value_sets`, by id, then oid, then name (invariant 2).
    pub fn resolve_value_set(&self, reference: &str) -> Option<&ValueSetReference> {
        self.value_sets
            .iter()
            .find(|vs| vs.id == reference)
            .or_else(|| self.value_sets.iter().find(|vs| vs.oid.as_deref() == Some(reference)))
            .or_else(|| self.value_sets.iter().find(|vs| vs.name == reference))
    }

    pub fn population(&self, population_type: PopulationType) -> Option<&Population> {
        self.populations
            .iter()
            .find(|p| p.population_type == population_type)
    }
}
