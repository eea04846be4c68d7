//! Sample UMS trees used by this workspace's test suites and the
//! composition harness (`qmf-harness`). These mirror the seed scenarios in
//! spec.md §8 literally, so downstream crates can assert against the exact
//! text/SQL/outcomes the spec calls out.

use crate::model::*;
use chrono::NaiveDate;

fn measurement_period(start: (i32, u32, u32), end: (i32, u32, u32)) -> MeasurementPeriod {
    MeasurementPeriod {
        start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
        end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        inclusive: true,
    }
}

fn metadata(measure_id: &str, title: &str) -> MeasureMetadata {
    MeasureMetadata {
        measure_id: measure_id.to_string(),
        title: title.to_string(),
        program: Program::ECqm,
        measure_type: MeasureType::Process,
        scoring: Scoring::Proportion,
        measurement_period: measurement_period((2026, 1, 1), (2026, 12, 31)),
    }
}

fn demographic_element(id: &str, min: u32, max: u32) -> DataElement {
    DataElement {
        id: id.to_string(),
        element_type: DataElementType::Demographic,
        description: format!("Age between {min} and {max} at start of measurement period"),
        value_set: None,
        direct_codes: Vec::new(),
        thresholds: Some(Thresholds {
            age_min: Some(min),
            age_max: Some(max),
            value_min: None,
            value_max: None,
            comparator: None,
        }),
        timing_requirements: Vec::new(),
        timing_override: None,
        negation: None,
        age_calculation: Some(AgeCalculation::AtStart),
        review_status: ReviewStatus::Approved,
    }
}

fn leaf_clause(id: &str, element: DataElement) -> LogicalClause {
    LogicalClause {
        id: format!("{id}-clause"),
        operator: ClauseOperator::And,
        description: element.description.clone(),
        children: vec![ClauseChild::Element(Box::new(element))],
        sibling_connections: Vec::new(),
        review_status: ReviewStatus::Approved,
    }
}

/// Scenario 1: demographics only.
pub fn minimal_measure() -> Measure {
    let ip = Population {
        population_type: PopulationType::InitialPopulation,
        description: "Patients 18-75".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("ip-age", demographic_element("ip-age-elem", 18, 75)),
        equals_initial_population: false,
    };
    let denominator = Population {
        population_type: PopulationType::Denominator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("den-clause"),
        equals_initial_population: true,
    };
    let numerator = Population {
        population_type: PopulationType::Numerator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("num-clause"),
        equals_initial_population: true,
    };

    Measure {
        metadata: metadata("demographics-only", "Demographics Only Measure"),
        global_constraints: Some(GlobalConstraints {
            age_range: Some(AgeRange { min: 18, max: 75 }),
            age_calculation: Some(AgeCalculation::AtStart),
            gender: Some(GenderConstraint::All),
        }),
        populations: vec![ip, denominator, numerator],
        value_sets: Vec::new(),
    }
}

/// Scenario 2: condition-based with a denominator exclusion.
pub fn diabetes_with_exclusion_measure() -> Measure {
    let diabetes_vs = ValueSetReference {
        id: "vs-diabetes".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.103.12.1001".to_string()),
        name: "Diabetes Mellitus".to_string(),
        version: None,
        codes: None,
    };
    let neoplasm_vs = ValueSetReference {
        id: "vs-neoplasm".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.108.12.1001".to_string()),
        name: "Malignant Neoplasm".to_string(),
        version: None,
        codes: None,
    };

    let diagnosis = DataElement {
        id: "ip-diabetes-elem".to_string(),
        element_type: DataElementType::Diagnosis,
        description: "Diagnosis of diabetes".to_string(),
        value_set: Some("vs-diabetes".to_string()),
        direct_codes: Vec::new(),
        thresholds: None,
        timing_requirements: Vec::new(),
        timing_override: Some(TimingConstraint {
            anchor: Anchor::MeasurementPeriod,
            side: Side::During,
            offset: None,
            reference_anchor: None,
        }),
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };
    let exclusion = DataElement {
        id: "dex-neoplasm-elem".to_string(),
        element_type: DataElementType::Diagnosis,
        description: "Diagnosis of malignant neoplasm".to_string(),
        value_set: Some("vs-neoplasm".to_string()),
        direct_codes: Vec::new(),
        thresholds: None,
        timing_requirements: Vec::new(),
        timing_override: Some(TimingConstraint {
            anchor: Anchor::MeasurementPeriod,
            side: Side::During,
            offset: None,
            reference_anchor: None,
        }),
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };

    let ip = Population {
        population_type: PopulationType::InitialPopulation,
        description: "Patients with diabetes".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("ip", diagnosis),
        equals_initial_population: false,
    };
    let denominator = Population {
        population_type: PopulationType::Denominator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("den-clause"),
        equals_initial_population: true,
    };
    let dex = Population {
        population_type: PopulationType::DenominatorExclusion,
        description: "Malignant neoplasm exclusion".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("dex", exclusion),
        equals_initial_population: false,
    };
    let numerator = Population {
        population_type: PopulationType::Numerator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("num-clause"),
        equals_initial_population: true,
    };

    Measure {
        metadata: metadata("diabetes-exclusion", "Diabetes Screening With Exclusion"),
        global_constraints: None,
        populations: vec![ip, denominator, dex, numerator],
        value_sets: vec![diabetes_vs, neoplasm_vs],
    }
}

/// Scenario 3: procedure with a 10-year lookback in the numerator.
pub fn colonoscopy_lookback_measure() -> Measure {
    let colonoscopy_vs = ValueSetReference {
        id: "vs-colonoscopy".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.108.12.1020".to_string()),
        name: "Colonoscopy".to_string(),
        version: None,
        codes: None,
    };
    let procedure = DataElement {
        id: "num-colonoscopy-elem".to_string(),
        element_type: DataElementType::Procedure,
        description: "Colonoscopy performed".to_string(),
        value_set: Some("vs-colonoscopy".to_string()),
        direct_codes: Vec::new(),
        thresholds: None,
        timing_requirements: vec![TimingRequirement {
            description: "within 10 years before end of measurement period".to_string(),
            relative_to: "measurement_period_end".to_string(),
            window: Some(TimingWindow {
                value: 10,
                unit: TimeUnit::Years,
                direction: Direction::Before,
            }),
        }],
        timing_override: None,
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };

    let ip = Population {
        population_type: PopulationType::InitialPopulation,
        description: "All patients".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("ip-clause"),
        equals_initial_population: false,
    };
    let denominator = Population {
        population_type: PopulationType::Denominator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("den-clause"),
        equals_initial_population: true,
    };
    let numerator = Population {
        population_type: PopulationType::Numerator,
        description: "Colonoscopy in the last 10 years".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("num", procedure),
        equals_initial_population: false,
    };

    Measure {
        metadata: metadata("colonoscopy-screening", "Colorectal Cancer Screening"),
        global_constraints: None,
        populations: vec![ip, denominator, numerator],
        value_sets: vec![colonoscopy_vs],
    }
}

/// Scenario 4: observation with thresholds (HbA1c control).
pub fn hba1c_threshold_measure() -> Measure {
    let hba1c_vs = ValueSetReference {
        id: "vs-hba1c".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.198.12.1013".to_string()),
        name: "HbA1c Laboratory Test".to_string(),
        version: None,
        codes: None,
    };
    let observation = DataElement {
        id: "num-hba1c-elem".to_string(),
        element_type: DataElementType::Observation,
        description: "Most recent HbA1c < 8".to_string(),
        value_set: Some("vs-hba1c".to_string()),
        direct_codes: Vec::new(),
        thresholds: Some(Thresholds {
            age_min: None,
            age_max: None,
            value_min: None,
            value_max: Some(8.0),
            comparator: Some(Comparator::Lt),
        }),
        timing_requirements: Vec::new(),
        timing_override: Some(TimingConstraint {
            anchor: Anchor::MeasurementPeriod,
            side: Side::During,
            offset: None,
            reference_anchor: None,
        }),
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };

    let ip = Population {
        population_type: PopulationType::InitialPopulation,
        description: "Patients with diabetes".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("ip-clause"),
        equals_initial_population: false,
    };
    let denominator = Population {
        population_type: PopulationType::Denominator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("den-clause"),
        equals_initial_population: true,
    };
    let numerator = Population {
        population_type: PopulationType::Numerator,
        description: "HbA1c in control".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("num", observation),
        equals_initial_population: false,
    };

    Measure {
        metadata: metadata("hba1c-control", "Diabetes: HbA1c Control"),
        global_constraints: None,
        populations: vec![ip, denominator, numerator],
        value_sets: vec![hba1c_vs],
    }
}

/// Scenario 5: multi-population with a gender constraint (cervical cancer
/// screening, hysterectomy exclusion).
pub fn cervical_cancer_screening_measure() -> Measure {
    let pap_vs = ValueSetReference {
        id: "vs-pap".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.108.12.1017".to_string()),
        name: "Pap Test".to_string(),
        version: None,
        codes: None,
    };
    let hysterectomy_vs = ValueSetReference {
        id: "vs-hysterectomy".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.198.12.1014".to_string()),
        name: "Hysterectomy with No Residual Cervix".to_string(),
        version: None,
        codes: None,
    };

    let pap_test = DataElement {
        id: "num-pap-elem".to_string(),
        element_type: DataElementType::Procedure,
        description: "Pap test within the last 3 years".to_string(),
        value_set: Some("vs-pap".to_string()),
        direct_codes: Vec::new(),
        thresholds: None,
        timing_requirements: vec![TimingRequirement {
            description: "within 3 years before end of measurement period".to_string(),
            relative_to: "measurement_period_end".to_string(),
            window: Some(TimingWindow {
                value: 3,
                unit: TimeUnit::Years,
                direction: Direction::Before,
            }),
        }],
        timing_override: None,
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };
    let hysterectomy = DataElement {
        id: "dex-hysterectomy-elem".to_string(),
        element_type: DataElementType::Procedure,
        description: "Hysterectomy with no residual cervix".to_string(),
        value_set: Some("vs-hysterectomy".to_string()),
        direct_codes: Vec::new(),
        thresholds: None,
        timing_requirements: Vec::new(),
        timing_override: None,
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };

    let ip = Population {
        population_type: PopulationType::InitialPopulation,
        description: "Women 21-64".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("ip-age", demographic_element("ip-age-elem", 21, 64)),
        equals_initial_population: false,
    };
    let denominator = Population {
        population_type: PopulationType::Denominator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("den-clause"),
        equals_initial_population: true,
    };
    let dex = Population {
        population_type: PopulationType::DenominatorExclusion,
        description: "Hysterectomy exclusion".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("dex", hysterectomy),
        equals_initial_population: false,
    };
    let numerator = Population {
        population_type: PopulationType::Numerator,
        description: "Pap test within 3 years".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("num", pap_test),
        equals_initial_population: false,
    };

    Measure {
        metadata: metadata("cervical-cancer-screening", "Cervical Cancer Screening"),
        global_constraints: Some(GlobalConstraints {
            age_range: Some(AgeRange { min: 21, max: 64 }),
            age_calculation: Some(AgeCalculation::AtStart),
            gender: Some(GenderConstraint::Female),
        }),
        populations: vec![ip, denominator, dex, numerator],
        value_sets: vec![pap_vs, hysterectomy_vs],
    }
}

/// Scenario 6: childhood immunization (DTaP dose counting, "turns 2").
pub fn childhood_immunization_measure() -> Measure {
    let dtap_vs = ValueSetReference {
        id: "vs-dtap".to_string(),
        oid: Some("2.16.840.1.113883.3.464.1003.196.12.1011".to_string()),
        name: "DTaP Vaccine".to_string(),
        version: None,
        codes: None,
    };

    let ip_age = DataElement {
        id: "ip-turns2-elem".to_string(),
        element_type: DataElementType::Demographic,
        description: "Turns 2 years old during the measurement period".to_string(),
        value_set: None,
        direct_codes: Vec::new(),
        thresholds: Some(Thresholds {
            age_min: Some(2),
            age_max: Some(2),
            value_min: None,
            value_max: None,
            comparator: None,
        }),
        timing_requirements: Vec::new(),
        timing_override: None,
        negation: None,
        age_calculation: Some(AgeCalculation::TurnsDuring),
        review_status: ReviewStatus::Approved,
    };
    let dtap = DataElement {
        id: "num-dtap-elem".to_string(),
        element_type: DataElementType::Immunization,
        description: "4 doses of DTaP before the second birthday".to_string(),
        value_set: Some("vs-dtap".to_string()),
        direct_codes: Vec::new(),
        thresholds: Some(Thresholds {
            age_min: None,
            age_max: None,
            value_min: Some(4.0),
            value_max: None,
            comparator: Some(Comparator::Gte),
        }),
        timing_requirements: Vec::new(),
        timing_override: None,
        negation: None,
        age_calculation: None,
        review_status: ReviewStatus::Approved,
    };

    let ip = Population {
        population_type: PopulationType::InitialPopulation,
        description: "Turns 2 during the measurement period".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("ip", ip_age),
        equals_initial_population: false,
    };
    let denominator = Population {
        population_type: PopulationType::Denominator,
        description: "Equals Initial Population".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: LogicalClause::empty_and("den-clause"),
        equals_initial_population: true,
    };
    let numerator = Population {
        population_type: PopulationType::Numerator,
        description: "4 doses of DTaP before the second birthday".to_string(),
        narrative: String::new(),
        additional_requirements: None,
        criteria: leaf_clause("num", dtap),
        equals_initial_population: false,
    };

    Measure {
        metadata: metadata("childhood-immunization", "Childhood Immunization Status"),
        global_constraints: None,
        populations: vec![ip, denominator, numerator],
        value_sets: vec![dtap_vs],
    }
}
