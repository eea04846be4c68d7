//! Schema binding (spec.md §4.5): a typed catalog of the clinical warehouse
//! tables the SQL generator is allowed to reference, and the per-dialect
//! date/conditional forms whose syntax actually varies. [`col`] is the gate
//! that makes generation *valid* rather than merely plausible — every
//! column reference goes through it.

use crate::error::{Result, SqlError};
use qmf_ums::{DataElementType, TimeUnit};

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static str,
    /// The column that timing predicates evaluate against, if this table
    /// carries a single authoritative date.
    pub date_column: Option<&'static str>,
    /// The column that `Thresholds` value comparisons evaluate against.
    pub value_column: Option<&'static str>,
}

impl TableDef {
    fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

const PERSON_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "birth_date", sql_type: "date", nullable: true },
    ColumnDef { name: "gender", sql_type: "varchar", nullable: true },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
];

const CONDITION_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code_system", sql_type: "varchar", nullable: true },
    ColumnDef { name: "onset_date", sql_type: "date", nullable: true },
];

const ENCOUNTER_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code_system", sql_type: "varchar", nullable: true },
    ColumnDef { name: "period_start", sql_type: "date", nullable: true },
];

const PROCEDURE_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code_system", sql_type: "varchar", nullable: true },
    ColumnDef { name: "performed_date", sql_type: "date", nullable: true },
];

/// `ph_f_result` additionally carries a numeric `value` column so
/// observation thresholds can be lowered directly in SQL.
const RESULT_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code_system", sql_type: "varchar", nullable: true },
    ColumnDef { name: "effective_date", sql_type: "date", nullable: true },
    ColumnDef { name: "value", sql_type: "decimal", nullable: true },
];

const MEDICATION_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code_system", sql_type: "varchar", nullable: true },
    ColumnDef { name: "authored_date", sql_type: "date", nullable: true },
];

const IMMUNIZATION_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "empi_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "population_id", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code", sql_type: "varchar", nullable: false },
    ColumnDef { name: "code_system", sql_type: "varchar", nullable: true },
    ColumnDef { name: "occurrence_date", sql_type: "date", nullable: true },
];

pub const PERSON_TABLE: &str = "ph_d_person";

/// Looks up the table the catalog uses for `element_type`. Five
/// `DataElementType` variants (assessment, device, allergy, communication,
/// goal) have no dedicated fact table and are a fatal schema-binding error
/// (spec.md §4.5) — the patient-trace evaluator resolves them polymorphically
/// against the seven tables below instead.
pub fn table_for(element_type: DataElementType) -> Result<&'static str> {
    match element_type {
        DataElementType::Diagnosis => Ok("ph_f_condition"),
        DataElementType::Encounter => Ok("ph_f_encounter"),
        DataElementType::Procedure => Ok("ph_f_procedure"),
        DataElementType::Observation => Ok("ph_f_result"),
        DataElementType::Medication => Ok("ph_f_medication"),
        DataElementType::Immunization => Ok("ph_f_immunization"),
        DataElementType::Demographic => Ok(PERSON_TABLE),
        other => Err(SqlError::UnknownResourceType(format!("{other:?}"))),
    }
}

fn table_def(name: &str) -> Option<TableDef> {
    match name {
        "ph_d_person" => Some(TableDef {
            name: "ph_d_person",
            columns: PERSON_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("birth_date"),
            value_column: None,
        }),
        "ph_f_condition" => Some(TableDef {
            name: "ph_f_condition",
            columns: CONDITION_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("onset_date"),
            value_column: None,
        }),
        "ph_f_encounter" => Some(TableDef {
            name: "ph_f_encounter",
            columns: ENCOUNTER_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("period_start"),
            value_column: None,
        }),
        "ph_f_procedure" => Some(TableDef {
            name: "ph_f_procedure",
            columns: PROCEDURE_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("performed_date"),
            value_column: None,
        }),
        "ph_f_result" => Some(TableDef {
            name: "ph_f_result",
            columns: RESULT_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("effective_date"),
            value_column: Some("value"),
        }),
        "ph_f_medication" => Some(TableDef {
            name: "ph_f_medication",
            columns: MEDICATION_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("authored_date"),
            value_column: None,
        }),
        "ph_f_immunization" => Some(TableDef {
            name: "ph_f_immunization",
            columns: IMMUNIZATION_COLUMNS,
            primary_key: "empi_id",
            date_column: Some("occurrence_date"),
            value_column: None,
        }),
        _ => None,
    }
}

/// The generation-time gate: every column reference in the SQL generator
/// must go through `col`, which fails on an unknown table or column rather
/// than silently emitting a typo into the generated SQL.
pub fn col(table: &str, column: &str, alias: Option<&str>) -> Result<String> {
    let def = table_def(table).ok_or_else(|| SqlError::UnknownResourceType(table.to_string()))?;
    def.column(column).ok_or_else(|| SqlError::UnknownColumn {
        table: table.to_string(),
        column: column.to_string(),
    })?;
    Ok(match alias {
        Some(alias) => format!("{alias}.{column}"),
        None => format!("{table}.{column}"),
    })
}

pub fn date_column(table: &str) -> Option<&'static str> {
    table_def(table).and_then(|t| t.date_column)
}

pub fn value_column(table: &str) -> Option<&'static str> {
    table_def(table).and_then(|t| t.value_column)
}

/// Dialects supported by the generator (spec.md §4.4). Emitted SQL is
/// otherwise ANSI-compatible; these are the few forms whose syntax varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Synapse,
    SqlServer,
    PostgreSql,
    Oracle,
}

impl Dialect {
    pub fn current_date(&self) -> &'static str {
        match self {
            Dialect::Synapse | Dialect::SqlServer => "GETDATE()",
            Dialect::PostgreSql => "CURRENT_DATE",
            Dialect::Oracle => "SYSDATE",
        }
    }

    /// `point +/- n * unit`, used both for measurement-period lookback
    /// windows and demographic birthday arithmetic.
    pub fn date_add(&self, point: &str, delta: i64, unit: TimeUnit) -> String {
        match self {
            Dialect::Synapse | Dialect::SqlServer => format!("DATEADD({}, {delta}, {point})", sql_server_unit(unit)),
            Dialect::PostgreSql => format!("({point} + INTERVAL '{delta} {}')", postgres_unit(unit)),
            Dialect::Oracle => match unit {
                TimeUnit::Days => format!("({point} + {delta})"),
                TimeUnit::Weeks => format!("({point} + {})", delta * 7),
                TimeUnit::Months => format!("ADD_MONTHS({point}, {delta})"),
                TimeUnit::Years => format!("ADD_MONTHS({point}, {})", delta * 12),
                TimeUnit::Hours => format!("({point} + {delta}/24)"),
            },
        }
    }

    pub fn age_calculation(&self, birth_col: &str, as_of: &str) -> String {
        match self {
            Dialect::Synapse | Dialect::SqlServer => format!("DATEDIFF(year, {birth_col}, {as_of})"),
            Dialect::PostgreSql => format!("EXTRACT(YEAR FROM AGE({as_of}, {birth_col}))"),
            Dialect::Oracle => format!("FLOOR(MONTHS_BETWEEN({as_of}, {birth_col}) / 12)"),
        }
    }

    pub fn coalesce(&self, args: &[&str]) -> String {
        format!("COALESCE({})", args.join(", "))
    }

    pub fn iif(&self, condition: &str, then_value: &str, else_value: &str) -> String {
        match self {
            Dialect::Synapse | Dialect::SqlServer => format!("IIF({condition}, {then_value}, {else_value})"),
            Dialect::PostgreSql | Dialect::Oracle => format!("CASE WHEN {condition} THEN {then_value} ELSE {else_value} END"),
        }
    }
}

fn sql_server_unit(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Days => "day",
        TimeUnit::Weeks => "week",
        TimeUnit::Months => "month",
        TimeUnit::Years => "year",
        TimeUnit::Hours => "hour",
    }
}

fn postgres_unit(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Days => "days",
        TimeUnit::Weeks => "weeks",
        TimeUnit::Months => "months",
        TimeUnit::Years => "years",
        TimeUnit::Hours => "hours",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_resolves_known_column() {
        assert_eq!(col("ph_f_condition", "empi_id", Some("F")).unwrap(), "F.empi_id");
    }

    #[test]
    fn col_rejects_unknown_column() {
        let err = col("ph_f_condition", "nonexistent", None).unwrap_err();
        assert!(matches!(err, SqlError::UnknownColumn { .. }));
    }

    #[test]
    fn table_for_rejects_assessment() {
        let err = table_for(DataElementType::Assessment).unwrap_err();
        assert!(matches!(err, SqlError::UnknownResourceType(_)));
    }

    #[test]
    fn dialects_render_date_add_differently() {
        assert_eq!(Dialect::SqlServer.date_add(":mpEnd", -10, TimeUnit::Years), "DATEADD(year, -10, :mpEnd)");
        assert_eq!(Dialect::PostgreSql.date_add(":mpEnd", -10, TimeUnit::Years), "(:mpEnd + INTERVAL '-10 years')");
        assert_eq!(Dialect::Oracle.date_add(":mpEnd", -10, TimeUnit::Years), "ADD_MONTHS(:mpEnd, -120)");
    }
}
