//! Lowers a UMS [`Measure`] into a parameterized SQL CTE chain against the
//! clinical warehouse schema (spec.md §4.4): `DEMOG -> IP -> DEN -> DEX ->
//! NUM`, plus a final count/rate aggregation.

use crate::binding::{SqlBinding, SqlValue};
use crate::error::SqlError;
use crate::schema::{self, Dialect, PERSON_TABLE};
use qmf_ums::{
    Anchor, ClauseChild, ClauseOperator, Comparator, DataElement, DataElementType, Direction, GenderConstraint, LogicalClause, Measure,
    PopulationType, Side, SiblingOperator, Thresholds,
};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SqlGeneration {
    pub success: bool,
    pub sql: String,
    pub bindings: Vec<SqlBinding>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

struct GenCtx<'a> {
    measure: &'a Measure,
    dialect: Dialect,
    bindings: Vec<SqlBinding>,
    warnings: Vec<String>,
    errors: Vec<String>,
    binding_counter: usize,
}

impl<'a> GenCtx<'a> {
    fn bind(&mut self, prefix: &str, value: SqlValue) -> String {
        self.binding_counter += 1;
        let name = format!("{prefix}{}", self.binding_counter);
        self.bindings.push(SqlBinding { name: name.clone(), value });
        format!(":{name}")
    }

    fn fail(&mut self, err: SqlError) -> String {
        self.errors.push(err.to_string());
        "1=0".to_string()
    }
}

/// Alias every downstream CTE (`IP`/`DEN`/`DEX`/`NUM`) binds its carried-forward
/// person row to. A data-element predicate that needs to correlate back to the
/// patient (§4.4) or a demographic element's birth date must reference this
/// alias rather than [`PERSON_TABLE`] — the real table name is only in scope
/// inside the `DEMOG` CTE itself.
const PERSON_ALIAS: &str = "P";

fn lower_demographic_predicate(element: &DataElement, ctx: &mut GenCtx) -> String {
    let mut predicates = Vec::new();
    if let Some(thresholds) = &element.thresholds {
        if thresholds.age_min.is_some() || thresholds.age_max.is_some() {
            let as_of = match element.age_calculation {
                Some(qmf_ums::AgeCalculation::AtEnd) => format!(":{}", bind_mp_end(ctx)),
                _ => format!(":{}", bind_mp_start(ctx)),
            };
            let age_expr = ctx.dialect.age_calculation(&format!("{PERSON_ALIAS}.birth_date"), &as_of);
            if let Some(min) = thresholds.age_min {
                predicates.push(format!("{age_expr} >= {min}"));
            }
            if let Some(max) = thresholds.age_max {
                predicates.push(format!("{age_expr} <= {max}"));
            }
        }
    }
    if predicates.is_empty() {
        "1=1".to_string()
    } else {
        predicates.join(" and ")
    }
}

fn bind_mp_start(ctx: &mut GenCtx) -> String {
    let binding = ctx.bind("mpStart", SqlValue::Date(ctx.measure.metadata.measurement_period.start));
    binding.trim_start_matches(':').to_string()
}

fn bind_mp_end(ctx: &mut GenCtx) -> String {
    let binding = ctx.bind("mpEnd", SqlValue::Date(ctx.measure.metadata.measurement_period.end));
    binding.trim_start_matches(':').to_string()
}

fn lower_gender_predicate(constraint: GenderConstraint) -> Option<String> {
    match constraint {
        GenderConstraint::Male => Some(format!("{PERSON_TABLE}.gender = 'male'")),
        GenderConstraint::Female => Some(format!("{PERSON_TABLE}.gender = 'female'")),
        GenderConstraint::Any | GenderConstraint::All => None,
    }
}

fn lower_timing(element: &DataElement, table: &str, ctx: &mut GenCtx) -> String {
    let Ok(date_col) = schema::col(table, schema::date_column(table).unwrap_or("population_id"), Some("F")) else {
        return ctx.fail(SqlError::UnknownColumn {
            table: table.to_string(),
            column: "date".to_string(),
        });
    };

    if let Some(constraint) = &element.timing_override {
        if constraint.anchor == Anchor::Ipsd && ctx.measure.population(PopulationType::InitialPopulation).is_none() {
            return ctx.fail(SqlError::UnknownTimingAnchor("IPSD".to_string()));
        }
        let mp_start = format!(":{}", bind_mp_start(ctx));
        let mp_end = format!(":{}", bind_mp_end(ctx));
        return match (constraint.side, &constraint.offset) {
            (Side::During, _) => format!("{date_col} between {mp_start} and {mp_end}"),
            (Side::BeforeEnd, Some(offset)) => {
                let lower = ctx.dialect.date_add(&mp_end, -(offset.value as i64), offset.unit);
                format!("{date_col} between {lower} and {mp_end}")
            }
            (Side::BeforeEnd, None) => format!("{date_col} <= {mp_end}"),
            (Side::AfterStart, Some(offset)) => {
                let upper = ctx.dialect.date_add(&mp_start, offset.value as i64, offset.unit);
                format!("{date_col} between {mp_start} and {upper}")
            }
            (Side::AfterStart, None) => format!("{date_col} >= {mp_start}"),
            (Side::BeforeStart, Some(offset)) => {
                let lower = ctx.dialect.date_add(&mp_start, -(offset.value as i64), offset.unit);
                format!("{date_col} between {lower} and {mp_start}")
            }
            (Side::BeforeStart, None) => format!("{date_col} <= {mp_start}"),
            (Side::AfterEnd, Some(offset)) => {
                let upper = ctx.dialect.date_add(&mp_end, offset.value as i64, offset.unit);
                format!("{date_col} between {mp_end} and {upper}")
            }
            (Side::AfterEnd, None) => format!("{date_col} >= {mp_end}"),
        };
    }

    if let Some(requirement) = element.timing_requirements.first() {
        let mp_end = format!(":{}", bind_mp_end(ctx));
        let mp_start = format!(":{}", bind_mp_start(ctx));
        let anchor = if requirement.relative_to.contains("start") { &mp_start } else { &mp_end };
        return match &requirement.window {
            Some(window) => match window.direction {
                Direction::Before => {
                    let lower = ctx.dialect.date_add(anchor, -(window.value as i64), window.unit);
                    format!("{date_col} between {lower} and {anchor}")
                }
                Direction::After => {
                    let upper = ctx.dialect.date_add(anchor, window.value as i64, window.unit);
                    format!("{date_col} between {anchor} and {upper}")
                }
                Direction::Within => {
                    let lower = ctx.dialect.date_add(anchor, -(window.value as i64), window.unit);
                    let upper = ctx.dialect.date_add(anchor, window.value as i64, window.unit);
                    format!("{date_col} between {lower} and {upper}")
                }
            },
            None => format!("{date_col} between {mp_start} and {mp_end}"),
        };
    }

    let mp_start = format!(":{}", bind_mp_start(ctx));
    let mp_end = format!(":{}", bind_mp_end(ctx));
    format!("{date_col} between {mp_start} and {mp_end}")
}

fn lower_thresholds(thresholds: &Thresholds, value_col: &str, ctx: &mut GenCtx) -> Option<String> {
    match thresholds.comparator {
        Some(Comparator::Gt) => thresholds.value_min.map(|v| format!("{value_col} > {}", ctx.bind("v", SqlValue::Decimal(v)))),
        Some(Comparator::Gte) => thresholds.value_min.map(|v| format!("{value_col} >= {}", ctx.bind("v", SqlValue::Decimal(v)))),
        Some(Comparator::Lt) => thresholds.value_max.map(|v| format!("{value_col} < {}", ctx.bind("v", SqlValue::Decimal(v)))),
        Some(Comparator::Lte) => thresholds.value_max.map(|v| format!("{value_col} <= {}", ctx.bind("v", SqlValue::Decimal(v)))),
        Some(Comparator::Eq) => thresholds.value_min.map(|v| format!("{value_col} = {}", ctx.bind("v", SqlValue::Decimal(v)))),
        Some(Comparator::Neq) => thresholds.value_min.map(|v| format!("{value_col} != {}", ctx.bind("v", SqlValue::Decimal(v)))),
        Some(Comparator::Between) => match (thresholds.value_min, thresholds.value_max) {
            (Some(min), Some(max)) => {
                let lower = ctx.bind("v", SqlValue::Decimal(min));
                let upper = ctx.bind("v", SqlValue::Decimal(max));
                Some(format!("{value_col} between {lower} and {upper}"))
            }
            _ => None,
        },
        None => None,
    }
}

fn lower_code_predicate(element: &DataElement, table: &str, ctx: &mut GenCtx) -> String {
    if !element.direct_codes.is_empty() {
        let Ok(code_col) = schema::col(table, "code", Some("F")) else {
            return ctx.fail(SqlError::UnknownColumn {
                table: table.to_string(),
                column: "code".to_string(),
            });
        };
        let codes = element
            .direct_codes
            .iter()
            .map(|c| ctx.bind("code", SqlValue::Text(c.code.clone())))
            .collect::<Vec<_>>()
            .join(", ");
        return format!("{code_col} in ({codes})");
    }

    let Some(reference) = &element.value_set else {
        ctx.warnings.push(format!("data element {} has no codes and no value set", element.id));
        return "1=0".to_string();
    };
    let Some(vs) = ctx.measure.resolve_value_set(reference) else {
        ctx.warnings.push(format!("data element {} references unknown value set '{reference}'", element.id));
        return "1=0".to_string();
    };
    let Some(oid) = vs.oid.clone() else {
        ctx.warnings.push(format!("value set '{}' has no OID to bind against valueset_codes", vs.name));
        return "1=0".to_string();
    };
    let Ok(code_col) = schema::col(table, "code", Some("F")) else {
        return ctx.fail(SqlError::UnknownColumn {
            table: table.to_string(),
            column: "code".to_string(),
        });
    };
    let oid_binding = ctx.bind("oid", SqlValue::Text(oid));
    format!("{code_col} in (select code from valueset_codes where valueset_oid = {oid_binding})")
}

fn lower_element(element: &DataElement, ctx: &mut GenCtx) -> String {
    if element.element_type == DataElementType::Demographic {
        let expr = lower_demographic_predicate(element, ctx);
        return if element.is_negated() { format!("not ({expr})") } else { expr };
    }

    let table = match schema::table_for(element.element_type) {
        Ok(table) => table,
        Err(err) => return ctx.fail(err),
    };

    let code_predicate = lower_code_predicate(element, table, ctx);
    let timing_predicate = lower_timing(element, table, ctx);

    let mut predicate = format!("F.empi_id = {PERSON_ALIAS}.empi_id and {code_predicate} and {timing_predicate}");

    if element.element_type == DataElementType::Observation {
        if let Some(thresholds) = &element.thresholds {
            if let Some(value_col) = schema::value_column(table) {
                if let Ok(value_col) = schema::col(table, value_col, Some("F")) {
                    if let Some(threshold_predicate) = lower_thresholds(thresholds, &value_col, ctx) {
                        predicate.push_str(&format!(" and {threshold_predicate}"));
                    }
                }
            }
        }
    }

    let expr = if element.element_type == DataElementType::Immunization {
        let doses = element.thresholds.and_then(|t| t.value_min).unwrap_or(1.0) as i64;
        format!("(select count(*) from {table} F where {predicate}) >= {doses}")
    } else {
        format!("exists (select 1 from {table} F where {predicate})")
    };

    if element.is_negated() {
        format!("not ({expr})")
    } else {
        expr
    }
}

fn lower_clause(clause: &LogicalClause, ctx: &mut GenCtx) -> String {
    if clause.operator == ClauseOperator::Not {
        let Some(only_child) = clause.children.first() else {
            return "1=1".to_string();
        };
        return format!("not ({})", lower_child(only_child, ctx));
    }

    if clause.children.is_empty() {
        return "1=1".to_string();
    }

    let mut out = lower_child(&clause.children[0], ctx);
    for i in 1..clause.children.len() {
        let connector = match clause.operator_between(i - 1) {
            SiblingOperator::And => "and",
            SiblingOperator::Or => "or",
        };
        out = format!("({out} {connector} {})", lower_child(&clause.children[i], ctx));
    }
    out
}

fn lower_child(child: &ClauseChild, ctx: &mut GenCtx) -> String {
    match child {
        ClauseChild::Clause(inner) => lower_clause(inner, ctx),
        ClauseChild::Element(element) => lower_element(element, ctx),
    }
}

/// Lowers `measure` into a parameterized SQL CTE chain for `dialect`
/// (spec.md §4.4).
pub fn generate(measure: &Measure, dialect: Dialect) -> SqlGeneration {
    let mut ctx = GenCtx {
        measure,
        dialect,
        bindings: Vec::new(),
        warnings: Vec::new(),
        errors: Vec::new(),
        binding_counter: 0,
    };

    let pid_binding = ctx.bind("pid", SqlValue::Text(measure.metadata.measure_id.clone()));

    let demog_predicate = match &measure.global_constraints {
        Some(constraints) => {
            let mut parts = Vec::new();
            if let Some(age_range) = &constraints.age_range {
                let as_of = match constraints.age_calculation {
                    Some(qmf_ums::AgeCalculation::AtEnd) => format!(":{}", bind_mp_end(&mut ctx)),
                    _ => format!(":{}", bind_mp_start(&mut ctx)),
                };
                let age_expr = ctx.dialect.age_calculation(&format!("{PERSON_TABLE}.birth_date"), &as_of);
                parts.push(format!("{age_expr} >= {}", age_range.min));
                parts.push(format!("{age_expr} <= {}", age_range.max));
            }
            if let Some(gender) = constraints.gender {
                if let Some(predicate) = lower_gender_predicate(gender) {
                    parts.push(predicate);
                }
            }
            if parts.is_empty() {
                "1=1".to_string()
            } else {
                parts.join(" and ")
            }
        }
        None => "1=1".to_string(),
    };

    let ip_clause = match measure.population(PopulationType::InitialPopulation) {
        Some(population) => lower_clause(&population.criteria, &mut ctx),
        None => {
            ctx.errors.push("measure defines no Initial Population".to_string());
            "1=0".to_string()
        }
    };

    let den_clause = match measure.population(PopulationType::Denominator) {
        Some(population) if !population.equals_initial_population => lower_clause(&population.criteria, &mut ctx),
        _ => "1=1".to_string(),
    };

    let dex_population = measure.population(PopulationType::DenominatorExclusion);
    let dex_clause = dex_population.map(|population| lower_clause(&population.criteria, &mut ctx));

    let num_clause = match measure.population(PopulationType::Numerator) {
        Some(population) if !population.equals_initial_population => lower_clause(&population.criteria, &mut ctx),
        Some(_) => "1=1".to_string(),
        None => {
            ctx.errors.push("measure defines no Numerator".to_string());
            "1=0".to_string()
        }
    };

    let mut lines = Vec::new();
    lines.push("with".to_string());
    lines.push(format!("  DEMOG as (select {PERSON_TABLE}.empi_id, {PERSON_TABLE}.birth_date, {PERSON_TABLE}.gender from {PERSON_TABLE} where {demog_predicate} and {PERSON_TABLE}.population_id = {pid_binding}),"));
    lines.push(format!(
        "  IP as (select distinct empi_id, birth_date, gender from DEMOG {PERSON_ALIAS} where {ip_clause}),"
    ));
    lines.push(format!("  DEN as (select empi_id, birth_date, gender from IP {PERSON_ALIAS} where {den_clause}),"));
    if let Some(dex_clause) = &dex_clause {
        lines.push(format!("  DEX as (select empi_id, birth_date, gender from DEN {PERSON_ALIAS} where {dex_clause}),"));
        lines.push(format!(
            "  NUM as (select empi_id, birth_date, gender from DEN {PERSON_ALIAS} where empi_id not in (select empi_id from DEX) and {num_clause})"
        ));
    } else {
        lines.push(format!("  NUM as (select empi_id, birth_date, gender from DEN {PERSON_ALIAS} where {num_clause})"));
    }
    lines.push(String::new());
    lines.push("select".to_string());
    lines.push("  (select count(*) from DEN) as denominator,".to_string());
    lines.push("  (select count(*) from NUM) as numerator,".to_string());
    lines.push(ctx.dialect.iif(
        "(select count(*) from DEN) = 0",
        "0.0",
        "cast((select count(*) from NUM) as decimal) / (select count(*) from DEN)",
    ) + " as rate");

    SqlGeneration {
        success: ctx.errors.is_empty(),
        sql: lines.join("\n"),
        bindings: ctx.bindings,
        warnings: ctx.warnings,
        errors: ctx.errors,
    }
}
