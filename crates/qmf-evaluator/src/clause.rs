//! Recursive descent over [`LogicalClause`] / [`DataElement`] trees
//! (spec.md §4.7). Children are evaluated left to right; the connector
//! between adjacent children is resolved by
//! [`LogicalClause::operator_between`] before falling back to the clause's
//! own operator.

use crate::dataelement::evaluate_element;
use crate::trace::{PartialMatch, TraceNode, TraceStatus};
use crate::EvalContext;
use qmf_ums::{ClauseChild, ClauseOperator, LogicalClause, SiblingOperator};

pub fn evaluate_clause(clause: &LogicalClause, ctx: &EvalContext) -> (bool, TraceNode) {
    match clause.operator {
        ClauseOperator::Not => evaluate_not(clause, ctx),
        _ => evaluate_and_or(clause, ctx),
    }
}

fn evaluate_not(clause: &LogicalClause, ctx: &EvalContext) -> (bool, TraceNode) {
    let Some(only_child) = clause.children.first() else {
        // Malformed (validation should have already flagged NOT arity);
        // an empty NOT vacuously fails closed rather than panicking.
        return (
            false,
            TraceNode::leaf(clause.id.clone(), clause.description.clone(), false, "not (<missing>)"),
        );
    };
    let (child_match, child_trace) = evaluate_child(only_child, ctx);
    let matched = !child_match;
    let node = TraceNode {
        id: clause.id.clone(),
        label: if clause.description.is_empty() {
            format!("not ({})", child_trace.label)
        } else {
            clause.description.clone()
        },
        status: TraceStatus::from_bool(matched),
        facts: Vec::new(),
        cql_snippet: format!("not ({})", child_trace.cql_snippet),
        children: vec![child_trace],
        partial: None,
    };
    (matched, node)
}

fn evaluate_and_or(clause: &LogicalClause, ctx: &EvalContext) -> (bool, TraceNode) {
    if clause.children.is_empty() {
        // Empty clauses are synthesized for "equals Initial Population"
        // and for required-but-absent populations; vacuously true.
        return (
            true,
            TraceNode::leaf(clause.id.clone(), clause.description.clone(), true, "true"),
        );
    }

    let results: Vec<(bool, TraceNode)> = clause
        .children
        .iter()
        .map(|child| evaluate_child(child, ctx))
        .collect();

    let mut combined = results[0].0;
    for i in 1..results.len() {
        combined = match clause.operator_between(i - 1) {
            SiblingOperator::And => combined && results[i].0,
            SiblingOperator::Or => combined || results[i].0,
        };
    }

    let met = results.iter().filter(|(matched, _)| *matched).count();
    let total = results.len();
    let status = if combined {
        TraceStatus::Pass
    } else if met > 0 {
        TraceStatus::Partial
    } else {
        TraceStatus::Fail
    };

    let snippet = results
        .iter()
        .map(|(_, node)| node.cql_snippet.clone())
        .collect::<Vec<_>>()
        .join(if clause.operator == ClauseOperator::Or { " or " } else { " and " });

    let node = TraceNode {
        id: clause.id.clone(),
        label: clause.description.clone(),
        status,
        facts: Vec::new(),
        cql_snippet: format!("({snippet})"),
        children: results.into_iter().map(|(_, node)| node).collect(),
        partial: Some(PartialMatch { met, total }),
    };

    (combined, node)
}

fn evaluate_child(child: &ClauseChild, ctx: &EvalContext) -> (bool, TraceNode) {
    match child {
        ClauseChild::Clause(inner) => evaluate_clause(inner, ctx),
        ClauseChild::Element(element) => evaluate_element(element, ctx),
    }
}

/// Collects descriptions of failed leaf data elements, depth-first,
/// left-to-right — used to build the numerator's "how close" summary.
pub fn collect_unmet_leaf_descriptions(node: &TraceNode, out: &mut Vec<String>) {
    if node.children.is_empty() {
        if node.status != TraceStatus::Pass && !node.label.is_empty() {
            out.push(node.label.clone());
        }
        return;
    }
    for child in &node.children {
        collect_unmet_leaf_descriptions(child, out);
    }
}
