//! Timing resolution (spec.md §4.9).
//!
//! Every timing check ultimately asks: does event date `D` lie in a window
//! `[from, to]`? This module resolves a [`TimingConstraint`] or a legacy
//! [`TimingRequirement`] into a concrete calendar window, inclusive on both
//! ends.

use chrono::{Months, NaiveDate};
use qmf_ums::{Anchor, DataElement, Direction, EffectiveTiming, MeasurementPeriod, Side, TimeUnit, TimingConstraint, TimingRequirement};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingError {
    #[error("unknown timing anchor: {0}")]
    UnknownAnchor(String),
}

/// Adds calendar units to a date: years add by `addMonths(v*12)`, months by
/// `addMonths(v)`, weeks by 7-day, days by 1-day (spec.md §4.9). Hours are
/// not distinguishable on a calendar date and round to the same day.
pub fn add_units(date: NaiveDate, value: i64, unit: TimeUnit) -> NaiveDate {
    match unit {
        TimeUnit::Years => add_months(date, value * 12),
        TimeUnit::Months => add_months(date, value),
        TimeUnit::Weeks => date + chrono::Duration::days(value * 7),
        TimeUnit::Days => date + chrono::Duration::days(value),
        TimeUnit::Hours => date,
    }
}

fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
            .unwrap_or(date)
    } else {
        date.checked_sub_months(Months::new((-months) as u32))
            .unwrap_or(date)
    }
}

fn reference_points(
    anchor: Anchor,
    mp: &MeasurementPeriod,
    ipsd: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), TimingError> {
    match anchor {
        Anchor::MeasurementPeriod => Ok((mp.start, mp.end)),
        Anchor::Ipsd => ipsd
            .map(|d| (d, d))
            .ok_or_else(|| TimingError::UnknownAnchor("IPSD with no initial population start date available".to_string())),
        Anchor::EventDate => Err(TimingError::UnknownAnchor(
            "EventDate anchor cannot be resolved without a reference event".to_string(),
        )),
    }
}

/// Resolves a [`TimingConstraint`] into a concrete `[from, to]` window.
pub fn window_for_constraint(
    constraint: &TimingConstraint,
    mp: &MeasurementPeriod,
    ipsd: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), TimingError> {
    let (start_ref, end_ref) = reference_points(constraint.anchor, mp, ipsd)?;
    let offset_value = constraint
        .offset
        .map(|o| (o.value as i64, o.unit))
        .unwrap_or((0, TimeUnit::Days));

    Ok(match constraint.side {
        Side::During => (start_ref, end_ref),
        Side::BeforeStart => (add_units(start_ref, -offset_value.0, offset_value.1), start_ref),
        Side::AfterStart => (start_ref, add_units(start_ref, offset_value.0, offset_value.1)),
        Side::BeforeEnd => (add_units(end_ref, -offset_value.0, offset_value.1), end_ref),
        Side::AfterEnd => (end_ref, add_units(end_ref, offset_value.0, offset_value.1)),
    })
}

/// Resolves a legacy [`TimingRequirement`]'s directional window against the
/// measurement period.
pub fn window_for_legacy(requirement: &TimingRequirement, mp: &MeasurementPeriod) -> (NaiveDate, NaiveDate) {
    let point = if requirement.relative_to.contains("start") {
        mp.start
    } else {
        mp.end
    };
    let Some(window) = &requirement.window else {
        return (mp.start, mp.end);
    };
    let value = window.value as i64;
    match window.direction {
        Direction::Before => (add_units(point, -value, window.unit), point),
        Direction::After => (point, add_units(point, value, window.unit)),
        Direction::Within => (add_units(point, -value, window.unit), add_units(point, value, window.unit)),
    }
}

/// Resolves a [`DataElement`]'s effective timing (structured takes
/// precedence over legacy) into a window. Elements with no timing at all
/// default to "event in measurement period".
pub fn resolve_window(
    element: &DataElement,
    mp: &MeasurementPeriod,
    ipsd: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), TimingError> {
    match element.effective_timing() {
        EffectiveTiming::Structured(constraint) => window_for_constraint(constraint, mp, ipsd),
        EffectiveTiming::Legacy(requirements) => Ok(window_for_legacy(&requirements[0], mp)),
        EffectiveTiming::Unspecified => Ok((mp.start, mp.end)),
    }
}

pub fn in_window(date: NaiveDate, window: (NaiveDate, NaiveDate)) -> bool {
    date >= window.0 && date <= window.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmf_ums::{Anchor as A, Offset, Side as S};

    fn mp() -> MeasurementPeriod {
        MeasurementPeriod {
            start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            inclusive: true,
        }
    }

    #[test]
    fn ten_year_lookback_before_end() {
        let constraint = TimingConstraint {
            anchor: A::MeasurementPeriod,
            side: S::BeforeEnd,
            offset: Some(Offset { value: 10, unit: TimeUnit::Years }),
            reference_anchor: None,
        };
        let (from, to) = window_for_constraint(&constraint, &mp(), None).unwrap();
        assert_eq!(to, mp().end);
        assert_eq!(from, NaiveDate::from_ymd_opt(2016, 12, 31).unwrap());
    }

    #[test]
    fn during_measurement_period() {
        let constraint = TimingConstraint {
            anchor: A::MeasurementPeriod,
            side: S::During,
            offset: None,
            reference_anchor: None,
        };
        let window = window_for_constraint(&constraint, &mp(), None).unwrap();
        assert_eq!(window, (mp().start, mp().end));
    }

    #[test]
    fn ipsd_anchor_without_ipsd_is_unknown() {
        let constraint = TimingConstraint {
            anchor: A::Ipsd,
            side: S::AfterStart,
            offset: Some(Offset { value: 1, unit: TimeUnit::Years }),
            reference_anchor: None,
        };
        assert!(window_for_constraint(&constraint, &mp(), None).is_err());
    }

    #[test]
    fn in_window_is_inclusive_on_both_ends() {
        let window = (mp().start, mp().end);
        assert!(in_window(mp().start, window));
        assert!(in_window(mp().end, window));
        assert!(!in_window(mp().end.succ_opt().unwrap(), window));
    }
}
