//! Draft/approved/archived lifecycle and category auto-assignment
//! (spec.md §4.6). Timestamps are taken as explicit parameters rather
//! than read internally via `Utc::now()`, keeping these functions pure
//! in line with the single-threaded, no-hidden-clock concurrency model.

use crate::error::{LibraryError, Result};
use crate::model::{ComponentBody, ComponentStatus, HistoryEntry, LibraryComponent};
use chrono::NaiveDateTime;

fn bump_minor(version: &str) -> String {
    let mut parts = version.splitn(2, '.');
    let major = parts.next().unwrap_or("0");
    let minor: u32 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    format!("{major}.{}", minor + 1)
}

/// Derives a default category purely from a component's shape. Kept
/// deliberately minimal rather than modeling an invented clinical
/// taxonomy: timing presence and atomic/composite kind are the only
/// signals actually available.
pub fn default_category(body: &ComponentBody) -> &'static str {
    match body {
        ComponentBody::Atomic(atomic) if atomic.timing.operator.is_some() => "Timed Criteria",
        ComponentBody::Atomic(_) => "Structural Criteria",
        ComponentBody::Composite(_) => "Composite Logic",
    }
}

/// Overwrites `metadata.category` only when it was never explicitly set
/// by a caller of [`set_category`].
pub fn recompute_category(component: &mut LibraryComponent) {
    if component.metadata.category_auto_assigned {
        component.metadata.category = default_category(&component.body).to_string();
    }
}

/// Explicit category override; once called, auto-assignment never
/// overwrites this component's category again.
pub fn set_category(component: &mut LibraryComponent, category: impl Into<String>) {
    component.metadata.category = category.into();
    component.metadata.category_auto_assigned = false;
}

/// Creates a new minor version of `component` in `Draft` status with an
/// appended history entry, leaving the original untouched.
pub fn create_version(component: &LibraryComponent, change_description: impl Into<String>, created_by: impl Into<String>, now: NaiveDateTime) -> Result<LibraryComponent> {
    if component.status == ComponentStatus::Archived {
        return Err(LibraryError::Archived(component.id.clone()));
    }

    let created_by = created_by.into();
    let change_description = change_description.into();
    let mut next = component.clone();
    next.version = bump_minor(&component.version);
    next.status = ComponentStatus::Draft;
    next.approved_by = None;
    next.approved_at = None;
    next.history.push(HistoryEntry {
        version_id: next.version.clone(),
        status: ComponentStatus::Draft,
        created_at: now,
        created_by,
        change_description,
    });
    Ok(next)
}

/// Moves a draft component to `Approved`, stamping the approver and time.
pub fn approve(component: &mut LibraryComponent, approver: impl Into<String>, now: NaiveDateTime) -> Result<()> {
    if component.status == ComponentStatus::Archived {
        return Err(LibraryError::Archived(component.id.clone()));
    }
    let approver = approver.into();
    component.status = ComponentStatus::Approved;
    component.approved_by = Some(approver.clone());
    component.approved_at = Some(now);
    component.history.push(HistoryEntry {
        version_id: component.version.clone(),
        status: ComponentStatus::Approved,
        created_at: now,
        created_by: approver,
        change_description: "approved".to_string(),
    });
    Ok(())
}

/// Records that `measure_id` draws on `component` (spec.md §3.2 Usage):
/// appends the measure id the first time it's seen, always bumps the
/// count, and stamps the last-used time.
pub fn record_usage(component: &mut LibraryComponent, measure_id: impl Into<String>, now: NaiveDateTime) {
    let measure_id = measure_id.into();
    if !component.usage.measure_ids.contains(&measure_id) {
        component.usage.measure_ids.push(measure_id);
    }
    component.usage.usage_count += 1;
    component.usage.last_used_at = Some(now);
}

/// Terminal transition: archived components can never be approved,
/// versioned, or archived again.
pub fn archive(component: &mut LibraryComponent, archived_by: impl Into<String>, now: NaiveDateTime) -> Result<()> {
    if component.status == ComponentStatus::Archived {
        return Err(LibraryError::AlreadyArchived(component.id.clone()));
    }
    let archived_by = archived_by.into();
    component.status = ComponentStatus::Archived;
    component.history.push(HistoryEntry {
        version_id: component.version.clone(),
        status: ComponentStatus::Archived,
        created_at: now,
        created_by: archived_by,
        change_description: "archived".to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomicComponent, ComponentBody, TimingDescriptor};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 30).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn draft() -> LibraryComponent {
        LibraryComponent::new(
            "c1",
            "Diabetes diagnosis",
            ComponentBody::Atomic(AtomicComponent { value_set_oid: Some("oid-1".to_string()), value_set_name: None, timing: TimingDescriptor::default(), negation: false }),
            "Structural Criteria",
        )
    }

    #[test]
    fn create_version_bumps_minor_and_resets_to_draft() {
        let mut approved = draft();
        approve(&mut approved, "reviewer", now()).unwrap();
        let next = create_version(&approved, "tightened timing", "author", now()).unwrap();
        assert_eq!(next.version, "0.2");
        assert_eq!(next.status, ComponentStatus::Draft);
        assert!(next.approved_by.is_none());
    }

    #[test]
    fn approve_stamps_approver_and_timestamp() {
        let mut component = draft();
        approve(&mut component, "reviewer", now()).unwrap();
        assert_eq!(component.status, ComponentStatus::Approved);
        assert_eq!(component.approved_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn archive_is_terminal() {
        let mut component = draft();
        archive(&mut component, "admin", now()).unwrap();
        assert_eq!(archive(&mut component, "admin", now()), Err(LibraryError::AlreadyArchived("c1".to_string())));
    }

    #[test]
    fn record_usage_tracks_distinct_measures_and_count() {
        let mut component = draft();
        record_usage(&mut component, "measure-a", now());
        record_usage(&mut component, "measure-a", now());
        record_usage(&mut component, "measure-b", now());
        assert_eq!(component.usage.measure_ids, vec!["measure-a".to_string(), "measure-b".to_string()]);
        assert_eq!(component.usage.usage_count, 3);
        assert_eq!(component.usage.last_used_at, Some(now()));
    }

    #[test]
    fn recompute_category_respects_explicit_override() {
        let mut component = draft();
        set_category(&mut component, "Custom Category");
        recompute_category(&mut component);
        assert_eq!(component.metadata.category, "Custom Category");
    }
}
