use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use course_core::model::{CourseId, StudentId};

/// A settled course purchase, as loaded from the orders collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub course_id: CourseId,
    pub student_id: StudentId,
    pub amount_cents: u64,
    pub purchased_at: DateTime<Utc>,
}

/// Half-open time window for dashboard filters: `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Unbounded range; matches every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    #[must_use]
    pub fn until(to: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    #[must_use]
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if self.from.is_some_and(|from| at < from) {
            return false;
        }
        if self.to.is_some_and(|to| at >= to) {
            return false;
        }
        true
    }
}

/// Totals for a set of sales within a window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevenueSummary {
    pub orders: u64,
    pub revenue_cents: u64,
    pub unique_students: u64,
}

/// Fold sales into dashboard totals, keeping only records inside the range.
#[must_use]
pub fn summarize(records: &[SaleRecord], range: DateRange) -> RevenueSummary {
    let mut students = HashSet::new();
    let mut summary = RevenueSummary::default();

    for record in records {
        if !range.contains(record.purchased_at) {
            continue;
        }
        summary.orders += 1;
        summary.revenue_cents = summary.revenue_cents.saturating_add(record.amount_cents);
        students.insert(record.student_id);
    }

    summary.unique_students = students.len() as u64;
    summary
}

/// Per-course totals within a window, keyed in course-id order.
#[must_use]
pub fn revenue_by_course(
    records: &[SaleRecord],
    range: DateRange,
) -> BTreeMap<CourseId, RevenueSummary> {
    let mut students: BTreeMap<CourseId, HashSet<StudentId>> = BTreeMap::new();
    let mut totals: BTreeMap<CourseId, RevenueSummary> = BTreeMap::new();

    for record in records {
        if !range.contains(record.purchased_at) {
            continue;
        }
        let summary = totals.entry(record.course_id).or_default();
        summary.orders += 1;
        summary.revenue_cents = summary.revenue_cents.saturating_add(record.amount_cents);
        students
            .entry(record.course_id)
            .or_default()
            .insert(record.student_id);
    }

    for (course_id, buyers) in students {
        if let Some(summary) = totals.get_mut(&course_id) {
            summary.unique_students = buyers.len() as u64;
        }
    }

    totals
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
