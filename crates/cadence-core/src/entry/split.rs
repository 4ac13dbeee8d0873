//! Splitting a long task into sequential schedule entries.
//!
//! Segments share the parent's id in `parent_entry_id`, carry a 1-based
//! `sequence_index` and the group's `total_group_hours`. Indices are fixed
//! at split time; removing a sibling leaves the others untouched.

use chrono::Duration;

use super::{new_entry_id, EntryStatus, ScheduleEntry};
use crate::error::ConfigurationError;
use crate::time_range::{add_minutes, MINUTES_PER_DAY};

/// Split `parent` into `parts` sequential segments totalling `total_hours`.
///
/// Segment `i` is placed `i` days after the parent's date, starting at the
/// parent's start time. Hours are divided evenly, rounded to the minute,
/// with the remainder landing on the last segment so the group always sums
/// to `total_hours`.
///
/// # Errors
/// Returns [`ConfigurationError::InvalidSplit`] for zero parts, or
/// [`ConfigurationError::InvalidTimeRange`] when a segment would not fit
/// before midnight.
pub fn split_task(
    parent: &ScheduleEntry,
    total_hours: f64,
    parts: u32,
) -> Result<Vec<ScheduleEntry>, ConfigurationError> {
    if parts == 0 || !total_hours.is_finite() || total_hours <= 0.0 {
        return Err(ConfigurationError::InvalidSplit(parts));
    }
    if total_hours * 60.0 / parts as f64 > MINUTES_PER_DAY as f64 {
        return Err(ConfigurationError::InvalidTimeRange {
            start: parent.start_time,
            end: parent.end_time,
        });
    }

    let total_minutes = (total_hours * 60.0).round() as i64;
    let base_minutes = total_minutes / parts as i64;
    let remainder = total_minutes - base_minutes * parts as i64;
    if base_minutes == 0 {
        return Err(ConfigurationError::InvalidSplit(parts));
    }

    let mut segments = Vec::with_capacity(parts as usize);
    for index in 0..parts {
        let minutes = if index + 1 == parts {
            base_minutes + remainder
        } else {
            base_minutes
        };
        let start_time = parent.start_time;
        let end_time = add_minutes(start_time, minutes)
            .filter(|end| *end > start_time)
            .ok_or(ConfigurationError::InvalidTimeRange {
                start: start_time,
                end: parent.end_time,
            })?;

        let mut segment = parent.clone();
        segment.id = new_entry_id();
        segment.date = parent.date + Duration::days(index as i64);
        segment.start_time = start_time;
        segment.end_time = end_time;
        segment.label = format!("{} ({}/{})", parent.label, index + 1, parts);
        segment.planned_hours = minutes as f64 / 60.0;
        segment.actual_hours = 0.0;
        segment.status = EntryStatus::Planned;
        segment.task_ref = parent.task_ref.clone().or_else(|| Some(parent.id.clone()));
        segment.parent_entry_id = Some(parent.id.clone());
        segment.sequence_index = Some(index + 1);
        segment.total_group_hours = Some(total_hours);
        segment.paused_at = None;
        segment.resumed_at = None;
        segment.paused_from = None;
        segment.completed_at = None;
        segments.push(segment);
    }

    Ok(segments)
}

/// Siblings of a split group, ordered by sequence index.
pub fn segments_of<'a>(parent_id: &str, entries: &'a [ScheduleEntry]) -> Vec<&'a ScheduleEntry> {
    let mut segments: Vec<&ScheduleEntry> = entries
        .iter()
        .filter(|e| e.parent_entry_id.as_deref() == Some(parent_id))
        .collect();
    segments.sort_by_key(|e| e.sequence_index.unwrap_or(u32::MAX));
    segments
}

/// Remove one segment by id without renumbering the rest.
///
/// Returns the removed entry, if any.
pub fn remove_segment(entries: &mut Vec<ScheduleEntry>, id: &str) -> Option<ScheduleEntry> {
    let position = entries.iter().position(|e| e.id == id)?;
    Some(entries.remove(position))
}

/// Progress of a split group: (actual hours logged, total group hours).
pub fn group_progress(parent_id: &str, entries: &[ScheduleEntry]) -> Option<(f64, f64)> {
    let segments = segments_of(parent_id, entries);
    let total = segments.first()?.total_group_hours?;
    let actual = segments.iter().map(|e| e.actual_hours).sum();
    Some((actual, total))
}
