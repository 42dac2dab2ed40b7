// Overall progress from per-task snapshots

use super::ProgressUpdate;
use crate::core::math::{clamp_unit, ratio};
use crate::loader::TaskSnapshot;

/// Combine task snapshots into one progress value
///
/// Byte-weighted over the tasks whose total size is known; falls back to the
/// share of terminal tasks when no task knows its size. Completion order does
/// not matter.
///
/// Only sized tasks weigh in, so a finished critical resource reads as 1.0
/// until a background task learns its size. Published progress never goes
/// back down, so that early 1.0 holds until completion.
pub fn overall_progress(tasks: &[TaskSnapshot]) -> ProgressUpdate {
    let (loaded, total) = tasks
        .iter()
        .filter_map(|task| task.bytes_total.map(|total| (task.bytes_loaded.unwrap_or(0), total)))
        .fold((0u64, 0u64), |(loaded_sum, total_sum), (loaded, total)| {
            (
                loaded_sum.saturating_add(loaded.min(total)),
                total_sum.saturating_add(total),
            )
        });

    if let Some(fraction) = ratio(loaded, total) {
        return ProgressUpdate {
            fraction,
            determinate: true,
        };
    }

    let finished = tasks.iter().filter(|task| task.is_terminal()).count() as u64;
    ProgressUpdate {
        fraction: clamp_unit(ratio(finished, tasks.len() as u64).unwrap_or(1.0)),
        determinate: false,
    }
}
