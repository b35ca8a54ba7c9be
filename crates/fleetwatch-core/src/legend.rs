//! Alert/normal counters for the map legend.

use crate::types::PositionRecord;
use serde::{Deserialize, Serialize};

/// Number of alert positions in the batch.
pub fn count_alerts(batch: &[PositionRecord]) -> usize {
    batch.iter().filter(|r| r.is_alert).count()
}

/// Number of non-alert positions in the batch.
pub fn count_normal(batch: &[PositionRecord]) -> usize {
    batch.iter().filter(|r| !r.is_alert).count()
}

/// Legend counts derived from one batch. `alerts + normal` always equals
/// the batch length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendCounts {
    pub alerts: usize,
    pub normal: usize,
    /// Alerts with the barrier flag
    pub barrier: usize,
    /// Alerts with the polygon flag
    pub polygon: usize,
}

impl LegendCounts {
    pub fn from_batch(batch: &[PositionRecord]) -> Self {
        batch.iter().fold(Self::default(), |mut counts, record| {
            if record.is_alert {
                counts.alerts += 1;
                counts.barrier += usize::from(record.intersects_barrier);
                counts.polygon += usize::from(record.inside_polygon);
            } else {
                counts.normal += 1;
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.alerts + self.normal
    }

    /// Share of alert positions, 0.0 for an empty batch.
    pub fn alert_ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.alerts as f64 / self.total() as f64
        }
    }
}
