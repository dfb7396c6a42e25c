//! Bounded chart history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of retained samples (one hour at 1 Hz).
pub const DEFAULT_CAPACITY: usize = 3600;

/// One chart point per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSample {
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// `None` while the sensor reading is invalid.
    pub temperature: Option<f64>,
    /// `None` unless the PID is active.
    pub setpoint: Option<f64>,
    pub duty_cycle: f64,
}

/// FIFO of chart samples. Every series has the same length, at most
/// `capacity`; the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct ChartHistory {
    capacity: usize,
    samples: VecDeque<ChartSample>,
}

impl ChartHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: ChartSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&ChartSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartSample> {
        self.samples.iter()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.timestamp_ms).collect()
    }

    pub fn temperatures(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| s.temperature).collect()
    }

    pub fn setpoints(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| s.setpoint).collect()
    }

    pub fn duty_cycles(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.duty_cycle).collect()
    }
}

impl Default for ChartHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn series_stay_aligned_and_bounded(capacity in 1_usize..50, pushes in 0_usize..200) {
            let mut history = ChartHistory::new(capacity);
            for i in 0..pushes {
                history.push(ChartSample {
                    timestamp_ms: i as i64,
                    temperature: (i % 3 != 0).then_some(i as f64),
                    setpoint: None,
                    duty_cycle: 50.0,
                });
            }
            let len = pushes.min(capacity);
            prop_assert_eq!(history.len(), len);
            prop_assert_eq!(history.timestamps().len(), len);
            prop_assert_eq!(history.temperatures().len(), len);
            prop_assert_eq!(history.setpoints().len(), len);
            prop_assert_eq!(history.duty_cycles().len(), len);
            if pushes > 0 {
                prop_assert_eq!(history.latest().map(|s| s.timestamp_ms), Some(pushes as i64 - 1));
            }
        }
    }
}
