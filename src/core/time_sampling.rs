//! Sample index to time mapping.
//!
//! A [`TimeSampling`] is shared by every property that references its index
//! in the archive table. Lookups take the property's sample count because the
//! same sampling can drive properties of different lengths.

use crate::util::{Error, Result};

/// Time in seconds.
pub type Chrono = f64;

/// Sample time reported by properties with a single constant sample.
pub const NON_TIME: Chrono = f64::MIN;

/// Stored time-per-cycle value that tags a sampling as acyclic.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = f64::MAX / 32.0;

/// Tolerance used when comparing a query time against sample times.
pub const CHRONO_EPSILON: Chrono = 1.0e-9;

/// Sampling pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// One sample every `time_per_cycle`, starting at the single stored time.
    Uniform { time_per_cycle: Chrono },
    /// Stored times repeat every `time_per_cycle`.
    Cyclic { time_per_cycle: Chrono },
    /// Every sample time is stored explicitly.
    Acyclic,
}

/// Times for a sequence of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSampling {
    kind: TimeSamplingType,
    times: Vec<Chrono>,
}

impl TimeSampling {
    /// Uniform sampling at 1 second per sample from time 0; archive entry 0.
    pub fn identity() -> Self {
        Self::uniform(1.0, 0.0)
    }

    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            kind: TimeSamplingType::Uniform { time_per_cycle },
            times: vec![start_time],
        }
    }

    /// `times` is one cycle; it is sorted on construction.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        if times.len() <= 1 {
            return Self::uniform(time_per_cycle, times.first().copied().unwrap_or(0.0));
        }
        Self {
            kind: TimeSamplingType::Cyclic { time_per_cycle },
            times: sorted(times),
        }
    }

    /// One stored time per sample; sorted on construction.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            kind: TimeSamplingType::Acyclic,
            times: sorted(times),
        }
    }

    /// Rebuild from the stored table form.
    pub fn from_stored(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        if time_per_cycle == ACYCLIC_TIME_PER_CYCLE {
            Self::acyclic(times)
        } else {
            Self::cyclic(time_per_cycle, times)
        }
    }

    #[inline]
    pub fn kind(&self) -> TimeSamplingType {
        self.kind
    }

    /// Stored time-per-cycle, the acyclic tag for acyclic samplings.
    pub fn time_per_cycle(&self) -> Chrono {
        match self.kind {
            TimeSamplingType::Uniform { time_per_cycle }
            | TimeSamplingType::Cyclic { time_per_cycle } => time_per_cycle,
            TimeSamplingType::Acyclic => ACYCLIC_TIME_PER_CYCLE,
        }
    }

    pub fn stored_times(&self) -> &[Chrono] {
        &self.times
    }

    pub fn is_acyclic(&self) -> bool {
        matches!(self.kind, TimeSamplingType::Acyclic)
    }

    /// Same type and same times.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.kind == other.kind && self.times == other.times
    }

    /// Time of sample `index`. Uniform and cyclic samplings extend without
    /// bound; acyclic samplings hold their last stored time.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match self.kind {
            TimeSamplingType::Uniform { time_per_cycle } => {
                self.times[0] + index as Chrono * time_per_cycle
            }
            TimeSamplingType::Cyclic { time_per_cycle } => {
                let per_cycle = self.times.len();
                let cycle = (index / per_cycle) as Chrono;
                self.times[index % per_cycle] + cycle * time_per_cycle
            }
            TimeSamplingType::Acyclic => match self.times.get(index) {
                Some(t) => *t,
                None => self.times.last().copied().unwrap_or(0.0),
            },
        }
    }

    /// First and last sample times for `num_samples` samples.
    pub fn time_range(&self, num_samples: usize) -> Result<(Chrono, Chrono)> {
        let last = num_samples.checked_sub(1).ok_or(Error::EmptyTimeSampling)?;
        Ok((self.sample_time(0), self.sample_time(last)))
    }

    /// Number of samples, out of `num_samples`, whose time is at or
    /// before `time`.
    fn count_at_or_before(&self, time: Chrono, num_samples: usize) -> usize {
        if let TimeSamplingType::Uniform { time_per_cycle } = self.kind {
            if time_per_cycle > 0.0 {
                let offset = (time - self.times[0]) / time_per_cycle;
                let estimate = (offset + CHRONO_EPSILON).floor();
                return if estimate < 0.0 {
                    0
                } else {
                    (estimate as usize).saturating_add(1).min(num_samples)
                };
            }
        }
        let (mut lo, mut hi) = (0, num_samples);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.sample_time(mid) <= time + CHRONO_EPSILON {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Largest index whose time is at or before `time`. Times before the
    /// first sample clamp to index 0.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> Result<(usize, Chrono)> {
        if num_samples == 0 {
            return Err(Error::EmptyTimeSampling);
        }
        let index = self.count_at_or_before(time, num_samples).saturating_sub(1);
        Ok((index, self.sample_time(index)))
    }

    /// Smallest index whose time is at or after `time`. Times past the last
    /// sample clamp to the last index.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> Result<(usize, Chrono)> {
        let (floor, floor_time) = self.floor_index(time, num_samples)?;
        if (floor_time - time).abs() <= CHRONO_EPSILON || floor_time > time {
            return Ok((floor, floor_time));
        }
        let index = (floor + 1).min(num_samples - 1);
        Ok((index, self.sample_time(index)))
    }

    /// Index whose time is closest to `time`; equidistant times resolve to
    /// the floor index.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> Result<(usize, Chrono)> {
        let (floor, floor_time) = self.floor_index(time, num_samples)?;
        let (ceil, ceil_time) = self.ceil_index(time, num_samples)?;
        if floor == ceil || floor_time > time {
            return Ok((floor, floor_time));
        }
        if time - floor_time <= ceil_time - time {
            Ok((floor, floor_time))
        } else {
            Ok((ceil, ceil_time))
        }
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::identity()
    }
}

fn sorted(mut times: Vec<Chrono>) -> Vec<Chrono> {
    times.sort_by(|a, b| a.total_cmp(b));
    times
}
