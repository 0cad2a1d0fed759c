//! Sample selection by index or time.

use super::time_sampling::{Chrono, TimeSampling};
use crate::util::{Error, Result};

/// Which sample of a property to read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSelector {
    /// Exact stored index.
    Index(usize),
    /// Last sample at or before the time.
    Floor(Chrono),
    /// First sample at or after the time.
    Ceil(Chrono),
    /// Closest sample; ties go to the earlier one.
    Near(Chrono),
}

impl SampleSelector {
    /// Resolve to an index in `[0, num_samples)`.
    pub fn resolve(self, sampling: &TimeSampling, num_samples: usize) -> Result<usize> {
        match self {
            Self::Index(index) if index < num_samples => Ok(index),
            Self::Index(index) => Err(Error::SampleOutOfBounds {
                index,
                count: num_samples,
            }),
            Self::Floor(t) => Ok(sampling.floor_index(t, num_samples)?.0),
            Self::Ceil(t) => Ok(sampling.ceil_index(t, num_samples)?.0),
            Self::Near(t) => Ok(sampling.near_index(t, num_samples)?.0),
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<usize> for SampleSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Chrono> for SampleSelector {
    fn from(time: Chrono) -> Self {
        Self::Near(time)
    }
}

/// Bracketing samples for interpolating at a time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleInterp {
    pub floor_index: usize,
    pub ceil_index: usize,
    /// 0.0 at the floor sample, 1.0 at the ceil sample.
    pub alpha: f64,
}

impl SampleInterp {
    pub fn at(sampling: &TimeSampling, time: Chrono, num_samples: usize) -> Result<Self> {
        let (floor_index, floor_time) = sampling.floor_index(time, num_samples)?;
        let (ceil_index, ceil_time) = sampling.ceil_index(time, num_samples)?;
        let span = ceil_time - floor_time;
        let alpha = if ceil_index == floor_index || span <= 0.0 {
            0.0
        } else {
            ((time - floor_time) / span).clamp(0.0, 1.0)
        };
        Ok(Self {
            floor_index,
            ceil_index,
            alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        assert_eq!(SampleSelector::Index(2).resolve(&ts, 4).unwrap(), 2);
        assert!(matches!(
            SampleSelector::Index(4).resolve(&ts, 4),
            Err(Error::SampleOutOfBounds { index: 4, count: 4 })
        ));
        assert_eq!(SampleSelector::Floor(1.5).resolve(&ts, 4).unwrap(), 1);
        assert_eq!(SampleSelector::Ceil(1.5).resolve(&ts, 4).unwrap(), 2);
        assert_eq!(SampleSelector::from(2.6).resolve(&ts, 4).unwrap(), 3);
        assert!(SampleSelector::Near(0.0).resolve(&ts, 0).is_err());
    }

    #[test]
    fn test_interp() {
        let ts = TimeSampling::uniform(2.0, 0.0);
        let interp = SampleInterp::at(&ts, 3.0, 4).unwrap();
        assert_eq!((interp.floor_index, interp.ceil_index), (1, 2));
        assert!((interp.alpha - 0.5).abs() < 1e-12);

        let exact = SampleInterp::at(&ts, 4.0, 4).unwrap();
        assert_eq!(exact.floor_index, exact.ceil_index);
        assert_eq!(exact.alpha, 0.0);
    }
}
