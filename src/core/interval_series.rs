use crate::core::units::{
    steps_per_day, DAYS_PER_LEAP_YEAR, DAYS_PER_YEAR, SUPPORTED_TIMESTEPS_PER_HOUR,
};
use crate::errors::SeriesError;
use itertools::Itertools;

/// The calendar grid an annual series is sampled on: its resolution and the length of its year.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SeriesGrid {
    timesteps_per_hour: usize,
    days: usize,
}

impl SeriesGrid {
    pub fn new(timesteps_per_hour: usize, days: usize) -> Result<Self, SeriesError> {
        Self::from_length(days * steps_per_day(timesteps_per_hour))
    }

    pub fn from_length(length: usize) -> Result<Self, SeriesError> {
        SUPPORTED_TIMESTEPS_PER_HOUR
            .iter()
            .cartesian_product([DAYS_PER_YEAR as usize, DAYS_PER_LEAP_YEAR as usize])
            .find(|&(&timesteps_per_hour, days)| days * steps_per_day(timesteps_per_hour) == length)
            .map(|(&timesteps_per_hour, days)| Self {
                timesteps_per_hour,
                days,
            })
            .ok_or_else(|| SeriesError::invalid_length(length))
    }

    pub fn timesteps_per_hour(&self) -> usize {
        self.timesteps_per_hour
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn is_leap(&self) -> bool {
        self.days == DAYS_PER_LEAP_YEAR as usize
    }

    pub fn steps_per_day(&self) -> usize {
        steps_per_day(self.timesteps_per_hour)
    }

    pub fn length(&self) -> usize {
        self.days * self.steps_per_day()
    }

    pub fn with_timesteps_per_hour(&self, timesteps_per_hour: usize) -> Result<Self, SeriesError> {
        Self::new(timesteps_per_hour, self.days)
    }
}

/// A fixed-length numeric series covering one calendar year, hourly or at 15-minute resolution.
///
/// Series are never mutated once built; every transformation returns a new series.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalSeries {
    values: Vec<f64>,
    grid: SeriesGrid,
}

impl IntervalSeries {
    pub fn new(values: Vec<f64>) -> Result<Self, SeriesError> {
        let grid = SeriesGrid::from_length(values.len())?;
        Ok(Self { values, grid })
    }

    pub fn filled(grid: SeriesGrid, value: f64) -> Self {
        Self {
            values: vec![value; grid.length()],
            grid,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn grid(&self) -> SeriesGrid {
        self.grid
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn timesteps_per_hour(&self) -> usize {
        self.grid.timesteps_per_hour()
    }

    pub fn days(&self) -> usize {
        self.grid.days()
    }

    /// Values for one day, addressed by 0-based day index.
    pub fn day(&self, day_index: usize) -> Option<&[f64]> {
        let steps = self.grid.steps_per_day();
        self.values.get(day_index * steps..(day_index + 1) * steps)
    }

    pub fn daily_profiles(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.grid.steps_per_day())
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            values: self.values.iter().map(|&v| f(v)).collect(),
            grid: self.grid,
        }
    }

    /// Resample onto a series of `target_length` values covering the same year.
    ///
    /// Going to a coarser resolution averages the sub-intervals making up each output interval;
    /// going to a finer one repeats each value. Resampling between leap and non-leap years
    /// is not supported.
    pub fn resample_to(&self, target_length: usize) -> Result<Self, SeriesError> {
        if target_length == self.len() {
            return Ok(self.clone());
        }
        let unsupported = SeriesError::UnsupportedInterval {
            from: self.len(),
            to: target_length,
        };
        let target_grid = SeriesGrid::from_length(target_length).map_err(|_| unsupported.clone())?;
        if target_grid.days() != self.grid.days() {
            return Err(unsupported);
        }

        let source_tph = self.timesteps_per_hour();
        let target_tph = target_grid.timesteps_per_hour();
        let values = if source_tph > target_tph {
            let factor = source_tph / target_tph;
            self.values
                .chunks(factor)
                .map(|chunk| chunk.iter().sum::<f64>() / factor as f64)
                .collect_vec()
        } else {
            let factor = target_tph / source_tph;
            self.values
                .iter()
                .flat_map(|&v| std::iter::repeat(v).take(factor))
                .collect_vec()
        };

        Ok(Self {
            values,
            grid: target_grid,
        })
    }

    pub fn resample_to_timesteps_per_hour(
        &self,
        timesteps_per_hour: usize,
    ) -> Result<Self, SeriesError> {
        let grid = self
            .grid
            .with_timesteps_per_hour(timesteps_per_hour)
            .map_err(|_| SeriesError::UnsupportedInterval {
                from: self.len(),
                to: self.grid.days() * steps_per_day(timesteps_per_hour),
            })?;
        self.resample_to(grid.length())
    }
}
