use crate::core::interval_series::IntervalSeries;
use crate::core::units::{steps_per_day, HOURS_PER_DAY, SUPPORTED_TIMESTEPS_PER_HOUR};
use crate::errors::SeriesError;
use anyhow::{anyhow, bail, Context};
use rayon::prelude::*;
use tracing::{debug, instrument};

/// The physics engine seen from the flexibility core: something that can produce the load of a
/// building for a single calendar day.
///
/// Implementations must be deterministic for the same model and day, and must share no mutable
/// state between days so that days can be simulated concurrently.
pub trait LoadSimulator: Send + Sync {
    /// Electrical load for each interval of the given (1-based) day of the year.
    fn simulate_day(&self, day_of_year: u32, timesteps_per_hour: usize)
        -> anyhow::Result<Vec<f64>>;
}

/// The simulated load for one representative day.
#[derive(Clone, Debug, PartialEq)]
pub struct RepresentativeDaySample {
    pub day_of_year: u32,
    pub load: Vec<f64>,
}

/// Simulate each of the requested days, optionally in parallel.
///
/// Any day failing to simulate, or returning a profile of the wrong length, fails the whole batch.
#[instrument(skip(simulator, days), fields(days = days.len()))]
pub fn run_samples(
    simulator: &dyn LoadSimulator,
    days: &[u32],
    timesteps_per_hour: usize,
    parallel: bool,
) -> anyhow::Result<Vec<RepresentativeDaySample>> {
    let simulate = |&day_of_year: &u32| -> anyhow::Result<RepresentativeDaySample> {
        let load = simulator
            .simulate_day(day_of_year, timesteps_per_hour)
            .with_context(|| format!("Simulation of day {day_of_year} failed"))?;
        let expected = steps_per_day(timesteps_per_hour);
        if load.len() != expected {
            bail!(
                "Simulation of day {day_of_year} returned {} values where {expected} were expected",
                load.len()
            );
        }
        Ok(RepresentativeDaySample { day_of_year, load })
    };

    let samples = if parallel {
        days.par_iter()
            .map(simulate)
            .collect::<anyhow::Result<Vec<_>>>()?
    } else {
        days.iter()
            .map(simulate)
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    debug!("Simulated {} days", samples.len());

    Ok(samples)
}

/// A series held at every supported resolution, so days can be sliced without resampling.
#[derive(Clone, Debug)]
struct ResampledSeries {
    by_timesteps_per_hour: Vec<(usize, IntervalSeries)>,
}

impl ResampledSeries {
    fn new(series: &IntervalSeries) -> Result<Self, SeriesError> {
        let by_timesteps_per_hour = SUPPORTED_TIMESTEPS_PER_HOUR
            .iter()
            .map(|&tph| Ok((tph, series.resample_to_timesteps_per_hour(tph)?)))
            .collect::<Result<Vec<_>, SeriesError>>()?;
        Ok(Self {
            by_timesteps_per_hour,
        })
    }

    fn day(&self, day_of_year: u32, timesteps_per_hour: usize) -> anyhow::Result<&[f64]> {
        let (_, series) = self
            .by_timesteps_per_hour
            .iter()
            .find(|(tph, _)| *tph == timesteps_per_hour)
            .ok_or_else(|| anyhow!("{timesteps_per_hour} timesteps per hour is not supported"))?;
        day_of_year
            .checked_sub(1)
            .and_then(|index| series.day(index as usize))
            .ok_or_else(|| anyhow!("Day {day_of_year} is outside a year of {} days", series.days()))
    }
}

/// A steady-state load model: an occupancy-shaped base load plus cooling and heating terms
/// proportional to the degree-hours either side of the balance points.
#[derive(Clone, Debug)]
pub struct DegreeHourLoadModel {
    air_temperatures: ResampledSeries,
    base_load: f64,
    hourly_profile: Vec<f64>,
    cooling_balance_point: f64,
    cooling_load_per_degree: f64,
    heating_balance_point: f64,
    heating_load_per_degree: f64,
}

impl DegreeHourLoadModel {
    pub fn new(
        air_temperatures: IntervalSeries,
        base_load: f64,
        hourly_profile: Vec<f64>,
        cooling_balance_point: f64,
        cooling_load_per_degree: f64,
        heating_balance_point: f64,
        heating_load_per_degree: f64,
    ) -> anyhow::Result<Self> {
        if hourly_profile.len() != HOURS_PER_DAY as usize {
            bail!(
                "Hourly load profile needs {HOURS_PER_DAY} values, not {}",
                hourly_profile.len()
            );
        }
        Ok(Self {
            air_temperatures: ResampledSeries::new(&air_temperatures)?,
            base_load,
            hourly_profile,
            cooling_balance_point,
            cooling_load_per_degree,
            heating_balance_point,
            heating_load_per_degree,
        })
    }
}

impl LoadSimulator for DegreeHourLoadModel {
    fn simulate_day(
        &self,
        day_of_year: u32,
        timesteps_per_hour: usize,
    ) -> anyhow::Result<Vec<f64>> {
        let temperatures = self.air_temperatures.day(day_of_year, timesteps_per_hour)?;

        Ok(temperatures
            .iter()
            .enumerate()
            .map(|(t_idx, &temperature)| {
                let hour = t_idx / timesteps_per_hour;
                let cooling = (temperature - self.cooling_balance_point).max(0.)
                    * self.cooling_load_per_degree;
                let heating = (self.heating_balance_point - temperature).max(0.)
                    * self.heating_load_per_degree;
                self.base_load * self.hourly_profile[hour] + cooling + heating
            })
            .collect())
    }
}

/// Load supplied ready-made, e.g. exported from a detailed simulation of the whole year.
#[derive(Clone, Debug)]
pub struct ProvidedLoadProfile {
    load: ResampledSeries,
}

impl ProvidedLoadProfile {
    pub fn new(load: &IntervalSeries) -> Result<Self, SeriesError> {
        Ok(Self {
            load: ResampledSeries::new(load)?,
        })
    }
}

impl LoadSimulator for ProvidedLoadProfile {
    fn simulate_day(
        &self,
        day_of_year: u32,
        timesteps_per_hour: usize,
    ) -> anyhow::Result<Vec<f64>> {
        Ok(self.load.day(day_of_year, timesteps_per_hour)?.to_vec())
    }
}
