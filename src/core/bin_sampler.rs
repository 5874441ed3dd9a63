use crate::core::interval_series::IntervalSeries;
use crate::errors::SeriesError;
use crate::statistics;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::Display;
use tracing::{debug, instrument};

pub const DEFAULT_BIN_COUNT: usize = 10;

/// How each day's outdoor temperature profile is reduced to the single value it is binned by.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BinStatistic {
    #[default]
    Max,
    Mean,
}

impl BinStatistic {
    fn of_day(&self, values: &[f64]) -> f64 {
        match self {
            BinStatistic::Max => statistics::max(values),
            BinStatistic::Mean => statistics::mean(values),
        }
    }
}

/// How a bin's representative day is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionPolicy {
    /// A day drawn uniformly from the bin, reproducible for a given seed.
    Random { seed: u64 },
    /// The earliest day in the bin, so that a simulation horizon ending on the last
    /// representative day covers every bin.
    Sort,
}

/// A band of daily outdoor temperature, and the days of the year (1-based) falling in it.
#[derive(Clone, Debug, PartialEq)]
pub struct TemperatureBin {
    pub lower: f64,
    pub upper: f64,
    pub days: BTreeSet<u32>,
}

impl TemperatureBin {
    pub fn contains_day(&self, day_of_year: u32) -> bool {
        self.days.contains(&day_of_year)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinSample {
    pub bins: Vec<TemperatureBin>,
    /// one day per bin, in bin order
    pub representative_days: Vec<u32>,
    pub bin_count: usize,
    /// the last calendar day a simulation must reach to cover every representative day
    pub max_day_of_year: u32,
}

impl BinSample {
    /// Position of the bin holding the given day, if any.
    pub fn bin_index_for_day(&self, day_of_year: u32) -> Option<usize> {
        self.bins.iter().position(|bin| bin.contains_day(day_of_year))
    }

    /// The distinct days needing simulation, in calendar order.
    pub fn days_to_simulate(&self) -> Vec<u32> {
        self.representative_days
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The degenerate sampling in which every day is its own bin.
    pub fn full_year(days_in_year: u32) -> Self {
        let bins = (1..=days_in_year)
            .map(|day| TemperatureBin {
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
                days: BTreeSet::from([day]),
            })
            .collect();
        Self {
            bins,
            representative_days: (1..=days_in_year).collect(),
            bin_count: days_in_year as usize,
            max_day_of_year: days_in_year,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BinSampler {
    bin_count: usize,
    statistic: BinStatistic,
}

impl Default for BinSampler {
    fn default() -> Self {
        Self::new(DEFAULT_BIN_COUNT, Default::default())
    }
}

impl BinSampler {
    pub fn new(bin_count: usize, statistic: BinStatistic) -> Self {
        Self {
            bin_count: bin_count.max(1),
            statistic,
        }
    }

    /// Validates a raw annual temperature series before sampling it.
    pub fn sample_values(
        &self,
        air_temperatures: &[f64],
        policy: SelectionPolicy,
    ) -> Result<BinSample, SeriesError> {
        let series = IntervalSeries::new(air_temperatures.to_vec())?;
        Ok(self.sample(&series, policy))
    }

    /// Stratify the days of the year into equal-width bands of the daily temperature
    /// statistic and choose one representative day per non-empty band.
    ///
    /// Bands are closed at the lower edge and open at the upper one, except the warmest band,
    /// which also holds the maximum.
    #[instrument(skip_all, fields(bin_count = self.bin_count, statistic = %self.statistic))]
    pub fn sample(&self, air_temperatures: &IntervalSeries, policy: SelectionPolicy) -> BinSample {
        let daily = air_temperatures
            .daily_profiles()
            .map(|day| self.statistic.of_day(day))
            .collect::<Vec<_>>();

        let low = statistics::min(&daily);
        let high = statistics::max(&daily);
        let width = (high - low) / self.bin_count as f64;

        let mut bins = (0..self.bin_count)
            .map(|i| TemperatureBin {
                lower: low + width * i as f64,
                upper: if i + 1 == self.bin_count {
                    high
                } else {
                    low + width * (i + 1) as f64
                },
                days: BTreeSet::new(),
            })
            .collect::<Vec<_>>();

        for (index, &temperature) in daily.iter().enumerate() {
            let bin = if width > 0. {
                (((temperature - low) / width).floor() as usize).min(self.bin_count - 1)
            } else {
                0
            };
            bins[bin].days.insert(index as u32 + 1);
        }
        bins.retain(|bin| !bin.days.is_empty());

        let representative_days = match policy {
            SelectionPolicy::Random { seed } => {
                let mut rng = Pcg64::seed_from_u64(seed);
                bins.iter()
                    .filter_map(|bin| bin.days.iter().nth(rng.random_range(0..bin.days.len())))
                    .copied()
                    .collect::<Vec<_>>()
            }
            SelectionPolicy::Sort => bins
                .iter()
                .filter_map(|bin| bin.days.first())
                .copied()
                .collect::<Vec<_>>(),
        };
        let max_day_of_year = representative_days.iter().copied().max().unwrap_or(0);

        debug!(
            bins = bins.len(),
            max_day_of_year, "Selected representative days {representative_days:?}"
        );

        BinSample {
            bin_count: bins.len(),
            bins,
            representative_days,
            max_day_of_year,
        }
    }
}
