use crate::core::bin_sampler::BinSample;
use crate::core::interval_series::{IntervalSeries, SeriesGrid};
use crate::core::sample_simulation::RepresentativeDaySample;
use anyhow::{anyhow, bail};
use std::collections::HashMap;
use tracing::instrument;

/// Expand representative-day loads into a load for the whole year by giving every day the
/// profile of its bin's representative day.
///
/// Days within a bin are assumed to behave alike; the result is an approximation of a full
/// simulation, exact only on the representative days themselves.
#[instrument(skip_all, fields(bins = bin_sample.bins.len(), samples = samples.len()))]
pub fn reconstruct(
    bin_sample: &BinSample,
    samples: &[RepresentativeDaySample],
    grid: SeriesGrid,
) -> anyhow::Result<IntervalSeries> {
    let steps = grid.steps_per_day();
    let samples_by_day = samples
        .iter()
        .map(|sample| (sample.day_of_year, sample))
        .collect::<HashMap<_, _>>();

    let mut values = vec![0.; grid.length()];
    for (bin, &representative_day) in bin_sample
        .bins
        .iter()
        .zip(&bin_sample.representative_days)
    {
        let sample = samples_by_day
            .get(&representative_day)
            .ok_or_else(|| anyhow!("No simulated load for representative day {representative_day}"))?;
        if sample.load.len() != steps {
            bail!(
                "Load for representative day {representative_day} has {} values where {steps} were expected",
                sample.load.len()
            );
        }
        for &day in &bin.days {
            let start = (day as usize - 1) * steps;
            values
                .get_mut(start..start + steps)
                .ok_or_else(|| anyhow!("Day {day} lies outside a year of {} days", grid.days()))?
                .copy_from_slice(&sample.load);
        }
    }

    Ok(IntervalSeries::new(values)?)
}
