use crate::core::interval_series::{IntervalSeries, SeriesGrid};
use crate::errors::SeriesError;
use crate::simulation_time::{Calendar, CalendarDay};
use crate::statistics::{argmax, sliding_sums};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, instrument};

/// Where the daily peak window is placed relative to the peak of the signal.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum PeakWindowStrategy {
    /// the placement capturing the most signal over the window length
    #[serde(rename = "max savings")]
    #[strum(serialize = "max savings")]
    MaxSavings,
    #[serde(rename = "start with peak")]
    #[strum(serialize = "start with peak")]
    StartWithPeak,
    #[default]
    #[serde(rename = "end with peak")]
    #[strum(serialize = "end with peak")]
    EndWithPeak,
    #[serde(rename = "center with peak")]
    #[strum(serialize = "center with peak")]
    CenterWithPeak,
}

/// The part of the year control windows are generated for.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum Season {
    #[default]
    #[serde(rename = "all year")]
    #[strum(serialize = "all year")]
    AllYear,
    /// May to September
    #[serde(rename = "summer")]
    #[strum(serialize = "summer")]
    Summer,
    /// November to March
    #[serde(rename = "winter")]
    #[strum(serialize = "winter")]
    Winter,
}

impl Season {
    fn includes(&self, day: &CalendarDay) -> bool {
        match self {
            Season::AllYear => true,
            Season::Summer => (5..=9).contains(&day.month()),
            Season::Winter => !(4..=10).contains(&day.month()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum DayTypes {
    #[default]
    #[serde(rename = "all days")]
    #[strum(serialize = "all days")]
    AllDays,
    #[serde(rename = "weekdays")]
    #[strum(serialize = "weekdays")]
    Weekdays,
    #[serde(rename = "weekends")]
    #[strum(serialize = "weekends")]
    Weekends,
}

impl DayTypes {
    fn includes(&self, day: &CalendarDay) -> bool {
        match self {
            DayTypes::AllDays => true,
            DayTypes::Weekdays => !day.is_weekend(),
            DayTypes::Weekends => day.is_weekend(),
        }
    }
}

/// Window lengths (in hours) and placement rules for daily control windows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakWindowSpec {
    pub peak_len: usize,
    pub prepeak_len: usize,
    /// reserved for recovery after the peak; not applied
    pub rebound_len: usize,
    pub strategy: PeakWindowStrategy,
    pub season: Season,
    pub day_types: DayTypes,
}

/// Daily windows marked over a year: 1.0 for intervals inside the window, 0.0 elsewhere.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlWindows {
    pub prepeak: IntervalSeries,
    pub peak: IntervalSeries,
}

pub struct PeakWindowGenerator {
    spec: PeakWindowSpec,
    calendar: Calendar,
}

impl PeakWindowGenerator {
    pub fn new(spec: PeakWindowSpec, calendar: Calendar) -> Self {
        if spec.rebound_len > 0 {
            debug!(
                rebound_len = spec.rebound_len,
                "Rebound window length is accepted but not applied"
            );
        }
        Self { spec, calendar }
    }

    /// The pre-peak (control action) window for each day of the signal.
    pub fn generate(&self, signal: &IntervalSeries) -> Result<IntervalSeries, SeriesError> {
        Ok(self.generate_windows(signal)?.prepeak)
    }

    /// Peak and pre-peak windows for each in-scope day, located from the daily peaks of `signal`.
    ///
    /// Windows never leave their day: a peak window the strategy would push over midnight is
    /// shifted back inside the day, and a pre-peak window reaching before midnight is clipped.
    #[instrument(skip_all, fields(strategy = %self.spec.strategy, peak_len = self.spec.peak_len))]
    pub fn generate_windows(&self, signal: &IntervalSeries) -> Result<ControlWindows, SeriesError> {
        self.check_year(signal.grid())?;
        let timesteps_per_hour = signal.timesteps_per_hour();
        self.mark_windows(signal.grid(), |day_index| {
            signal
                .day(day_index)
                .map(|day| self.peak_window_start(day, timesteps_per_hour))
                .unwrap_or_default()
        })
    }

    /// Windows at the same clock time every in-scope day, with the peak window starting at
    /// `start_hour`.
    pub fn fixed_windows(
        &self,
        grid: SeriesGrid,
        start_hour: usize,
    ) -> Result<ControlWindows, SeriesError> {
        self.check_year(grid)?;
        let start = start_hour * grid.timesteps_per_hour();
        self.mark_windows(grid, |_| start)
    }

    fn check_year(&self, grid: SeriesGrid) -> Result<(), SeriesError> {
        if grid.days() != self.calendar.days_in_year() as usize {
            return Err(SeriesError::InvalidSeriesLength {
                length: grid.length(),
                expected: format!(
                    "{} values for {}",
                    self.calendar.series_length(grid.timesteps_per_hour()),
                    self.calendar.year()
                ),
            });
        }
        Ok(())
    }

    fn peak_window_start(&self, day: &[f64], timesteps_per_hour: usize) -> usize {
        let window = self.spec.peak_len * timesteps_per_hour;
        let peak = argmax(day).unwrap_or_default() as isize;
        match self.spec.strategy {
            PeakWindowStrategy::EndWithPeak => (peak + 1 - window as isize).max(0) as usize,
            PeakWindowStrategy::StartWithPeak => peak as usize,
            PeakWindowStrategy::CenterWithPeak => (peak - (window / 2) as isize).max(0) as usize,
            PeakWindowStrategy::MaxSavings => argmax(&sliding_sums(day, window)).unwrap_or_default(),
        }
    }

    fn mark_windows(
        &self,
        grid: SeriesGrid,
        window_start: impl Fn(usize) -> usize,
    ) -> Result<ControlWindows, SeriesError> {
        let steps = grid.steps_per_day();
        let peak_len = (self.spec.peak_len * grid.timesteps_per_hour()).min(steps);
        let prepeak_len = self.spec.prepeak_len * grid.timesteps_per_hour();

        let mut prepeak = vec![0.; grid.length()];
        let mut peak = vec![0.; grid.length()];
        let mut days_marked = 0;

        for day in self.calendar.iter() {
            if !(self.spec.season.includes(&day) && self.spec.day_types.includes(&day)) {
                continue;
            }
            let offset = day.index() * steps;
            let start = window_start(day.index()).min(steps - peak_len);

            peak[offset + start..offset + start + peak_len].fill(1.);
            prepeak[offset + start.saturating_sub(prepeak_len)..offset + start].fill(1.);
            days_marked += 1;
        }
        debug!(days_marked, "Marked control windows");

        Ok(ControlWindows {
            prepeak: IntervalSeries::new(prepeak)?,
            peak: IntervalSeries::new(peak)?,
        })
    }
}
