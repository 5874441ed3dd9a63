use crate::core::units::steps_per_day;
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

pub(crate) fn reject_nulls<T>(vec_of_options: Vec<Option<T>>) -> anyhow::Result<Vec<T>> {
    vec_of_options
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| anyhow!("A null was in a schedule when it was not expected."))
}

pub(crate) fn expand_numeric_schedule(schedule: &NumericSchedule) -> Vec<Option<f64>> {
    schedule.expand()
}

/// A named, rule-based control schedule as held by the host building model
/// (a thermostat setpoint or a lighting level).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ControlSchedule {
    #[serde(skip)]
    pub name: String,
    /// length in hours covered by each expanded schedule entry
    #[serde(default = "default_time_series_step")]
    pub time_series_step: f64,
    pub schedule: NumericSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summer_design_day: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winter_design_day: Option<Vec<f64>>,
}

fn default_time_series_step() -> f64 {
    1.
}

impl ControlSchedule {
    pub fn new(name: &str, time_series_step: f64, schedule: NumericSchedule) -> Self {
        Self {
            name: name.to_string(),
            time_series_step,
            schedule,
            summer_design_day: None,
            winter_design_day: None,
        }
    }

    /// Builds a schedule holding one explicit value per interval of `timesteps_per_hour` resolution.
    pub fn from_interval_values(name: &str, timesteps_per_hour: usize, values: &[f64]) -> Self {
        Self::new(
            name,
            1. / timesteps_per_hour as f64,
            NumericSchedule::from_values(values),
        )
    }

    pub fn with_design_days(mut self, summer: Vec<f64>, winter: Vec<f64>) -> Self {
        self.summer_design_day = Some(summer);
        self.winter_design_day = Some(winter);
        self
    }

    /// Expands the schedule rules and maps the result onto a grid of `timesteps_per_hour`
    /// intervals per hour.
    ///
    /// Coarser rules are repeated across the finer grid; finer rules are averaged into each
    /// coarser interval. The number of values returned is whatever the rules cover.
    pub fn to_interval_values(&self, timesteps_per_hour: usize) -> anyhow::Result<Vec<f64>> {
        let expanded = reject_nulls(expand_numeric_schedule(&self.schedule))
            .map_err(|err| anyhow!("Schedule '{}': {err}", self.name))?;

        let target_step = 1. / timesteps_per_hour as f64;
        let ratio = self.time_series_step / target_step;
        if ratio <= 0. || !ratio.is_finite() {
            bail!(
                "Schedule '{}' has an invalid time series step of {} hours",
                self.name,
                self.time_series_step
            );
        }

        if ratio >= 1. {
            let repeat = integral_ratio(ratio).ok_or_else(|| {
                anyhow!(
                    "Schedule '{}' with a step of {} hours cannot be mapped onto {timesteps_per_hour} intervals per hour",
                    self.name,
                    self.time_series_step
                )
            })?;
            Ok(expanded
                .into_iter()
                .flat_map(|v| std::iter::repeat(v).take(repeat))
                .collect())
        } else {
            let chunk = integral_ratio(1. / ratio).ok_or_else(|| {
                anyhow!(
                    "Schedule '{}' with a step of {} hours cannot be averaged onto {timesteps_per_hour} intervals per hour",
                    self.name,
                    self.time_series_step
                )
            })?;
            Ok(expanded
                .chunks(chunk)
                .map(|values| values.iter().sum::<f64>() / values.len() as f64)
                .collect())
        }
    }

    pub(crate) fn design_day_length_is_valid(&self, timesteps_per_hour: usize) -> bool {
        [&self.summer_design_day, &self.winter_design_day]
            .iter()
            .all(|day| {
                day.as_ref()
                    .map_or(true, |values| values.len() == steps_per_day(timesteps_per_hour))
            })
    }
}

fn integral_ratio(ratio: f64) -> Option<usize> {
    let rounded = ratio.round();
    ((ratio - rounded).abs() < 1e-9 && rounded >= 1.).then_some(rounded as usize)
}

/// Data structures representing how schedules can be provided as input (in JSON).
pub(crate) mod input {
    use itertools::Itertools;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    pub struct Schedule<T: Copy> {
        pub(crate) main: Vec<ScheduleEntry<T>>,
        #[serde(flatten)]
        pub(crate) references: HashMap<String, ScheduleReferenceEntry<T>>,
    }

    impl<T> Schedule<T>
    where
        T: Copy,
    {
        pub(super) fn expand(&self) -> Vec<Option<T>> {
            let mut visiting = vec![];
            self.main
                .iter()
                .flat_map(|entry| self.expand_entry(entry, &mut visiting))
                .collect()
        }

        fn expand_entry<'a>(
            &'a self,
            entry: &'a ScheduleEntry<T>,
            visiting: &mut Vec<&'a str>,
        ) -> Vec<Option<T>> {
            match entry {
                ScheduleEntry::Null(_) => vec![None],
                ScheduleEntry::Value(v) => vec![Some(*v)],
                ScheduleEntry::Repeater(repeater) => {
                    let once = match &repeater.value {
                        ScheduleRepeaterValue::Reference(reference) => {
                            self.expand_reference(reference, visiting)
                        }
                        ScheduleRepeaterValue::Entry(ScheduleRepeaterEntry::Null(_)) => {
                            vec![None]
                        }
                        ScheduleRepeaterValue::Entry(ScheduleRepeaterEntry::Value(v)) => {
                            vec![Some(*v)]
                        }
                    };
                    std::iter::repeat(once)
                        .take(repeater.repeat)
                        .flatten()
                        .collect_vec()
                }
                ScheduleEntry::Reference(reference) => self.expand_reference(reference, visiting),
            }
        }

        // an unknown or cyclic reference expands to a null, which is rejected downstream
        fn expand_reference<'a>(
            &'a self,
            reference: &'a str,
            visiting: &mut Vec<&'a str>,
        ) -> Vec<Option<T>> {
            if visiting.contains(&reference) {
                return vec![None];
            }
            visiting.push(reference);
            let expanded = match self.references.get(reference) {
                Some(ScheduleReferenceEntry::Single(entry)) => self.expand_entry(entry, visiting),
                Some(ScheduleReferenceEntry::Multi(entries)) => entries
                    .iter()
                    .flat_map(|entry| self.expand_entry(entry, visiting))
                    .collect_vec(),
                None => vec![None],
            };
            visiting.pop();
            expanded
        }
    }

    impl<T> Schedule<T>
    where
        T: Copy + PartialEq,
    {
        /// Encodes a fixed grid of values as run-length repeaters, one entry per run.
        pub fn from_values(values: &[T]) -> Self {
            let main = values
                .iter()
                .chunk_by(|&&v| v)
                .into_iter()
                .map(|(value, run)| match run.count() {
                    1 => ScheduleEntry::Value(value),
                    repeat => ScheduleEntry::Repeater(ScheduleRepeater {
                        value: ScheduleRepeaterValue::Entry(ScheduleRepeaterEntry::Value(value)),
                        repeat,
                    }),
                })
                .collect();

            Self {
                main,
                references: Default::default(),
            }
        }
    }

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    #[serde(untagged)]
    pub enum ScheduleEntry<T: Copy> {
        Null(()),
        Value(T),
        Repeater(ScheduleRepeater<T>),
        Reference(String),
    }

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    #[serde(untagged)]
    pub enum ScheduleReferenceEntry<T: Copy> {
        Multi(Vec<ScheduleEntry<T>>),
        Single(ScheduleEntry<T>),
    }

    #[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
    #[serde(untagged)]
    pub enum ScheduleRepeaterEntry<T> {
        Null(()),
        Value(T),
    }

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    pub struct ScheduleRepeater<T: Copy> {
        pub(crate) value: ScheduleRepeaterValue<T>,
        pub(crate) repeat: usize,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    #[serde(untagged)]
    pub enum ScheduleRepeaterValue<T: Copy> {
        Reference(String),
        Entry(ScheduleRepeaterEntry<T>),
    }

    pub type NumericSchedule = Schedule<f64>;

}

pub use input::NumericSchedule;
