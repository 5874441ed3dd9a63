use crate::core::interval_series::IntervalSeries;
use crate::core::schedule::ControlSchedule;
use crate::core::units::{fraction_from_percent, steps_per_day};
use anyhow::Context;
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use strum::Display;
use tracing::{debug, instrument, warn};

/// A control action applied during a window, and its magnitude.
#[derive(Clone, Copy, Debug, Display, PartialEq)]
pub enum Adjustment {
    /// lower the cooling setpoint by this many degrees
    #[strum(serialize = "pre-cooling")]
    PreCool { setpoint_offset: f64 },
    /// raise the heating setpoint by this many degrees
    #[strum(serialize = "pre-heating")]
    PreHeat { setpoint_offset: f64 },
    /// dim lighting by this percentage
    #[strum(serialize = "dimming")]
    Dim { percent: f64 },
}

impl Adjustment {
    /// Turns a 0-1 window series into per-interval offsets: degrees to add to a setpoint, or a
    /// retention fraction to multiply a lighting level by.
    pub fn control_offsets(&self, window: &IntervalSeries) -> IntervalSeries {
        match *self {
            Adjustment::PreCool { setpoint_offset } => window.map(|w| -w * setpoint_offset),
            Adjustment::PreHeat { setpoint_offset } => window.map(|w| w * setpoint_offset),
            Adjustment::Dim { percent } => window.map(|w| 1. - w * fraction_from_percent(percent)),
        }
    }

    fn name_suffix(&self) -> &'static str {
        match self {
            Adjustment::PreCool { .. } | Adjustment::PreHeat { .. } => "adjusted",
            Adjustment::Dim { .. } => "df_adjusted",
        }
    }

    /// Applies one interval's offset to `base`, keeping a setpoint on its side of `reference`.
    ///
    /// When the adjusted setpoint would cross the reference, the midpoint of the base and the
    /// reference is used instead. A base that is already at or beyond the reference is returned
    /// unchanged, so input whose setpoints already cross stays crossed.
    fn combine(&self, base: f64, offset: f64, reference: Option<f64>) -> f64 {
        match (self, reference) {
            (Adjustment::Dim { .. }, _) => base * offset,
            (Adjustment::PreCool { .. }, Some(heating)) => {
                let adjusted = base + offset;
                if adjusted > heating {
                    adjusted
                } else if base > heating {
                    (base + heating) / 2.
                } else {
                    base
                }
            }
            (Adjustment::PreHeat { .. }, Some(cooling)) => {
                let adjusted = base + offset;
                if adjusted < cooling {
                    adjusted
                } else if base < cooling {
                    (base + cooling) / 2.
                } else {
                    base
                }
            }
            (Adjustment::PreCool { .. } | Adjustment::PreHeat { .. }, None) => base + offset,
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct AdjustmentKey {
    kind: String,
    source: String,
    reference: Option<String>,
}

/// Builds adjusted copies of control schedules for one model-processing run.
///
/// Consumers sharing a source schedule (and reference schedule) share a single adjusted
/// schedule; the source schedules are never modified.
#[derive(Debug)]
pub struct ScheduleAdjuster {
    timesteps_per_hour: usize,
    generated: HashMap<AdjustmentKey, String>,
    schedules: IndexMap<String, ControlSchedule>,
    reserved_names: HashSet<String>,
}

impl ScheduleAdjuster {
    pub fn new(timesteps_per_hour: usize) -> Self {
        Self {
            timesteps_per_hour,
            generated: Default::default(),
            schedules: Default::default(),
            reserved_names: Default::default(),
        }
    }

    /// Names already held by the model, which generated schedules must not take.
    pub fn with_reserved_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.reserved_names.extend(names);
        self
    }

    /// Returns the name of the adjusted copy of `source`, generating it on first request.
    ///
    /// `reference` is the opposing setpoint schedule bounding a thermostat adjustment:
    /// heating when pre-cooling, cooling when pre-heating.
    #[instrument(skip_all, fields(schedule = %source.name, adjustment = %adjustment))]
    pub fn adjust(
        &mut self,
        source: &ControlSchedule,
        reference: Option<&ControlSchedule>,
        window: &IntervalSeries,
        adjustment: Adjustment,
    ) -> anyhow::Result<String> {
        let key = AdjustmentKey {
            kind: adjustment.to_string(),
            source: source.name.clone(),
            reference: reference.map(|r| r.name.clone()),
        };
        if let Some(name) = self.generated.get(&key) {
            debug!("Reusing adjusted schedule '{name}'");
            return Ok(name.clone());
        }

        let offsets = adjustment.control_offsets(window);
        let adjusted = self
            .merge(source, reference, &offsets, adjustment)
            .with_context(|| format!("Failed to adjust schedule '{}'", source.name))?;

        let name = self.unused_name(source, reference, adjustment);
        debug!("Generated adjusted schedule '{name}'");

        self.schedules.insert(
            name.clone(),
            ControlSchedule {
                name: name.clone(),
                ..adjusted
            },
        );
        self.generated.insert(key, name.clone());
        Ok(name)
    }

    /// The first free name of `"{source} {suffix}"`, then qualified by the reference schedule,
    /// then by the adjustment, then numbered.
    fn unused_name(
        &self,
        source: &ControlSchedule,
        reference: Option<&ControlSchedule>,
        adjustment: Adjustment,
    ) -> String {
        let name = format!("{} {}", source.name, adjustment.name_suffix());
        let is_taken =
            |candidate: &String| self.schedules.contains_key(candidate) || self.reserved_names.contains(candidate);

        let mut candidates = vec![name.clone()];
        if let Some(reference) = reference {
            candidates.push(format!("{name} for {}", reference.name));
        }
        candidates.push(format!("{name} {adjustment}"));
        if let Some(free) = candidates.into_iter().find(|candidate| !is_taken(candidate)) {
            return free;
        }

        (2..)
            .map(|n| format!("{name} {n}"))
            .find(|candidate| !is_taken(candidate))
            .unwrap_or_else(|| name.clone())
    }

    fn merge(
        &self,
        source: &ControlSchedule,
        reference: Option<&ControlSchedule>,
        offsets: &IntervalSeries,
        adjustment: Adjustment,
    ) -> anyhow::Result<ControlSchedule> {
        let tph = self.timesteps_per_hour;
        let base = source.to_interval_values(tph)?;
        let reference_values = reference
            .map(|reference| reference.to_interval_values(tph))
            .transpose()?;

        let mut length = base.len().min(offsets.len());
        if base.len() != offsets.len() {
            warn!(
                "Schedule '{}' covers {} intervals but the control offsets cover {}; both truncated to {length}",
                source.name,
                base.len(),
                offsets.len()
            );
        }
        if let Some(reference_values) = &reference_values {
            if reference_values.len() < length {
                warn!(
                    "Reference schedule covers {} intervals, fewer than the {length} being adjusted; truncated",
                    reference_values.len()
                );
                length = reference_values.len();
            }
        }

        let merged = (0..length)
            .map(|i| {
                adjustment.combine(
                    base[i],
                    offsets.values()[i],
                    reference_values.as_ref().map(|values| values[i]),
                )
            })
            .collect_vec();

        let adjusted = ControlSchedule::from_interval_values(&source.name, tph, &merged);
        let source_design_days = if source.design_day_length_is_valid(tph) {
            (
                source.summer_design_day.clone(),
                source.winter_design_day.clone(),
            )
        } else {
            debug!(
                "Design days of '{}' do not fit {tph} intervals per hour; replacing them",
                source.name
            );
            (None, None)
        };
        let (summer, winter) = match source_design_days {
            (Some(summer), Some(winter)) => (summer, winter),
            (summer, winter) => {
                let design_day = most_active_day(&merged, steps_per_day(tph))
                    .and_then(|day| base.chunks(steps_per_day(tph)).nth(day))
                    .map(|day| day.to_vec())
                    .unwrap_or_default();
                (
                    summer.unwrap_or_else(|| design_day.clone()),
                    winter.unwrap_or(design_day),
                )
            }
        };

        Ok(adjusted.with_design_days(summer, winter))
    }

    pub fn schedules(&self) -> &IndexMap<String, ControlSchedule> {
        &self.schedules
    }

    pub fn into_schedules(self) -> IndexMap<String, ControlSchedule> {
        self.schedules
    }
}

/// The index of the whole day with the most nonzero intervals, the earliest such day on ties.
fn most_active_day(values: &[f64], steps_per_day: usize) -> Option<usize> {
    values
        .chunks_exact(steps_per_day)
        .map(|day| day.iter().filter(|&&v| v != 0.).count())
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (day, count)| match best {
            Some((_, best_count)) if count <= best_count => best,
            _ => Some((day, count)),
        })
        .map(|(day, _)| day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schedule::NumericSchedule;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn constant(name: &str, value: f64) -> ControlSchedule {
        ControlSchedule::new(
            name,
            1.,
            serde_json::from_value::<NumericSchedule>(serde_json::json!({
                "main": [{"value": value, "repeat": 8760}]
            }))
            .unwrap(),
        )
    }

    /// Hours 11 and 12 of every day.
    #[fixture]
    fn window() -> IntervalSeries {
        IntervalSeries::new(
            (0..8760)
                .map(|i| if (11..13).contains(&(i % 24)) { 1. } else { 0. })
                .collect(),
        )
        .unwrap()
    }

    fn adjusted_values(adjuster: &ScheduleAdjuster, name: &str) -> Vec<f64> {
        adjuster.schedules()[name].to_interval_values(1).unwrap()
    }

    #[rstest]
    #[case(2., 22.)]
    #[case(4., 22.5)]
    fn pre_cooling_should_respect_heating_setpoint(
        window: IntervalSeries,
        #[case] setpoint_offset: f64,
        #[case] expected: f64,
    ) {
        let cooling = constant("cooling", 24.);
        let heating = constant("heating", 21.);
        let mut adjuster = ScheduleAdjuster::new(1);

        let name = adjuster
            .adjust(
                &cooling,
                Some(&heating),
                &window,
                Adjustment::PreCool { setpoint_offset },
            )
            .unwrap();
        assert_eq!(name, "cooling adjusted");

        let values = adjusted_values(&adjuster, &name);
        assert_eq!(values.len(), 8760);
        assert_relative_eq!(values[11], expected);
        assert_relative_eq!(values[12], expected);
        assert_relative_eq!(values[13], 24.);
        assert!(values.iter().all(|&v| v > 21.));
    }

    #[rstest]
    fn pre_heating_should_respect_cooling_setpoint(window: IntervalSeries) {
        let cooling = constant("cooling", 24.);
        let heating = constant("heating", 21.);
        let mut adjuster = ScheduleAdjuster::new(1);

        let name = adjuster
            .adjust(
                &heating,
                Some(&cooling),
                &window,
                Adjustment::PreHeat { setpoint_offset: 5. },
            )
            .unwrap();
        let values = adjusted_values(&adjuster, &name);
        assert_relative_eq!(values[11], 22.5);
        assert_relative_eq!(values[0], 21.);
        assert!(values.iter().all(|&v| v < 24.));
    }

    #[rstest]
    #[case(Adjustment::PreCool { setpoint_offset: 2. }, 20., 21.)]
    #[case(Adjustment::PreCool { setpoint_offset: 2. }, 21., 21.)]
    #[case(Adjustment::PreHeat { setpoint_offset: 2. }, 25., 24.)]
    #[case(Adjustment::PreHeat { setpoint_offset: 2. }, 24., 24.)]
    fn crossed_setpoints_should_be_left_alone(
        #[case] adjustment: Adjustment,
        #[case] base: f64,
        #[case] reference: f64,
    ) {
        let offset = match adjustment {
            Adjustment::PreCool { setpoint_offset } => -setpoint_offset,
            _ => 2.,
        };
        assert_relative_eq!(adjustment.combine(base, offset, Some(reference)), base);
    }

    #[rstest]
    fn dimming_should_scale_lighting_in_window(window: IntervalSeries) {
        let lighting = constant("lighting", 0.8);
        let mut adjuster = ScheduleAdjuster::new(1);

        let name = adjuster
            .adjust(&lighting, None, &window, Adjustment::Dim { percent: 25. })
            .unwrap();
        assert_eq!(name, "lighting df_adjusted");
        let values = adjusted_values(&adjuster, &name);
        assert_relative_eq!(values[12], 0.6);
        assert_relative_eq!(values[14], 0.8);
    }

    #[rstest]
    fn shared_source_should_be_adjusted_once(window: IntervalSeries) {
        let cooling = constant("cooling", 24.);
        let heating = constant("heating", 21.);
        let other_heating = constant("other heating", 18.);
        let mut adjuster = ScheduleAdjuster::new(1);
        let adjustment = Adjustment::PreCool { setpoint_offset: 2. };

        let first = adjuster
            .adjust(&cooling, Some(&heating), &window, adjustment)
            .unwrap();
        let second = adjuster
            .adjust(&cooling, Some(&heating), &window, adjustment)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(adjuster.schedules().len(), 1);

        let third = adjuster
            .adjust(&cooling, Some(&other_heating), &window, adjustment)
            .unwrap();
        assert_eq!(third, "cooling adjusted for other heating");
        assert_eq!(adjuster.schedules().len(), 2);
    }

    #[rstest]
    fn unbounded_adjustment_should_not_replace_bounded_one(window: IntervalSeries) {
        let cooling = constant("sp", 24.);
        let heating = constant("heating", 21.);
        let mut adjuster = ScheduleAdjuster::new(1);
        let adjustment = Adjustment::PreCool { setpoint_offset: 4. };

        let bounded = adjuster
            .adjust(&cooling, Some(&heating), &window, adjustment)
            .unwrap();
        let unbounded = adjuster.adjust(&cooling, None, &window, adjustment).unwrap();

        assert_ne!(bounded, unbounded);
        assert_eq!(adjuster.schedules().len(), 2);
        assert_relative_eq!(adjusted_values(&adjuster, &bounded)[11], 22.5);
        assert_relative_eq!(adjusted_values(&adjuster, &unbounded)[11], 20.);
    }

    #[rstest]
    fn pre_heating_should_not_replace_pre_cooling_of_same_schedule(window: IntervalSeries) {
        let setpoint = constant("sp", 24.);
        let heating = constant("heating", 21.);
        let mut adjuster = ScheduleAdjuster::new(1);

        let cooled = adjuster
            .adjust(
                &setpoint,
                Some(&heating),
                &window,
                Adjustment::PreCool { setpoint_offset: 4. },
            )
            .unwrap();
        let heated = adjuster
            .adjust(&setpoint, None, &window, Adjustment::PreHeat { setpoint_offset: 4. })
            .unwrap();
        let heated_again = adjuster
            .adjust(&setpoint, None, &window, Adjustment::PreHeat { setpoint_offset: 4. })
            .unwrap();

        assert_eq!(cooled, "sp adjusted");
        assert_eq!(heated, "sp adjusted pre-heating");
        assert_eq!(heated, heated_again);
        assert_eq!(adjuster.schedules().len(), 2);
        assert_relative_eq!(adjusted_values(&adjuster, &cooled)[11], 22.5);
        assert_relative_eq!(adjusted_values(&adjuster, &heated)[11], 28.);
    }

    #[rstest]
    fn generated_names_should_avoid_model_schedules(window: IntervalSeries) {
        let cooling = constant("cooling", 24.);
        let mut adjuster = ScheduleAdjuster::new(1).with_reserved_names([
            "cooling adjusted".to_string(),
            "cooling adjusted pre-cooling".to_string(),
        ]);

        let name = adjuster
            .adjust(&cooling, None, &window, Adjustment::PreCool { setpoint_offset: 1. })
            .unwrap();
        assert_eq!(name, "cooling adjusted 2");
    }

    #[rstest]
    fn source_schedule_should_be_untouched(window: IntervalSeries) {
        let cooling = constant("cooling", 24.);
        let before = cooling.clone();
        let mut adjuster = ScheduleAdjuster::new(1);
        adjuster
            .adjust(&cooling, None, &window, Adjustment::PreCool { setpoint_offset: 2. })
            .unwrap();
        assert_eq!(cooling, before);
    }

    #[rstest]
    fn mismatched_lengths_should_truncate_to_shorter(window: IntervalSeries) {
        let short = ControlSchedule::new(
            "short",
            1.,
            NumericSchedule::from_values(&vec![24.; 48]),
        );
        let mut adjuster = ScheduleAdjuster::new(1);
        let name = adjuster
            .adjust(&short, None, &window, Adjustment::PreCool { setpoint_offset: 1. })
            .unwrap();
        let values = adjusted_values(&adjuster, &name);
        assert_eq!(values.len(), 48);
        assert_eq!(values[35], 23.);
    }

    #[rstest]
    fn design_days_should_take_most_active_unadjusted_day(window: IntervalSeries) {
        // lights off on day 1, on for the first 10 hours of day 2, on for 6 hours of day 3
        let mut levels = vec![0.; 8760];
        levels[24..34].fill(1.);
        levels[48..54].fill(1.);
        let lighting = ControlSchedule::new("lighting", 1., NumericSchedule::from_values(&levels));
        let mut adjuster = ScheduleAdjuster::new(1);
        let name = adjuster
            .adjust(&lighting, None, &window, Adjustment::Dim { percent: 50. })
            .unwrap();

        let adjusted = &adjuster.schedules()[&name];
        let expected = levels[24..48].to_vec();
        assert_eq!(adjusted.summer_design_day.as_ref(), Some(&expected));
        assert_eq!(adjusted.winter_design_day.as_ref(), Some(&expected));
    }

    #[rstest]
    fn source_design_days_should_be_kept(window: IntervalSeries) {
        let cooling =
            constant("cooling", 24.).with_design_days(vec![23.; 24], vec![26.; 24]);
        let mut adjuster = ScheduleAdjuster::new(1);
        let name = adjuster
            .adjust(&cooling, None, &window, Adjustment::PreCool { setpoint_offset: 1. })
            .unwrap();
        let adjusted = &adjuster.schedules()[&name];
        assert_eq!(adjusted.summer_design_day, Some(vec![23.; 24]));
        assert_eq!(adjusted.winter_design_day, Some(vec![26.; 24]));
    }

    #[rstest]
    #[case(&[0., 0., 1., 1., 1., 0.], 3, Some(1))]
    #[case(&[1., 0., 0., 1., 0., 0.], 3, Some(0))]
    #[case(&[1., 1.], 3, None)]
    fn should_find_most_active_day(
        #[case] values: &[f64],
        #[case] steps: usize,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(most_active_day(values, steps), expected);
    }
}
