use crate::core::applicability::{Applicability, ApplicabilityOutcome};
use crate::core::bin_sampler::{BinSample, BinSampler, SelectionPolicy};
use crate::core::interval_series::{IntervalSeries, SeriesGrid};
use crate::core::load_reconstructor::reconstruct;
use crate::core::peak_window::{ControlWindows, PeakWindowGenerator};
use crate::core::sample_simulation::{
    run_samples, DegreeHourLoadModel, LoadSimulator, ProvidedLoadProfile,
};
use crate::core::schedule::ControlSchedule;
use crate::core::schedule_adjuster::{Adjustment, ScheduleAdjuster};
use crate::errors::{InputError, ScheduleMissingError, SeriesError};
use crate::input::{
    Building, DemandFlexibility, FuelType, Input, LightingWindow, LoadModelInput,
    LoadPredictionMethod, SignalKind, Thermostat,
};
use crate::simulation_time::Calendar;
use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use tracing::{debug, info, instrument, warn};

/// Counts of how many thermostats and lights were given adjusted schedules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateSummary {
    pub thermostats_updated: usize,
    pub thermostats_total: usize,
    pub lights_updated: usize,
    pub lights_total: usize,
    /// why each object that was not updated was skipped
    pub warnings: Vec<String>,
}

impl Display for UpdateSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "thermostats updated {}/{}, lights updated {}/{}",
            self.thermostats_updated, self.thermostats_total, self.lights_updated, self.lights_total
        )
    }
}

#[derive(Debug)]
pub struct DemandFlexResults {
    pub applicability: ApplicabilityOutcome,
    pub windows: Option<ControlWindows>,
    /// the series daily peaks were located from, when there was one
    pub signal: Option<IntervalSeries>,
    pub schedules: IndexMap<String, ControlSchedule>,
    /// the input model with the new schedules added and consumers pointed at them
    pub updated_model: Input,
    pub summary: UpdateSummary,
}

/// Wraps an annual series supplied for the model, checking it fits the model's calendar year.
fn series_for_calendar(
    values: &[f64],
    calendar: &Calendar,
    description: &str,
) -> anyhow::Result<IntervalSeries> {
    let series = IntervalSeries::new(values.to_vec()).with_context(|| description.to_string())?;
    if series.days() != calendar.days_in_year() as usize {
        return Err(anyhow::Error::new(SeriesError::InvalidSeriesLength {
            length: series.len(),
            expected: format!(
                "{} values for {} at {} per hour",
                calendar.series_length(series.timesteps_per_hour()),
                calendar.year(),
                series.timesteps_per_hour()
            ),
        })
        .context(description.to_string()));
    }
    Ok(series)
}

fn building_applicability(applicable_building_types: &[String]) -> Applicability<Building> {
    let applicable_building_types = applicable_building_types.to_vec();
    Applicability::new().with_check("building type", move |building: &Building| {
        if applicable_building_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&building.building_type))
        {
            Ok(())
        } else {
            Err(format!(
                "'{}' is not one of {applicable_building_types:?}",
                building.building_type
            ))
        }
    })
}

/// One side of a thermostat is adjusted only when it has a setpoint schedule and runs on
/// electricity.
fn setpoint_side_applicability(
    side: &'static str,
    schedule: fn(&Thermostat) -> Option<&str>,
    fuel: fn(&Thermostat) -> FuelType,
) -> Applicability<Thermostat> {
    Applicability::new()
        .with_check(side, move |thermostat: &Thermostat| {
            schedule(thermostat)
                .map(|_| ())
                .ok_or_else(|| "no setpoint schedule".to_string())
        })
        .with_check(side, move |thermostat: &Thermostat| match fuel(thermostat) {
            FuelType::Electricity => Ok(()),
            other => Err(format!("fuelled by {other}")),
        })
}

fn simulator_from_input(
    load_model: &LoadModelInput,
    air_temperatures: Option<&IntervalSeries>,
    calendar: &Calendar,
    method: LoadPredictionMethod,
) -> anyhow::Result<Box<dyn LoadSimulator>> {
    let simulator: Box<dyn LoadSimulator> = match load_model {
        LoadModelInput::DegreeHours {
            base_load,
            hourly_profile,
            cooling_balance_point,
            cooling_load_per_degree,
            heating_balance_point,
            heating_load_per_degree,
        } => Box::new(DegreeHourLoadModel::new(
            air_temperatures.cloned().ok_or_else(|| {
                InputError::MissingAirTemperatures {
                    method: method.to_string(),
                }
            })?,
            *base_load,
            hourly_profile.clone(),
            *cooling_balance_point,
            *cooling_load_per_degree,
            *heating_balance_point,
            *heating_load_per_degree,
        )?),
        LoadModelInput::Provided { load } => Box::new(ProvidedLoadProfile::new(
            &series_for_calendar(load, calendar, "Provided load")?,
        )?),
    };
    Ok(simulator)
}

pub struct Corpus {
    calendar: Calendar,
    settings: DemandFlexibility,
    air_temperatures: Option<IntervalSeries>,
    peak_signal: Option<(SignalKind, IntervalSeries)>,
    simulator: Option<Box<dyn LoadSimulator>>,
    input: Input,
}

impl Corpus {
    pub fn from_inputs(input: Input) -> anyhow::Result<Self> {
        let calendar = input.calendar;
        let settings = input.demand_flexibility.clone();
        let method = settings.load_prediction_method;

        let air_temperatures = input
            .external_conditions
            .as_ref()
            .and_then(|conditions| conditions.air_temperatures.as_ref())
            .map(|values| series_for_calendar(values, &calendar, "Outdoor air temperatures"))
            .transpose()?;

        let peak_signal = input
            .peak_signal
            .as_ref()
            .map(|signal| {
                series_for_calendar(&signal.values, &calendar, "Peak signal")
                    .map(|series| (signal.kind, series))
            })
            .transpose()?;

        let needs_air_temperatures = match method {
            LoadPredictionMethod::Oat => true,
            LoadPredictionMethod::BinSample | LoadPredictionMethod::PartYearBinSample => {
                peak_signal.is_none()
            }
            LoadPredictionMethod::FullBaseline | LoadPredictionMethod::Fix => false,
        };
        if needs_air_temperatures && air_temperatures.is_none() {
            return Err(InputError::MissingAirTemperatures {
                method: method.to_string(),
            }
            .into());
        }

        let simulator = match (&input.load_model, &peak_signal) {
            (_, Some(_)) => None,
            _ if !method.simulates_load() => None,
            (Some(load_model), None) => Some(simulator_from_input(
                load_model,
                air_temperatures.as_ref(),
                &calendar,
                method,
            )?),
            (None, None) => {
                return Err(InputError::MissingLoadModel {
                    method: method.to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            calendar,
            settings,
            air_temperatures,
            peak_signal,
            simulator,
            input,
        })
    }

    #[instrument(skip_all, fields(method = %self.settings.load_prediction_method))]
    pub fn run(&self) -> anyhow::Result<DemandFlexResults> {
        let applicability = building_applicability(&self.settings.applicable_building_types)
            .evaluate(&self.input.building);
        if let ApplicabilityOutcome::NotApplicable { reason } = &applicability {
            info!("Demand flexibility does not apply to this building ({reason}); nothing to do");
            return Ok(DemandFlexResults {
                applicability,
                windows: None,
                signal: None,
                schedules: Default::default(),
                updated_model: self.input.clone(),
                summary: UpdateSummary {
                    thermostats_total: self.input.thermostats.len(),
                    lights_total: self.input.lights.len(),
                    ..Default::default()
                },
            });
        }

        let grid = SeriesGrid::new(
            self.settings.num_timesteps_in_hr,
            self.calendar.days_in_year() as usize,
        )?;
        let (signal, windows) = self.control_windows(grid)?;

        let mut adjuster = ScheduleAdjuster::new(grid.timesteps_per_hour())
            .with_reserved_names(self.input.schedules.keys().cloned());
        let mut updated_model = self.input.clone();
        let mut summary = UpdateSummary {
            thermostats_total: self.input.thermostats.len(),
            lights_total: self.input.lights.len(),
            ..Default::default()
        };

        for (name, thermostat) in &self.input.thermostats {
            match self.adjust_thermostat(name, thermostat, &windows, &mut adjuster) {
                Ok(Some(updated)) => {
                    updated_model.thermostats.insert(name.clone(), updated);
                    summary.thermostats_updated += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("Skipping thermostat '{name}': {err:#}");
                    summary.warnings.push(format!("thermostat '{name}': {err:#}"));
                }
            }
        }

        let lighting_window = match self.settings.lighting_window {
            LightingWindow::Prepeak => &windows.prepeak,
            LightingWindow::Peak => &windows.peak,
        };
        for (name, light) in &self.input.lights {
            let adjusted = self
                .input
                .schedules
                .get(&light.schedule)
                .ok_or_else(|| {
                    anyhow!(ScheduleMissingError::new(
                        name,
                        "lighting",
                        Some(&light.schedule)
                    ))
                })
                .and_then(|schedule| {
                    adjuster.adjust(
                        schedule,
                        None,
                        lighting_window,
                        Adjustment::Dim {
                            percent: self.settings.light_adjustment,
                        },
                    )
                });
            match adjusted {
                Ok(schedule_name) => {
                    if let Some(updated) = updated_model.lights.get_mut(name) {
                        updated.schedule = schedule_name;
                    }
                    summary.lights_updated += 1;
                }
                Err(err) => {
                    warn!("Skipping light '{name}': {err:#}");
                    summary.warnings.push(format!("light '{name}': {err:#}"));
                }
            }
        }

        // a thermostat that failed part way may have left schedules nothing points at
        let in_use = updated_model
            .thermostats
            .values()
            .flat_map(|thermostat| {
                [
                    thermostat.cooling_setpoint_schedule.clone(),
                    thermostat.heating_setpoint_schedule.clone(),
                ]
            })
            .flatten()
            .chain(updated_model.lights.values().map(|light| light.schedule.clone()))
            .collect::<HashSet<_>>();
        let mut schedules = adjuster.into_schedules();
        schedules.retain(|name, _| {
            let used = in_use.contains(name);
            if !used {
                debug!("Dropping unused adjusted schedule '{name}'");
            }
            used
        });
        for (name, schedule) in &schedules {
            updated_model.schedules.insert(name.clone(), schedule.clone());
        }
        info!("Demand flexibility applied: {summary}");

        Ok(DemandFlexResults {
            applicability,
            windows: Some(windows),
            signal,
            schedules,
            updated_model,
            summary,
        })
    }

    /// The signal (if any) that daily peaks are located from, and the resulting windows.
    fn control_windows(
        &self,
        grid: SeriesGrid,
    ) -> anyhow::Result<(Option<IntervalSeries>, ControlWindows)> {
        let generator = PeakWindowGenerator::new(self.settings.peak_window_spec(), self.calendar);
        let method = self.settings.load_prediction_method;

        let signal = match (method, &self.peak_signal) {
            (LoadPredictionMethod::Fix, _) => {
                let windows =
                    generator.fixed_windows(grid, self.settings.fixed_peak_start_hour)?;
                return Ok((None, windows));
            }
            (LoadPredictionMethod::Oat, _) => self
                .air_temperatures
                .as_ref()
                .ok_or_else(|| InputError::MissingAirTemperatures {
                    method: method.to_string(),
                })?
                .resample_to(grid.length())?,
            (_, Some((kind, signal))) => {
                info!("Locating daily peaks from the supplied {kind} series");
                signal.resample_to(grid.length())?
            }
            (_, None) => self.predict_load(grid)?,
        };

        let windows = generator.generate_windows(&signal)?;
        Ok((Some(signal), windows))
    }

    /// Annual load at the resolution of `grid`, from simulating either every day or one
    /// representative day per outdoor temperature bin.
    #[instrument(skip_all)]
    fn predict_load(&self, grid: SeriesGrid) -> anyhow::Result<IntervalSeries> {
        let simulator = self.simulator.as_deref().ok_or_else(|| {
            InputError::MissingLoadModel {
                method: self.settings.load_prediction_method.to_string(),
            }
        })?;

        let bin_sample = match self.settings.load_prediction_method {
            LoadPredictionMethod::BinSample | LoadPredictionMethod::PartYearBinSample => {
                let air_temperatures = self.air_temperatures.as_ref().ok_or_else(|| {
                    InputError::MissingAirTemperatures {
                        method: self.settings.load_prediction_method.to_string(),
                    }
                })?;
                let policy = match self.settings.load_prediction_method {
                    LoadPredictionMethod::PartYearBinSample => SelectionPolicy::Sort,
                    _ => SelectionPolicy::Random {
                        seed: self.settings.seed,
                    },
                };
                BinSampler::new(self.settings.bin_count, self.settings.bin_statistic)
                    .sample(air_temperatures, policy)
            }
            _ => BinSample::full_year(self.calendar.days_in_year()),
        };

        let days = bin_sample.days_to_simulate();
        info!(
            "Simulating {} of {} days (up to day {})",
            days.len(),
            self.calendar.days_in_year(),
            bin_sample.max_day_of_year
        );
        let samples = run_samples(
            simulator,
            &days,
            grid.timesteps_per_hour(),
            self.settings.parallel_simulation,
        )
        .context("Load prediction failed")?;

        reconstruct(&bin_sample, &samples, grid)
    }

    /// Adjusts the setpoint schedules of one thermostat, returning the thermostat re-pointed at
    /// the new schedules, or `None` when neither side is to be adjusted.
    ///
    /// Every named schedule is looked up before anything is generated.
    fn adjust_thermostat(
        &self,
        name: &str,
        thermostat: &Thermostat,
        windows: &ControlWindows,
        adjuster: &mut ScheduleAdjuster,
    ) -> anyhow::Result<Option<Thermostat>> {
        let adjust_cooling = self.settings.adjust_cooling
            && self.applicable_side(
                name,
                thermostat,
                setpoint_side_applicability(
                    "cooling",
                    |t| t.cooling_setpoint_schedule.as_deref(),
                    |t| t.cooling_fuel,
                ),
            );
        let adjust_heating = self.settings.adjust_heating
            && self.applicable_side(
                name,
                thermostat,
                setpoint_side_applicability(
                    "heating",
                    |t| t.heating_setpoint_schedule.as_deref(),
                    |t| t.heating_fuel,
                ),
            );
        if !(adjust_cooling || adjust_heating) {
            return Ok(None);
        }

        let cooling = self.named_schedule(
            name,
            "cooling setpoint",
            thermostat.cooling_setpoint_schedule.as_deref(),
        )?;
        let heating = self.named_schedule(
            name,
            "heating setpoint",
            thermostat.heating_setpoint_schedule.as_deref(),
        )?;

        let mut updated = thermostat.clone();
        let mut cooling_reference = cooling.cloned();

        if let (true, Some(cooling)) = (adjust_cooling, cooling) {
            let adjusted = adjuster.adjust(
                cooling,
                heating,
                &windows.prepeak,
                Adjustment::PreCool {
                    setpoint_offset: self.settings.sp_adjustment,
                },
            )?;
            // pre-heating must stay below the pre-cooled setpoint
            cooling_reference = adjuster.schedules().get(&adjusted).cloned();
            updated.cooling_setpoint_schedule = Some(adjusted);
        }

        if let (true, Some(heating)) = (adjust_heating, heating) {
            let adjusted = adjuster.adjust(
                heating,
                cooling_reference.as_ref(),
                &windows.prepeak,
                Adjustment::PreHeat {
                    setpoint_offset: self.settings.sp_adjustment,
                },
            )?;
            updated.heating_setpoint_schedule = Some(adjusted);
        }

        Ok(Some(updated))
    }

    /// An optional schedule, which must exist when it is named.
    fn named_schedule(
        &self,
        owner: &str,
        role: &'static str,
        schedule: Option<&str>,
    ) -> Result<Option<&ControlSchedule>, ScheduleMissingError> {
        schedule
            .map(|schedule| {
                self.input
                    .schedules
                    .get(schedule)
                    .ok_or_else(|| ScheduleMissingError::new(owner, role, Some(schedule)))
            })
            .transpose()
    }

    fn applicable_side(
        &self,
        name: &str,
        thermostat: &Thermostat,
        applicability: Applicability<Thermostat>,
    ) -> bool {
        match applicability.evaluate(thermostat) {
            ApplicabilityOutcome::Applicable => true,
            ApplicabilityOutcome::NotApplicable { reason } => {
                debug!("Thermostat '{name}' not adjusted: {reason}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ingest_for_processing;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::{json, Value};

    /// 50 all day with a peak of 100 at 16:00.
    fn daily_peak_load() -> Vec<f64> {
        (0..8760)
            .map(|i| if i % 24 == 16 { 100. } else { 50. })
            .collect()
    }

    #[fixture]
    fn model() -> Value {
        json!({
            "Calendar": {"year": 2019},
            "Building": {"building_type": "single-family detached"},
            "ExternalConditions": {
                "air_temperatures": (0..8760).map(|i| 10. + (i % 24) as f64).collect::<Vec<_>>()
            },
            "Schedules": {
                "cooling sp": {"schedule": {"main": [{"value": 24.0, "repeat": 8760}]}},
                "heating sp": {"schedule": {"main": [{"value": 21.0, "repeat": 8760}]}},
                "lighting": {"schedule": {"main": [{"value": 0.5, "repeat": 8760}]}}
            },
            "Thermostats": {
                "living": {
                    "cooling_setpoint_schedule": "cooling sp",
                    "heating_setpoint_schedule": "heating sp"
                },
                "bedroom": {
                    "cooling_setpoint_schedule": "cooling sp",
                    "heating_setpoint_schedule": "heating sp"
                }
            },
            "Lights": {
                "kitchen": {"schedule": "lighting"}
            },
            "LoadModel": {"type": "Provided", "load": daily_peak_load()},
            "DemandFlexibility": {
                "peak_len": 4,
                "prepeak_len": 2,
                "sp_adjustment": 4.0,
                "light_adjustment": 20.0,
                "load_prediction_method": "full baseline",
                "peak_window_strategy": "end with peak"
            }
        })
    }

    fn run(model: &Value) -> anyhow::Result<DemandFlexResults> {
        let input = ingest_for_processing(model.to_string().as_bytes())?.finalize()?;
        Corpus::from_inputs(input)?.run()
    }

    #[rstest]
    fn should_pre_cool_shared_schedule_once(model: Value) {
        let results = run(&model).unwrap();

        assert!(results.applicability.is_applicable());
        assert_eq!(results.summary.thermostats_updated, 2);
        assert_eq!(results.summary.lights_updated, 1);
        assert_eq!(
            results.schedules.keys().collect::<Vec<_>>(),
            vec!["cooling sp adjusted", "lighting df_adjusted"]
        );

        let cooling = results.schedules["cooling sp adjusted"]
            .to_interval_values(1)
            .unwrap();
        assert_relative_eq!(cooling[11], 22.5);
        assert_relative_eq!(cooling[12], 22.5);
        assert_relative_eq!(cooling[13], 24.);

        let model = &results.updated_model;
        assert!(model.schedules.contains_key("cooling sp"));
        assert_eq!(
            model.thermostats["bedroom"].cooling_setpoint_schedule.as_deref(),
            Some("cooling sp adjusted")
        );
        assert_eq!(model.lights["kitchen"].schedule, "lighting df_adjusted");
    }

    #[rstest]
    fn lighting_should_be_dimmed_in_peak_window(model: Value) {
        let results = run(&model).unwrap();
        let lighting = results.schedules["lighting df_adjusted"]
            .to_interval_values(1)
            .unwrap();
        assert_relative_eq!(lighting[12], 0.5);
        assert_relative_eq!(lighting[13], 0.4);
        assert_relative_eq!(lighting[16], 0.4);
        assert_relative_eq!(lighting[17], 0.5);
    }

    #[rstest]
    fn missing_schedule_should_skip_only_that_thermostat(mut model: Value) {
        model["Thermostats"]["bedroom"]["cooling_setpoint_schedule"] = json!("nonexistent");
        let results = run(&model).unwrap();
        assert_eq!(results.summary.thermostats_updated, 1);
        assert_eq!(results.summary.thermostats_total, 2);
        assert_eq!(results.summary.warnings.len(), 1);
        assert!(results.summary.warnings[0].contains("nonexistent"));
        assert_eq!(
            results.summary.to_string(),
            "thermostats updated 1/2, lights updated 1/1"
        );
    }

    #[rstest]
    fn non_electric_cooling_should_not_be_adjusted(mut model: Value) {
        model["Thermostats"]["living"]["cooling_fuel"] = json!("natural_gas");
        let results = run(&model).unwrap();
        assert_eq!(results.summary.thermostats_updated, 1);
        assert!(results.summary.warnings.is_empty());
        assert_eq!(
            results.updated_model.thermostats["living"]
                .cooling_setpoint_schedule
                .as_deref(),
            Some("cooling sp")
        );
    }

    #[rstest]
    fn unsupported_building_should_be_a_no_op(mut model: Value) {
        model["Building"]["building_type"] = json!("warehouse");
        let results = run(&model).unwrap();
        assert!(!results.applicability.is_applicable());
        assert!(results.schedules.is_empty());
        assert!(results.windows.is_none());
        assert_eq!(results.summary.thermostats_updated, 0);
    }

    #[rstest]
    fn pre_heating_should_stay_below_pre_cooled_setpoint(mut model: Value) {
        model["DemandFlexibility"]["adjust_heating"] = json!(true);
        let results = run(&model).unwrap();
        let heating = results.schedules["heating sp adjusted"]
            .to_interval_values(1)
            .unwrap();
        // 21 + 4 would reach the pre-cooled 22.5, so it is held at the midpoint
        assert_relative_eq!(heating[11], (21. + 22.5) / 2.);
        assert_relative_eq!(heating[10], 21.);
    }

    #[rstest]
    fn thermostat_without_heating_schedule_should_still_be_pre_cooled(mut model: Value) {
        model["DemandFlexibility"]["adjust_heating"] = json!(true);
        model["Thermostats"].as_object_mut().unwrap().remove("bedroom");
        model["Thermostats"]["living"]
            .as_object_mut()
            .unwrap()
            .remove("heating_setpoint_schedule");
        let results = run(&model).unwrap();

        assert!(results.summary.warnings.is_empty());
        assert_eq!(
            results.summary.to_string(),
            "thermostats updated 1/1, lights updated 1/1"
        );
        let living = &results.updated_model.thermostats["living"];
        assert_eq!(
            living.cooling_setpoint_schedule.as_deref(),
            Some("cooling sp adjusted")
        );
        assert_eq!(living.heating_setpoint_schedule, None);
        // nothing bounds the pre-cooling without a heating schedule
        let cooling = results.schedules["cooling sp adjusted"]
            .to_interval_values(1)
            .unwrap();
        assert_relative_eq!(cooling[11], 20.);
        assert_eq!(
            results.schedules.keys().collect::<Vec<_>>(),
            vec!["cooling sp adjusted", "lighting df_adjusted"]
        );
    }

    #[rstest]
    fn failed_thermostat_should_leave_no_adjusted_schedules(mut model: Value) {
        model["DemandFlexibility"]["adjust_heating"] = json!(true);
        model["Thermostats"].as_object_mut().unwrap().remove("living");
        model["Thermostats"]["bedroom"]["heating_setpoint_schedule"] = json!("nonexistent");
        let results = run(&model).unwrap();

        assert_eq!(results.summary.thermostats_updated, 0);
        assert!(results.summary.warnings[0].contains("nonexistent"));
        assert_eq!(
            results.updated_model.thermostats["bedroom"]
                .cooling_setpoint_schedule
                .as_deref(),
            Some("cooling sp")
        );
        assert_eq!(
            results.schedules.keys().collect::<Vec<_>>(),
            vec!["lighting df_adjusted"]
        );
        assert!(!results
            .updated_model
            .schedules
            .contains_key("cooling sp adjusted"));
    }

    #[rstest]
    fn adjusted_schedule_should_not_overwrite_model_schedule(mut model: Value) {
        model["Schedules"]["cooling sp adjusted"] =
            json!({"schedule": {"main": [{"value": 26.0, "repeat": 8760}]}});
        let results = run(&model).unwrap();

        let model = &results.updated_model;
        assert_eq!(
            model.thermostats["living"].cooling_setpoint_schedule.as_deref(),
            Some("cooling sp adjusted for heating sp")
        );
        let untouched = model.schedules["cooling sp adjusted"]
            .to_interval_values(1)
            .unwrap();
        assert_relative_eq!(untouched[11], 26.);
    }

    #[rstest]
    #[case("bin sample")]
    #[case("part year bin sample")]
    fn bin_sampling_should_locate_the_same_peaks(mut model: Value, #[case] method: &str) {
        model["DemandFlexibility"]["load_prediction_method"] = json!(method);
        let results = run(&model).unwrap();
        let windows = results.windows.unwrap();
        let day = windows.prepeak.day(200).unwrap();
        assert_eq!(day[11], 1.);
        assert_eq!(day[12], 1.);
        assert_eq!(day.iter().sum::<f64>(), 2.);
    }

    #[rstest]
    fn supplied_signal_should_override_load(mut model: Value) {
        model["PeakSignal"] = json!({
            "kind": "emissions",
            "values": (0..8760).map(|i| if i % 24 == 8 { 0.9 } else { 0.2 }).collect::<Vec<_>>()
        });
        let results = run(&model).unwrap();
        let prepeak = results.windows.unwrap().prepeak;
        assert_eq!(prepeak.day(0).unwrap()[3], 1.);
        assert_eq!(prepeak.day(0).unwrap()[4], 1.);
    }

    #[rstest]
    fn fixed_method_should_need_no_signal(mut model: Value) {
        model["DemandFlexibility"]["load_prediction_method"] = json!("fix");
        model["DemandFlexibility"]["fixed_peak_start_hour"] = json!(17);
        let results = run(&model).unwrap();
        assert!(results.signal.is_none());
        let prepeak = results.windows.unwrap().prepeak;
        assert_eq!(prepeak.day(9).unwrap()[15], 1.);
        assert_eq!(prepeak.day(9).unwrap()[16], 1.);
        assert_eq!(prepeak.day(9).unwrap()[17], 0.);
    }

    #[rstest]
    fn oat_method_should_use_outdoor_temperature(mut model: Value) {
        model["DemandFlexibility"]["load_prediction_method"] = json!("oat");
        let results = run(&model).unwrap();
        // temperatures peak at 23:00, so the peak window is 20-23 and pre-peak 18-19
        let prepeak = results.windows.unwrap().prepeak;
        assert_eq!(prepeak.day(0).unwrap()[18], 1.);
        assert_eq!(prepeak.day(0).unwrap()[19], 1.);
    }

    #[rstest]
    fn bin_sampling_without_temperatures_should_fail(mut model: Value) {
        model["DemandFlexibility"]["load_prediction_method"] = json!("bin sample");
        model.as_object_mut().unwrap().remove("ExternalConditions");
        assert!(run(&model).is_err());
    }

    #[rstest]
    fn series_for_another_year_should_be_rejected(mut model: Value) {
        model["Calendar"]["year"] = json!(2020);
        let error = run(&model).unwrap_err();
        assert!(error
            .chain()
            .any(|cause| matches!(
                cause.downcast_ref::<SeriesError>(),
                Some(SeriesError::InvalidSeriesLength { .. })
            )));
    }
}
