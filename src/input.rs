use crate::core::bin_sampler::{BinStatistic, DEFAULT_BIN_COUNT};
use crate::core::peak_window::{DayTypes, PeakWindowSpec, PeakWindowStrategy, Season};
use crate::core::schedule::ControlSchedule;
use crate::core::units::SUPPORTED_TIMESTEPS_PER_HOUR;
use crate::errors::InputError;
use crate::simulation_time::Calendar;
use anyhow::anyhow;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::io::{BufReader, Read};
use strum::Display;

pub fn ingest_for_processing(json: impl Read) -> Result<InputForProcessing, anyhow::Error> {
    InputForProcessing::init_with_json(json)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Input {
    #[serde(default)]
    pub calendar: Calendar,
    pub building: Building,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_conditions: Option<ExternalConditionsInput>,
    pub schedules: IndexMap<String, ControlSchedule>,
    #[serde(default)]
    pub thermostats: IndexMap<String, Thermostat>,
    #[serde(default)]
    pub lights: IndexMap<String, Light>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_model: Option<LoadModelInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_signal: Option<PeakSignalInput>,
    pub demand_flexibility: DemandFlexibility,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Building {
    pub building_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalConditionsInput {
    pub air_temperatures: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FuelType {
    Electricity,
    NaturalGas,
    FuelOil,
    Propane,
    Wood,
    DistrictHeating,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Thermostat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooling_setpoint_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_setpoint_schedule: Option<String>,
    #[serde(default = "default_fuel")]
    pub cooling_fuel: FuelType,
    #[serde(default = "default_fuel")]
    pub heating_fuel: FuelType,
}

fn default_fuel() -> FuelType {
    FuelType::Electricity
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Light {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub schedule: String,
}

/// How the building's electrical load is predicted for days that are simulated.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum LoadModelInput {
    DegreeHours {
        /// occupancy-driven electrical load at full occupancy, in kW
        base_load: f64,
        #[serde(default = "default_hourly_profile")]
        hourly_profile: Vec<f64>,
        #[serde(default = "default_cooling_balance_point")]
        cooling_balance_point: f64,
        cooling_load_per_degree: f64,
        #[serde(default = "default_heating_balance_point")]
        heating_balance_point: f64,
        #[serde(default)]
        heating_load_per_degree: f64,
    },
    /// A whole year of load computed elsewhere.
    Provided { load: Vec<f64> },
}

fn default_hourly_profile() -> Vec<f64> {
    vec![
        0.4, 0.35, 0.3, 0.3, 0.3, 0.35, 0.5, 0.7, 0.6, 0.45, 0.4, 0.4, 0.45, 0.45, 0.5, 0.6, 0.75,
        0.9, 1.0, 1.0, 0.9, 0.8, 0.65, 0.5,
    ]
}

fn default_cooling_balance_point() -> f64 {
    18.
}

fn default_heating_balance_point() -> f64 {
    15.5
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum SignalKind {
    #[serde(rename = "grid signal")]
    #[strum(serialize = "grid signal")]
    GridSignal,
    #[serde(rename = "emissions")]
    #[strum(serialize = "emissions")]
    Emissions,
}

/// A signal supplied in place of predicted load, to locate daily peaks by.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PeakSignalInput {
    pub kind: SignalKind,
    pub values: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum LoadPredictionMethod {
    #[default]
    #[serde(rename = "full baseline")]
    #[strum(serialize = "full baseline")]
    FullBaseline,
    #[serde(rename = "bin sample")]
    #[strum(serialize = "bin sample")]
    BinSample,
    #[serde(rename = "part year bin sample")]
    #[strum(serialize = "part year bin sample")]
    PartYearBinSample,
    #[serde(rename = "fix")]
    #[strum(serialize = "fix")]
    Fix,
    #[serde(rename = "oat")]
    #[strum(serialize = "oat")]
    Oat,
}

impl LoadPredictionMethod {
    pub fn simulates_load(&self) -> bool {
        matches!(
            self,
            Self::FullBaseline | Self::BinSample | Self::PartYearBinSample
        )
    }
}

/// Which of the daily windows lighting is dimmed in.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LightingWindow {
    Prepeak,
    #[default]
    Peak,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DemandFlexibility {
    /// length of the daily peak window, in hours
    #[validate(minimum = 1)]
    #[validate(maximum = 24)]
    pub peak_len: usize,
    /// hours of control action ahead of the peak window
    #[validate(maximum = 24)]
    pub prepeak_len: usize,
    #[serde(default)]
    pub rebound_len: usize,
    /// degrees C the cooling setpoint is lowered (and heating setpoint raised) by
    #[serde(default = "default_sp_adjustment")]
    pub sp_adjustment: f64,
    #[serde(default)]
    #[validate(minimum = 0.)]
    #[validate(maximum = 100.)]
    pub light_adjustment: f64,
    #[serde(default = "default_num_timesteps_in_hr")]
    pub num_timesteps_in_hr: usize,
    #[serde(default)]
    pub load_prediction_method: LoadPredictionMethod,
    #[serde(default)]
    pub peak_window_strategy: PeakWindowStrategy,
    #[serde(default)]
    pub season: Season,
    #[serde(default)]
    pub day_types: DayTypes,
    #[serde(default = "default_fixed_peak_start_hour")]
    #[validate(maximum = 23)]
    pub fixed_peak_start_hour: usize,
    #[serde(default = "default_bin_count")]
    #[validate(minimum = 1)]
    pub bin_count: usize,
    #[serde(default)]
    pub bin_statistic: BinStatistic,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub adjust_cooling: bool,
    #[serde(default)]
    pub adjust_heating: bool,
    #[serde(default)]
    pub lighting_window: LightingWindow,
    #[serde(default)]
    pub parallel_simulation: bool,
    #[serde(default = "default_applicable_building_types")]
    pub applicable_building_types: Vec<String>,
}

fn default_sp_adjustment() -> f64 {
    2.
}

fn default_num_timesteps_in_hr() -> usize {
    1
}

fn default_fixed_peak_start_hour() -> usize {
    16
}

fn default_bin_count() -> usize {
    DEFAULT_BIN_COUNT
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_applicable_building_types() -> Vec<String> {
    [
        "single-family detached",
        "single-family attached",
        "multifamily",
        "manufactured home",
    ]
    .map(String::from)
    .to_vec()
}

impl DemandFlexibility {
    pub fn peak_window_spec(&self) -> PeakWindowSpec {
        PeakWindowSpec {
            peak_len: self.peak_len,
            prepeak_len: self.prepeak_len,
            rebound_len: self.rebound_len,
            strategy: self.peak_window_strategy,
            season: self.season,
            day_types: self.day_types,
        }
    }

    /// Range checks on each setting, then the checks that involve the host model.
    pub(crate) fn check(&self, calendar: &Calendar) -> Result<(), InputError> {
        self.validate()
            .map_err(|errors| InputError::InvalidSettings(errors.to_string()))?;

        if !SUPPORTED_TIMESTEPS_PER_HOUR.contains(&self.num_timesteps_in_hr) {
            return Err(InputError::InvalidSettings(format!(
                "num_timesteps_in_hr must be one of {SUPPORTED_TIMESTEPS_PER_HOUR:?}, not {}",
                self.num_timesteps_in_hr
            )));
        }
        if self.load_prediction_method == LoadPredictionMethod::FullBaseline
            && self.num_timesteps_in_hr != calendar.timesteps_per_hour()
        {
            return Err(InputError::InvalidSettings(format!(
                "num_timesteps_in_hr ({}) must match the model timestep ({} per hour) for a full baseline run",
                self.num_timesteps_in_hr,
                calendar.timesteps_per_hour()
            )));
        }
        if self.prepeak_len + self.peak_len > 24 {
            return Err(InputError::InvalidSettings(format!(
                "peak_len ({}) and prepeak_len ({}) together exceed a day",
                self.peak_len, self.prepeak_len
            )));
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct InputForProcessing {
    input: Input,
}

/// Gives the binary a way to supply data read from separate files before the model is checked.
impl InputForProcessing {
    pub fn init_with_json(json: impl Read) -> Result<Self, anyhow::Error> {
        let reader = BufReader::new(json);

        let mut input: Input = serde_json::from_reader(reader)?;
        for (name, schedule) in input.schedules.iter_mut() {
            schedule.name = name.clone();
        }

        Ok(Self { input })
    }

    /// Checks the assembled model and hands it over for calculation.
    pub fn finalize(self) -> anyhow::Result<Input> {
        self.input
            .calendar
            .validate()
            .map_err(|errors| anyhow!("Invalid calendar: {errors}"))?;
        self.input
            .demand_flexibility
            .check(&self.input.calendar)?;

        Ok(self.input)
    }

    pub fn set_air_temperatures(&mut self, air_temperatures: Vec<f64>) -> &Self {
        let external_conditions =
            self.input
                .external_conditions
                .get_or_insert(ExternalConditionsInput {
                    air_temperatures: None,
                    latitude: None,
                    longitude: None,
                });
        external_conditions.air_temperatures = Some(air_temperatures);
        self
    }

    pub fn set_peak_signal(&mut self, kind: SignalKind, values: Vec<f64>) -> &Self {
        self.input.peak_signal = Some(PeakSignalInput { kind, values });
        self
    }

    pub fn set_provided_load(&mut self, load: Vec<f64>) -> &Self {
        self.input.load_model = Some(LoadModelInput::Provided { load });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::{json, Value};

    #[fixture]
    fn input_json() -> Value {
        json!({
            "Calendar": {"year": 2019},
            "Building": {"building_type": "single-family detached"},
            "Schedules": {
                "cooling sp": {"schedule": {"main": [{"value": 24.0, "repeat": 8760}]}},
                "heating sp": {"schedule": {"main": [{"value": 21.0, "repeat": 8760}]}}
            },
            "Thermostats": {
                "living": {
                    "cooling_setpoint_schedule": "cooling sp",
                    "heating_setpoint_schedule": "heating sp"
                }
            },
            "DemandFlexibility": {
                "peak_len": 4,
                "prepeak_len": 2,
                "load_prediction_method": "oat",
                "peak_window_strategy": "max savings"
            }
        })
    }

    fn ingest(value: &Value) -> anyhow::Result<Input> {
        ingest_for_processing(value.to_string().as_bytes())?.finalize()
    }

    #[rstest]
    fn should_read_input_with_defaults(input_json: Value) {
        let input = ingest(&input_json).unwrap();
        assert_eq!(input.schedules["cooling sp"].name, "cooling sp");
        assert_eq!(input.thermostats["living"].cooling_fuel, FuelType::Electricity);
        let settings = &input.demand_flexibility;
        assert_eq!(settings.load_prediction_method, LoadPredictionMethod::Oat);
        assert_eq!(settings.peak_window_strategy, PeakWindowStrategy::MaxSavings);
        assert_eq!(settings.sp_adjustment, 2.);
        assert_eq!(settings.bin_count, 10);
        assert_eq!(settings.fixed_peak_start_hour, 16);
        assert!(settings.adjust_cooling);
        assert!(!settings.adjust_heating);
        assert_eq!(settings.lighting_window, LightingWindow::Peak);
    }

    #[rstest]
    fn should_reject_unknown_fields(mut input_json: Value) {
        input_json["DemandFlexibility"]["peak_length"] = json!(3);
        assert!(ingest(&input_json).is_err());
    }

    #[rstest]
    #[case("peak_len", json!(0))]
    #[case("peak_len", json!(25))]
    #[case("light_adjustment", json!(120.0))]
    #[case("num_timesteps_in_hr", json!(2))]
    #[case("fixed_peak_start_hour", json!(24))]
    #[case("prepeak_len", json!(22))]
    #[case("load_prediction_method", json!("half baseline"))]
    fn should_reject_out_of_range_settings(
        mut input_json: Value,
        #[case] field: &str,
        #[case] value: Value,
    ) {
        input_json["DemandFlexibility"][field] = value;
        assert!(ingest(&input_json).is_err());
    }

    #[rstest]
    fn full_baseline_should_require_model_timestep(mut input_json: Value) {
        input_json["DemandFlexibility"]["load_prediction_method"] = json!("full baseline");
        input_json["DemandFlexibility"]["num_timesteps_in_hr"] = json!(4);
        let error = ingest(&input_json).unwrap_err();
        assert!(error.to_string().contains("full baseline"));

        input_json["Calendar"]["timesteps_per_hour"] = json!(4);
        assert!(ingest(&input_json).is_ok());
    }

    #[rstest]
    fn should_accept_supplied_series(input_json: Value) {
        let mut input = ingest_for_processing(input_json.to_string().as_bytes()).unwrap();
        input.set_air_temperatures(vec![10.; 8760]);
        input.set_peak_signal(SignalKind::Emissions, vec![0.3; 8760]);
        input.set_provided_load(vec![1.; 8760]);
        let input = input.finalize().unwrap();
        assert_eq!(
            input.external_conditions.and_then(|e| e.air_temperatures).map(|t| t.len()),
            Some(8760)
        );
        assert_eq!(input.peak_signal.map(|s| s.kind), Some(SignalKind::Emissions));
        assert!(matches!(input.load_model, Some(LoadModelInput::Provided { .. })));
    }

    #[rstest]
    fn should_read_degree_hour_load_model(mut input_json: Value) {
        input_json["LoadModel"] = json!({
            "type": "DegreeHours",
            "base_load": 1.2,
            "cooling_load_per_degree": 0.4
        });
        let input = ingest(&input_json).unwrap();
        match input.load_model {
            Some(LoadModelInput::DegreeHours {
                hourly_profile,
                cooling_balance_point,
                heating_load_per_degree,
                ..
            }) => {
                assert_eq!(hourly_profile.len(), 24);
                assert_eq!(cooling_balance_point, 18.);
                assert_eq!(heating_load_per_degree, 0.);
            }
            other => panic!("unexpected load model {other:?}"),
        }
    }
}
