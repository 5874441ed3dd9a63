pub mod core;
pub mod corpus;
pub mod errors;
pub mod input;
pub mod output;
pub mod read_weather_file;
pub mod simulation_time;
mod statistics;

pub use crate::corpus::{DemandFlexResults, UpdateSummary};
use crate::corpus::Corpus;
use crate::errors::{CalculationError, DemandFlexError, OutputError};
use crate::input::{ingest_for_processing, SignalKind};
use crate::output::Output;
use crate::read_weather_file::ExternalConditions;
use bitflags::bitflags;
use csv::WriterBuilder;
use std::io::Read;
use tracing::{debug, instrument};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ProjectFlags: u32 {
        /// write the daily control windows and peak signal as a CSV
        const WINDOWS_OUTPUT = 0b1;
        /// simulate representative days in parallel whatever the model says
        const PARALLEL_SIMULATION = 0b10;
    }
}

/// Series read from files alongside the JSON model, each taking the place of the
/// corresponding part of the model when given.
#[derive(Clone, Debug, Default)]
pub struct SuppliedSeries {
    pub external_conditions: Option<ExternalConditions>,
    pub peak_signal: Option<(SignalKind, Vec<f64>)>,
    pub load: Option<Vec<f64>>,
}

#[instrument(skip_all)]
pub fn run_project(
    input: impl Read,
    output: impl Output,
    supplied_series: SuppliedSeries,
    flags: &ProjectFlags,
) -> Result<DemandFlexResults, DemandFlexError> {
    let mut input_for_processing = ingest_for_processing(input)?;

    if let Some(external_conditions) = supplied_series.external_conditions {
        input_for_processing.set_air_temperatures(external_conditions.air_temperatures);
    }
    if let Some((kind, values)) = supplied_series.peak_signal {
        input_for_processing.set_peak_signal(kind, values);
    }
    if let Some(load) = supplied_series.load {
        input_for_processing.set_provided_load(load);
    }

    let mut input = input_for_processing.finalize()?;
    if flags.contains(ProjectFlags::PARALLEL_SIMULATION) {
        input.demand_flexibility.parallel_simulation = true;
    }

    let corpus = Corpus::from_inputs(input)?;
    let results = corpus
        .run()
        .map_err(|err| DemandFlexError::FailureInCalculation(CalculationError::new(err)))?;

    if !output.is_noop() {
        write_model_output(&output, &results).map_err(DemandFlexError::ErrorInOutput)?;
        if flags.contains(ProjectFlags::WINDOWS_OUTPUT) {
            write_windows_output(&output, &results).map_err(DemandFlexError::ErrorInOutput)?;
        }
    }

    Ok(results)
}

fn write_model_output(output: &impl Output, results: &DemandFlexResults) -> Result<(), OutputError> {
    let writer = output
        .writer_for_location_key("model", "json")
        .map_err(OutputError::new)?;
    serde_json::to_writer_pretty(writer, &results.updated_model)
        .map_err(|err| OutputError::new(err.into()))?;
    debug!("Wrote updated model");
    Ok(())
}

fn write_windows_output(
    output: &impl Output,
    results: &DemandFlexResults,
) -> Result<(), OutputError> {
    let Some(windows) = &results.windows else {
        return Ok(());
    };

    (|| -> anyhow::Result<()> {
        let writer = output.writer_for_location_key("windows", "csv")?;
        let mut writer = WriterBuilder::new().from_writer(writer);

        let mut headings = vec!["Timestep", "Prepeak window", "Peak window"];
        if results.signal.is_some() {
            headings.push("Signal");
        }
        writer.write_record(&headings)?;

        for (t_idx, (prepeak, peak)) in windows
            .prepeak
            .values()
            .iter()
            .zip(windows.peak.values())
            .enumerate()
        {
            let mut row = vec![t_idx.to_string(), prepeak.to_string(), peak.to_string()];
            if let Some(signal) = &results.signal {
                row.push(signal.values()[t_idx].to_string());
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    })()
    .map_err(OutputError::new)?;
    debug!("Wrote control windows");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SinkOutput;
    use rstest::*;

    #[rstest]
    fn invalid_json_should_be_an_invalid_request() {
        let result = run_project(
            "{\"Calendar\": ".as_bytes(),
            SinkOutput,
            Default::default(),
            &ProjectFlags::empty(),
        );
        assert!(matches!(result, Err(DemandFlexError::InvalidRequest(_))));
    }

    #[rstest]
    fn flags_should_combine() {
        let flags = ProjectFlags::WINDOWS_OUTPUT | ProjectFlags::PARALLEL_SIMULATION;
        assert!(flags.contains(ProjectFlags::WINDOWS_OUTPUT));
        assert!(!ProjectFlags::default().contains(ProjectFlags::PARALLEL_SIMULATION));
    }
}
