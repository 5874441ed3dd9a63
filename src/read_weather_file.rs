use anyhow::{anyhow, Context};
use csv::ReaderBuilder as CsvReaderBuilder;
use std::io::Read;

const COLUMN_LONGITUDE: usize = 7;
const COLUMN_LATITUDE: usize = 6;
const COLUMN_AIR_TEMP: usize = 6; // dry bulb temp in degrees
const EPW_HEADER_LINES: usize = 8;

#[derive(Clone, Debug)]
pub struct ExternalConditions {
    pub air_temperatures: Vec<f64>,
    pub longitude: f64,
    pub latitude: f64,
}

fn parse_field(record: &csv::StringRecord, column: usize, line: usize) -> anyhow::Result<f64> {
    let field = record
        .get(column)
        .ok_or_else(|| anyhow!("Line {line} of weather file has no column {column}"))?;
    field
        .trim()
        .parse()
        .with_context(|| format!("Line {line} of weather file has unreadable value '{field}'"))
}

/// Reads outdoor air temperatures and location from an EPW weather file.
pub fn weather_data_to_vec(file: impl Read) -> anyhow::Result<ExternalConditions> {
    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut air_temperatures = vec![];
    let mut latitude: Option<f64> = None;
    let mut longitude: Option<f64> = None;

    for (i, result) in reader.records().enumerate() {
        let record: csv::StringRecord = result?;
        if i == 0 {
            latitude = Some(parse_field(&record, COLUMN_LATITUDE, i + 1)?);
            longitude = Some(parse_field(&record, COLUMN_LONGITUDE, i + 1)?);
        } else if i >= EPW_HEADER_LINES {
            air_temperatures.push(parse_field(&record, COLUMN_AIR_TEMP, i + 1)?);
        }
    }

    Ok(ExternalConditions {
        air_temperatures,
        latitude: latitude.ok_or_else(|| anyhow!("Weather file has no location header"))?,
        longitude: longitude.ok_or_else(|| anyhow!("Weather file has no location header"))?,
    })
}

/// Reads a single-column series of numbers, such as a grid signal, emissions factors or a
/// pre-simulated load, skipping a header line if there is one.
pub fn time_series_from_csv(file: impl Read) -> anyhow::Result<Vec<f64>> {
    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut values = vec![];
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let field = record.get(0).map(str::trim).unwrap_or_default();
        match field.parse::<f64>() {
            Ok(value) => values.push(value),
            Err(_) if i == 0 => continue,
            Err(err) => {
                return Err(anyhow!(
                    "Line {} of time series has unreadable value '{field}': {err}",
                    i + 1
                ))
            }
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const EPW_HEADER: &str = "LOCATION,Denver Centennial,CO,USA,TMY3,724666,39.74,-105.18,-7.0,1793.0
DESIGN CONDITIONS,0
TYPICAL/EXTREME PERIODS,0
GROUND TEMPERATURES,0
HOLIDAYS/DAYLIGHT SAVINGS,No,0,0,0
COMMENTS 1,test
COMMENTS 2,test
DATA PERIODS,1,1,Data,Sunday, 1/ 1,12/31
";

    #[rstest]
    fn should_read_air_temperatures_and_location() {
        let epw = format!(
            "{EPW_HEADER}1999,1,1,1,0,?9?9?9?9E0?9?9?9,-3.5,-8.0,67\n1999,1,1,2,0,?9?9?9?9E0?9?9?9,-4.1,-8.2,70\n"
        );
        let conditions = weather_data_to_vec(epw.as_bytes()).unwrap();
        assert_eq!(conditions.air_temperatures, vec![-3.5, -4.1]);
        assert_eq!(conditions.latitude, 39.74);
        assert_eq!(conditions.longitude, -105.18);
    }

    #[rstest]
    fn should_fail_on_malformed_row_rather_than_panic() {
        let epw = format!("{EPW_HEADER}1999,1,1,1,0,?9?9?9?9E0?9?9?9,warm\n");
        assert!(weather_data_to_vec(epw.as_bytes()).is_err());
    }

    #[rstest]
    #[case("signal\n1.5\n2\n", vec![1.5, 2.])]
    #[case("0.25\n0.5\n", vec![0.25, 0.5])]
    fn should_read_single_column_series(#[case] csv: &str, #[case] expected: Vec<f64>) {
        assert_eq!(time_series_from_csv(csv.as_bytes()).unwrap(), expected);
    }

    #[rstest]
    fn should_reject_unreadable_series_value() {
        assert!(time_series_from_csv("1.0\nabc\n".as_bytes()).is_err());
    }
}
