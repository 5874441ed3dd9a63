use anyhow::{anyhow, Context};
use clap::{Args, Parser};
use demand_flex::input::SignalKind;
use demand_flex::output::FileOutput;
use demand_flex::read_weather_file::{time_series_from_csv, weather_data_to_vec};
use demand_flex::{run_project, ProjectFlags, SuppliedSeries};
use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct DemandFlexArgs {
    input_file: String,
    #[arg(long, short, help = "Path to weather file in .epw format")]
    epw_file: Option<String>,
    #[command(flatten)]
    signal_file: SignalFileType,
    #[arg(
        long,
        short,
        help = "Path to a pre-simulated annual load profile in .csv format"
    )]
    load_profile: Option<String>,
    #[clap(
        long,
        short,
        default_value_t = false,
        help = "Output the daily prepeak and peak windows"
    )]
    windows_output: bool,
    #[clap(
        long,
        default_value_t = false,
        help = "Simulate representative days in parallel"
    )]
    parallel: bool,
    #[clap(long, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
    #[clap(long, short, default_value_t = false, help = "Log at debug level")]
    verbose: bool,
}

#[derive(Args, Clone, Default, Debug)]
#[group(required = false, multiple = false)]
struct SignalFileType {
    #[arg(long, short, help = "Path to an annual grid signal in .csv format")]
    grid_signal_file: Option<String>,
    #[arg(
        long,
        help = "Path to an annual series of grid emissions factors in .csv format"
    )]
    emissions_file: Option<String>,
}

impl SignalFileType {
    fn kind_and_path(&self) -> Option<(SignalKind, &str)> {
        match self {
            SignalFileType {
                grid_signal_file: Some(file),
                ..
            } => Some((SignalKind::GridSignal, file.as_str())),
            SignalFileType {
                emissions_file: Some(file),
                ..
            } => Some((SignalKind::Emissions, file.as_str())),
            _ => None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = DemandFlexArgs::parse();

    // set up basic tracing
    let tracing_subscriber = {
        let level = if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(level);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)
        .context("setting tracing subscriber failed")?;

    let input_file = args.input_file.as_str();
    let input_file_ext = Path::new(input_file).extension().and_then(OsStr::to_str);
    let input_file_stem = match input_file_ext {
        Some(ext) => &input_file[..(input_file.len() - ext.len() - 1)],
        None => input_file,
    };

    let output_path = PathBuf::from(format!("{input_file_stem}__results"));
    fs::create_dir_all(&output_path)?;
    let input_file_name = Path::new(input_file_stem)
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| anyhow!("Could not derive an output name from {input_file}"))?;
    let file_output = FileOutput::new(output_path, format!("{input_file_name}__{{}}.{{}}"));

    let supplied_series = SuppliedSeries {
        external_conditions: args
            .epw_file
            .as_ref()
            .map(|file| -> anyhow::Result<_> {
                weather_data_to_vec(BufReader::new(File::open(file)?))
                    .with_context(|| format!("Could not parse the weather file {file}"))
            })
            .transpose()?,
        peak_signal: args
            .signal_file
            .kind_and_path()
            .map(|(kind, file)| -> anyhow::Result<_> {
                let values = time_series_from_csv(BufReader::new(File::open(file)?))
                    .with_context(|| format!("Could not parse the {kind} file {file}"))?;
                Ok((kind, values))
            })
            .transpose()?,
        load: args
            .load_profile
            .as_ref()
            .map(|file| -> anyhow::Result<_> {
                time_series_from_csv(BufReader::new(File::open(file)?))
                    .with_context(|| format!("Could not parse the load profile {file}"))
            })
            .transpose()?,
    };

    let project_flags = (&args).into();

    let response = run_project(
        BufReader::new(File::open(Path::new(input_file))?),
        &file_output,
        supplied_series,
        &project_flags,
    )?;

    for warning in &response.summary.warnings {
        info!("{warning}");
    }
    info!("{}", response.summary);
    debug!(
        "Applicability: {}",
        serde_json::to_string_pretty(&response.applicability)?
    );

    Ok(())
}

impl From<&DemandFlexArgs> for ProjectFlags {
    fn from(args: &DemandFlexArgs) -> Self {
        let mut flags = ProjectFlags::empty();
        if args.windows_output {
            flags.insert(ProjectFlags::WINDOWS_OUTPUT);
        }
        if args.parallel {
            flags.insert(ProjectFlags::PARALLEL_SIMULATION);
        }

        flags
    }
}
