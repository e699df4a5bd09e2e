use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info};

use pitwall::{
    AnalysisFacade, AnalysisRequest, AppConfig, PitwallError, TelemetrySource, load_session_jsonl,
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Session file in JSON lines format
    #[arg(short, long)]
    input: PathBuf,

    /// Config file, defaults to pitwall/config.json in the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the result to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Indent the JSON result
    #[arg(long)]
    pretty: bool,

    /// Store the effective config back to the config file
    #[arg(long)]
    save_config: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct DriverArgs {
    driver: String,
}

#[derive(clap::Args, Debug)]
struct LapArgs {
    driver: String,
    lap: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Timed laps and session statistics
    Session {
        /// Only include these drivers
        drivers: Vec<String>,
    },
    /// Telemetry and metrics of a lap, optionally compared with a second lap
    Telemetry {
        driver: String,
        lap: u32,
        #[arg(requires = "lap2")]
        driver2: Option<String>,
        lap2: Option<u32>,
    },
    TireDegradation(DriverArgs),
    RacePace {
        #[arg(required = true)]
        drivers: Vec<String>,
    },
    CornerAnalysis(LapArgs),
    GearUsage(LapArgs),
    FuelEffect(DriverArgs),
    DownforceAnalysis(LapArgs),
    BrakeAnalysis(LapArgs),
    ThrottleTrace(LapArgs),
    TireAnalysis(LapArgs),
    EnergyAnalysis(LapArgs),
    PitstopAnalysis,
    DrsAnalysis(LapArgs),
    StrategyAnalysis,
    RaceInsights,
}

impl From<&Commands> for AnalysisRequest {
    fn from(command: &Commands) -> Self {
        match command {
            Commands::Session { drivers } => AnalysisRequest::Session {
                drivers: drivers.clone(),
            },
            Commands::Telemetry {
                driver,
                lap,
                driver2,
                lap2,
            } => AnalysisRequest::Telemetry {
                driver: driver.clone(),
                lap: *lap,
                compare_with: driver2.clone().zip(*lap2),
            },
            Commands::TireDegradation(DriverArgs { driver }) => AnalysisRequest::TireDegradation {
                driver: driver.clone(),
            },
            Commands::RacePace { drivers } => AnalysisRequest::RacePace {
                drivers: drivers.clone(),
            },
            Commands::CornerAnalysis(LapArgs { driver, lap }) => AnalysisRequest::Corners {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::GearUsage(LapArgs { driver, lap }) => AnalysisRequest::GearUsage {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::FuelEffect(DriverArgs { driver }) => AnalysisRequest::FuelEffect {
                driver: driver.clone(),
            },
            Commands::DownforceAnalysis(LapArgs { driver, lap }) => AnalysisRequest::Downforce {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::BrakeAnalysis(LapArgs { driver, lap }) => AnalysisRequest::Brakes {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::ThrottleTrace(LapArgs { driver, lap }) => AnalysisRequest::Throttle {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::TireAnalysis(LapArgs { driver, lap }) => AnalysisRequest::Tires {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::EnergyAnalysis(LapArgs { driver, lap }) => AnalysisRequest::Energy {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::PitstopAnalysis => AnalysisRequest::PitStops,
            Commands::DrsAnalysis(LapArgs { driver, lap }) => AnalysisRequest::Drs {
                driver: driver.clone(),
                lap: *lap,
            },
            Commands::StrategyAnalysis => AnalysisRequest::Strategy,
            Commands::RaceInsights => AnalysisRequest::Insights,
        }
    }
}

fn run(args: &Args) -> Result<(), PitwallError> {
    let app_config = match &args.config {
        Some(config_path) => AppConfig::from_path(config_path)?,
        None => AppConfig::from_local_file()?,
    };
    if args.save_config {
        match &args.config {
            Some(config_path) => app_config.save_to(config_path)?,
            None => app_config.save()?,
        }
        info!("Saved config");
    }

    let session = load_session_jsonl(&args.input)?;
    let info = session.session_info();
    info!("Analyzing {} {}", info.event, info.session_type);

    let request = AnalysisRequest::from(&args.command);
    let result = AnalysisFacade::new(&session, app_config.analysis).run(&request)?;
    writer::write_result(
        &result,
        args.output.as_deref(),
        args.pretty || app_config.pretty_output,
    )
}

fn main() {
    colog::init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        match std::error::Error::source(&e) {
            Some(source) => error!("{}: {}", e, source),
            None => error!("{}", e),
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_kebab_case_subcommands_map_to_requests() {
        let args = Args::parse_from([
            "pitwall",
            "--input",
            "session.jsonl",
            "corner-analysis",
            "VER",
            "12",
        ]);
        assert_eq!(
            AnalysisRequest::from(&args.command),
            AnalysisRequest::Corners {
                driver: "VER".to_string(),
                lap: 12
            }
        );

        let args = Args::parse_from(["pitwall", "-i", "s.jsonl", "pitstop-analysis"]);
        assert_eq!(
            AnalysisRequest::from(&args.command),
            AnalysisRequest::PitStops
        );
    }

    #[test]
    fn test_telemetry_comparison_arguments() {
        let args = Args::parse_from([
            "pitwall", "-i", "s.jsonl", "telemetry", "LEC", "5", "SAI", "6",
        ]);
        assert_eq!(
            AnalysisRequest::from(&args.command),
            AnalysisRequest::Telemetry {
                driver: "LEC".to_string(),
                lap: 5,
                compare_with: Some(("SAI".to_string(), 6)),
            }
        );

        let missing_lap =
            Args::try_parse_from(["pitwall", "-i", "s.jsonl", "telemetry", "LEC", "5", "SAI"]);
        assert!(missing_lap.is_err());
    }

    #[test]
    fn test_race_pace_requires_drivers() {
        assert!(Args::try_parse_from(["pitwall", "-i", "s.jsonl", "race-pace"]).is_err());
    }
}
