pub mod corners;
pub mod metrics;
pub mod pace;
pub mod regression;
pub mod session;
pub(crate) mod stats;
pub mod stints;
pub mod zones;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::PitwallError;
use crate::telemetry::{TelemetrySource, TelemetryTrace};
use corners::{CornerAnalysis, CornerDetector, CornerDetectorConfig};
use metrics::{
    DownforceAnalysis, DownforceAnalyzer, EnergyAnalysis, EnergyAnalyzer, GearUsage,
    GearUsageAnalyzer, ThrottleAnalyzer, ThrottleTrace, TireAnalysis,
};
use pace::{DriverLaps, RaceInsights, RacePace, StrategyAnalysis};
use regression::FuelEffect;
use session::{SessionSummary, TelemetryComparison};
use stints::{DriverPitStops, PitStopAnalysis, TireDegradation};
use zones::{
    BrakeAnalysis, BrakeZoneAnalyzer, BrakeZoneConfig, DrsAnalysis, DrsGateConfig, DrsZoneAnalyzer,
};

/// A stateless analysis over the telemetry of a single lap.
pub trait TraceAnalyzer {
    type Output: Serialize;

    fn analyze(&self, trace: &TelemetryTrace) -> Self::Output;
}

/// Tunable thresholds of the trace analyses. Missing fields fall back to the
/// defaults, so a config file only needs the values it changes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub corners: CornerDetectorConfig,
    pub brake_zones: BrakeZoneConfig,
    pub drs: DrsGateConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            corners: CornerDetectorConfig::default(),
            brake_zones: BrakeZoneConfig::default(),
            drs: DrsGateConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisRequest {
    /// Timed laps and headline statistics, optionally for a subset of drivers
    Session { drivers: Vec<String> },
    /// Telemetry of a lap, optionally side by side with a second lap
    Telemetry {
        driver: String,
        lap: u32,
        compare_with: Option<(String, u32)>,
    },
    TireDegradation { driver: String },
    RacePace { drivers: Vec<String> },
    Corners { driver: String, lap: u32 },
    GearUsage { driver: String, lap: u32 },
    FuelEffect { driver: String },
    Downforce { driver: String, lap: u32 },
    Brakes { driver: String, lap: u32 },
    Throttle { driver: String, lap: u32 },
    Tires { driver: String, lap: u32 },
    Energy { driver: String, lap: u32 },
    PitStops,
    Drs { driver: String, lap: u32 },
    Strategy,
    Insights,
}

impl AnalysisRequest {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisRequest::Session { .. } => "session",
            AnalysisRequest::Telemetry { .. } => "telemetry",
            AnalysisRequest::TireDegradation { .. } => "tire-degradation",
            AnalysisRequest::RacePace { .. } => "race-pace",
            AnalysisRequest::Corners { .. } => "corner-analysis",
            AnalysisRequest::GearUsage { .. } => "gear-usage",
            AnalysisRequest::FuelEffect { .. } => "fuel-effect",
            AnalysisRequest::Downforce { .. } => "downforce-analysis",
            AnalysisRequest::Brakes { .. } => "brake-analysis",
            AnalysisRequest::Throttle { .. } => "throttle-trace",
            AnalysisRequest::Tires { .. } => "tire-analysis",
            AnalysisRequest::Energy { .. } => "energy-analysis",
            AnalysisRequest::PitStops => "pitstop-analysis",
            AnalysisRequest::Drs { .. } => "drs-analysis",
            AnalysisRequest::Strategy => "strategy-analysis",
            AnalysisRequest::Insights => "race-insights",
        }
    }

    fn validate(&self) -> Result<(), PitwallError> {
        let invalid = |reason: String| Err(PitwallError::InvalidRequest { reason });
        match self {
            AnalysisRequest::RacePace { drivers } if drivers.is_empty() => {
                invalid("race pace needs at least one driver".to_string())
            }
            AnalysisRequest::Telemetry {
                compare_with: Some((_, 0)),
                ..
            } => invalid("lap numbers start at 1".to_string()),
            AnalysisRequest::Telemetry { lap: 0, .. }
            | AnalysisRequest::Corners { lap: 0, .. }
            | AnalysisRequest::GearUsage { lap: 0, .. }
            | AnalysisRequest::Downforce { lap: 0, .. }
            | AnalysisRequest::Brakes { lap: 0, .. }
            | AnalysisRequest::Throttle { lap: 0, .. }
            | AnalysisRequest::Tires { lap: 0, .. }
            | AnalysisRequest::Energy { lap: 0, .. }
            | AnalysisRequest::Drs { lap: 0, .. } => invalid("lap numbers start at 1".to_string()),
            _ => Ok(()),
        }
    }
}

/// Result of an analysis of one lap, tagged with the lap it was computed for.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LapAnalysis<T> {
    pub driver: String,
    pub lap: u32,
    #[serde(flatten)]
    pub analysis: T,
}

/// Result of an analysis over all laps of one driver.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DriverAnalysis<T> {
    pub driver: String,
    #[serde(flatten)]
    pub analysis: T,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AnalysisResult {
    Session(SessionSummary),
    Telemetry(TelemetryComparison),
    TireDegradation(TireDegradation),
    RacePace(RacePace),
    Corners(LapAnalysis<CornerAnalysis>),
    GearUsage(LapAnalysis<GearUsage>),
    FuelEffect(DriverAnalysis<FuelEffect>),
    Downforce(LapAnalysis<DownforceAnalysis>),
    Brakes(LapAnalysis<BrakeAnalysis>),
    Throttle(LapAnalysis<ThrottleTrace>),
    Tires(LapAnalysis<TireAnalysis>),
    Energy(LapAnalysis<EnergyAnalysis>),
    PitStops(PitStopAnalysis),
    Drs(LapAnalysis<DrsAnalysis>),
    Strategy(StrategyAnalysis),
    Insights(RaceInsights),
}

/// Runs analyses against a telemetry source. Holds no state besides the
/// thresholds, so one facade can serve any number of requests.
pub struct AnalysisFacade<'a, S: TelemetrySource + ?Sized> {
    source: &'a S,
    config: AnalysisConfig,
}

impl<'a, S: TelemetrySource + ?Sized> AnalysisFacade<'a, S> {
    pub fn new(source: &'a S, config: AnalysisConfig) -> Self {
        Self { source, config }
    }

    pub fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, PitwallError> {
        request.validate()?;
        debug!("Running {} analysis: {:?}", request.name(), request);

        let result = match request {
            AnalysisRequest::Session { drivers } => {
                AnalysisResult::Session(session::session_summary(self.source, drivers)?)
            }
            AnalysisRequest::Telemetry {
                driver,
                lap,
                compare_with,
            } => AnalysisResult::Telemetry(session::compare_laps(
                self.source,
                (driver.as_str(), *lap),
                compare_with.as_ref().map(|(d, l)| (d.as_str(), *l)),
            )?),
            AnalysisRequest::TireDegradation { driver } => {
                let laps = self.source.driver_laps(driver)?;
                AnalysisResult::TireDegradation(TireDegradation {
                    driver: driver.clone(),
                    stints: stints::segment_stints(laps),
                })
            }
            AnalysisRequest::RacePace { drivers } => {
                let driver_laps = drivers
                    .iter()
                    .map(|driver| Ok((driver.as_str(), self.source.driver_laps(driver)?)))
                    .collect::<Result<Vec<DriverLaps>, PitwallError>>()?;
                AnalysisResult::RacePace(pace::race_pace(&driver_laps))
            }
            AnalysisRequest::Corners { driver, lap } => AnalysisResult::Corners(
                self.lap_analysis(&CornerDetector::new(self.config.corners), driver, *lap)?,
            ),
            AnalysisRequest::GearUsage { driver, lap } => {
                AnalysisResult::GearUsage(self.lap_analysis(&GearUsageAnalyzer, driver, *lap)?)
            }
            AnalysisRequest::FuelEffect { driver } => {
                let lap_times = self
                    .source
                    .driver_laps(driver)?
                    .into_iter()
                    .filter_map(|lap| Some((lap.lap_number, lap.valid_lap_time()?)))
                    .collect_vec();
                AnalysisResult::FuelEffect(DriverAnalysis {
                    driver: driver.clone(),
                    analysis: regression::fuel_effect(&lap_times),
                })
            }
            AnalysisRequest::Downforce { driver, lap } => {
                AnalysisResult::Downforce(self.lap_analysis(&DownforceAnalyzer, driver, *lap)?)
            }
            AnalysisRequest::Brakes { driver, lap } => AnalysisResult::Brakes(self.lap_analysis(
                &BrakeZoneAnalyzer::new(self.config.brake_zones),
                driver,
                *lap,
            )?),
            AnalysisRequest::Throttle { driver, lap } => {
                AnalysisResult::Throttle(self.lap_analysis(&ThrottleAnalyzer, driver, *lap)?)
            }
            AnalysisRequest::Tires { driver, lap } => {
                AnalysisResult::Tires(self.tire_analysis(driver, *lap)?)
            }
            AnalysisRequest::Energy { driver, lap } => {
                AnalysisResult::Energy(self.lap_analysis(&EnergyAnalyzer, driver, *lap)?)
            }
            AnalysisRequest::PitStops => AnalysisResult::PitStops(self.pit_stop_analysis()?),
            AnalysisRequest::Drs { driver, lap } => AnalysisResult::Drs(self.lap_analysis(
                &DrsZoneAnalyzer::new(self.config.drs.into()),
                driver,
                *lap,
            )?),
            AnalysisRequest::Strategy => AnalysisResult::Strategy(pace::strategy_analysis(
                &self.all_driver_laps()?,
                &self.source.session_info().session_type,
            )),
            AnalysisRequest::Insights => {
                AnalysisResult::Insights(pace::race_insights(&self.all_driver_laps()?))
            }
        };
        Ok(result)
    }

    fn lap_analysis<A: TraceAnalyzer>(
        &self,
        analyzer: &A,
        driver: &str,
        lap_number: u32,
    ) -> Result<LapAnalysis<A::Output>, PitwallError> {
        let (_, trace) = self.source.lap_with_trace(driver, lap_number)?;
        if trace.is_empty() {
            debug!("Lap {} of {} has no telemetry", lap_number, driver);
        }
        Ok(LapAnalysis {
            driver: driver.to_string(),
            lap: lap_number,
            analysis: analyzer.analyze(trace),
        })
    }

    fn tire_analysis(
        &self,
        driver: &str,
        lap_number: u32,
    ) -> Result<LapAnalysis<TireAnalysis>, PitwallError> {
        let (lap, trace) = self.source.lap_with_trace(driver, lap_number)?;
        // laps without a compound are not compared with anything
        let compound = lap.normalized_compound();
        let compound_lap_times = self
            .source
            .driver_laps(driver)?
            .into_iter()
            .filter(|other| compound.is_some() && other.normalized_compound() == compound)
            .filter_map(|other| other.valid_lap_time())
            .collect_vec();
        Ok(LapAnalysis {
            driver: driver.to_string(),
            lap: lap_number,
            analysis: TireAnalysis::new(lap, trace, &compound_lap_times),
        })
    }

    fn pit_stop_analysis(&self) -> Result<PitStopAnalysis, PitwallError> {
        let drivers = self
            .source
            .drivers()
            .into_iter()
            .map(|driver| {
                let laps = self.source.driver_laps(driver)?;
                Ok(stints::driver_pit_stops(driver, &laps))
            })
            .collect::<Result<Vec<DriverPitStops>, PitwallError>>()?;
        let stop_counts = drivers.iter().map(|d| d.pit_stops as f64).collect_vec();
        Ok(PitStopAnalysis {
            average_stops: stats::mean(&stop_counts),
            drivers,
            session_type: self.source.session_info().session_type.clone(),
        })
    }

    fn all_driver_laps(&self) -> Result<Vec<DriverLaps<'a>>, PitwallError> {
        let source: &'a S = self.source;
        source
            .drivers()
            .into_iter()
            .map(|driver| Ok((driver, source.driver_laps(driver)?)))
            .collect()
    }
}
