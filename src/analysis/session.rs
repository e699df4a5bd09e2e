use itertools::Itertools;
use log::debug;
use serde::Serialize;

use super::metrics::LapMetrics;
use super::stats;
use crate::PitwallError;
use crate::telemetry::{LapRecord, TelemetrySource, TelemetryTrace, sample_at};

/// Only the fastest laps of the first drivers are scanned for speed records
const SPEED_RECORD_DRIVERS: usize = 3;
/// Position of the speed trap as a fraction of the lap distance
const SPEED_TRAP_LAP_FRACTION: f64 = 0.7;
const NO_DRIVER: &str = "N/A";

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionLap {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: f64,
    pub sector1: Option<f64>,
    pub sector2: Option<f64>,
    pub sector3: Option<f64>,
    pub compound: String,
    pub is_personal_best: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FastestLap {
    pub time: f64,
    pub driver: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SpeedRecord {
    pub value: f64,
    pub driver: String,
}

impl Default for SpeedRecord {
    fn default() -> Self {
        Self {
            value: 0.,
            driver: NO_DRIVER.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatistics {
    pub fastest_lap: FastestLap,
    pub top_speed: SpeedRecord,
    pub speed_trap: SpeedRecord,
    pub total_laps: u32,
    pub avg_lap_time: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub year: Option<u32>,
    pub event: String,
    pub session_type: String,
    pub drivers: Vec<String>,
    pub laps: Vec<SessionLap>,
    pub statistics: SessionStatistics,
}

/// Lists the timed laps of a session with its headline statistics. When
/// `driver_filter` is not empty only those drivers are included, and each of
/// them must have laps in the session.
pub fn session_summary<S: TelemetrySource + ?Sized>(
    source: &S,
    driver_filter: &[String],
) -> Result<SessionSummary, PitwallError> {
    let known_drivers = source.drivers();
    if let Some(missing) = driver_filter
        .iter()
        .find(|driver| !known_drivers.contains(&driver.as_str()))
    {
        return Err(PitwallError::DriverNotFound {
            driver: missing.clone(),
        });
    }

    let laps = source
        .laps()
        .iter()
        .filter(|lap| driver_filter.is_empty() || driver_filter.contains(&lap.driver))
        .collect_vec();
    let drivers = laps
        .iter()
        .map(|lap| lap.driver.clone())
        .unique()
        .collect_vec();

    let timed_laps = laps
        .iter()
        .filter_map(|lap| Some((*lap, lap.valid_lap_time()?)))
        .collect_vec();
    let session_laps = timed_laps
        .iter()
        .map(|(lap, lap_time)| SessionLap {
            driver: lap.driver.clone(),
            lap_number: lap.lap_number,
            lap_time: *lap_time,
            sector1: lap.sector1,
            sector2: lap.sector2,
            sector3: lap.sector3,
            compound: lap.compound_label(),
            is_personal_best: lap.is_personal_best,
        })
        .collect_vec();

    let fastest_lap = timed_laps
        .iter()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(lap, time)| FastestLap {
            time: *time,
            driver: lap.driver.clone(),
        })
        .unwrap_or(FastestLap {
            time: 0.,
            driver: NO_DRIVER.to_string(),
        });

    let mut top_speed = SpeedRecord::default();
    let mut speed_trap = SpeedRecord::default();
    for driver in drivers.iter().take(SPEED_RECORD_DRIVERS) {
        let Some((fastest, _)) = timed_laps
            .iter()
            .filter(|(lap, _)| lap.driver == *driver)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };
        let Some(trace) = source.trace(driver, fastest.lap_number) else {
            debug!("No telemetry for {} lap {}", driver, fastest.lap_number);
            continue;
        };

        let max_speed = stats::max(&trace.speed);
        if max_speed > top_speed.value {
            top_speed = SpeedRecord {
                value: max_speed,
                driver: driver.clone(),
            };
        }
        if let Some(trap_speed) = speed_trap_speed(trace)
            && trap_speed > speed_trap.value
        {
            speed_trap = SpeedRecord {
                value: trap_speed,
                driver: driver.clone(),
            };
        }
    }

    let lap_times = timed_laps.iter().map(|(_, time)| *time).collect_vec();
    let info = source.session_info();
    Ok(SessionSummary {
        year: info.year,
        event: info.event.clone(),
        session_type: info.session_type.clone(),
        drivers,
        laps: session_laps,
        statistics: SessionStatistics {
            fastest_lap,
            top_speed,
            speed_trap,
            total_laps: laps.iter().map(|lap| lap.lap_number).max().unwrap_or(0),
            avg_lap_time: stats::mean(&lap_times),
        },
    })
}

/// Speed at the sample closest to the speed trap position, `None` without
/// distance data.
fn speed_trap_speed(trace: &TelemetryTrace) -> Option<f64> {
    let trap_distance = stats::max(&trace.distance) * SPEED_TRAP_LAP_FRACTION;
    let (trap_index, _) = trace
        .distance
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - trap_distance)
                .abs()
                .total_cmp(&(*b - trap_distance).abs())
        })?;
    Some(sample_at(&trace.speed, trap_index))
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LapTelemetryData {
    #[serde(flatten)]
    pub trace: TelemetryTrace,
    pub compound: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LapTelemetry {
    pub driver: String,
    pub lap: u32,
    pub telemetry: LapTelemetryData,
    pub metrics: LapMetrics,
}

impl LapTelemetry {
    pub fn new(lap: &LapRecord, trace: &TelemetryTrace) -> Self {
        Self {
            driver: lap.driver.clone(),
            lap: lap.lap_number,
            telemetry: LapTelemetryData {
                trace: trace.clone(),
                compound: lap.compound_label(),
            },
            metrics: LapMetrics::new(lap, trace),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryComparison {
    pub driver1: LapTelemetry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver2: Option<LapTelemetry>,
}

/// Telemetry and metrics for one lap, or two laps side by side.
pub fn compare_laps<S: TelemetrySource + ?Sized>(
    source: &S,
    first: (&str, u32),
    second: Option<(&str, u32)>,
) -> Result<TelemetryComparison, PitwallError> {
    let lap_telemetry = |(driver, lap_number): (&str, u32)| {
        source
            .lap_with_trace(driver, lap_number)
            .map(|(lap, trace)| LapTelemetry::new(lap, trace))
    };
    Ok(TelemetryComparison {
        driver1: lap_telemetry(first)?,
        driver2: second.map(lap_telemetry).transpose()?,
    })
}
