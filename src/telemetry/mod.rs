pub mod loader;

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::PitwallError;

pub use loader::{SessionRecord, SpeedUnit, load_session_jsonl};

/// Compound label used when a lap carries no tire information.
pub const UNKNOWN_COMPOUND: &str = "UNKNOWN";

static EMPTY_TRACE: TelemetryTrace = TelemetryTrace {
    distance: Vec::new(),
    speed: Vec::new(),
    throttle: Vec::new(),
    brake: Vec::new(),
    gear: Vec::new(),
    rpm: Vec::new(),
    drs: Vec::new(),
};

/// Per-sample telemetry for one lap of one driver, stored as parallel columns.
///
/// The sample index encodes temporal order. A source that could not provide a
/// column leaves it empty; every analysis treats reads past the end of a column
/// as zero rather than failing.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryTrace {
    /// Meters from the start of the lap, non-decreasing
    pub distance: Vec<f64>,
    /// km/h
    pub speed: Vec<f64>,
    /// 0-100
    pub throttle: Vec<f64>,
    /// 0-100
    pub brake: Vec<f64>,
    pub gear: Vec<u8>,
    pub rpm: Vec<f64>,
    /// DRS channel, any value above zero means the flap is open
    pub drs: Vec<f64>,
}

impl TelemetryTrace {
    /// Number of samples in the longest column.
    pub fn len(&self) -> usize {
        [
            self.distance.len(),
            self.speed.len(),
            self.throttle.len(),
            self.brake.len(),
            self.gear.len(),
            self.rpm.len(),
            self.drs.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the columns that are shorter than the trace, empty ones included.
    pub fn short_columns(&self) -> Vec<&'static str> {
        let len = self.len();
        [
            ("distance", self.distance.len()),
            ("speed", self.speed.len()),
            ("throttle", self.throttle.len()),
            ("brake", self.brake.len()),
            ("gear", self.gear.len()),
            ("rpm", self.rpm.len()),
            ("drs", self.drs.len()),
        ]
        .into_iter()
        .filter(|(_, column_len)| *column_len < len)
        .map(|(name, _)| name)
        .collect_vec()
    }
}

/// Reads a sample from a column, zero when the column is too short.
pub(crate) fn sample_at(column: &[f64], index: usize) -> f64 {
    column.get(index).copied().unwrap_or(0.)
}

/// Timing and tire metadata for one lap.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LapRecord {
    pub driver: String,
    pub lap_number: u32,
    #[serde(default)]
    pub lap_time: Option<f64>,
    #[serde(default)]
    pub sector1: Option<f64>,
    #[serde(default)]
    pub sector2: Option<f64>,
    #[serde(default)]
    pub sector3: Option<f64>,
    #[serde(default)]
    pub compound: Option<String>,
    /// Laps driven on the current set of tires
    #[serde(default)]
    pub tire_age: u32,
    #[serde(default)]
    pub is_personal_best: bool,
}

impl LapRecord {
    /// Lap time in seconds if the lap was timed, `None` for missing or
    /// non-positive times.
    pub fn valid_lap_time(&self) -> Option<f64> {
        self.lap_time.filter(|t| t.is_finite() && *t > 0.)
    }

    /// Upper-cased compound, `None` when the lap carries no compound.
    pub fn normalized_compound(&self) -> Option<String> {
        self.compound
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    }

    pub fn compound_label(&self) -> String {
        self.normalized_compound()
            .unwrap_or_else(|| UNKNOWN_COMPOUND.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default)]
    pub year: Option<u32>,
    pub event: String,
    pub session_type: String,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            year: None,
            event: "Unknown".to_string(),
            session_type: "Unknown".to_string(),
        }
    }
}

/// Provides the laps and telemetry of one session to the analyses.
///
/// Implementations own locating, loading and caching session data; the
/// analyses only read through this trait.
pub trait TelemetrySource {
    fn session_info(&self) -> &SessionInfo;

    fn laps(&self) -> &[LapRecord];

    /// Telemetry for a lap, `None` when the lap was recorded without telemetry.
    fn trace(&self, driver: &str, lap_number: u32) -> Option<&TelemetryTrace>;

    /// Drivers in the order they first appear in the lap list.
    fn drivers(&self) -> Vec<&str> {
        self.laps()
            .iter()
            .map(|lap| lap.driver.as_str())
            .unique()
            .collect_vec()
    }

    /// All laps of a driver ordered by lap number.
    fn driver_laps(&self, driver: &str) -> Result<Vec<&LapRecord>, PitwallError> {
        let laps = self
            .laps()
            .iter()
            .filter(|lap| lap.driver == driver)
            .sorted_by_key(|lap| lap.lap_number)
            .collect_vec();
        if laps.is_empty() {
            return Err(PitwallError::DriverNotFound {
                driver: driver.to_string(),
            });
        }
        Ok(laps)
    }

    fn lap(&self, driver: &str, lap_number: u32) -> Result<&LapRecord, PitwallError> {
        self.laps()
            .iter()
            .find(|lap| lap.driver == driver && lap.lap_number == lap_number)
            .ok_or_else(|| PitwallError::LapNotFound {
                driver: driver.to_string(),
                lap_number,
            })
    }

    /// Looks up a lap and its telemetry. A lap without telemetry yields an
    /// empty trace; a lap that does not exist is an error.
    fn lap_with_trace(
        &self,
        driver: &str,
        lap_number: u32,
    ) -> Result<(&LapRecord, &TelemetryTrace), PitwallError> {
        let lap = self.lap(driver, lap_number)?;
        let trace = self.trace(driver, lap_number).unwrap_or(&EMPTY_TRACE);
        Ok((lap, trace))
    }
}

/// In-memory session: lap records plus the telemetry traces that were recorded.
#[derive(Clone, Debug, Default)]
pub struct SessionData {
    pub info: SessionInfo,
    pub laps: Vec<LapRecord>,
    traces: HashMap<(String, u32), TelemetryTrace>,
}

impl SessionData {
    pub fn new(info: SessionInfo) -> Self {
        Self {
            info,
            laps: Vec::new(),
            traces: HashMap::new(),
        }
    }

    pub fn add_lap(&mut self, lap: LapRecord) {
        self.laps.push(lap);
    }

    pub fn add_trace(&mut self, driver: &str, lap_number: u32, trace: TelemetryTrace) {
        self.traces.insert((driver.to_string(), lap_number), trace);
    }

    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }
}

impl TelemetrySource for SessionData {
    fn session_info(&self) -> &SessionInfo {
        &self.info
    }

    fn laps(&self) -> &[LapRecord] {
        &self.laps
    }

    fn trace(&self, driver: &str, lap_number: u32) -> Option<&TelemetryTrace> {
        self.traces.get(&(driver.to_string(), lap_number))
    }
}
