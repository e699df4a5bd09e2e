use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uom::si::f64::Velocity;
use uom::si::velocity::{kilometer_per_hour, meter_per_second};

use super::{LapRecord, SessionData, SessionInfo, TelemetrySource, TelemetryTrace};
use crate::PitwallError;

/// Unit of the speed column in a stored trace.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpeedUnit {
    #[default]
    #[serde(rename = "kph")]
    KilometersPerHour,
    #[serde(rename = "mps")]
    MetersPerSecond,
}

impl SpeedUnit {
    pub fn to_kph(&self, value: f64) -> f64 {
        match self {
            SpeedUnit::KilometersPerHour => value,
            SpeedUnit::MetersPerSecond => {
                Velocity::new::<meter_per_second>(value).get::<kilometer_per_hour>()
            }
        }
    }
}

/// Telemetry of one lap as stored in a session file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub driver: String,
    pub lap_number: u32,
    #[serde(default)]
    pub speed_unit: SpeedUnit,
    pub telemetry: TelemetryTrace,
}

/// One line of a session file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SessionRecord {
    Session(SessionInfo),
    Lap(LapRecord),
    Trace(Box<TraceRecord>),
}

/// Loads a session from a JSON lines file. The first record must describe the
/// session; lap and trace records may follow in any order.
pub fn load_session_jsonl(source_file: &Path) -> Result<SessionData, PitwallError> {
    let records = serde_jsonlines::json_lines(source_file)
        .map_err(|e| PitwallError::SourceIOError { source: e })?
        .collect::<Result<Vec<SessionRecord>, std::io::Error>>()
        .map_err(|e| PitwallError::SourceIOError { source: e })?;

    let session = session_from_records(records)?;
    info!(
        "Loaded {:?}: {} laps, {} traces for {} drivers",
        source_file,
        session.laps.len(),
        session.trace_count(),
        session.drivers().len()
    );
    Ok(session)
}

pub fn session_from_records(
    records: impl IntoIterator<Item = SessionRecord>,
) -> Result<SessionData, PitwallError> {
    let mut session: Option<SessionData> = None;
    for record in records {
        match record {
            SessionRecord::Session(info) => {
                if session.is_some() {
                    warn!(
                        "Ignoring additional session record for {} {}, one session per file",
                        info.event, info.session_type
                    );
                } else {
                    debug!("Session {} {}", info.event, info.session_type);
                    session = Some(SessionData::new(info));
                }
            }
            SessionRecord::Lap(lap) => session
                .as_mut()
                .ok_or(PitwallError::MissingSessionInfo)?
                .add_lap(lap),
            SessionRecord::Trace(trace_record) => {
                let cur_session = session.as_mut().ok_or(PitwallError::MissingSessionInfo)?;
                let TraceRecord {
                    driver,
                    lap_number,
                    speed_unit,
                    mut telemetry,
                } = *trace_record;
                if speed_unit != SpeedUnit::KilometersPerHour {
                    telemetry
                        .speed
                        .iter_mut()
                        .for_each(|s| *s = speed_unit.to_kph(*s));
                }
                let short_columns = telemetry.short_columns();
                if !telemetry.is_empty() && !short_columns.is_empty() {
                    warn!(
                        "Trace for {} lap {} is missing samples in {:?}",
                        driver, lap_number, short_columns
                    );
                }
                cur_session.add_trace(&driver, lap_number, telemetry);
            }
        }
    }
    session.ok_or(PitwallError::MissingSessionInfo)
}
