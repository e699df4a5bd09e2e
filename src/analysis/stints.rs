use itertools::Itertools;
use serde::Serialize;

use super::stats;
use crate::telemetry::LapRecord;

/// Stints shorter than this report no degradation
pub const MIN_DEGRADATION_LAPS: usize = 3;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StintLap {
    pub lap_number: u32,
    pub time: f64,
}

/// A run of consecutive timed laps on one compound.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stint {
    pub compound: String,
    pub laps: Vec<StintLap>,
    pub avg_lap_time: f64,
    /// Seconds lost per lap between the first and last lap of the stint
    pub degradation: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TireDegradation {
    pub driver: String,
    pub stints: Vec<Stint>,
}

/// Splits a driver's laps, ordered by lap number, into stints.
///
/// Laps without a compound or a lap time are skipped. A new stint starts on
/// every compound change relative to the previous usable lap, and the last
/// stint is always closed at the end of the input.
pub fn segment_stints<'a>(laps: impl IntoIterator<Item = &'a LapRecord>) -> Vec<Stint> {
    let timed_laps = laps.into_iter().filter_map(|lap| {
        let compound = lap.normalized_compound()?;
        let time = lap.valid_lap_time()?;
        Some((
            compound,
            StintLap {
                lap_number: lap.lap_number,
                time,
            },
        ))
    });

    let stints = timed_laps.chunk_by(|(compound, _)| compound.clone());
    stints
        .into_iter()
        .map(|(compound, stint_laps)| {
            let laps = stint_laps.map(|(_, lap)| lap).collect_vec();
            let times = laps.iter().map(|lap| lap.time).collect_vec();
            Stint {
                compound,
                avg_lap_time: stats::mean(&times),
                degradation: stint_degradation(&times),
                laps,
            }
        })
        .collect()
}

/// Time difference between the last and first lap spread over the stint.
/// Short stints are too noisy and report 0.
pub fn stint_degradation(times: &[f64]) -> f64 {
    match (times.first(), times.last()) {
        (Some(first), Some(last)) if times.len() >= MIN_DEGRADATION_LAPS => {
            (last - first) / times.len() as f64
        }
        _ => 0.,
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PitStint {
    pub compound: String,
    pub start_lap: u32,
    pub end_lap: u32,
    pub laps: u32,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverPitStops {
    pub driver: String,
    pub pit_stops: usize,
    /// First lap on the new compound after each stop
    pub pit_laps: Vec<u32>,
    pub compounds_used: Vec<String>,
    pub stints: Vec<PitStint>,
    pub total_laps: u32,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PitStopAnalysis {
    pub drivers: Vec<DriverPitStops>,
    pub average_stops: f64,
    pub session_type: String,
}

/// Infers pit stops from compound changes over all of a driver's laps,
/// ordered by lap number. Unlike [`segment_stints`], untimed laps count and a
/// missing compound is its own `UNKNOWN` stint.
pub fn driver_pit_stops(driver: &str, laps: &[&LapRecord]) -> DriverPitStops {
    let total_laps = laps.iter().map(|lap| lap.lap_number).max().unwrap_or(0);
    let mut pit_laps = Vec::new();
    let mut compounds_used: Vec<String> = Vec::new();
    let mut stints = Vec::new();
    let mut current_compound: Option<String> = None;
    let mut stint_start = 1;

    for lap in laps {
        let compound = lap.compound_label();
        if lap.normalized_compound().is_some() && !compounds_used.contains(&compound) {
            compounds_used.push(compound.clone());
        }

        if let Some(previous) = current_compound.as_ref()
            && *previous != compound
        {
            pit_laps.push(lap.lap_number);
            stints.push(PitStint {
                compound: previous.clone(),
                start_lap: stint_start,
                end_lap: lap.lap_number.saturating_sub(1),
                laps: lap.lap_number.saturating_sub(stint_start),
            });
            stint_start = lap.lap_number;
        }
        current_compound = Some(compound);
    }

    if let Some(compound) = current_compound {
        stints.push(PitStint {
            compound,
            start_lap: stint_start,
            end_lap: total_laps,
            laps: (total_laps + 1).saturating_sub(stint_start),
        });
    }

    DriverPitStops {
        driver: driver.to_string(),
        pit_stops: pit_laps.len(),
        pit_laps,
        compounds_used,
        stints,
        total_laps,
    }
}
