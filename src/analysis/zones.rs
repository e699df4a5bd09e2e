use serde::{Deserialize, Serialize};

use super::{TraceAnalyzer, stats};
use crate::telemetry::{TelemetryTrace, sample_at};

/// Brake force above which a sample belongs to a brake zone
pub const BRAKE_ZONE_THRESHOLD: f64 = 10.;
/// A brake zone must span more than this many samples to be reported
pub const MIN_BRAKE_ZONE_SAMPLES: usize = 5;
/// Only the first brake zones encountered on a lap are reported
pub const MAX_BRAKE_ZONES: usize = 10;
/// DRS channel value above which the flap counts as open
pub const DRS_ACTIVE_THRESHOLD: f64 = 0.;
/// Sampling rate used to turn sample counts into durations
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 100.;

/// Threshold crossing rules that turn a gate signal into zones.
///
/// A zone opens on the first sample above `enter_above` and closes on the first
/// sample at or below `exit_at_or_below`. A zone still open when the signal
/// ends is dropped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneGate {
    pub enter_above: f64,
    pub exit_at_or_below: f64,
    /// Zones need strictly more samples than this to be kept
    pub min_samples: usize,
}

impl ZoneGate {
    pub fn segment(&self, signal: &[f64]) -> Vec<Zone> {
        let mut zones = Vec::new();
        let mut zone_start: Option<usize> = None;
        for (i, &value) in signal.iter().enumerate() {
            match zone_start {
                None if value > self.enter_above => zone_start = Some(i),
                Some(start) if value <= self.exit_at_or_below => {
                    zone_start = None;
                    if i - start > self.min_samples {
                        zones.push(Zone { start, end: i });
                    }
                }
                _ => {}
            }
        }
        zones
    }
}

/// Sample range `[start, end)` where a gate signal was active. `end` is the
/// sample on which the gate closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub start: usize,
    pub end: usize,
}

impl Zone {
    pub fn sample_count(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrakeZone {
    pub start_distance: f64,
    pub end_distance: f64,
    pub peak_brake_force: f64,
    pub avg_brake_force: f64,
    pub speed_loss: f64,
    /// Seconds
    pub duration: f64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrakeAnalysis {
    pub brake_zones: Vec<BrakeZone>,
    pub total_brake_time_percent: f64,
    pub avg_brake_force: f64,
}

/// Brake zone gate as read from the config file.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrakeGateConfig {
    pub enter_above: f64,
    pub exit_at_or_below: f64,
    pub min_samples: usize,
}

impl Default for BrakeGateConfig {
    fn default() -> Self {
        Self {
            enter_above: BRAKE_ZONE_THRESHOLD,
            exit_at_or_below: BRAKE_ZONE_THRESHOLD,
            min_samples: MIN_BRAKE_ZONE_SAMPLES,
        }
    }
}

impl From<BrakeGateConfig> for ZoneGate {
    fn from(config: BrakeGateConfig) -> Self {
        Self {
            enter_above: config.enter_above,
            exit_at_or_below: config.exit_at_or_below,
            min_samples: config.min_samples,
        }
    }
}

/// DRS gate as read from the config file.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DrsGateConfig {
    pub enter_above: f64,
    pub exit_at_or_below: f64,
    pub min_samples: usize,
}

impl Default for DrsGateConfig {
    fn default() -> Self {
        Self {
            enter_above: DRS_ACTIVE_THRESHOLD,
            exit_at_or_below: DRS_ACTIVE_THRESHOLD,
            min_samples: 0,
        }
    }
}

impl From<DrsGateConfig> for ZoneGate {
    fn from(config: DrsGateConfig) -> Self {
        Self {
            enter_above: config.enter_above,
            exit_at_or_below: config.exit_at_or_below,
            min_samples: config.min_samples,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrakeZoneConfig {
    pub gate: BrakeGateConfig,
    pub max_zones: usize,
    pub sample_rate_hz: f64,
}

impl Default for BrakeZoneConfig {
    fn default() -> Self {
        Self {
            gate: BrakeGateConfig::default(),
            max_zones: MAX_BRAKE_ZONES,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
        }
    }
}

pub struct BrakeZoneAnalyzer {
    config: BrakeZoneConfig,
}

impl BrakeZoneAnalyzer {
    pub fn new(config: BrakeZoneConfig) -> Self {
        Self { config }
    }

    fn brake_zone(&self, trace: &TelemetryTrace, zone: Zone) -> BrakeZone {
        let force = &trace.brake[zone.start..zone.end];
        let last = zone.end - 1;
        BrakeZone {
            start_distance: sample_at(&trace.distance, zone.start),
            end_distance: sample_at(&trace.distance, last),
            peak_brake_force: stats::max(force),
            avg_brake_force: stats::mean(force),
            speed_loss: sample_at(&trace.speed, zone.start) - sample_at(&trace.speed, last),
            duration: zone.sample_count() as f64 / self.config.sample_rate_hz,
        }
    }
}

impl Default for BrakeZoneAnalyzer {
    fn default() -> Self {
        Self::new(BrakeZoneConfig::default())
    }
}

impl TraceAnalyzer for BrakeZoneAnalyzer {
    type Output = BrakeAnalysis;

    fn analyze(&self, trace: &TelemetryTrace) -> BrakeAnalysis {
        // zones are taken in lap order, not by severity
        let brake_zones = ZoneGate::from(self.config.gate)
            .segment(&trace.brake)
            .into_iter()
            .take(self.config.max_zones)
            .map(|zone| self.brake_zone(trace, zone))
            .collect();

        BrakeAnalysis {
            brake_zones,
            total_brake_time_percent: stats::percent_where(&trace.brake, |b| b > 0.),
            avg_brake_force: stats::mean_where(&trace.brake, |b| b > 0.),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrsZone {
    pub zone_number: u32,
    pub start_distance: f64,
    pub end_distance: f64,
    pub length: f64,
    pub entry_speed: f64,
    pub exit_speed: f64,
    pub speed_gain: f64,
    pub avg_throttle: f64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrsAnalysis {
    pub drs_zones: Vec<DrsZone>,
    pub total_drs_usage: f64,
    pub avg_speed_in_drs: f64,
    pub max_speed_in_drs: f64,
    pub total_zones: usize,
    pub total_speed_gain: f64,
}

pub struct DrsZoneAnalyzer {
    gate: ZoneGate,
}

impl DrsZoneAnalyzer {
    pub fn new(gate: ZoneGate) -> Self {
        Self { gate }
    }

    fn drs_zone(trace: &TelemetryTrace, zone: Zone, zone_number: u32) -> DrsZone {
        let entry_speed = sample_at(&trace.speed, zone.start);
        let exit_speed = sample_at(&trace.speed, zone.end);
        let throttle_end = zone.end.min(trace.throttle.len());
        let throttle = trace.throttle.get(zone.start..throttle_end).unwrap_or(&[]);
        let start_distance = sample_at(&trace.distance, zone.start);
        let end_distance = sample_at(&trace.distance, zone.end);
        DrsZone {
            zone_number,
            start_distance,
            end_distance,
            length: end_distance - start_distance,
            entry_speed,
            exit_speed,
            speed_gain: (exit_speed - entry_speed).max(0.),
            avg_throttle: stats::mean(throttle),
        }
    }
}

impl Default for DrsZoneAnalyzer {
    fn default() -> Self {
        Self::new(DrsGateConfig::default().into())
    }
}

impl TraceAnalyzer for DrsZoneAnalyzer {
    type Output = DrsAnalysis;

    fn analyze(&self, trace: &TelemetryTrace) -> DrsAnalysis {
        let drs_zones: Vec<DrsZone> = self
            .gate
            .segment(&trace.drs)
            .into_iter()
            .enumerate()
            .map(|(i, zone)| Self::drs_zone(trace, zone, i as u32 + 1))
            .collect();

        let speed_with_drs: Vec<f64> = trace
            .speed
            .iter()
            .zip(&trace.drs)
            .filter(|(_, drs)| **drs > self.gate.enter_above)
            .map(|(speed, _)| *speed)
            .collect();

        DrsAnalysis {
            total_drs_usage: stats::percent_where(&trace.drs, |d| d > self.gate.enter_above),
            avg_speed_in_drs: stats::mean(&speed_with_drs),
            max_speed_in_drs: stats::max(&speed_with_drs),
            total_zones: drs_zones.len(),
            total_speed_gain: drs_zones.iter().fold(0., |total, z| total + z.speed_gain),
            drs_zones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gate(threshold: f64, min_samples: usize) -> ZoneGate {
        ZoneGate {
            enter_above: threshold,
            exit_at_or_below: threshold,
            min_samples,
        }
    }

    fn trace_with_brake(brake: Vec<f64>) -> TelemetryTrace {
        let len = brake.len();
        TelemetryTrace {
            distance: (0..len).map(|i| i as f64 * 5.).collect(),
            speed: (0..len).map(|i| 300. - i as f64).collect(),
            brake,
            ..Default::default()
        }
    }

    #[test]
    fn test_gate_opens_and_closes_on_thresholds() {
        let zone_gate = gate(10., 0);
        let zones = zone_gate.segment(&[0., 20., 30., 10., 0., 50., 5.]);
        assert_eq!(
            zones,
            vec![Zone { start: 1, end: 3 }, Zone { start: 5, end: 6 }]
        );
    }

    #[test]
    fn test_open_zone_at_end_is_discarded() {
        let zone_gate = gate(0., 0);
        assert!(zone_gate.segment(&[0., 0., 1., 1., 1.]).is_empty());
        assert!(zone_gate.segment(&[1.; 20]).is_empty());
    }

    #[test]
    fn test_min_samples_is_exclusive() {
        let zone_gate = gate(10., 5);
        let mut signal = vec![0.; 3];
        signal.extend([50.; 5]);
        signal.push(0.);
        signal.extend([50.; 6]);
        signal.push(0.);
        assert_eq!(zone_gate.segment(&signal), vec![Zone { start: 9, end: 15 }]);
    }

    #[test]
    fn test_brake_zone_aggregates() {
        let mut brake = vec![0.; 5];
        brake.extend([20., 80., 100., 90., 60., 30.]);
        brake.extend([0.; 5]);
        let analysis = BrakeZoneAnalyzer::default().analyze(&trace_with_brake(brake));

        assert_eq!(analysis.brake_zones.len(), 1);
        let zone = &analysis.brake_zones[0];
        assert_eq!(zone.start_distance, 25.);
        assert_eq!(zone.end_distance, 50.);
        assert_eq!(zone.peak_brake_force, 100.);
        assert!((zone.avg_brake_force - 63.333333333333336).abs() < 1e-9);
        assert_eq!(zone.speed_loss, 5.);
        assert!((zone.duration - 0.06).abs() < 1e-12);
        assert!((analysis.total_brake_time_percent - 6. / 16. * 100.).abs() < 1e-9);
        assert!((analysis.avg_brake_force - 63.333333333333336).abs() < 1e-9);
    }

    #[test]
    fn test_brake_zones_never_above_threshold() {
        let analysis = BrakeZoneAnalyzer::default().analyze(&trace_with_brake(vec![10.; 200]));
        assert!(analysis.brake_zones.is_empty());
    }

    #[test]
    fn test_brake_zones_always_above_threshold_are_not_flushed() {
        let analysis = BrakeZoneAnalyzer::default().analyze(&trace_with_brake(vec![60.; 200]));
        assert!(analysis.brake_zones.is_empty());
        assert_eq!(analysis.total_brake_time_percent, 100.);
    }

    #[test]
    fn test_brake_zones_keep_first_ten_in_lap_order() {
        let mut brake = Vec::new();
        for zone in 0..12 {
            brake.extend([0.; 4]);
            brake.extend(vec![20. + zone as f64; 8]);
        }
        brake.push(0.);
        let analysis = BrakeZoneAnalyzer::default().analyze(&trace_with_brake(brake));
        assert_eq!(analysis.brake_zones.len(), MAX_BRAKE_ZONES);
        assert_eq!(analysis.brake_zones[0].peak_brake_force, 20.);
        assert_eq!(analysis.brake_zones[9].peak_brake_force, 29.);
    }

    #[test]
    fn test_drs_zone_aggregates() {
        let trace = TelemetryTrace {
            distance: (0..10).map(|i| i as f64 * 10.).collect(),
            speed: vec![280., 285., 290., 300., 310., 315., 320., 200., 180., 170.],
            throttle: vec![100., 100., 100., 100., 100., 99., 98., 0., 0., 0.],
            drs: vec![0., 0., 12., 12., 14., 14., 14., 0., 0., 0.],
            ..Default::default()
        };
        let analysis = DrsZoneAnalyzer::default().analyze(&trace);

        assert_eq!(analysis.total_zones, 1);
        let zone = &analysis.drs_zones[0];
        assert_eq!(zone.zone_number, 1);
        assert_eq!(zone.start_distance, 20.);
        assert_eq!(zone.end_distance, 70.);
        assert_eq!(zone.length, 50.);
        assert_eq!(zone.entry_speed, 290.);
        assert_eq!(zone.exit_speed, 200.);
        // braking at the end of the straight means no gain
        assert_eq!(zone.speed_gain, 0.);
        assert!((zone.avg_throttle - 99.4).abs() < 1e-9);
        assert_eq!(analysis.total_drs_usage, 50.);
        assert_eq!(analysis.max_speed_in_drs, 320.);
        assert!((analysis.avg_speed_in_drs - 307.).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_drs_zone_is_kept() {
        let trace = TelemetryTrace {
            speed: vec![250., 260., 270.],
            drs: vec![0., 1., 0.],
            ..Default::default()
        };
        let analysis = DrsZoneAnalyzer::default().analyze(&trace);
        assert_eq!(analysis.total_zones, 1);
        assert_eq!(analysis.drs_zones[0].speed_gain, 10.);
        assert_eq!(analysis.drs_zones[0].avg_throttle, 0.);
    }

    #[test]
    fn test_lap_without_drs_reports_zero_speed_gain() {
        let trace = TelemetryTrace {
            speed: vec![250., 260., 270.],
            drs: vec![0., 0., 0.],
            ..Default::default()
        };
        let analysis = DrsZoneAnalyzer::default().analyze(&trace);
        assert!(analysis.drs_zones.is_empty());
        assert!(analysis.total_speed_gain.is_sign_positive());
        assert_eq!(
            serde_json::to_string(&analysis.total_speed_gain).unwrap(),
            "0.0"
        );
    }

    #[test]
    fn test_empty_trace_has_no_zones() {
        let trace = TelemetryTrace::default();
        assert_eq!(BrakeZoneAnalyzer::default().analyze(&trace), BrakeAnalysis::default());
        assert_eq!(DrsZoneAnalyzer::default().analyze(&trace), DrsAnalysis::default());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_zones_are_ordered_and_disjoint(
            signal in prop::collection::vec(0f64..100., 0..300),
            threshold in 0f64..50.,
        ) {
            let zones = gate(threshold, 0).segment(&signal);
            for zone in &zones {
                prop_assert!(zone.start < zone.end);
                prop_assert!(zone.end < signal.len());
                prop_assert!(signal[zone.start] > threshold);
                prop_assert!(signal[zone.end] <= threshold);
            }
            for pair in zones.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
        }

        #[test]
        fn prop_brake_analysis_is_idempotent(
            brake in prop::collection::vec(0f64..100., 0..300),
        ) {
            let trace = trace_with_brake(brake);
            let analyzer = BrakeZoneAnalyzer::default();
            prop_assert_eq!(analyzer.analyze(&trace), analyzer.analyze(&trace));
        }
    }
}
