use serde::{Deserialize, Serialize};
use simple_moving_average::{SMA, SumTreeSMA};

use super::TraceAnalyzer;
use crate::telemetry::{TelemetryTrace, sample_at};

/// Minimum distance (m) between the apexes of two consecutive corners
pub const MIN_CORNER_DISTANCE_M: f64 = 150.;
/// Minimum drop (km/h) below the trailing average speed that starts a corner
pub const MIN_SPEED_DROP_KPH: f64 = 40.;
/// Minimum brake point speed minus apex speed (km/h) for a corner to count
pub const SPEED_DELTA_THRESHOLD_KPH: f64 = 25.;
/// Brake force above which a sample is taken as the brake point
pub const BRAKE_POINT_THRESHOLD: f64 = 25.;
/// Samples searched backwards from the trigger for the brake point
pub const BRAKE_POINT_WINDOW: usize = 35;
/// Samples searched forwards from the trigger for the apex
pub const APEX_WINDOW: usize = 40;
/// Samples searched forwards from the apex for the exit
pub const EXIT_WINDOW: usize = 40;
/// Throttle above which the driver is back on power at the exit
pub const EXIT_THROTTLE_THRESHOLD: f64 = 60.;
/// Speed (km/h) the car must have regained over the apex at the exit
pub const EXIT_SPEED_MARGIN_KPH: f64 = 15.;
/// Apex speed (km/h) under which a corner is slow
pub const SLOW_CORNER_MAX_KPH: f64 = 100.;
/// Apex speed (km/h) under which a corner is medium speed
pub const MEDIUM_CORNER_MAX_KPH: f64 = 180.;

/// First sample examined by the scan
const SCAN_START: usize = 30;
/// The scan stops this many samples before the end of the trace
const SCAN_END_MARGIN: usize = 40;
/// Samples in the trailing speed average
const SPEED_AVERAGE_WINDOW: usize = 10;
/// Samples before which the trailing average is not trusted
const WARMUP_SAMPLES: usize = 20;
const SCAN_STEP: usize = 5;
/// Samples skipped past a corner exit before scanning resumes
const EXIT_SKIP: usize = 20;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CornerType {
    Slow,
    Medium,
    Fast,
}

impl CornerType {
    pub fn from_apex_speed(apex_speed: f64) -> Self {
        if apex_speed < SLOW_CORNER_MAX_KPH {
            CornerType::Slow
        } else if apex_speed < MEDIUM_CORNER_MAX_KPH {
            CornerType::Medium
        } else {
            CornerType::Fast
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrakePoint {
    pub distance: f64,
    pub speed: f64,
    pub brake_force: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Apex {
    pub distance: f64,
    pub min_speed: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CornerExit {
    pub distance: f64,
    pub speed: f64,
    pub throttle: f64,
}

/// Sample indices of the three corner phases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CornerSamples {
    pub brake_point: usize,
    pub apex: usize,
    pub exit: usize,
}

/// A braking, apex and exit event detected on a lap.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Corner {
    /// 1-based, in detection order
    pub corner_number: u32,
    pub brake_point: BrakePoint,
    pub apex: Apex,
    pub exit: CornerExit,
    /// Brake point speed minus apex speed
    pub speed_delta: f64,
    #[serde(rename = "type")]
    pub corner_type: CornerType,
    #[serde(skip)]
    pub samples: CornerSamples,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CornerAnalysis {
    pub corners: Vec<Corner>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CornerDetectorConfig {
    pub min_corner_distance: f64,
    pub min_speed_drop: f64,
    pub speed_delta_threshold: f64,
    pub brake_point_threshold: f64,
    pub brake_point_window: usize,
    pub apex_window: usize,
    pub exit_window: usize,
    pub exit_throttle_threshold: f64,
    pub exit_speed_margin: f64,
}

impl Default for CornerDetectorConfig {
    fn default() -> Self {
        Self {
            min_corner_distance: MIN_CORNER_DISTANCE_M,
            min_speed_drop: MIN_SPEED_DROP_KPH,
            speed_delta_threshold: SPEED_DELTA_THRESHOLD_KPH,
            brake_point_threshold: BRAKE_POINT_THRESHOLD,
            brake_point_window: BRAKE_POINT_WINDOW,
            apex_window: APEX_WINDOW,
            exit_window: EXIT_WINDOW,
            exit_throttle_threshold: EXIT_THROTTLE_THRESHOLD,
            exit_speed_margin: EXIT_SPEED_MARGIN_KPH,
        }
    }
}

/// Segments a lap into corners with a single forward scan over the speed trace.
///
/// A corner is triggered where speed falls well below its trailing average.
/// From there the detector looks back for the brake point, forward for the
/// apex (minimum speed) and from the apex for the exit (back on throttle with
/// speed recovering). After a corner the scan resumes past its exit, so
/// corners come out in lap order and never share samples.
pub struct CornerDetector {
    config: CornerDetectorConfig,
}

impl CornerDetector {
    pub fn new(config: CornerDetectorConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, trace: &TelemetryTrace) -> Vec<Corner> {
        // the scan needs both a speed and a position for every sample it visits
        let len = trace.speed.len().min(trace.distance.len());
        let speed = &trace.speed[..len];
        let distance = &trace.distance[..len];
        let trailing_avg = trailing_speed_average(speed);

        let mut corners: Vec<Corner> = Vec::new();
        let mut last_corner_distance = -self.config.min_corner_distance;
        let mut brake_search_floor = 0;
        let mut i = SCAN_START;
        while i + SCAN_END_MARGIN < len {
            if i <= WARMUP_SAMPLES {
                i += 1;
                continue;
            }

            let speed_drop = trailing_avg[i] - speed[i];
            if speed_drop <= self.config.min_speed_drop
                || distance[i] - last_corner_distance <= self.config.min_corner_distance
            {
                i += SCAN_STEP;
                continue;
            }

            let samples = self.locate_phases(trace, len, i, brake_search_floor);
            let speed_delta = speed[samples.brake_point] - speed[samples.apex];
            if speed_delta <= self.config.speed_delta_threshold {
                i += SCAN_STEP;
                continue;
            }

            corners.push(Corner {
                corner_number: corners.len() as u32 + 1,
                brake_point: BrakePoint {
                    distance: distance[samples.brake_point],
                    speed: speed[samples.brake_point],
                    brake_force: sample_at(&trace.brake, samples.brake_point),
                },
                apex: Apex {
                    distance: distance[samples.apex],
                    min_speed: speed[samples.apex],
                },
                exit: CornerExit {
                    distance: distance[samples.exit],
                    speed: speed[samples.exit],
                    throttle: sample_at(&trace.throttle, samples.exit),
                },
                speed_delta,
                corner_type: CornerType::from_apex_speed(speed[samples.apex]),
                samples,
            });
            last_corner_distance = distance[samples.apex];
            brake_search_floor = samples.exit + 1;
            i = samples.exit + EXIT_SKIP;
        }
        corners
    }

    /// Finds brake point, apex and exit around a trigger sample. Only samples
    /// before `len` and brake points at or after `brake_search_floor` are used.
    fn locate_phases(
        &self,
        trace: &TelemetryTrace,
        len: usize,
        trigger: usize,
        brake_search_floor: usize,
    ) -> CornerSamples {
        let speed = &trace.speed;

        let brake_search_start = trigger
            .saturating_sub(self.config.brake_point_window)
            .max(brake_search_floor);
        let brake_point = (brake_search_start..trigger)
            .find(|&j| sample_at(&trace.brake, j) > self.config.brake_point_threshold)
            .unwrap_or(trigger);

        let mut apex = trigger;
        for j in trigger..(trigger + self.config.apex_window).min(len) {
            if speed[j] < speed[apex] {
                apex = j;
            }
        }

        let exit_speed = speed[apex] + self.config.exit_speed_margin;
        let exit = (apex..(apex + self.config.exit_window).min(len))
            .find(|&j| {
                sample_at(&trace.throttle, j) > self.config.exit_throttle_threshold
                    && speed[j] > exit_speed
            })
            .unwrap_or(apex);

        CornerSamples {
            brake_point,
            apex,
            exit,
        }
    }
}

impl Default for CornerDetector {
    fn default() -> Self {
        Self::new(CornerDetectorConfig::default())
    }
}

impl TraceAnalyzer for CornerDetector {
    type Output = CornerAnalysis;

    fn analyze(&self, trace: &TelemetryTrace) -> CornerAnalysis {
        CornerAnalysis {
            corners: self.detect(trace),
        }
    }
}

/// Average of the `SPEED_AVERAGE_WINDOW` samples preceding each sample.
fn trailing_speed_average(speed: &[f64]) -> Vec<f64> {
    let mut window = SumTreeSMA::<f64, f64, SPEED_AVERAGE_WINDOW>::new();
    speed
        .iter()
        .map(|&s| {
            let avg = window.get_average();
            window.add_sample(s);
            avg
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE_SPEED: f64 = 280.;

    /// Straight-line trace at `BASE_SPEED` with full throttle, 10 m per sample.
    fn straight(len: usize) -> TelemetryTrace {
        TelemetryTrace {
            distance: (0..len).map(|i| i as f64 * 10.).collect(),
            speed: vec![BASE_SPEED; len],
            throttle: vec![100.; len],
            brake: vec![0.; len],
            ..Default::default()
        }
    }

    /// Carves a braking dip into the trace: 10 samples of braking down to
    /// `apex_speed`, then 10 samples of full throttle back to `BASE_SPEED`.
    fn add_dip(trace: &mut TelemetryTrace, start: usize, apex_speed: f64) {
        let drop = BASE_SPEED - apex_speed;
        for t in 0..10 {
            trace.speed[start + t] = BASE_SPEED - drop * (t + 1) as f64 / 10.;
            trace.throttle[start + t] = 0.;
            trace.brake[start + t] = 90.;
        }
        for t in 0..10 {
            trace.speed[start + 10 + t] = apex_speed + drop * (t + 1) as f64 / 10.;
        }
    }

    #[test]
    fn test_corner_type_thresholds() {
        assert_eq!(CornerType::from_apex_speed(99.9), CornerType::Slow);
        assert_eq!(CornerType::from_apex_speed(100.), CornerType::Medium);
        assert_eq!(CornerType::from_apex_speed(179.9), CornerType::Medium);
        assert_eq!(CornerType::from_apex_speed(180.), CornerType::Fast);
    }

    #[test]
    fn test_single_braking_event() {
        let mut speed = vec![300.; 40];
        speed.extend((0..20).map(|k| 300. - 250. * (k + 1) as f64 / 20.));
        speed.extend((0..40).map(|k| 50. + 230. * (k + 1) as f64 / 40.));
        let len = speed.len();
        let mut brake = vec![0.; len];
        brake[40..60].iter_mut().for_each(|b| *b = 80.);
        let mut throttle = vec![100.; len];
        throttle[40..60].iter_mut().for_each(|t| *t = 0.);
        let trace = TelemetryTrace {
            distance: (0..len).map(|i| i as f64 * 10.).collect(),
            speed,
            throttle,
            brake,
            ..Default::default()
        };

        let corners = CornerDetector::default().detect(&trace);
        assert_eq!(corners.len(), 1);
        let corner = &corners[0];
        assert_eq!(corner.corner_number, 1);
        assert_eq!(corner.samples.brake_point, 40);
        assert_eq!(corner.samples.apex, 59);
        assert_eq!(corner.samples.exit, 62);
        assert_eq!(corner.apex.min_speed, 50.);
        assert_eq!(corner.brake_point.brake_force, 80.);
        assert_eq!(corner.exit.throttle, 100.);
        assert!(corner.speed_delta > SPEED_DELTA_THRESHOLD_KPH);
        assert!((corner.speed_delta - 237.5).abs() < 1e-9);
        assert_eq!(
            corner.corner_type,
            CornerType::from_apex_speed(corner.apex.min_speed)
        );
    }

    #[test]
    fn test_three_corners_in_lap_order() {
        let mut trace = straight(200);
        add_dip(&mut trace, 40, 80.);
        add_dip(&mut trace, 95, 140.);
        add_dip(&mut trace, 145, 190.);

        let corners = CornerDetector::default().detect(&trace);
        assert_eq!(corners.len(), 3);
        assert_eq!(
            corners.iter().map(|c| c.corner_type).collect::<Vec<_>>(),
            vec![CornerType::Slow, CornerType::Medium, CornerType::Fast]
        );
        assert_eq!(
            corners.iter().map(|c| c.samples.apex).collect::<Vec<_>>(),
            vec![49, 104, 154]
        );
        assert_eq!(
            corners.iter().map(|c| c.samples.brake_point).collect::<Vec<_>>(),
            vec![40, 95, 145]
        );
        assert_eq!(
            corners.iter().map(|c| c.samples.exit).collect::<Vec<_>>(),
            vec![50, 106, 156]
        );
        assert!(corners.windows(2).all(|p| p[0].apex.distance < p[1].apex.distance));
        assert_eq!(
            corners.iter().map(|c| c.corner_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_brake_point_defaults_to_trigger_without_braking() {
        let mut trace = straight(120);
        add_dip(&mut trace, 40, 100.);
        trace.brake.iter_mut().for_each(|b| *b = 0.);

        let corners = CornerDetector::default().detect(&trace);
        assert_eq!(corners.len(), 1);
        // trigger lands on the first scanned sample deep enough into the dip
        assert_eq!(corners[0].samples.brake_point, 45);
        assert_eq!(corners[0].brake_point.brake_force, 0.);
    }

    #[test]
    fn test_exit_defaults_to_apex_without_throttle() {
        let mut trace = straight(120);
        add_dip(&mut trace, 40, 100.);
        trace.throttle.iter_mut().for_each(|t| *t = 0.);

        let corners = CornerDetector::default().detect(&trace);
        assert_eq!(corners.len(), 1);
        assert_eq!(corners[0].samples.exit, corners[0].samples.apex);
        assert_eq!(corners[0].exit.distance, corners[0].apex.distance);
    }

    #[test]
    fn test_shallow_dip_is_not_a_corner() {
        let mut trace = straight(120);
        add_dip(&mut trace, 40, 250.);
        assert!(CornerDetector::default().detect(&trace).is_empty());
    }

    #[test]
    fn test_short_flat_and_empty_traces() {
        assert!(CornerDetector::default().detect(&TelemetryTrace::default()).is_empty());
        assert!(CornerDetector::default().detect(&straight(60)).is_empty());
        assert!(CornerDetector::default().detect(&straight(500)).is_empty());

        let mut no_distance = straight(120);
        add_dip(&mut no_distance, 40, 80.);
        no_distance.distance.clear();
        assert!(CornerDetector::default().detect(&no_distance).is_empty());
    }

    #[test]
    fn test_corners_closer_than_min_distance_are_merged() {
        let mut trace = straight(200);
        for d in trace.distance.iter_mut() {
            *d /= 10.;
        }
        add_dip(&mut trace, 40, 80.);
        add_dip(&mut trace, 95, 80.);
        // 55 samples at 1 m each is well inside the minimum corner distance
        assert_eq!(CornerDetector::default().detect(&trace).len(), 1);
    }

    fn arbitrary_trace() -> impl Strategy<Value = TelemetryTrace> {
        (50usize..400).prop_flat_map(|len| {
            (
                prop::collection::vec(0.5f64..20., len),
                prop::collection::vec(40f64..340., len),
                prop::collection::vec(0f64..100., len),
                prop::collection::vec(0f64..100., len),
            )
                .prop_map(|(steps, speed, throttle, brake)| TelemetryTrace {
                    distance: steps
                        .iter()
                        .scan(0., |d, step| {
                            *d += step;
                            Some(*d)
                        })
                        .collect(),
                    speed,
                    throttle,
                    brake,
                    ..Default::default()
                })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_corners_are_ordered_and_disjoint(trace in arbitrary_trace()) {
            let corners = CornerDetector::default().detect(&trace);
            for (i, corner) in corners.iter().enumerate() {
                prop_assert_eq!(corner.corner_number as usize, i + 1);
                prop_assert!(corner.speed_delta > SPEED_DELTA_THRESHOLD_KPH);
                prop_assert!(corner.samples.brake_point <= corner.samples.apex);
                prop_assert!(corner.samples.apex <= corner.samples.exit);
                prop_assert_eq!(
                    corner.corner_type,
                    CornerType::from_apex_speed(corner.apex.min_speed)
                );
            }
            for pair in corners.windows(2) {
                prop_assert!(pair[0].apex.distance < pair[1].apex.distance);
                prop_assert!(pair[0].samples.exit < pair[1].samples.brake_point);
            }
        }

        #[test]
        fn prop_detection_is_idempotent(trace in arbitrary_trace()) {
            let detector = CornerDetector::default();
            prop_assert_eq!(detector.detect(&trace), detector.detect(&trace));
        }
    }
}
