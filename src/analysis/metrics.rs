use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{TraceAnalyzer, stats};
use crate::telemetry::{LapRecord, TelemetryTrace, sample_at};

/// Reference top speed used to scale the downforce index, km/h
const DOWNFORCE_REFERENCE_SPEED: f64 = 350.;
/// Throttle at or above this counts as flat out
pub const FULL_THROTTLE_MIN: f64 = 95.;
/// Throttle at or below this counts as lifting or coasting
pub const COAST_THROTTLE_MAX: f64 = 20.;
/// Throttle level a driver has to cross to register an application point
pub const THROTTLE_APPLICATION_LEVEL: f64 = 50.;
pub const MAX_THROTTLE_APPLICATION_POINTS: usize = 15;
/// Share of braking energy assumed to be harvested
const ENERGY_RECOVERY_FACTOR: f64 = 0.65;
pub const MAX_GEAR: u8 = 8;
/// Tire age at which a set is considered worn out, laps
pub const TIRE_LIFE_LAPS: u32 = 30;

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownforceAnalysis {
    pub downforce_index: f64,
    pub high_speed_avg: f64,
    pub low_speed_avg: f64,
    pub speed_variance: f64,
    pub aerodynamic_efficiency: f64,
}

/// Estimates the aero level of a lap from how fast the car is in the quick
/// parts of the lap and how much its speed varies.
#[derive(Default)]
pub struct DownforceAnalyzer;

impl TraceAnalyzer for DownforceAnalyzer {
    type Output = DownforceAnalysis;

    fn analyze(&self, trace: &TelemetryTrace) -> DownforceAnalysis {
        let speed = &trace.speed;
        if speed.is_empty() {
            return DownforceAnalysis::default();
        }

        let upper_quartile = stats::percentile(speed, 75.);
        let lower_quartile = stats::percentile(speed, 25.);
        let high_speed_avg = stats::mean_where(speed, |s| s > upper_quartile);
        let low_speed_avg = stats::mean_where(speed, |s| s < lower_quartile);
        let speed_variance = stats::variance(speed);

        let downforce_index = (high_speed_avg / DOWNFORCE_REFERENCE_SPEED * 70.
            + (30. - speed_variance / 100.))
            .clamp(0., 100.);

        DownforceAnalysis {
            downforce_index,
            high_speed_avg,
            low_speed_avg,
            speed_variance,
            aerodynamic_efficiency: high_speed_avg / (speed_variance + 1.),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErsDeployment {
    High,
    Medium,
    #[default]
    Low,
}

impl ErsDeployment {
    pub fn from_full_throttle_pct(full_throttle_pct: f64) -> Self {
        if full_throttle_pct > 70. {
            ErsDeployment::High
        } else if full_throttle_pct > 50. {
            ErsDeployment::Medium
        } else {
            ErsDeployment::Low
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnergyAnalysis {
    pub full_throttle_pct: f64,
    #[serde(rename = "liftAndCoastPct")]
    pub lift_coast_pct: f64,
    #[serde(rename = "estimatedBrakeEnergy")]
    pub brake_energy: f64,
    #[serde(rename = "estimatedEnergyRecovery")]
    pub energy_recovery: f64,
    pub efficiency_score: f64,
    pub ers_deployment: ErsDeployment,
    pub pu_stress: f64,
    pub fuel_efficiency: f64,
}

#[derive(Default)]
pub struct EnergyAnalyzer;

impl TraceAnalyzer for EnergyAnalyzer {
    type Output = EnergyAnalysis;

    fn analyze(&self, trace: &TelemetryTrace) -> EnergyAnalysis {
        if trace.throttle.is_empty() {
            return EnergyAnalysis::default();
        }

        let full_throttle_pct = stats::percent_where(&trace.throttle, |t| t >= FULL_THROTTLE_MIN);
        let lift_coast_pct = stats::percent_where(&trace.throttle, |t| t <= COAST_THROTTLE_MAX);
        let brake_energy = trace
            .brake
            .iter()
            .zip(&trace.speed)
            .fold(0., |energy, (brake, speed)| energy + brake * speed)
            / 1000.;
        let energy_recovery = brake_energy * ENERGY_RECOVERY_FACTOR;

        EnergyAnalysis {
            full_throttle_pct,
            lift_coast_pct,
            brake_energy,
            energy_recovery,
            efficiency_score: ((100. - lift_coast_pct) * 0.6 + energy_recovery / 100. * 0.4)
                .clamp(0., 100.),
            ers_deployment: ErsDeployment::from_full_throttle_pct(full_throttle_pct),
            pu_stress: (full_throttle_pct * 0.8 + (100. - lift_coast_pct) * 0.2).clamp(0., 100.),
            fuel_efficiency: 0.8 + lift_coast_pct / 100. * 0.3,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GearUsage {
    /// Percentage of samples per gear, keyed `gear1` to `gear8`
    pub gear_usage: BTreeMap<String, f64>,
}

#[derive(Default)]
pub struct GearUsageAnalyzer;

impl TraceAnalyzer for GearUsageAnalyzer {
    type Output = GearUsage;

    fn analyze(&self, trace: &TelemetryTrace) -> GearUsage {
        let gear_usage = (1..=MAX_GEAR)
            .map(|gear| {
                (
                    format!("gear{gear}"),
                    stats::percent_where(&trace.gear, |g| g == gear),
                )
            })
            .collect();
        GearUsage { gear_usage }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlePoint {
    pub distance: f64,
    pub throttle_level: f64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleTrace {
    pub full_throttle_pct: f64,
    pub partial_throttle_pct: f64,
    pub coast_pct: f64,
    pub throttle_application_points: Vec<ThrottlePoint>,
}

#[derive(Default)]
pub struct ThrottleAnalyzer;

impl TraceAnalyzer for ThrottleAnalyzer {
    type Output = ThrottleTrace;

    fn analyze(&self, trace: &TelemetryTrace) -> ThrottleTrace {
        let throttle = &trace.throttle;
        // the last sample is never reported as an application point
        let throttle_application_points = (1..throttle.len().saturating_sub(1))
            .filter(|&i| {
                throttle[i - 1] < THROTTLE_APPLICATION_LEVEL
                    && throttle[i] >= THROTTLE_APPLICATION_LEVEL
            })
            .take(MAX_THROTTLE_APPLICATION_POINTS)
            .map(|i| ThrottlePoint {
                distance: sample_at(&trace.distance, i),
                throttle_level: throttle[i],
            })
            .collect();

        ThrottleTrace {
            full_throttle_pct: stats::percent_where(throttle, |t| t >= FULL_THROTTLE_MIN),
            partial_throttle_pct: stats::percent_where(throttle, |t| {
                t > COAST_THROTTLE_MAX && t < FULL_THROTTLE_MIN
            }),
            coast_pct: stats::percent_where(throttle, |t| t <= COAST_THROTTLE_MAX),
            throttle_application_points,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TirePerformance {
    Optimal,
    Degraded,
    Critical,
}

impl TirePerformance {
    pub fn from_tire_age(tire_age: u32) -> Self {
        match tire_age {
            0..10 => TirePerformance::Optimal,
            10..20 => TirePerformance::Degraded,
            _ => TirePerformance::Critical,
        }
    }
}

/// Wear estimate derived from the age of a set of tires alone.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TireWear {
    #[serde(rename = "estimatedLifeRemaining")]
    pub estimated_life: u32,
    pub performance: TirePerformance,
    pub temp_impact: f64,
    pub wear_level: f64,
}

impl TireWear {
    pub fn from_tire_age(tire_age: u32) -> Self {
        let age = tire_age as f64;
        Self {
            estimated_life: TIRE_LIFE_LAPS.saturating_sub(tire_age),
            performance: TirePerformance::from_tire_age(tire_age),
            temp_impact: (age * 2.5).min(100.),
            wear_level: (age / TIRE_LIFE_LAPS as f64 * 100.).min(100.),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TireAnalysis {
    pub compound: String,
    pub tire_age: u32,
    pub avg_speed: f64,
    pub degradation_rate: f64,
    #[serde(flatten)]
    pub wear: TireWear,
}

impl TireAnalysis {
    /// `compound_lap_times` are the driver's valid lap times on the same
    /// compound, in lap order.
    pub fn new(lap: &LapRecord, trace: &TelemetryTrace, compound_lap_times: &[f64]) -> Self {
        let degradation_rate = match (compound_lap_times.first(), compound_lap_times.last()) {
            (Some(first), Some(last)) if compound_lap_times.len() > 1 => {
                (last - first) / compound_lap_times.len() as f64
            }
            _ => 0.,
        };
        Self {
            compound: lap.compound_label(),
            tire_age: lap.tire_age,
            avg_speed: stats::mean(&trace.speed),
            degradation_rate,
            wear: TireWear::from_tire_age(lap.tire_age),
        }
    }
}

/// Headline numbers of one lap used when comparing two laps.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LapMetrics {
    pub max_speed: f64,
    pub avg_speed: f64,
    pub avg_throttle: f64,
    pub avg_brake: f64,
    /// Mean of the DRS channel as a percentage
    pub drs_usage: f64,
    pub lap_time: f64,
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
}

impl LapMetrics {
    pub fn new(lap: &LapRecord, trace: &TelemetryTrace) -> Self {
        Self {
            max_speed: stats::max(&trace.speed),
            avg_speed: stats::mean(&trace.speed),
            avg_throttle: stats::mean(&trace.throttle),
            avg_brake: stats::mean(&trace.brake),
            drs_usage: stats::mean(&trace.drs) * 100.,
            lap_time: lap.lap_time.unwrap_or(0.),
            sector1: lap.sector1.unwrap_or(0.),
            sector2: lap.sector2.unwrap_or(0.),
            sector3: lap.sector3.unwrap_or(0.),
        }
    }
}
