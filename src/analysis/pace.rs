use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::stats;
use crate::telemetry::LapRecord;

/// Drivers listed as top performers and as most consistent
const LEADERBOARD_SIZE: usize = 3;

/// Laps of one driver, ordered by lap number.
pub type DriverLaps<'a> = (&'a str, Vec<&'a LapRecord>);

fn valid_lap_times(laps: &[&LapRecord]) -> Vec<f64> {
    laps.iter().filter_map(|lap| lap.valid_lap_time()).collect_vec()
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverPace {
    pub driver: String,
    pub avg_pace: f64,
    pub median_pace: f64,
    pub best_pace: f64,
    pub total_laps: usize,
}

impl DriverPace {
    /// `None` when the driver set no valid lap time.
    pub fn from_laps(driver: &str, laps: &[&LapRecord]) -> Option<Self> {
        let times = valid_lap_times(laps);
        if times.is_empty() {
            return None;
        }
        Some(Self {
            driver: driver.to_string(),
            avg_pace: stats::mean(&times),
            median_pace: stats::median(&times),
            best_pace: stats::min(&times),
            total_laps: times.len(),
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RacePace {
    pub pace_comparison: Vec<DriverPace>,
}

pub fn race_pace(drivers: &[DriverLaps]) -> RacePace {
    RacePace {
        pace_comparison: drivers
            .iter()
            .filter_map(|(driver, laps)| DriverPace::from_laps(driver, laps))
            .collect(),
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaceTrend {
    Improving,
    Declining,
}

impl PaceTrend {
    /// Compares the two halves of a run of lap times. A single lap is compared
    /// with itself and reads as declining.
    pub fn from_lap_times(times: &[f64]) -> Self {
        let (first_half, second_half) = if times.len() > 1 {
            times.split_at(times.len() / 2)
        } else {
            (times, times)
        };
        if stats::mean(second_half) < stats::mean(first_half) {
            PaceTrend::Improving
        } else {
            PaceTrend::Declining
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompoundPace {
    pub avg_pace: f64,
    pub best_pace: f64,
    pub laps: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverStrategy {
    pub driver: String,
    pub best_lap: f64,
    pub avg_lap: f64,
    pub consistency: f64,
    pub pace_trend: PaceTrend,
    pub compound_pace: BTreeMap<String, CompoundPace>,
    pub total_laps: usize,
    pub total_time: f64,
    pub gap_to_best: f64,
    pub position: usize,
    pub gap_to_leader: f64,
}

impl DriverStrategy {
    fn from_laps(driver: &str, laps: &[&LapRecord]) -> Option<Self> {
        let timed_laps = laps
            .iter()
            .filter_map(|lap| Some((lap.compound_label(), lap.valid_lap_time()?)))
            .collect_vec();
        if timed_laps.is_empty() {
            return None;
        }
        let times = timed_laps.iter().map(|(_, time)| *time).collect_vec();

        let compound_pace = timed_laps
            .iter()
            .into_group_map_by(|(compound, _)| compound.clone())
            .into_iter()
            .map(|(compound, laps)| {
                let compound_times = laps.iter().map(|(_, time)| *time).collect_vec();
                (
                    compound,
                    CompoundPace {
                        avg_pace: stats::mean(&compound_times),
                        best_pace: stats::min(&compound_times),
                        laps: compound_times.len(),
                    },
                )
            })
            .collect();

        let best_lap = stats::min(&times);
        let avg_lap = stats::mean(&times);
        Some(Self {
            driver: driver.to_string(),
            best_lap,
            avg_lap,
            consistency: stats::std_dev(&times),
            pace_trend: PaceTrend::from_lap_times(&times),
            compound_pace,
            total_laps: times.len(),
            total_time: times.iter().fold(0., |total, t| total + *t),
            gap_to_best: avg_lap - best_lap,
            position: 0,
            gap_to_leader: 0.,
        })
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAnalysis {
    pub drivers: Vec<DriverStrategy>,
    pub session_type: String,
    pub total_drivers: usize,
}

/// Ranks drivers by average lap time. Drivers without a valid lap are left out.
pub fn strategy_analysis(drivers: &[DriverLaps], session_type: &str) -> StrategyAnalysis {
    let mut ranked = drivers
        .iter()
        .filter_map(|(driver, laps)| DriverStrategy::from_laps(driver, laps))
        .sorted_by(|a, b| a.avg_lap.total_cmp(&b.avg_lap))
        .collect_vec();

    let leader_avg = ranked.first().map(|s| s.avg_lap).unwrap_or(0.);
    for (i, strategy) in ranked.iter_mut().enumerate() {
        strategy.position = i + 1;
        strategy.gap_to_leader = strategy.avg_lap - leader_avg;
    }

    StrategyAnalysis {
        total_drivers: ranked.len(),
        drivers: ranked,
        session_type: session_type.to_string(),
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverPerformance {
    pub driver: String,
    pub best_lap: f64,
    pub avg_lap: f64,
    pub consistency: f64,
    /// 0-100, penalizes lap time spread and distance from the best lap
    pub performance_score: f64,
    pub total_laps: usize,
}

impl DriverPerformance {
    fn from_laps(driver: &str, laps: &[&LapRecord]) -> Option<Self> {
        let times = valid_lap_times(laps);
        if times.is_empty() {
            return None;
        }
        let best_lap = stats::min(&times);
        let avg_lap = stats::mean(&times);
        let consistency = stats::std_dev(&times);
        Some(Self {
            driver: driver.to_string(),
            best_lap,
            avg_lap,
            consistency,
            performance_score: (100. - consistency * 2. - (avg_lap - best_lap) * 5.)
                .clamp(0., 100.),
            total_laps: times.len(),
        })
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RaceInsights {
    pub top_performers: Vec<DriverPerformance>,
    pub most_consistent: Vec<DriverPerformance>,
    pub all_drivers: Vec<DriverPerformance>,
    pub insights: Vec<String>,
    pub session_avg_pace: f64,
    pub total_drivers: usize,
}

pub fn race_insights(drivers: &[DriverLaps]) -> RaceInsights {
    let all_drivers = drivers
        .iter()
        .filter_map(|(driver, laps)| DriverPerformance::from_laps(driver, laps))
        .sorted_by(|a, b| b.performance_score.total_cmp(&a.performance_score))
        .collect_vec();

    let top_performers = all_drivers
        .iter()
        .take(LEADERBOARD_SIZE)
        .cloned()
        .collect_vec();
    let most_consistent = if all_drivers.len() >= LEADERBOARD_SIZE {
        all_drivers
            .iter()
            .sorted_by(|a, b| a.consistency.total_cmp(&b.consistency))
            .take(LEADERBOARD_SIZE)
            .cloned()
            .collect_vec()
    } else {
        all_drivers.clone()
    };

    let avg_laps = all_drivers.iter().map(|d| d.avg_lap).collect_vec();
    let session_avg_pace = stats::mean(&avg_laps);

    let mut insights = Vec::new();
    if let Some(leader) = all_drivers.first() {
        insights.push(format!(
            "{} leads performance with a score of {:.1}",
            leader.driver, leader.performance_score
        ));
    }
    if let Some(steadiest) = most_consistent.first() {
        insights.push(format!(
            "{} is the most consistent driver with {:.3}s variance",
            steadiest.driver, steadiest.consistency
        ));
    }
    insights.push(format!("Session average pace: {session_avg_pace:.3}s"));

    RaceInsights {
        top_performers,
        most_consistent,
        total_drivers: all_drivers.len(),
        all_drivers,
        insights,
        session_avg_pace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laps(driver: &str, compounds_and_times: &[(&str, Option<f64>)]) -> Vec<LapRecord> {
        compounds_and_times
            .iter()
            .enumerate()
            .map(|(i, (compound, time))| LapRecord {
                driver: driver.to_string(),
                lap_number: i as u32 + 1,
                lap_time: *time,
                compound: Some(compound.to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_driver_pace() {
        let records = laps(
            "HAM",
            &[
                ("SOFT", Some(91.)),
                ("SOFT", None),
                ("SOFT", Some(93.)),
                ("SOFT", Some(90.)),
                ("SOFT", Some(95.)),
            ],
        );
        let refs = records.iter().collect_vec();
        let pace = DriverPace::from_laps("HAM", &refs).unwrap();
        assert_eq!(pace.total_laps, 4);
        assert_eq!(pace.best_pace, 90.);
        assert_eq!(pace.avg_pace, 92.25);
        assert_eq!(pace.median_pace, 92.);

        let untimed = laps("BOT", &[("SOFT", None)]);
        let untimed_refs = untimed.iter().collect_vec();
        assert!(DriverPace::from_laps("BOT", &untimed_refs).is_none());
        let comparison = race_pace(&[("HAM", refs), ("BOT", untimed_refs)]);
        assert_eq!(comparison.pace_comparison.len(), 1);
    }

    #[test]
    fn test_pace_trend() {
        assert_eq!(
            PaceTrend::from_lap_times(&[92., 92., 91., 90.]),
            PaceTrend::Improving
        );
        assert_eq!(
            PaceTrend::from_lap_times(&[90., 91., 92.]),
            PaceTrend::Declining
        );
        assert_eq!(PaceTrend::from_lap_times(&[90.]), PaceTrend::Declining);
    }

    #[test]
    fn test_strategy_ranks_by_average_lap() {
        let slow = laps(
            "ALB",
            &[("MEDIUM", Some(94.)), ("MEDIUM", Some(96.)), ("HARD", Some(95.))],
        );
        let fast = laps("LEC", &[("SOFT", Some(90.)), ("SOFT", Some(92.))]);
        let drivers = vec![
            ("ALB", slow.iter().collect_vec()),
            ("LEC", fast.iter().collect_vec()),
        ];
        let analysis = strategy_analysis(&drivers, "R");

        assert_eq!(analysis.total_drivers, 2);
        assert_eq!(analysis.session_type, "R");
        let leader = &analysis.drivers[0];
        assert_eq!(leader.driver, "LEC");
        assert_eq!(leader.position, 1);
        assert_eq!(leader.gap_to_leader, 0.);
        assert_eq!(leader.consistency, 1.);
        assert_eq!(leader.gap_to_best, 1.);
        assert_eq!(leader.total_time, 182.);

        let second = &analysis.drivers[1];
        assert_eq!(second.position, 2);
        assert_eq!(second.gap_to_leader, 4.);
        assert_eq!(second.compound_pace.len(), 2);
        assert_eq!(second.compound_pace["MEDIUM"].avg_pace, 95.);
        assert_eq!(second.compound_pace["MEDIUM"].laps, 2);
        assert_eq!(second.compound_pace["HARD"].best_pace, 95.);
    }

    #[test]
    fn test_race_insights() {
        let records = [
            laps("VER", &[("SOFT", Some(90.)), ("SOFT", Some(90.))]),
            laps("NOR", &[("SOFT", Some(90.)), ("SOFT", Some(92.))]),
            laps("PIA", &[("SOFT", Some(91.)), ("SOFT", Some(91.5))]),
            laps("STR", &[("SOFT", Some(95.)), ("SOFT", Some(105.))]),
        ];
        let drivers = records
            .iter()
            .map(|laps| (laps[0].driver.as_str(), laps.iter().collect_vec()))
            .collect_vec();
        let insights = race_insights(&drivers);

        assert_eq!(insights.total_drivers, 4);
        let order = insights
            .all_drivers
            .iter()
            .map(|d| d.driver.as_str())
            .collect_vec();
        assert_eq!(order, vec!["VER", "PIA", "NOR", "STR"]);
        // 100 - 2*5 - 5*5
        assert_eq!(insights.all_drivers[3].performance_score, 65.);
        assert_eq!(insights.top_performers.len(), 3);
        assert_eq!(
            insights
                .most_consistent
                .iter()
                .map(|d| d.driver.as_str())
                .collect_vec(),
            vec!["VER", "PIA", "NOR"]
        );
        assert_eq!(insights.insights[0], "VER leads performance with a score of 100.0");
        assert_eq!(
            insights.insights[1],
            "VER is the most consistent driver with 0.000s variance"
        );
        assert!((insights.session_avg_pace - 93.0625).abs() < 1e-9);
    }

    #[test]
    fn test_insights_with_few_drivers_lists_everyone_as_consistent() {
        let records = laps("OCO", &[("HARD", Some(99.)), ("HARD", Some(97.))]);
        let insights = race_insights(&[("OCO", records.iter().collect_vec())]);
        assert_eq!(insights.most_consistent.len(), 1);
        assert_eq!(insights.insights.len(), 3);

        let empty = race_insights(&[]);
        assert_eq!(empty.total_drivers, 0);
        assert_eq!(empty.insights, vec!["Session average pace: 0.000s"]);
    }
}
