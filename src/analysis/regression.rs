use serde::Serialize;

use super::stats;

/// Fewer valid laps than this give no fuel effect estimate
pub const MIN_FUEL_EFFECT_LAPS: usize = 5;

/// Slope of the least-squares line through paired samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
}

impl LinearFit {
    /// Ordinary least squares over paired samples. Returns `None` when there
    /// are fewer than two points or all `x` are equal.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return None;
        }
        let (xs, ys) = (&xs[..n], &ys[..n]);
        let x_mean = stats::mean(xs);
        let y_mean = stats::mean(ys);

        // centered sums of cross products and squares
        let (sxy, sxx) = xs
            .iter()
            .zip(ys)
            .fold((0., 0.), |(sxy, sxx), (x, y)| {
                let dx = x - x_mean;
                (sxy + dx * (y - y_mean), sxx + dx * dx)
            });
        if sxx == 0. {
            return None;
        }
        Some(Self { slope: sxy / sxx })
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuelEffect {
    /// Lap time change per lap in seconds, negative when the car gets faster
    pub fuel_effect_per_lap: f64,
    pub total_fuel_effect: f64,
}

/// Fits lap time against lap number over `(lap_number, lap_time)` pairs.
pub fn fuel_effect(laps: &[(u32, f64)]) -> FuelEffect {
    if laps.len() < MIN_FUEL_EFFECT_LAPS {
        return FuelEffect::default();
    }
    let (lap_numbers, lap_times): (Vec<f64>, Vec<f64>) = laps
        .iter()
        .map(|(lap_number, time)| (*lap_number as f64, *time))
        .unzip();
    let slope = LinearFit::fit(&lap_numbers, &lap_times)
        .map(|fit| fit.slope)
        .unwrap_or(0.);
    FuelEffect {
        fuel_effect_per_lap: slope,
        total_fuel_effect: slope * laps.len() as f64,
    }
}
