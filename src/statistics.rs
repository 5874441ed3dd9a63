/// A simple statistics module with the daily reductions used when binning and windowing series.
use statrs::statistics::Statistics;

pub fn mean(numbers: &[f64]) -> f64 {
    Statistics::mean(numbers)
}

pub fn max(numbers: &[f64]) -> f64 {
    Statistics::max(numbers)
}

pub fn min(numbers: &[f64]) -> f64 {
    Statistics::min(numbers)
}

/// Index of the largest value, taking the earliest index where several values tie.
pub fn argmax(numbers: &[f64]) -> Option<usize> {
    numbers
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, best_value)) if v <= best_value => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Sums of every run of `window` consecutive values, in order of where the run starts.
pub fn sliding_sums(numbers: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![];
    }
    numbers.windows(window).map(|w| w.iter().sum()).collect()
}
