pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const DAYS_PER_LEAP_YEAR: u32 = 366;

/// Interval resolutions an annual series may be sampled at (hourly and 15-minute).
pub const SUPPORTED_TIMESTEPS_PER_HOUR: [usize; 2] = [1, 4];

pub fn steps_per_day(timesteps_per_hour: usize) -> usize {
    HOURS_PER_DAY as usize * timesteps_per_hour
}

pub(crate) fn fraction_from_percent(percent: f64) -> f64 {
    percent / 100.
}
