pub mod applicability;
pub mod bin_sampler;
pub mod interval_series;
pub mod load_reconstructor;
pub mod peak_window;
pub mod sample_simulation;
pub mod schedule;
pub mod schedule_adjuster;
pub mod units;
