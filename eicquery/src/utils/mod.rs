pub mod baseline;
pub mod rolling;
pub mod smoothing;

pub use baseline::{
    asls_baseline,
    threshold_baseline,
};
pub use rolling::RollingMedianCalculator;
pub use smoothing::{
    gaussian_smooth,
    moving_average,
    savitzky_golay,
};
