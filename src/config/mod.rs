pub mod loader;
pub mod settings;

pub use settings::{ComputePrecision, DecodeSettings, DeposcribeConfig, Device};
