pub mod decision;
pub mod imagery;
pub mod inference;
pub mod spectral;
pub mod timeseries;
