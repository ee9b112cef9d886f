pub mod artifact;
pub mod cases;
pub mod clean;
pub mod config;
pub mod differ;
pub mod display;
pub mod driver;
pub mod errors;
pub mod log;
pub mod naming;
pub mod plot;
pub mod registry;
pub mod stats;
pub mod types;
