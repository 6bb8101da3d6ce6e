pub mod capital;
pub mod config;
pub mod errors;
pub mod math;
pub mod options;
pub mod portfolio;
pub mod scenarios;
pub mod server;
pub mod state;
