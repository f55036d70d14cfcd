#![cfg_attr(not(test), no_std)]

pub mod controller;
pub mod detect;
pub mod schedule;
pub mod settings;
pub mod statistics;
pub mod telemetry;
pub mod thermal;
pub mod window;

pub use controller::{Controller, Status};
pub use settings::Settings;
