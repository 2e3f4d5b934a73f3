#![warn(rust_2018_idioms)]

mod display;
mod input;
mod server;
pub mod settings;

pub use crate::display::LogDisplay;
pub use crate::server::{run, Stats};
