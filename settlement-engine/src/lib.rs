#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod access_control;
pub mod cli;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod registry;
pub mod scenario;
pub mod settlement;
pub mod signature;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
