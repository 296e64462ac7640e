//! pairtestor: sequential hardware tests for serial port pairs.
//!
//! The library holds the scheduler, the unit tests and their persisted
//! settings; the `pairtestor` binary is a command line front end over it.

pub mod config;
pub mod deferred;
pub mod logger;
pub mod ports;
pub mod scheduler;
pub mod settings;
pub mod unit_test;
pub mod utils;
pub mod view_model;
