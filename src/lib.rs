// src/lib.rs
pub mod banner;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod extract;
pub mod job;
pub mod problems;
pub mod providers;
pub mod report;
pub mod results;
pub mod sandbox;
