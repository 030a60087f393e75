pub mod algorithm;
pub mod common;
pub mod config;
pub mod map;
pub mod query;
pub mod region;
pub mod scenario;
pub mod stat;
