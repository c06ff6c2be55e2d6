//! Greenhouse sensor hub
//!
//! Receives telemetry datagrams from field sensors, stores every reading,
//! pushes it to live subscribers, serves recent history, accepts manual
//! reports, and asks an external reasoning service for advice on the latest
//! conditions.

pub mod actors;
pub mod advisory;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod history;
pub mod hub;
pub mod pipeline;
pub mod reading;
pub mod storage;
