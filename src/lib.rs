//! Core library for the sitesync command line application.
//!
//! The library reconciles an authoritative source spreadsheet against a
//! downstream system-of-record export and computes the field-level updates
//! needed to bring the downstream system in line. Value transforms live in
//! [`sitesync::tools::normalize`], the mapping resolver in
//! [`sitesync::tools::mapping`], primary key auditing in
//! [`sitesync::tools::keys`], and the join/compare pass in
//! [`sitesync::tools::engine`]. Everything that touches the file system is
//! kept in [`sitesync::tools::io`] and the batch orchestration under
//! [`sitesync::tools::run`].

pub mod sitesync;

pub use sitesync::tools::{
    Result, ToolError, config, engine, error, io, keys, mapping, model, normalize, report, run,
};
