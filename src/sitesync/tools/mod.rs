pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod keys;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod report;
pub mod run;

pub use error::{Result, ToolError};
