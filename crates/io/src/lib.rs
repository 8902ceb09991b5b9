// File I/O operations

pub mod error;
pub mod labels;
pub mod pipeline;
pub mod tables;
pub mod text;

pub use error::IoError;
pub use pipeline::{DateFilter, DateSelection, Pipeline};
