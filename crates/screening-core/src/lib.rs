pub mod catalog;
pub mod error;
pub mod thresholds;
pub mod types;

pub use catalog::*;
pub use error::*;
pub use thresholds::*;
pub use types::*;
