pub mod constants;
pub mod error;
pub mod fixed;
pub mod types;

pub use constants::*;
pub use error::FairbatchError;
pub use fixed::*;
pub use types::*;
