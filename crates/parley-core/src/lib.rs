pub mod config;
pub mod error;
pub mod export;
pub mod types;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use export::SessionExport;
pub use types::*;
