pub mod alert;
pub mod config;
pub mod entity;
pub mod error;

pub use alert::*;
pub use config::Config;
pub use entity::*;
pub use error::*;
