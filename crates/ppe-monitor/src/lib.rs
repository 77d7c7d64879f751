pub mod alarm;
pub mod alert;
pub mod config;
pub mod context;
pub mod fleet;
pub mod metrics;
pub mod opentelemetry;
pub mod selection;
pub mod status;
pub mod stream_health;
pub mod task;

mod error;

pub use error::{Error, Result};
