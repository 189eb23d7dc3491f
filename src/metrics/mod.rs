//! Pure metric computation: time windows and aggregators.

pub mod aggregate;
pub mod window;
