//! Turning check streams into one result per service.

pub mod aggregate;
pub mod consumer;

pub use aggregate::{aggregate_results, ServiceCheckResult};
pub use consumer::{consume_check_results, ConsumedItems};
