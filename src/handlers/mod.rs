//! HTTP handlers for the analyzer service.

pub mod analyze;
pub mod health;
pub mod send_results;
pub mod upload;

pub use analyze::{analyze, analyze_comprehensive, analyze_detailed};
pub use health::health_check;
pub use send_results::send_results;
pub use upload::upload;
