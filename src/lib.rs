pub mod aggregate;
pub mod audit;
pub mod config;
pub mod error;
pub mod metrics;
pub mod peaks;
pub mod record;
pub mod report;
pub mod scenario;
pub mod section;
pub mod topology;

pub use aggregate::{NetworkTables, ReportTables, aggregate};
pub use config::ExtractConfig;
pub use error::{ExtractError, Result};
pub use record::{Category, LoadClass, Record};
pub use scenario::{Scenario, run_batch, run_scenario};
