pub mod collect;
pub mod config;
pub mod digitizer;
pub mod enrichment;
pub mod error;
pub mod harvest;
pub mod selector;
pub mod sources;
pub mod store;
pub mod surface;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;

pub use config::{AppConfig, HarvestConfig};
pub use error::{HarvestError, Result};
pub use harvest::{HarvestReport, Harvester};
