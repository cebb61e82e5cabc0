pub mod error;
pub mod uptimerobot;

use certwatch_common::types::MonitorDefinition;

pub use error::{RegistryError, Result};

/// Number of monitors requested per registry page.
pub const PAGE_SIZE: usize = 50;

/// One page of registry results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryPage {
    /// Entries that decoded against the monitor schema.
    pub monitors: Vec<MonitorDefinition>,
    /// Raw entry count before decoding. Pagination continues on this value so
    /// a malformed entry cannot end the walk early.
    pub fetched: usize,
}

/// Source of monitor definitions, read one offset-addressed page at a time.
#[async_trait::async_trait]
pub trait RegistrySource: Send + Sync {
    /// Registry name used in logs (e.g., "uptimerobot").
    fn name(&self) -> &str;

    /// Fetches up to `limit` monitor definitions starting at `offset`.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<RegistryPage>;
}
