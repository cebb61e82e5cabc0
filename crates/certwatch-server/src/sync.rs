use certwatch_common::types::Monitor;
use certwatch_registry::{RegistryError, RegistrySource, PAGE_SIZE};
use certwatch_storage::MonitorStore;
use std::sync::Arc;

/// Copies monitor definitions from a registry into the store.
pub struct RegistrySync {
    registry: Arc<dyn RegistrySource>,
    store: Arc<dyn MonitorStore>,
}

impl RegistrySync {
    pub fn new(registry: Arc<dyn RegistrySource>, store: Arc<dyn MonitorStore>) -> Self {
        Self { registry, store }
    }

    /// Walks the registry page by page and inserts every monitor the store
    /// has not seen. Returns how many were inserted.
    ///
    /// A page whose raw entry count is not exactly [`PAGE_SIZE`] ends the walk. A
    /// registry error aborts the remaining pages; monitors already inserted
    /// stay inserted.
    pub async fn sync(&self) -> Result<usize, RegistryError> {
        let mut offset = 0;
        let mut inserted = 0;

        loop {
            let page = self.registry.fetch_page(offset, PAGE_SIZE).await?;
            tracing::info!(
                registry = self.registry.name(),
                "fetched {}-{}",
                offset,
                offset + PAGE_SIZE
            );

            for def in page.monitors {
                match self.store.find_by_id(&def.id) {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(monitor = %def.friendly_name, error = %e, "Failed to look up monitor");
                        continue;
                    }
                }

                let monitor = Monitor::from_definition(def);
                match self.store.insert_if_absent(&monitor) {
                    Ok(true) => {
                        tracing::info!(
                            monitor = %monitor.friendly_name,
                            url = %monitor.url,
                            "Inserted monitor"
                        );
                        inserted += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(monitor = %monitor.friendly_name, error = %e, "Failed to insert monitor");
                    }
                }
            }

            if page.fetched != PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(inserted)
    }
}
