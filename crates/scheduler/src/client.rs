use std::sync::Arc;

use chrono::{DateTime, Utc};
use vigil_core::{RegexpMatcher, ResultWriter};

/// Client id of direct requests, which expect exactly one immediate result
/// and are never re-armed.
pub const DIRECT_CLIENT_ID: u64 = 0;

/// The party that requested item polls or watches.
pub trait ClientAccessor: Send + Sync {
    fn id(&self) -> u64;
    fn output(&self) -> Arc<dyn ResultWriter>;
    fn global_regexp(&self) -> Arc<dyn RegexpMatcher>;
    /// Refresh interval for unsupported items, in seconds.
    fn refresh_unsupported(&self) -> u32;
}

/// An item as configured by its client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientItem {
    pub item_id: u64,
    /// Polling interval in the client's own notation, e.g. `30s`.
    pub delay: String,
    pub key: String,
}

/// Computes when an item is polled next.
pub trait NextCheck: Send + Sync {
    fn next_check(
        &self,
        item_id: u64,
        delay: &str,
        now: DateTime<Utc>,
        failed: bool,
        refresh_unsupported: u32,
    ) -> Result<DateTime<Utc>, String>;
}

impl<F> NextCheck for F
where
    F: Fn(u64, &str, DateTime<Utc>, bool, u32) -> Result<DateTime<Utc>, String> + Send + Sync,
{
    fn next_check(
        &self,
        item_id: u64,
        delay: &str,
        now: DateTime<Utc>,
        failed: bool,
        refresh_unsupported: u32,
    ) -> Result<DateTime<Utc>, String> {
        self(item_id, delay, now, failed, refresh_unsupported)
    }
}
