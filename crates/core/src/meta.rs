use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Per-item state that survives between executions of the same polling task.
///
/// Log-style exporters keep their read position here; anything else a
/// plugin wants to remember about an item goes into `data`.
#[derive(Default)]
pub struct Meta {
    last_logsize: u64,
    mtime: i32,
    pub data: Option<Box<dyn Any + Send + Sync>>,
}

impl Meta {
    pub fn last_logsize(&self) -> u64 {
        self.last_logsize
    }

    pub fn set_last_logsize(&mut self, value: u64) {
        self.last_logsize = value;
    }

    pub fn mtime(&self) -> i32 {
        self.mtime
    }

    pub fn set_mtime(&mut self, value: i32) {
        self.mtime = value;
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("last_logsize", &self.last_logsize)
            .field("mtime", &self.mtime)
            .field("data", &self.data.is_some())
            .finish()
    }
}

/// Shared handle to an item's metadata. Owned by the client; tasks only
/// hand it to plugins.
pub type SharedMeta = Arc<RwLock<Meta>>;

pub fn new_shared_meta() -> SharedMeta {
    Arc::new(RwLock::new(Meta::default()))
}
