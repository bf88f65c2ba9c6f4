pub mod error;
pub mod itemkey;
pub mod meta;
pub mod plugin;
pub mod regexp;
pub mod result;

pub use error::*;
pub use itemkey::parse_key;
pub use meta::{new_shared_meta, Meta, SharedMeta};
pub use plugin::*;
pub use regexp::PatternCache;
pub use result::*;
