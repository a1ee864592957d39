//! Well-known metadata components
//!
//! Fixed identities the core and its presets refer to. Upstream authoring
//! layers must publish these components under the same ids.

use crate::stamp::ComponentId;

/// Root path every other path ultimately promotes from
pub const MASTER_PATH: ComponentId = ComponentId(1);

/// Development path, forked from master
pub const DEVELOPMENT_PATH: ComponentId = ComponentId(2);

/// Default author for system-authored content
pub const USER: ComponentId = ComponentId(10);

/// Module holding the core metadata
pub const CORE_MODULE: ComponentId = ComponentId(20);

/// Look up a path preset by name (`master`, `development`)
pub fn path_by_name(name: &str) -> Option<ComponentId> {
    match name.to_ascii_lowercase().as_str() {
        "master" => Some(MASTER_PATH),
        "development" | "dev" => Some(DEVELOPMENT_PATH),
        _ => None,
    }
}
