pub mod config;
pub mod diff;
pub mod error;
pub mod protocol;
pub mod resolver;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub mod types;

pub use crate::config::Settings;
pub use crate::diff::{Diff, DiffSource};
pub use crate::error::{ConfigError, ProtocolError, StoreError, VcsError};
pub use crate::resolver::{resolve_session, Resolution, ResolveOptions};
pub use crate::store::SessionStore;
