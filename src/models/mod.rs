//! Data models shared by the config layer, the services and the tasks.
//!
//! - [`GameVariant`]: which of the two supported games a run targets
//! - [`ItemParams`]: publish metadata stored in a mod's item cfg
//! - [`Visibility`]: Workshop visibility of an item
//! - [`default_rc_values`]: the defaults merged into `.vmbrc` on every load

pub mod config;
pub mod item;

pub use config::{DEFAULT_RC_FILE, GameVariant, ValueKind, default_rc_values};
pub use item::{ItemParams, Visibility, split_tags};
