//! Services module - the mod building logic behind every task.
//!
//! Services know nothing about the command line. Each one takes its inputs
//! explicitly (usually a [`Config`](crate::config::Config) or a
//! [`ModLocator`]) and reports failures through its own error enum.
//!
//! # Components
//!
//! - [`item_cfg`]: reads and writes the per-mod `item_v<N>.cfg` publish metadata.
//! - [`ModLocator`]: mod folder paths, name validation and mod discovery.
//! - [`Templater`]: creates a new mod folder from the template.
//! - [`ToolLocator`]: finds the SDK and the Workshop folder through Steam,
//!   falling back to configured paths.
//! - [`BuildPipeline`]: runs the Stingray compiler, checks its manifest and
//!   places the bundles.
//! - [`UploadPipeline`]: drives the Workshop uploader and scrapes the item id.
//! - [`bundle`]: bundle file naming shared by the template and the build.

pub mod build;
pub mod bundle;
pub mod item_cfg;
pub mod mod_locator;
pub mod template;
pub mod tool_locator;
pub mod upload;

pub use build::{BuildError, BuildOptions, BuildPipeline, BuildReport, BuildSettings, BuildStage, WorkshopTarget};
pub use item_cfg::ItemCfgError;
pub use mod_locator::{ModCheck, ModLocator, valid_mod_name};
pub use template::{TemplateError, TemplateParams, Templater};
pub use tool_locator::{LocatorError, SteamLookup, SystemSteamLookup, ToolLocator};
pub use upload::{UgcUploader, UploadError, UploadPipeline, UploadRequest, UploaderClient, UploaderOutputScanner};
