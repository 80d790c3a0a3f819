//! Configuration types and loading for flowclone.
//!
//! A clone run is described by a single file holding the source, the destination and the flow
//! limit. Values from the file can be overridden through `APP_`-prefixed environment variables.

mod load;
pub mod shared;
mod template;

pub use load::{LoadConfigError, load_config_file};
pub use template::{DEFAULT_CONFIG_FILE_NAME, usage_template};
