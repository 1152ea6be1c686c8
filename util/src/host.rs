//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the root of the software
/// directory tree.
pub const SW_ROOT_ENV_VAR: &str = "GUID_SW_ROOT";

/// Get the root directory of the software tree.
///
/// The root is read from the `GUID_SW_ROOT` environment variable, which
/// must be set before any executable is run. Parameter files and session
/// directories are resolved relative to this root.
pub fn get_guid_sw_root() -> Result<PathBuf, env::VarError> {
    Ok(PathBuf::from(env::var(SW_ROOT_ENV_VAR)?))
}
