//! Policy file persistence.
//!
//! # File Format
//!
//! A JSON object holding the ordered policy list:
//!
//! ```json
//! {
//!   "policies": [
//!     {"tool": "Bash(git status)", "permission": "allow"},
//!     {"tool": "Write", "permission": "ask", "argumentMatches": {"path": "**/src/**"}},
//!     {"tool": "mcp_*", "permission": "exclude"}
//!   ]
//! }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use callguard_core::policy::*;
//!
//! // Missing files load as an empty list
//! let mut file = load_policy_file(path)?;
//! file.policies.push(Policy::allow("Read"));
//! save_policy_file(path, &file)?;
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Policy;

/// Contents of a policy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFile {
    #[serde(default)]
    pub policies: Vec<Policy>,
}

#[derive(Error, Debug)]
pub enum PolicyFileError {
    #[error("Failed to read policy file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid policy file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write policy file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to serialize policies: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load a policy file.
///
/// A missing file is not an error: it loads as an empty policy list, so a
/// fresh setup works without any configuration.
///
/// # Errors
///
/// Returns an error if the file exists but can't be read or parsed.
pub fn load_policy_file(path: &Path) -> Result<PolicyFile, PolicyFileError> {
    if !path.exists() {
        log::debug!("No policy file at {}, using no policies", path.display());
        return Ok(PolicyFile::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| PolicyFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: PolicyFile =
        serde_json::from_str(&contents).map_err(|source| PolicyFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    log::debug!(
        "Loaded {} policies from {}",
        file.policies.len(),
        path.display()
    );
    Ok(file)
}

/// Save a policy file.
///
/// # Atomic Write
///
/// Writes to `<path>.tmp` and renames it over the target, so a crash never
/// leaves a half-written file behind. The parent directory is created if
/// needed.
pub fn save_policy_file(path: &Path, file: &PolicyFile) -> Result<(), PolicyFileError> {
    let write_error = |source| PolicyFileError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let json = serde_json::to_string_pretty(file)?;

    let mut temp_name = OsString::from(path.as_os_str());
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, json).map_err(write_error)?;
    fs::rename(&temp_path, path).map_err(write_error)?;

    Ok(())
}
