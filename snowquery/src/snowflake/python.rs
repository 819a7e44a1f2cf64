use std::ffi::OsString;
use std::path::PathBuf;

use super::BridgeError;

/// Environment variable that points to the Python interpreter to use.
pub const PYTHON_ENV: &str = "SNOWQUERY_PYTHON";

/// Locate the Python interpreter: `$SNOWQUERY_PYTHON`, then `python3`, then `python` on `PATH`.
pub fn find_python() -> Result<PathBuf, BridgeError> {
    let candidates: Vec<OsString> = std::env::var_os(PYTHON_ENV)
        .filter(|v| !v.is_empty())
        .into_iter()
        .chain(["python3".into(), "python".into()])
        .collect();

    let mut last_err = None;
    for candidate in candidates {
        match which::which(&candidate) {
            Ok(path) => {
                log::debug!("using python interpreter {}", path.display());
                return Ok(path);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or(which::Error::CannotFindBinaryPath).into())
}
