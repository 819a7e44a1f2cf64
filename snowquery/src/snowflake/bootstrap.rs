//! Installation and upgrade of `snowflake-connector-python`.
//!
//! Runs once, before the first Snowflake connection is opened:
//!
//! ```text
//! NotChecked -> [Installing] -> VersionChecking -> [Upgrading] -> Ready
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::errors::BootstrapError;

use super::{find_python, BridgeError};

/// Oldest connector version that can fetch Arrow batches.
pub const MIN_CONNECTOR_VERSION: &str = "2.7.4";

const PACKAGE: &str = "snowflake-connector-python[pandas]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    NotChecked,
    Installing,
    VersionChecking,
    Upgrading,
    Ready,
}

/// Outcome of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Version of the importable connector, if it could be read.
    pub version: Option<String>,
    pub installed: bool,
    pub upgraded: bool,
}

/// Operations on the Python package that provides `snowflake.connector`.
///
/// Failures are reported as the text of the underlying tool.
pub trait PackageManager {
    /// Whether the module can be found, without importing it.
    fn is_available(&mut self) -> Result<bool, String>;

    fn install(&mut self) -> Result<(), String>;

    /// Install the newest version, replacing the current one.
    fn upgrade(&mut self) -> Result<(), String>;

    /// Import the module, bypassing cached import state.
    fn import(&mut self) -> Result<(), String>;

    /// Version of the imported module. `None` when it cannot be determined.
    fn version(&mut self) -> Option<String>;
}

/// Drives a [PackageManager] through the bootstrap states.
pub struct Bootstrap<P> {
    manager: P,
    state: BootstrapState,
    readiness: Option<Readiness>,
}

impl<P: PackageManager> Bootstrap<P> {
    pub fn new(manager: P) -> Self {
        Bootstrap {
            manager,
            state: BootstrapState::NotChecked,
            readiness: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn manager(&self) -> &P {
        &self.manager
    }

    /// Bring the connector to a usable state. Once ready, further calls return immediately.
    pub fn ensure_ready(&mut self) -> Result<Readiness, BootstrapError> {
        if let Some(readiness) = &self.readiness {
            return Ok(readiness.clone());
        }

        let mut readiness = Readiness {
            version: None,
            installed: false,
            upgraded: false,
        };

        let available = self.manager.is_available().unwrap_or(false);
        if !available {
            self.state = BootstrapState::Installing;
            log::info!("snowflake connector not found, installing {PACKAGE}");

            self.manager.install().map_err(BootstrapError::Install)?;
            readiness.installed = true;
        }
        self.manager.import().map_err(BootstrapError::Import)?;

        self.state = BootstrapState::VersionChecking;
        readiness.version = self.manager.version();

        match &readiness.version {
            None => {
                log::warn!("cannot determine the version of the snowflake connector, assuming it is usable");
            }
            Some(found) if ConnectorVersion::parse(found) < ConnectorVersion::minimum() => {
                self.state = BootstrapState::Upgrading;
                log::info!(
                    "snowflake connector {found} is older than {MIN_CONNECTOR_VERSION}, upgrading"
                );

                let found = found.clone();
                self.manager
                    .upgrade()
                    .map_err(|message| BootstrapError::Upgrade {
                        found: found.clone(),
                        message,
                    })?;
                self.manager.import().map_err(BootstrapError::Import)?;

                readiness.upgraded = true;
                readiness.version = self.manager.version().or(Some(found));
            }
            Some(found) => log::debug!("snowflake connector {found} is up to date"),
        }

        self.state = BootstrapState::Ready;
        self.readiness = Some(readiness.clone());
        Ok(readiness)
    }
}

/// Numeric components of a version string.
///
/// Build metadata after `+` is dropped and each component is read up to its
/// first non-digit, so `2.7.4rc1+local` reads as `2.7.4`.
#[derive(Debug, Clone)]
pub struct ConnectorVersion(Vec<u64>);

impl ConnectorVersion {
    pub fn parse(version: &str) -> Self {
        let version = version.trim();
        let release = version.split('+').next().unwrap_or_default();

        let components = release
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect();
        ConnectorVersion(components)
    }

    pub fn minimum() -> Self {
        Self::parse(MIN_CONNECTOR_VERSION)
    }

    fn component(&self, i: usize) -> u64 {
        self.0.get(i).copied().unwrap_or(0)
    }
}

impl PartialEq for ConnectorVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for ConnectorVersion {}

impl PartialOrd for ConnectorVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConnectorVersion {
    // missing components count as zero, so 2.8 == 2.8.0
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for ConnectorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// [PackageManager] that runs `pip` with the Python interpreter used by the bridge.
#[derive(Debug, Clone)]
pub struct PipPackageManager {
    python: PathBuf,
}

impl PipPackageManager {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        PipPackageManager {
            python: python.into(),
        }
    }

    /// Use the interpreter found by [find_python].
    pub fn discover() -> Result<Self, BridgeError> {
        Ok(Self::new(find_python()?))
    }

    fn run(&self, args: &[&str]) -> Result<String, String> {
        log::debug!("running {} {}", self.python.display(), args.join(" "));

        let output = Command::new(&self.python)
            .args(args)
            .output()
            .map_err(|e| format!("cannot run {}: {e}", self.python.display()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("{} ({})", stderr.trim(), output.status))
        }
    }
}

impl PackageManager for PipPackageManager {
    fn is_available(&mut self) -> Result<bool, String> {
        let found = self.run(&[
            "-c",
            "import importlib.util; print(importlib.util.find_spec('snowflake.connector') is not None)",
        ]);
        // find_spec raises when the parent package is missing
        Ok(matches!(found.as_deref(), Ok("True")))
    }

    fn install(&mut self) -> Result<(), String> {
        let requirement = format!("{PACKAGE}>={MIN_CONNECTOR_VERSION}");
        self.run(&["-m", "pip", "install", &requirement]).map(drop)
    }

    fn upgrade(&mut self) -> Result<(), String> {
        self.run(&["-m", "pip", "install", "--upgrade", "--force-reinstall", PACKAGE])
            .map(drop)
    }

    fn import(&mut self) -> Result<(), String> {
        self.run(&[
            "-c",
            "import importlib; importlib.invalidate_caches(); import snowflake.connector",
        ])
        .map(drop)
    }

    fn version(&mut self) -> Option<String> {
        self.run(&[
            "-c",
            "import snowflake.connector; print(snowflake.connector.__version__)",
        ])
        .ok()
        .filter(|v| !v.is_empty())
    }
}
