//! Thin convenience layer over `Host` that picks an error surfacing style.
//! The core always returns explicit results; only this layer reads the
//! configured `ErrorMode`.

use anyhow::Result;

use crate::config::{BridgeConfig, ErrorMode};
use crate::host::Host;

pub struct Session {
    host: Host,
    mode: ErrorMode,
    collected: Vec<String>,
}

impl Session {
    pub fn new(config: BridgeConfig) -> Self {
        let mode = config.error_mode;
        Self { host: Host::new(config), mode, collected: Vec::new() }
    }

    pub fn from_host(host: Host, mode: ErrorMode) -> Self {
        Self { host, mode, collected: Vec::new() }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    /// Evaluates `script`. In fail-fast mode errors return immediately; in
    /// collect mode they are recorded and the result is empty.
    pub fn eval(&mut self, script: &str) -> Result<String> {
        match self.host.eval(script) {
            Ok(result) => Ok(result),
            Err(err) => match self.mode {
                ErrorMode::FailFast => Err(err),
                ErrorMode::Collect => {
                    self.collected.push(format!("{err:#}"));
                    Ok(String::new())
                }
            },
        }
    }

    /// Errors recorded so far in collect mode, oldest first.
    pub fn errors(&self) -> &[String] {
        &self.collected
    }

    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.collected)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.host.last_error()
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.host.finalize()
    }
}
