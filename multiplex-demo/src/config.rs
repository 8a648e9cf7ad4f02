//! Minimal demo configuration, loaded from an optional TOML file. The
//! runtime library itself takes no configuration (SPEC_FULL.md §12) — this
//! is just enough for the demo binary to pick scenario parameters without
//! recompiling, mirroring (at a fraction of the scope) the teacher's own
//! `serde`-derived `RuntimeConfig`/`ServiceConfig` pattern.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Delay before the Shutdown service cascades `"exit"` to the controller.
    pub shutdown_delay_ms: u64,
    /// Run the controller's worker in background mode (spec §4.F `Run`).
    pub background: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            shutdown_delay_ms: 100,
            background: true,
        }
    }
}

impl DemoConfig {
    pub async fn load(path: Option<String>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
