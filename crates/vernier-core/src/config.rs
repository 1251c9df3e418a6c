//! Runtime configuration.
//!
//! Two knobs, both overridable through the environment:
//!
//! | Key | Variable | Default | Effect |
//! |---|---|---|---|
//! | `node_pool_size` | `VERNIER_NODE_POOL_SIZE` | `100` | Initial node-vector capacity. |
//! | `output` | `VERNIER_OUTPUT` | `csv` | Writer service for `write_metadata`; `none` disables output. |
//!
//! Malformed overrides fall back to the default with a warning rather than
//! failing startup.

use serde::{Deserialize, Serialize};

/// Environment variable overriding `node_pool_size`.
pub const ENV_NODE_POOL_SIZE: &str = "VERNIER_NODE_POOL_SIZE";

/// Environment variable overriding `output`.
pub const ENV_OUTPUT: &str = "VERNIER_OUTPUT";

const DEFAULT_NODE_POOL_SIZE: usize = 100;
const DEFAULT_OUTPUT: &str = "csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Initial capacity reserved in the node vector.
    pub node_pool_size: usize,
    /// Name of the writer service used by `write_metadata`.
    pub output: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            node_pool_size: DEFAULT_NODE_POOL_SIZE,
            output: DEFAULT_OUTPUT.to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overlaid with any `VERNIER_*` environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::overlay(
            std::env::var(ENV_NODE_POOL_SIZE).ok().as_deref(),
            std::env::var(ENV_OUTPUT).ok().as_deref(),
        )
    }

    fn overlay(node_pool_size: Option<&str>, output: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = node_pool_size {
            match raw.parse::<usize>() {
                Ok(size) => config.node_pool_size = size,
                Err(_) => {
                    tracing::warn!(
                        target: "vernier.runtime",
                        value = raw,
                        "ignoring malformed node pool size override"
                    );
                }
            }
        }
        if let Some(name) = output {
            config.output = name.to_owned();
        }
        config
    }
}
