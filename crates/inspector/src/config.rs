//! Inspector session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to the handles of a subtree removed from the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetachedNodePolicy {
    /// Move the bound subtree into a dangling map, handles unchanged
    #[default]
    Retain,
    /// Unbind the subtree; its handles stop resolving
    Discard,
}

/// Per-session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Delay between two search ticks
    #[serde(with = "millis")]
    pub search_tick_interval: Duration,

    /// How many recently inspected handles are remembered
    pub max_inspected_nodes: usize,

    /// Depth the document is described with when it is first pushed
    pub document_push_depth: u32,

    pub detached_node_policy: DetachedNodePolicy,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            search_tick_interval: Duration::from_millis(25),
            max_inspected_nodes: 5,
            document_push_depth: 2,
            detached_node_policy: DetachedNodePolicy::Retain,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: InspectorConfig = serde_json::from_str(
            r#"{ "search_tick_interval": 5, "detached_node_policy": "discard" }"#,
        )
        .unwrap();

        assert_eq!(config.search_tick_interval, Duration::from_millis(5));
        assert_eq!(config.detached_node_policy, DetachedNodePolicy::Discard);
        assert_eq!(config.max_inspected_nodes, 5);
        assert_eq!(config.document_push_depth, 2);
    }
}
