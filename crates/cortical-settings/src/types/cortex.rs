//! Per-cortex settings.

use serde::{Deserialize, Serialize};

/// Which cortexes are instantiated per session, and their parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CortexSettings {
    /// Cortex names, in the order they are instantiated.
    pub enabled: Vec<String>,
    /// Timer-driven `ping` producer.
    pub ping: PingSettings,
    /// Random-delay `dummy` cortex.
    pub dummy: DummySettings,
    /// Frame-archiving `memory` cortex.
    pub memory: MemorySettings,
    /// Remote inference `classifier` cortex.
    pub classifier: ClassifierSettings,
}

impl Default for CortexSettings {
    fn default() -> Self {
        Self {
            enabled: vec!["echo".to_string()],
            ping: PingSettings::default(),
            dummy: DummySettings::default(),
            memory: MemorySettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

/// `ping` cortex settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PingSettings {
    /// Delay between two pings.
    pub interval_ms: u64,
    /// Payload of each ping.
    pub payload: String,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            payload: "ping".to_string(),
        }
    }
}

/// `dummy` cortex settings. A delay is drawn from `[min_ms, max_ms)` once per session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DummySettings {
    /// Inclusive lower bound.
    pub min_ms: u64,
    /// Exclusive upper bound.
    pub max_ms: u64,
}

impl Default for DummySettings {
    fn default() -> Self {
        Self {
            min_ms: 1_000,
            max_ms: 1_500,
        }
    }
}

/// `memory` cortex settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorySettings {
    /// Root directory for archived frames; one subdirectory per session.
    pub path: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            path: "/tmp/training".to_string(),
        }
    }
}

/// `classifier` cortex settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    /// Inference endpoint receiving the raw image as the request body.
    pub url: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Content type of the frames forwarded to the endpoint.
    pub content_type: String,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8501/v1/classify".to_string(),
            timeout_ms: 10_000,
            content_type: "image/jpeg".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_echo_only() {
        assert_eq!(CortexSettings::default().enabled, vec!["echo".to_string()]);
    }

    #[test]
    fn dummy_defaults_match_demo_range() {
        let d = DummySettings::default();
        assert_eq!(d.min_ms, 1_000);
        assert_eq!(d.max_ms, 1_500);
    }

    #[test]
    fn classifier_defaults() {
        let c = ClassifierSettings::default();
        assert_eq!(c.content_type, "image/jpeg");
        assert_eq!(c.timeout_ms, 10_000);
    }

    #[test]
    fn nested_partial_override() {
        let parsed: CortexSettings =
            serde_json::from_str(r#"{"ping": {"intervalMs": 250}}"#).unwrap();
        assert_eq!(parsed.ping.interval_ms, 250);
        assert_eq!(parsed.ping.payload, "ping");
        assert_eq!(parsed.memory.path, "/tmp/training");
    }
}
