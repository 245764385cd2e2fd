use std::{fs, path::Path, time::Duration};

use comms::specs::{DegeneracyPolicy, ModelSpec, OperatorSpec};
use serde::{Deserialize, Serialize};

use crate::{
    coordinator::RoundPlan,
    error::{CoordinatorError, Result},
};

/// The coordinator's configuration, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// `host:port` of every worker, the order defines the worker ids.
    pub worker_addrs: Vec<String>,
    pub operator: OperatorSpec,
    pub model: ModelSpec,
    /// The observed counts, one per operator row. Every count is one when absent.
    #[serde(default)]
    pub counts: Option<ModelSpec>,
    #[serde(default)]
    pub degeneracy: DegeneracyPolicy,
    /// Upper bound for each round phase in milliseconds.
    #[serde(default)]
    pub phase_timeout_ms: Option<u64>,
}

impl CoordinatorConfig {
    /// Reads and validates a JSON configuration file.
    ///
    /// # Arguments
    /// * `path` - The path of the file.
    ///
    /// # Errors
    /// Returns `CoordinatorError::Configuration` if the file can't be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CoordinatorError::Configuration(format!("couldn't read {}: {e}", path.display()))
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| {
            CoordinatorError::Configuration(format!("invalid config {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration before anything is connected.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(CoordinatorError::Configuration(msg.to_string()));

        if self.worker_addrs.is_empty() {
            return invalid("at least one worker address is required");
        }

        if self.phase_timeout_ms == Some(0) {
            return invalid("phase_timeout_ms must be positive");
        }

        match self.degeneracy {
            DegeneracyPolicy::Background { value } if !(value.is_finite() && value >= 0.) => {
                invalid("the background value must be finite and non negative")
            }
            _ => Ok(()),
        }
    }

    /// The per round settings handed to the `Coordinator`.
    pub fn round_plan(&self) -> RoundPlan {
        RoundPlan {
            operator: self.operator.clone(),
            degeneracy: self.degeneracy,
            phase_timeout: self.phase_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "worker_addrs": ["worker-0:50000", "worker-1:50000"],
        "operator": { "diagonal": { "rows": 4, "cols": 4, "value": 2.0 } },
        "model": { "ramp": { "len": 4 } }
    }"#;

    #[test]
    fn defaults() {
        let config: CoordinatorConfig = serde_json::from_str(CONFIG).unwrap();

        assert_eq!(config.worker_addrs.len(), 2);
        assert_eq!(config.degeneracy, DegeneracyPolicy::Flag);
        assert_eq!(config.phase_timeout_ms, None);
        assert_eq!(config.model, ModelSpec::Ramp { len: 4 });
        assert_eq!(config.counts, None);
        config.validate().unwrap();
    }

    #[test]
    fn background_and_timeout() {
        let json = r#"{
            "worker_addrs": ["127.0.0.1:50000"],
            "operator": { "file": { "path": "/data/response.safetensors" } },
            "model": { "ones": { "len": 4 } },
            "counts": { "inline": { "values": [1.0, 0.0, 3.0, 2.0] } },
            "degeneracy": { "background": { "value": 0.001 } },
            "phase_timeout_ms": 2500
        }"#;
        let config: CoordinatorConfig = serde_json::from_str(json).unwrap();
        let plan = config.round_plan();

        assert!(matches!(config.counts, Some(ModelSpec::Inline { ref values }) if values.len() == 4));
        assert_eq!(plan.degeneracy.background(), 0.001);
        assert_eq!(plan.phase_timeout, Some(Duration::from_millis(2500)));
        assert!(matches!(
            plan.operator,
            OperatorSpec::File { ref tensor, .. } if tensor == "response_matrix"
        ));
    }

    #[test]
    fn empty_worker_list_is_rejected() {
        let mut config: CoordinatorConfig = serde_json::from_str(CONFIG).unwrap();
        config.worker_addrs.clear();

        assert!(matches!(
            config.validate(),
            Err(CoordinatorError::Configuration(_))
        ));
    }

    #[test]
    fn negative_background_is_rejected() {
        let mut config: CoordinatorConfig = serde_json::from_str(CONFIG).unwrap();
        config.degeneracy = DegeneracyPolicy::Background { value: -1. };

        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file() {
        let ret = CoordinatorConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(ret, Err(CoordinatorError::Configuration(_))));
    }
}
