use crate::data::{ConsistencyLevel, Policy};
use humantime::Duration as HumanDuration;
use std::{fs::read_to_string, time::Duration};

/// Node configuration, usually loaded from a YAML file via [`Node::from_file`].
/// Duration-like fields are stored in humantime form and parsed by the
/// accessors; loading validates the config, so the accessors may assume it.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Node {
    backends: Vec<String>,
    local_address: Option<String>,
    #[serde(default = "Node::default_read_consistency")]
    default_read_consistency: String,
    #[serde(default = "Node::default_write_consistency")]
    default_write_consistency: String,
    #[serde(default = "Node::default_operation_timeout")]
    operation_timeout: String,
    #[serde(default)]
    policies: Vec<String>,
}

impl Node {
    fn default_read_consistency() -> String {
        "majority".to_string()
    }

    fn default_write_consistency() -> String {
        "all".to_string()
    }

    fn default_operation_timeout() -> String {
        "500ms".to_string()
    }

    /// Loads and validates a node config from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = read_to_string(path)
            .map_err(|e| format!("failed to read node config {}: {}", path, e))?;
        Self::from_yaml(&contents)
    }

    /// Parses and validates a node config from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            debug!("node config does not parse: {}", e);
            format!("node config does not parse: {}", e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backends.is_empty() {
            let msg = "node config lists no backends".to_string();
            error!("{}", msg);
            return Err(msg);
        }

        if self.backends.iter().any(|address| address.is_empty()) {
            return Err("node config lists a backend with an empty address".to_string());
        }

        if let Some(local) = &self.local_address {
            if !self.backends.contains(local) {
                return Err(format!(
                    "local_address {} is not one of the configured backends",
                    local
                ));
            }
        }

        Self::check_default_level("default_read_consistency", &self.default_read_consistency)?;
        Self::check_default_level("default_write_consistency", &self.default_write_consistency)?;

        if let Err(e) = self.operation_timeout.parse::<HumanDuration>() {
            return Err(format!(
                "operation_timeout {} does not parse: {}",
                self.operation_timeout, e
            ));
        }

        for policy in &self.policies {
            if let Err(e) = policy.parse::<Policy>() {
                return Err(e);
            }
        }

        Ok(())
    }

    fn check_default_level(field: &str, level: &str) -> Result<(), String> {
        match level.parse::<ConsistencyLevel>() {
            Ok(ConsistencyLevel::Default) => {
                Err(format!("{} must name a concrete consistency level", field))
            }
            Ok(_) => Ok(()),
            Err(e) => Err(format!("{} does not parse: {}", field, e)),
        }
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    pub fn read_consistency(&self) -> ConsistencyLevel {
        self.default_read_consistency
            .parse()
            .expect("parse consistency level")
    }

    pub fn write_consistency(&self) -> ConsistencyLevel {
        self.default_write_consistency
            .parse()
            .expect("parse consistency level")
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
            .parse::<HumanDuration>()
            .expect("parse humantime duration")
            .into()
    }

    pub fn policies(&self) -> Vec<Policy> {
        self.policies
            .iter()
            .map(|policy| policy.parse().expect("parse policy"))
            .collect()
    }
}
