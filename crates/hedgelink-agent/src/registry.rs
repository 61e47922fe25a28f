use std::collections::HashMap;

use hedgelink_core::AgentEndpoint;

/// Process-wide table of configured agents: stable name → base URL.
///
/// Built once from configuration at startup; never mutated afterwards, so
/// lookups need no locking.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    endpoints: Vec<AgentEndpoint>,
    by_name: HashMap<String, String>,
}

impl AgentRegistry {
    pub fn from_config(agents: &[AgentEndpoint]) -> Self {
        let by_name = agents
            .iter()
            .map(|a| (a.name.clone(), a.url.trim_end_matches('/').to_string()))
            .collect();
        Self {
            endpoints: agents.to_vec(),
            by_name,
        }
    }

    /// Base URL for `name`, without a trailing slash.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// All configured endpoints, in configuration order.
    pub fn endpoints(&self) -> &[AgentEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::from_config(&[
            AgentEndpoint {
                name: "vps1".into(),
                url: "http://vps1:9100/".into(),
            },
            AgentEndpoint {
                name: "vps2".into(),
                url: "http://vps2:9100".into(),
            },
        ])
    }

    #[test]
    fn resolves_known_names_and_strips_trailing_slash() {
        let r = registry();
        assert_eq!(r.resolve("vps1"), Some("http://vps1:9100"));
        assert_eq!(r.resolve("vps2"), Some("http://vps2:9100"));
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(registry().resolve("vps9"), None);
    }
}
