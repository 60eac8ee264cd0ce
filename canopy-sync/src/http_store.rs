//! HTTP remote store.
//!
//! Talks JSON to a workspace master:
//!
//! ```text
//! GET    <base>/projects              -> [ProjectConfig]
//! POST   <base>/projects              <- ProjectConfig
//! PUT    <base>/projects              <- ProjectConfig
//! DELETE <base>/projects?path=<path>
//! ```
//!
//! Every request is bounded by the agent-level timeout.

use std::time::Duration;

use canopy_core::{ProjectConfig, ProjectError, ProjectPath, RemoteStore};

use crate::error::SyncError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpRemoteStore {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: format!("{}/projects", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call(
        &self,
        method: &'static str,
        request: Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, SyncError> {
        request.map_err(|e| match e {
            ureq::Error::Status(status, response) => SyncError::Status {
                method,
                url: self.endpoint.clone(),
                status,
                message: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => SyncError::Transport {
                method,
                url: self.endpoint.clone(),
                message: t.to_string(),
            },
        })
    }
}

impl RemoteStore for HttpRemoteStore {
    fn list(&self) -> Result<Vec<ProjectConfig>, ProjectError> {
        let response = self.call("GET", self.agent.get(&self.endpoint).call())?;
        let body = response.into_string().map_err(|e| SyncError::Transport {
            method: "GET",
            url: self.endpoint.clone(),
            message: e.to_string(),
        })?;
        Ok(serde_json::from_str(&body).map_err(SyncError::from)?)
    }

    fn add(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        tracing::debug!(path = %config.path, "remote add");
        self.call("POST", self.agent.post(&self.endpoint).send_json(config))?;
        Ok(())
    }

    fn update(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        tracing::debug!(path = %config.path, "remote update");
        self.call("PUT", self.agent.put(&self.endpoint).send_json(config))?;
        Ok(())
    }

    fn remove(&self, path: &ProjectPath) -> Result<(), ProjectError> {
        tracing::debug!(path = %path, "remote remove");
        self.call(
            "DELETE",
            self.agent
                .delete(&self.endpoint)
                .query("path", path.as_str())
                .call(),
        )?;
        Ok(())
    }
}
