//! Blocking HTTP client for the DTU live endpoint.

#![allow(missing_docs)]

use std::time::Duration;

use serde_json::Value;

use crate::analysis::decode::parse_document;
use crate::core::config::PollerConfig;
use crate::core::errors::{Result, TachoError};

/// GETs the live record and parses the JSON body.
#[derive(Debug, Clone)]
pub struct LiveClient {
    agent: ureq::Agent,
    url: String,
}

impl LiveClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.into(),
        }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(config.live_url(), config.timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One request. Anything but HTTP 200 with a JSON body is an error.
    pub fn fetch(&self) -> Result<Value> {
        let response = match self.agent.get(&self.url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(TachoError::HttpStatus {
                    url: self.url.clone(),
                    status,
                });
            }
            Err(error) => {
                return Err(TachoError::Http {
                    url: self.url.clone(),
                    details: error.to_string(),
                });
            }
        };

        let status = response.status();
        if status != 200 {
            return Err(TachoError::HttpStatus {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.into_string().map_err(|error| TachoError::Http {
            url: self.url.clone(),
            details: format!("reading body failed: {error}"),
        })?;
        parse_document(&body).map_err(|error| TachoError::Http {
            url: self.url.clone(),
            details: format!("invalid JSON body: {error}"),
        })
    }
}
