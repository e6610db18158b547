// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;

use crate::errors::ConfigError;

/// Default number of records wrapped in one intake request.
const DEFAULT_BATCH_SIZE: usize = 400;
/// Default number of concurrently in-flight intake requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 3;

fn logs_intake_url(site: &str) -> String {
    format!("https://http-intake.logs.{site}/api/v2/logs")
}

/// Immutable forwarder configuration, fixed for the lifetime of a
/// [`crate::Forwarder`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Full logs intake URL the forwarder POSTs to.
    pub intake_url: String,
    /// API key sent as the `DD-API-KEY` header. May be empty; an empty key
    /// is sent as an empty header value.
    pub api_key: String,
    /// Buffer capacity: how many records accumulate before a batch ships.
    pub max_batch_size: usize,
    /// Upper bound on concurrently in-flight intake requests.
    pub max_concurrent_requests: usize,
}

impl Config {
    pub fn new(
        intake_url: impl Into<String>,
        api_key: impl Into<String>,
        max_batch_size: usize,
        max_concurrent_requests: usize,
    ) -> Result<Config, ConfigError> {
        let config = Config {
            intake_url: intake_url.into(),
            api_key: api_key.into(),
            max_batch_size,
            max_concurrent_requests,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from the environment.
    ///
    /// `DD_API_KEY` is required. The intake URL is derived from `DD_SITE`
    /// (default `datadoghq.com`); `DD_LOGS_DD_URL` overrides the entire URL
    /// and is primarily used for integration tests. Batch size and request
    /// concurrency come from `DD_FORWARDER_BATCH_SIZE` and
    /// `DD_FORWARDER_CONCURRENT_REQUESTS`, falling back to the defaults when
    /// unset or unparsable.
    pub fn from_env() -> Result<Config, ConfigError> {
        let api_key = env::var("DD_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;

        let dd_site = env::var("DD_SITE").unwrap_or_else(|_| "datadoghq.com".to_string());
        let intake_url = match env::var("DD_LOGS_DD_URL") {
            Ok(url) => url,
            Err(_) => logs_intake_url(&dd_site),
        };

        let max_batch_size = env::var("DD_FORWARDER_BATCH_SIZE")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE);
        let max_concurrent_requests = env::var("DD_FORWARDER_CONCURRENT_REQUESTS")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS);

        Config::new(intake_url, api_key, max_batch_size, max_concurrent_requests)
    }

    /// A batch size or concurrency bound of zero would wedge the pipeline;
    /// both must be at least 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intake_url.is_empty() {
            return Err(ConfigError::MissingIntakeUrl);
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}
