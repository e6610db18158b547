// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while building a [`crate::Config`] or the HTTP client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DD_API_KEY environment variable is not set")]
    MissingApiKey,

    #[error("intake URL must not be empty")]
    MissingIntakeUrl,

    #[error("invalid intake URL: {0}")]
    InvalidIntakeUrl(String),

    #[error("API key is not a valid header value")]
    InvalidApiKey,

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("concurrent request limit must be at least 1")]
    InvalidConcurrency,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// The only producer-facing failure: the forwarder was stopped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForwardError {
    #[error("forwarder is shut down")]
    Shutdown,
}

/// Failures while shipping one batch. Terminal for the batch either way:
/// the caller logs and discards, it never retries or requeues.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// The payload could not be constructed (JSON or gzip failure).
    #[error("failed to prepare payload: {0}")]
    Payload(String),

    /// The request failed in transport, or the intake answered with a
    /// status other than 202.
    #[error("destination error (status {status:?}): {message}")]
    Destination {
        status: Option<StatusCode>,
        message: String,
    },
}
