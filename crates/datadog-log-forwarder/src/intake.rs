// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logs intake client: turns a drained batch into one gzip-compressed JSON
//! array of intake entries and POSTs it to the configured URL.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Serialize;

use crate::config::Config;
use crate::errors::{ConfigError, ShippingError};
use crate::forwarder::BatchSink;
use crate::record::Record;

/// Source and service identifier stamped on every intake entry.
const FORWARDER_SOURCE: &str = "cportal";

/// Connect and request timeout for intake requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(6);

const DD_API_KEY_HEADER: &str = "DD-API-KEY";

/// One element of the JSON array the intake receives per batch.
#[derive(Debug, Serialize)]
struct IntakeEntry {
    ddsource: &'static str,
    ddtags: String,
    hostname: String,
    message: String,
    service: &'static str,
}

fn tag_field(record: &Record, name: &str) -> String {
    record.str_field(name).unwrap_or_default().to_string()
}

fn build_entry(record: &Record) -> Result<IntakeEntry, ShippingError> {
    let vdom = tag_field(record, "vdom");
    let lb_partition = tag_field(record, "lb_partition");
    let log_type = tag_field(record, "log_type");

    let message =
        serde_json::to_string(record).map_err(|err| ShippingError::Payload(err.to_string()))?;

    Ok(IntakeEntry {
        ddsource: FORWARDER_SOURCE,
        ddtags: format!("vdom:{vdom},lb_partition:{lb_partition},log_type:{log_type}"),
        hostname: tag_field(record, "hostname"),
        message,
        service: FORWARDER_SOURCE,
    })
}

/// Serializes the batch as a JSON array of intake entries and gzips it.
fn encode_batch(batch: &[Record]) -> Result<Vec<u8>, ShippingError> {
    let entries = batch
        .iter()
        .map(build_entry)
        .collect::<Result<Vec<_>, _>>()?;
    let json =
        serde_json::to_vec(&entries).map_err(|err| ShippingError::Payload(err.to_string()))?;

    let mut encoder = GzEncoder::new(
        Vec::with_capacity(json.len() / 2),
        flate2::Compression::default(),
    );
    encoder
        .write_all(&json)
        .map_err(|err| ShippingError::Payload(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| ShippingError::Payload(err.to_string()))
}

/// HTTP client for the logs intake endpoint.
#[derive(Clone)]
pub struct LogsApi {
    client: reqwest::Client,
    intake_url: Url,
    api_key: HeaderValue,
}

impl LogsApi {
    pub fn new(config: &Config) -> Result<LogsApi, ConfigError> {
        let intake_url = Url::parse(&config.intake_url)
            .map_err(|err| ConfigError::InvalidIntakeUrl(err.to_string()))?;
        let api_key =
            HeaderValue::from_str(&config.api_key).map_err(|_| ConfigError::InvalidApiKey)?;

        let client = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(LogsApi {
            client,
            intake_url,
            api_key,
        })
    }

    /// Ships one batch. The intake acknowledges with 202; any other status
    /// or a transport failure is an error and the batch is gone.
    pub async fn ship_logs(&self, batch: &[Record]) -> Result<(), ShippingError> {
        let body = encode_batch(batch)?;

        let response = self
            .client
            .post(self.intake_url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .header(DD_API_KEY_HEADER, self.api_key.clone())
            .body(body)
            .send()
            .await
            .map_err(|err| ShippingError::Destination {
                status: None,
                message: err.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            Ok(())
        } else {
            Err(ShippingError::Destination {
                status: Some(status),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl BatchSink for LogsApi {
    async fn ship(&self, batch: &[Record]) -> Result<(), ShippingError> {
        self.ship_logs(batch).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use serde_json::Value;

    use super::{build_entry, encode_batch};
    use crate::record::Record;

    #[test]
    fn entry_maps_tag_fields_and_wraps_record_as_message() {
        let record = Record::new()
            .with_field("hostname", "h1")
            .with_field("vdom", "v1")
            .with_field("log_type", "app")
            .with_field("extra", "x");

        let entry = build_entry(&record).unwrap();
        assert_eq!(entry.ddsource, "cportal");
        assert_eq!(entry.service, "cportal");
        assert_eq!(entry.ddtags, "vdom:v1,lb_partition:,log_type:app");
        assert_eq!(entry.hostname, "h1");

        let message: Value = serde_json::from_str(&entry.message).unwrap();
        assert_eq!(message["hostname"], "h1");
        assert_eq!(message["vdom"], "v1");
        assert_eq!(message["log_type"], "app");
        assert_eq!(message["extra"], "x");
    }

    #[test]
    fn entry_defaults_missing_and_non_string_tags_to_empty() {
        let record = Record::new().with_field("vdom", 5).with_field("level", 3);

        let entry = build_entry(&record).unwrap();
        assert_eq!(entry.ddtags, "vdom:,lb_partition:,log_type:");
        assert_eq!(entry.hostname, "");

        // The original values still travel inside the message.
        let message: Value = serde_json::from_str(&entry.message).unwrap();
        assert_eq!(message["vdom"], 5);
        assert_eq!(message["level"], 3);
    }

    #[test]
    fn encoded_batch_is_a_gzipped_json_array_in_order() {
        let batch = vec![
            Record::new().with_field("hostname", "first"),
            Record::new().with_field("hostname", "second"),
        ];

        let compressed = encode_batch(&batch).unwrap();
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();

        let entries: Value = serde_json::from_str(&json).unwrap();
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["hostname"], "first");
        assert_eq!(entries[1]["hostname"], "second");
        assert_eq!(entries[0]["ddsource"], "cportal");
    }
}
