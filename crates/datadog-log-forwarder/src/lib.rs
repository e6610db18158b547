// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded batching-and-forwarding pipeline for the Datadog logs intake.
//!
//! Producers submit individual log records through a [`forwarder::Forwarder`].
//! Records accumulate in a bounded in-memory buffer; when the buffer fills, a
//! dispatch task drains it into a batch, gzip-compresses the batch as a JSON
//! array of intake entries, and POSTs it to the configured intake URL. At most
//! a configured number of batches are in flight at once. Delivery is
//! best-effort: failed batches are logged and discarded, and records still
//! buffered when the forwarder stops are dropped.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod config;
pub mod errors;
pub mod forwarder;
pub mod intake;
pub mod record;

pub use config::Config;
pub use errors::{ConfigError, ForwardError, ShippingError};
pub use forwarder::{BatchSink, Forwarder};
pub use intake::LogsApi;
pub use record::Record;
