// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing forwarder handle and the dispatch task behind it.
//!
//! One dispatch task is the only drainer of the buffer. It sleeps until a
//! producer fills the buffer to capacity, drains everything into one batch,
//! waits for an in-flight permit, and ships the batch on its own task with
//! the permit moved in. Batches already in flight when [`Forwarder::stop`]
//! is called run to completion; buffered records that were never drained are
//! dropped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::buffer::RecordBuffer;
use crate::config::Config;
use crate::errors::{ConfigError, ForwardError, ShippingError};
use crate::intake::LogsApi;
use crate::record::Record;

/// Destination for drained batches. [`LogsApi`] is the production
/// implementation; tests substitute their own.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn ship(&self, batch: &[Record]) -> Result<(), ShippingError>;
}

struct Inner {
    buffer: RecordBuffer,
    wake: Notify,
    shutdown: CancellationToken,
    /// Counting permits bounding concurrently in-flight batches.
    in_flight: Arc<Semaphore>,
}

/// Cloneable handle over the running pipeline.
///
/// Batches sent concurrently may reach the intake out of order; within one
/// batch, records keep their submission order.
#[derive(Clone)]
pub struct Forwarder {
    inner: Arc<Inner>,
}

impl Forwarder {
    /// Builds the intake client from `config` and starts the dispatch task.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Result<Forwarder, ConfigError> {
        let api = LogsApi::new(&config)?;
        Forwarder::with_sink(config, Arc::new(api))
    }

    /// Starts the pipeline with a caller-supplied batch destination.
    pub fn with_sink(config: Config, sink: Arc<dyn BatchSink>) -> Result<Forwarder, ConfigError> {
        config.validate()?;

        let inner = Arc::new(Inner {
            buffer: RecordBuffer::new(config.max_batch_size),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            in_flight: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        });
        tokio::spawn(dispatch_loop(Arc::clone(&inner), sink));

        Ok(Forwarder { inner })
    }

    /// Enqueues one record, awaiting while the buffer is full. When the
    /// enqueue fills the buffer to capacity the dispatch task is woken
    /// immediately. Fails once the forwarder has been stopped.
    pub async fn submit(&self, record: Record) -> Result<(), ForwardError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ForwardError::Shutdown);
        }

        let filled = self.inner.buffer.push(record).await?;
        if filled {
            self.inner.wake.notify_one();
        }
        Ok(())
    }

    /// Submits records in order. Not atomic: a shutdown partway through
    /// leaves the already-submitted prefix enqueued.
    pub async fn submit_many(
        &self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<(), ForwardError> {
        for record in records {
            self.submit(record).await?;
        }
        Ok(())
    }

    /// Stops the dispatch task and wakes blocked producers. Buffered records
    /// that were never drained are dropped; in-flight batches complete.
    pub fn stop(&self) {
        debug!("stopping forwarder");
        self.inner.shutdown.cancel();
        self.inner.buffer.close();
    }

    pub fn is_running(&self) -> bool {
        !self.inner.shutdown.is_cancelled()
    }
}

async fn dispatch_loop(inner: Arc<Inner>, sink: Arc<dyn BatchSink>) {
    debug!("dispatch task started");

    loop {
        tokio::select! {
            () = inner.wake.notified() => {}
            () = inner.shutdown.cancelled() => break,
        }

        let batch = inner.buffer.drain();
        if batch.is_empty() {
            // Spurious wake; nothing arrived since the last drain.
            debug!("woken with an empty buffer");
            continue;
        }

        // Admission control: wait for a free in-flight slot rather than drop
        // the batch. Cancellation wins the race so nothing new is admitted
        // once shutdown begins.
        let permit = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => break,
            permit = Arc::clone(&inner.in_flight).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            match sink.ship(&batch).await {
                Ok(()) => debug!("shipped batch of {} records", batch.len()),
                Err(err) => error!("dropping batch of {} records: {err}", batch.len()),
            }
            drop(permit);
        });
    }

    debug!("dispatch task stopped");
}
