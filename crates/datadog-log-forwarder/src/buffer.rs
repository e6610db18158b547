// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO between producers and the dispatch task.
//!
//! Capacity is tracked by a free-slot semaphore: `push` consumes one permit
//! per record (awaiting while the buffer is full) and `drain` returns as many
//! permits as records it removed. Producers only ever append; the dispatch
//! task is the single drainer.

use std::sync::Mutex;

use tokio::sync::Semaphore;

use crate::errors::ForwardError;
use crate::record::Record;

pub struct RecordBuffer {
    capacity: usize,
    /// Free-slot permits; zero available means the buffer is full.
    slots: Semaphore,
    queue: Mutex<Vec<Record>>,
}

impl RecordBuffer {
    pub fn new(capacity: usize) -> Self {
        RecordBuffer {
            capacity,
            slots: Semaphore::new(capacity),
            queue: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Appends one record, awaiting while the buffer is full. Returns `true`
    /// when this enqueue filled the buffer to exactly its capacity, i.e. the
    /// caller should wake the dispatch task. Fails only after [`close`].
    ///
    /// [`close`]: RecordBuffer::close
    pub async fn push(&self, record: Record) -> Result<bool, ForwardError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| ForwardError::Shutdown)?;
        // The slot stays consumed until drain hands it back.
        permit.forget();

        #[allow(clippy::expect_used)]
        let mut queue = self.queue.lock().expect("lock poisoned");
        queue.push(record);
        Ok(queue.len() == self.capacity)
    }

    /// Atomically removes and returns every queued record, oldest first.
    /// Never blocks; returns an empty batch when nothing is queued.
    pub fn drain(&self) -> Vec<Record> {
        #[allow(clippy::expect_used)]
        let batch = std::mem::take(&mut *self.queue.lock().expect("lock poisoned"));
        if !batch.is_empty() {
            self.slots.add_permits(batch.len());
        }
        batch
    }

    /// Wakes every producer blocked in [`push`] with a shutdown error.
    /// Records already queued stay queued.
    ///
    /// [`push`]: RecordBuffer::push
    pub fn close(&self) {
        self.slots.close();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tokio::time::{timeout, Duration};

    use super::RecordBuffer;
    use crate::errors::ForwardError;
    use crate::record::Record;

    fn record(seq: u64) -> Record {
        Record::new().with_field("seq", seq)
    }

    fn seq(record: &Record) -> u64 {
        record.get("seq").and_then(|v| v.as_u64()).unwrap()
    }

    #[tokio::test]
    async fn drain_returns_records_in_fifo_order() {
        let buffer = RecordBuffer::new(8);
        for i in 0..5 {
            buffer.push(record(i)).await.unwrap();
        }

        let batch = buffer.drain();
        let order = batch.iter().map(seq).collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn drain_leaves_buffer_empty() {
        let buffer = RecordBuffer::new(4);
        buffer.push(record(1)).await.unwrap();
        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.drain().is_empty());
    }

    #[tokio::test]
    async fn push_reports_filled_to_capacity() {
        let buffer = RecordBuffer::new(2);
        assert!(!buffer.push(record(1)).await.unwrap());
        assert!(buffer.push(record(2)).await.unwrap());

        buffer.drain();
        assert!(!buffer.push(record(3)).await.unwrap());
    }

    #[tokio::test]
    async fn push_blocks_while_full_until_drained() {
        let buffer = Arc::new(RecordBuffer::new(1));
        buffer.push(record(1)).await.unwrap();

        let blocked = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move { buffer.push(record(2)).await })
        };

        // Full buffer: the push must not complete yet.
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        let batch = buffer.drain();
        assert_eq!(batch.len(), 1);

        timeout(Duration::from_secs(1), blocked)
            .await
            .expect("push should unblock after drain")
            .unwrap()
            .unwrap();
        assert_eq!(buffer.drain().len(), 1);
    }

    #[tokio::test]
    async fn close_wakes_blocked_producer_with_shutdown() {
        let buffer = Arc::new(RecordBuffer::new(1));
        buffer.push(record(1)).await.unwrap();

        let blocked = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move { buffer.push(record(2)).await })
        };
        tokio::task::yield_now().await;

        buffer.close();
        let res = timeout(Duration::from_secs(1), blocked)
            .await
            .expect("close should unblock the producer")
            .unwrap();
        assert_eq!(res, Err(ForwardError::Shutdown));
    }

    #[tokio::test]
    async fn concurrent_producers_lose_and_duplicate_nothing() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 25;

        let buffer = Arc::new(RecordBuffer::new(10));
        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let buffer = Arc::clone(&buffer);
            producers.push(tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    buffer.push(record(p * PER_PRODUCER + i)).await.unwrap();
                }
            }));
        }

        let mut seen = Vec::new();
        while seen.len() < (PRODUCERS * PER_PRODUCER) as usize {
            seen.extend(buffer.drain().iter().map(seq));
            tokio::task::yield_now().await;
        }
        for producer in producers {
            producer.await.unwrap();
        }
        assert!(buffer.drain().is_empty());

        let distinct = seen.iter().copied().collect::<HashSet<_>>();
        assert_eq!(seen.len(), (PRODUCERS * PER_PRODUCER) as usize);
        assert_eq!(distinct.len(), seen.len());
    }
}
