// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Handoff of ISP output buffers from the driver to the application.
//!
//! Each client slot owns one [`FrameExchange`]. The driver thread deposits a
//! completed buffer into a one-slot mailbox ("sent"); the application waits
//! for an acknowledgement token ("received"), then for the mailbox, and gets
//! the buffer wrapped in a [`Frame`]. Dropping the frame releases the buffer,
//! refills the ISP output port and hands the token back, so a slot never has
//! more than one buffer outstanding.

use crate::{backend::HardwareBuffer, config::FrameHandle, status::Status};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::{
    error, fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Hands free pool buffers back to the ISP output port.
pub type Refill = Box<dyn Fn() + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The handle addresses a camera whose pipeline was not built
    NotBuilt(FrameHandle),

    /// The driver reported a failed transfer for the delivered buffer
    Delivery { handle: FrameHandle, status: Status },

    /// The exchange channels were closed
    Disconnected(FrameHandle),
}

impl FrameError {
    pub fn handle(&self) -> FrameHandle {
        match self {
            FrameError::NotBuilt(handle) | FrameError::Disconnected(handle) => *handle,
            FrameError::Delivery { handle, .. } => *handle,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameError::NotBuilt(handle) => write!(f, "{} has no built pipeline", handle),
            FrameError::Delivery { handle, status } => {
                write!(f, "{} delivered a failed buffer: {}", handle, status)
            }
            FrameError::Disconnected(handle) => write!(f, "{} exchange disconnected", handle),
        }
    }
}

impl error::Error for FrameError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            FrameError::Delivery { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Buffer counters of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeStats {
    /// Buffers placed in the mailbox
    pub delivered: u64,
    /// Buffers returned unconsumed, replaced by a newer delivery
    pub dropped: u64,
}

pub struct FrameExchange<T: HardwareBuffer> {
    handle: FrameHandle,
    sent_tx: Sender<T>,
    sent_rx: Receiver<T>,
    received_tx: Sender<()>,
    received_rx: Receiver<()>,
    refill: Refill,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl<T: HardwareBuffer> FrameExchange<T> {
    pub fn new(handle: FrameHandle, refill: Refill) -> Self {
        let (sent_tx, sent_rx) = bounded(1);
        let (received_tx, received_rx) = bounded(1);
        // The first fetch needs no prior acknowledgement.
        let _ = received_tx.try_send(());

        FrameExchange {
            handle,
            sent_tx,
            sent_rx,
            received_tx,
            received_rx,
            refill,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> FrameHandle {
        self.handle
    }

    /// Producer side, called from the driver's buffer callback.
    ///
    /// An unconsumed buffer still in the mailbox is replaced, so `fetch`
    /// always sees the newest frame.
    pub fn on_buffer_ready(&self, buffer: T) {
        let buffer = match self.sent_tx.try_send(buffer) {
            Ok(()) => return self.count_delivered(),
            Err(TrySendError::Full(buffer)) => buffer,
            Err(TrySendError::Disconnected(buffer)) => {
                self.discard(buffer);
                return;
            }
        };

        if let Ok(stale) = self.sent_rx.try_recv() {
            log::trace!("{}: replacing unconsumed buffer", self.handle);
            self.discard(stale);
        }
        match self.sent_tx.try_send(buffer) {
            Ok(()) => self.count_delivered(),
            Err(err) => self.discard(err.into_inner()),
        }
    }

    fn count_delivered(&self) {
        let n = self.delivered.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("{}: buffer {} delivered", self.handle, n);
    }

    /// Returns `buffer` to its pool without handing it out.
    fn discard(&self, buffer: T) {
        drop(buffer);
        self.dropped.fetch_add(1, Ordering::Relaxed);
        (self.refill)();
    }

    /// Consumer side. Blocks until this caller holds the slot and a buffer
    /// has been delivered.
    pub fn fetch(&self) -> Result<Frame<'_, T>, FrameError> {
        self.received_rx
            .recv()
            .map_err(|_| FrameError::Disconnected(self.handle))?;

        let buffer = match self.sent_rx.recv() {
            Ok(buffer) => buffer,
            Err(_) => {
                self.acknowledge();
                return Err(FrameError::Disconnected(self.handle));
            }
        };

        let status = buffer.status();
        if !status.is_success() {
            log::error!("{}: delivery failed: {}", self.handle, status);
            drop(buffer);
            (self.refill)();
            self.acknowledge();
            return Err(FrameError::Delivery {
                handle: self.handle,
                status,
            });
        }

        Ok(Frame {
            exchange: self,
            buffer: Some(buffer),
        })
    }

    pub fn stats(&self) -> ExchangeStats {
        ExchangeStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn acknowledge(&self) {
        if self.received_tx.try_send(()).is_err() {
            log::warn!("{}: acknowledgement already pending", self.handle);
        }
    }

    fn give_back(&self, buffer: T) {
        drop(buffer);
        (self.refill)();
        self.acknowledge();
    }
}

impl<T: HardwareBuffer> fmt::Debug for FrameExchange<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FrameExchange")
            .field("handle", &self.handle)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A delivered ISP output buffer, lent to the application.
///
/// Dropping the frame returns the buffer to the hardware.
pub struct Frame<'a, T: HardwareBuffer> {
    exchange: &'a FrameExchange<T>,
    buffer: Option<T>,
}

impl<T: HardwareBuffer> Frame<'_, T> {
    pub fn data(&self) -> &[u8] {
        match &self.buffer {
            Some(buffer) => buffer.data(),
            None => &[],
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.data().as_ptr()
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn pts(&self) -> Option<i64> {
        self.buffer.as_ref().and_then(|buffer| buffer.pts())
    }

    pub fn handle(&self) -> FrameHandle {
        self.exchange.handle
    }
}

impl<T: HardwareBuffer> Drop for Frame<'_, T> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.exchange.give_back(buffer);
        }
    }
}

impl<T: HardwareBuffer> fmt::Debug for Frame<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Frame")
            .field("handle", &self.handle())
            .field("len", &self.len())
            .field("pts", &self.pts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize},
            Arc, Mutex,
        },
        thread,
        time::Duration,
    };

    struct TestBuffer {
        data: Vec<u8>,
        status: Status,
        released: Arc<AtomicUsize>,
    }

    impl TestBuffer {
        fn new(seq: u8, released: &Arc<AtomicUsize>) -> Self {
            TestBuffer {
                data: vec![seq; 16],
                status: Status::SUCCESS,
                released: released.clone(),
            }
        }
    }

    impl HardwareBuffer for TestBuffer {
        fn data(&self) -> &[u8] {
            &self.data
        }

        fn status(&self) -> Status {
            self.status
        }

        fn pts(&self) -> Option<i64> {
            Some(self.data[0] as i64)
        }
    }

    impl Drop for TestBuffer {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn exchange() -> (Arc<FrameExchange<TestBuffer>>, Arc<AtomicUsize>) {
        let refills = Arc::new(AtomicUsize::new(0));
        let counter = refills.clone();
        let exchange = FrameExchange::new(
            FrameHandle::new(0, 1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (Arc::new(exchange), refills)
    }

    #[test]
    fn test_fetch_and_return() {
        let (exchange, refills) = exchange();
        let released = Arc::new(AtomicUsize::new(0));

        exchange.on_buffer_ready(TestBuffer::new(7, &released));
        let frame = exchange.fetch().unwrap();
        assert_eq!(frame.len(), 16);
        assert_eq!(frame.data()[0], 7);
        assert_eq!(frame.pts(), Some(7));
        assert_eq!(frame.handle(), FrameHandle::new(0, 1));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(frame);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(refills.load(Ordering::SeqCst), 1);
        assert_eq!(exchange.stats(), ExchangeStats { delivered: 1, dropped: 0 });
    }

    #[test]
    fn test_newest_buffer_replaces_unconsumed() {
        let (exchange, refills) = exchange();
        let released = Arc::new(AtomicUsize::new(0));

        exchange.on_buffer_ready(TestBuffer::new(1, &released));
        exchange.on_buffer_ready(TestBuffer::new(2, &released));
        exchange.on_buffer_ready(TestBuffer::new(3, &released));
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(refills.load(Ordering::SeqCst), 2);

        let frame = exchange.fetch().unwrap();
        assert_eq!(frame.data()[0], 3);
        drop(frame);
        assert_eq!(exchange.stats(), ExchangeStats { delivered: 3, dropped: 2 });
    }

    #[test]
    fn test_failed_delivery() {
        let (exchange, refills) = exchange();
        let released = Arc::new(AtomicUsize::new(0));

        let mut buffer = TestBuffer::new(1, &released);
        buffer.status = Status::EIO;
        exchange.on_buffer_ready(buffer);

        assert_eq!(
            exchange.fetch().unwrap_err(),
            FrameError::Delivery {
                handle: FrameHandle::new(0, 1),
                status: Status::EIO,
            }
        );
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(refills.load(Ordering::SeqCst), 1);

        // The token came back, so the next delivery is fetchable.
        exchange.on_buffer_ready(TestBuffer::new(2, &released));
        assert_eq!(exchange.fetch().unwrap().data()[0], 2);
    }

    #[test]
    fn test_second_fetch_waits_for_return() {
        let (exchange, _) = exchange();
        let released = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        exchange.on_buffer_ready(TestBuffer::new(1, &released));
        let first = exchange.fetch().unwrap();

        let started = Arc::new(AtomicBool::new(false));
        let waiter = {
            let exchange = exchange.clone();
            let order = order.clone();
            let started = started.clone();
            thread::spawn(move || {
                started.store(true, Ordering::SeqCst);
                let frame = exchange.fetch().unwrap();
                order.lock().unwrap().push(frame.data()[0]);
            })
        };

        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));

        // A delivery alone does not release the waiter while the first frame
        // is still held.
        exchange.on_buffer_ready(TestBuffer::new(2, &released));
        thread::sleep(Duration::from_millis(50));
        assert!(order.lock().unwrap().is_empty());

        order.lock().unwrap().push(first.data()[0]);
        drop(first);
        waiter.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}
