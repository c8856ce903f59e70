//! Synchronous request/reply between caller threads and an apartment.
//!
//! A request is a one-shot reply sender pushed through a rendezvous channel.
//! The apartment's serve loop handles one request completely before taking
//! the next, so requests are answered in FIFO order and at most one native
//! call is in flight. Each request carries its own reply channel, so a reply
//! always reaches the caller that asked for it.
//!
//! Once the server side is gone both directions report "disconnected", which
//! surfaces as [`Reply::Closed`]: there is no data right now, which is not an
//! error by itself.

use std::sync::mpsc::{self, Receiver, SyncSender};

use tracing::debug;

/// Outcome of a [`Requester::call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Ready(T),
    /// The serve loop has shut down.
    Closed,
}

impl<T> Reply<T> {
    pub fn is_closed(&self) -> bool {
        matches!(self, Reply::Closed)
    }
}

/// Caller side of the protocol.
pub struct Requester<T> {
    tx: SyncSender<SyncSender<T>>,
}

// Manual impl: `T` itself does not need to be `Clone`.
impl<T> Clone for Requester<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Apartment side of the protocol.
pub struct RequestServer<T> {
    rx: Receiver<SyncSender<T>>,
}

/// Creates a connected requester/server pair.
pub fn channel<T>() -> (Requester<T>, RequestServer<T>) {
    // Zero capacity: a send completes only when the serve loop takes it.
    let (tx, rx) = mpsc::sync_channel(0);
    (Requester { tx }, RequestServer { rx })
}

impl<T> Requester<T> {
    /// Sends a refresh request and blocks until its reply arrives.
    ///
    /// There is no timeout: the call lasts as long as the handler does.
    pub fn call(&self) -> Reply<T> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        if self.tx.send(reply_tx).is_err() {
            return Reply::Closed;
        }
        match reply_rx.recv() {
            Ok(value) => Reply::Ready(value),
            Err(_) => Reply::Closed,
        }
    }
}

impl<T> RequestServer<T> {
    /// Answers requests with `handler` until every requester is dropped.
    ///
    /// Returns the number of requests served.
    pub fn serve<F>(self, mut handler: F) -> u64
    where
        F: FnMut() -> T,
    {
        let mut served = 0;
        for reply in self.rx.iter() {
            let value = handler();
            served += 1;
            if reply.send(value).is_err() {
                debug!("requester went away before its reply");
            }
        }
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_replies_in_submission_order() {
        let (requester, server) = channel::<u32>();
        let worker = thread::spawn(move || {
            let mut next = 0;
            server.serve(|| {
                next += 1;
                next
            })
        });

        assert_eq!(requester.call(), Reply::Ready(1));
        assert_eq!(requester.call(), Reply::Ready(2));
        assert_eq!(requester.call(), Reply::Ready(3));

        drop(requester);
        assert_eq!(worker.join().unwrap(), 3);
    }

    #[test]
    fn test_closed_after_server_exit() {
        let (requester, server) = channel::<u32>();
        drop(server);
        assert!(requester.call().is_closed());
        assert!(requester.call().is_closed());
    }

    #[test]
    fn test_one_request_in_flight() {
        let (requester, server) = channel::<usize>();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let (flight, max) = (in_flight.clone(), max_seen.clone());
        let worker = thread::spawn(move || {
            server.serve(|| {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                flight.fetch_sub(1, Ordering::SeqCst);
                now
            })
        });

        let start = Arc::new(Barrier::new(4));
        let callers: Vec<_> = (0..4)
            .map(|_| {
                let requester = requester.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    (0..5)
                        .map(|_| requester.call())
                        .filter(|r| matches!(r, Reply::Ready(_)))
                        .count()
                })
            })
            .collect();

        let answered: usize = callers.into_iter().map(|c| c.join().unwrap()).sum();
        drop(requester);

        assert_eq!(answered, 20);
        assert_eq!(worker.join().unwrap(), 20);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
