//! Pre-loaded task queue shared by the scan workers.
//!
//! All tasks are enqueued up front and the sending side is dropped, so a
//! drained queue reports itself empty immediately instead of waiting out the
//! pop timeout. `join` blocks until every task has been popped and marked
//! done.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One symbol to scan. `seq` is its position in the requested order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTask {
    pub symbol: String,
    pub seq: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Pop {
    Task(ScanTask),
    /// Nothing arrived within the timeout.
    Timeout,
    /// Queue drained; nothing will ever arrive.
    Empty,
}

pub struct TaskQueue {
    receiver: Mutex<Receiver<ScanTask>>,
    pending: Mutex<usize>,
    all_done: Condvar,
}

fn relock<'a, T>(result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl TaskQueue {
    /// One task per symbol, in the given order.
    pub fn preload<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::channel();
        let mut count = 0usize;
        for (seq, symbol) in symbols.into_iter().enumerate() {
            // The receiver is alive in this scope, so send cannot fail.
            let _ = tx.send(ScanTask {
                symbol: symbol.into(),
                seq,
            });
            count += 1;
        }
        drop(tx);

        Self {
            receiver: Mutex::new(rx),
            pending: Mutex::new(count),
            all_done: Condvar::new(),
        }
    }

    pub fn pending(&self) -> usize {
        *relock(self.pending.lock())
    }

    pub fn pop(&self, timeout: Duration) -> Pop {
        let rx = relock(self.receiver.lock());
        match rx.recv_timeout(timeout) {
            Ok(task) => Pop::Task(task),
            Err(RecvTimeoutError::Timeout) => Pop::Timeout,
            Err(RecvTimeoutError::Disconnected) => Pop::Empty,
        }
    }

    /// Marks one popped task finished.
    pub fn task_done(&self) {
        let mut pending = relock(self.pending.lock());
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.all_done.notify_all();
        }
    }

    /// Drops every task not yet popped and marks it done. Returns how many
    /// were dropped.
    pub fn cancel(&self) -> usize {
        let rx = relock(self.receiver.lock());
        let dropped = rx.try_iter().count();
        drop(rx);

        if dropped > 0 {
            let mut pending = relock(self.pending.lock());
            *pending = pending.saturating_sub(dropped);
            if *pending == 0 {
                self.all_done.notify_all();
            }
        }
        dropped
    }

    /// Blocks until every task is done.
    pub fn join(&self) {
        let mut pending = relock(self.pending.lock());
        while *pending > 0 {
            pending = relock(self.all_done.wait(pending));
        }
    }

    /// Like [`join`](Self::join) but gives up after `timeout`. Returns
    /// whether the queue finished.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let pending = relock(self.pending.lock());
        let (pending, _) = self
            .all_done
            .wait_timeout_while(pending, timeout, |p| *p > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *pending == 0
    }
}
