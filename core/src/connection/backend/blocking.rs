/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::error::{Error, Result};
use tokio::task::{JoinError, JoinHandle};

fn join_error(e: JoinError) -> Error {
    Error::Io(std::io::Error::other(e))
}

/// Runs `call` on the blocking thread pool.
pub async fn blocking<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(call).await.map_err(join_error)
}

/// Serializes the blocking calls of one session and remembers the last one.
///
/// Dropping the future of `run` does not stop the call: the thread keeps
/// running. The handle stays here so teardown can wait for it with `settle`
/// before releasing anything that call may still reach.
#[derive(Debug)]
pub struct InFlight<T> {
    task: Option<JoinHandle<T>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        InFlight { task: None }
    }
}

impl<T: Send + 'static> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F>(&mut self, call: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.settle().await;
        let task = self.task.insert(tokio::task::spawn_blocking(call));
        let result = task.await.map_err(join_error);
        self.task = None;
        result
    }

    /// Waits for a call whose caller gave up on it; its result is returned, not raised.
    pub async fn settle(&mut self) -> Option<T> {
        let task = self.task.as_mut()?;
        let result = task.await.ok();
        self.task = None;
        result
    }

    pub fn is_busy(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Hands the outstanding call over, e.g. to a teardown task spawned from `Drop`.
    pub fn take(&mut self) -> Option<JoinHandle<T>> {
        self.task.take()
    }
}
