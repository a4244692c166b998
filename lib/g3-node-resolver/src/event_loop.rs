/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::LocalSet;

use crate::ResolveError;

static GLOBAL_EVENT_LOOP: OnceLock<EventLoop> = OnceLock::new();

/// A single threaded event loop that is driven by the calling thread.
///
/// The loop itself is never torn down. Everything a call spawns on it lives in
/// a per call task set, which is gone when the call returns.
pub struct EventLoop {
    runtime: Runtime,
}

impl EventLoop {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name("node-resolver")
            .build()?;
        Ok(EventLoop { runtime })
    }

    /// Get the process wide event loop, creating it on first use.
    pub fn global() -> io::Result<&'static EventLoop> {
        if let Some(l) = GLOBAL_EVENT_LOOP.get() {
            return Ok(l);
        }
        let l = EventLoop::new()?;
        // a concurrent initializer may have won, then ours is dropped
        Ok(GLOBAL_EVENT_LOOP.get_or_init(|| l))
    }

    /// Block the calling thread, dispatching loop events until `fut` is ready.
    ///
    /// The calling thread must not be inside another runtime.
    pub(crate) fn drive<F: Future>(&self, fut: F) -> Result<F::Output, ResolveError> {
        if Handle::try_current().is_ok() {
            return Err(ResolveError::InAsyncContext);
        }
        let local = LocalSet::new();
        let output = self.runtime.block_on(local.run_until(fut));
        // tasks left in the set are dropped here, they may hold io resources
        // which need the runtime context to deregister
        let _guard = self.runtime.enter();
        drop(local);
        Ok(output)
    }
}
