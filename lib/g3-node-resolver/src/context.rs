/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, trace};
use tokio::sync::Notify;

use crate::{NodeRecord, ResolveError, ResolverStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ContextState {
    Pending,
    Done,
    Failed,
}

struct RequestContext {
    state: ContextState,
    nodes: IndexMap<String, NodeRecord>,
    error: Option<ResolveError>,
    fragments: usize,
}

struct ContextInner {
    reference: String,
    ctx: RefCell<RequestContext>,
    changed: Notify,
    stats: Arc<ResolverStats>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        trace!("request context {} released", self.reference);
        self.stats.add_context_released();
    }
}

/// The request context shared by the drive step and the backend callback.
///
/// Both sides run on the same local task set, so a `RefCell` is enough. The
/// callback only mutates the data and signals `changed`, the drive step decides
/// what to do with the loop.
#[derive(Clone)]
pub(crate) struct SharedRequestContext {
    inner: Rc<ContextInner>,
}

impl SharedRequestContext {
    pub(crate) fn new(reference: String, stats: Arc<ResolverStats>) -> Self {
        stats.add_context_allocated();
        SharedRequestContext {
            inner: Rc::new(ContextInner {
                reference,
                ctx: RefCell::new(RequestContext {
                    state: ContextState::Pending,
                    nodes: IndexMap::new(),
                    error: None,
                    fragments: 0,
                }),
                changed: Notify::new(),
                stats,
            }),
        }
    }

    #[inline]
    pub(crate) fn reference(&self) -> &str {
        &self.inner.reference
    }

    pub(crate) fn state(&self) -> ContextState {
        self.inner.ctx.borrow().state
    }

    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        self.state() == ContextState::Pending
    }

    /// Accumulate one fragment, keeping the first record seen for each id.
    ///
    /// Returns false and leaves the data untouched if the context is terminal.
    pub(crate) fn append(&self, records: Vec<NodeRecord>) -> bool {
        let mut ctx = self.inner.ctx.borrow_mut();
        if ctx.state != ContextState::Pending {
            return false;
        }
        ctx.fragments += 1;
        trace!(
            "request context {}: fragment {} with {} records",
            self.inner.reference,
            ctx.fragments,
            records.len()
        );
        for node in records {
            if ctx.nodes.contains_key(&node.id) {
                debug!(
                    "request context {}: duplicate node id {} dropped",
                    self.inner.reference, node.id
                );
                continue;
            }
            ctx.nodes.insert(node.id.clone(), node);
        }
        true
    }

    pub(crate) fn complete(&self) -> bool {
        self.transit(ContextState::Done, None)
    }

    pub(crate) fn fail(&self, e: ResolveError) -> bool {
        self.transit(ContextState::Failed, Some(e))
    }

    fn transit(&self, state: ContextState, e: Option<ResolveError>) -> bool {
        {
            let mut ctx = self.inner.ctx.borrow_mut();
            if ctx.state != ContextState::Pending {
                return false;
            }
            ctx.state = state;
            ctx.error = e;
        }
        self.inner.changed.notify_one();
        true
    }

    /// Wait for the next state change signal.
    ///
    /// A signal sent while nobody is waiting is kept, so checking the state
    /// before awaiting this never misses a transition.
    pub(crate) async fn changed(&self) {
        self.inner.changed.notified().await
    }

    /// Move the outcome out of the context.
    ///
    /// Records accumulated before a failure stay in the context and go away
    /// with it.
    pub(crate) fn take_result(&self) -> Result<Vec<NodeRecord>, ResolveError> {
        let mut ctx = self.inner.ctx.borrow_mut();
        match ctx.state {
            ContextState::Done => Ok(std::mem::take(&mut ctx.nodes).into_values().collect()),
            ContextState::Failed => Err(ctx.error.take().unwrap_or(ResolveError::ChannelClosed)),
            ContextState::Pending => Err(ResolveError::Timeout),
        }
    }
}
