/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ResolveError;

#[derive(Default)]
pub struct ResolverStats {
    query_total: AtomicU64,
    query_controller: AtomicU64,
    query_config_service: AtomicU64,
    query_fallback: AtomicU64,

    handle_opened: AtomicU64,
    handle_closed: AtomicU64,
    registration_added: AtomicU64,
    registration_removed: AtomicU64,
    context_allocated: AtomicU64,
    context_released: AtomicU64,

    connect_failed: AtomicU64,
    timeout: AtomicU64,
    backend_error: AtomicU64,
    channel_closed: AtomicU64,
    parse_error: AtomicU64,
    no_backend: AtomicU64,
    in_async_context: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverSnapshot {
    pub query_total: u64,
    pub query_controller: u64,
    pub query_config_service: u64,
    pub query_fallback: u64,
    pub handle_opened: u64,
    pub handle_closed: u64,
    pub registration_added: u64,
    pub registration_removed: u64,
    pub context_allocated: u64,
    pub context_released: u64,
    pub connect_failed: u64,
    pub timeout: u64,
    pub backend_error: u64,
    pub channel_closed: u64,
    pub parse_error: u64,
    pub no_backend: u64,
    pub in_async_context: u64,
}

impl ResolverSnapshot {
    /// Handles opened but not yet closed.
    pub fn alive_handles(&self) -> u64 {
        self.handle_opened.saturating_sub(self.handle_closed)
    }

    /// Dispatch registrations still attached to the event loop.
    pub fn alive_registrations(&self) -> u64 {
        self.registration_added
            .saturating_sub(self.registration_removed)
    }

    /// Request contexts allocated but not yet released.
    pub fn alive_contexts(&self) -> u64 {
        self.context_allocated.saturating_sub(self.context_released)
    }
}

impl ResolverStats {
    pub fn snapshot(&self) -> ResolverSnapshot {
        ResolverSnapshot {
            query_total: self.query_total.load(Ordering::Relaxed),
            query_controller: self.query_controller.load(Ordering::Relaxed),
            query_config_service: self.query_config_service.load(Ordering::Relaxed),
            query_fallback: self.query_fallback.load(Ordering::Relaxed),
            handle_opened: self.handle_opened.load(Ordering::Relaxed),
            handle_closed: self.handle_closed.load(Ordering::Relaxed),
            registration_added: self.registration_added.load(Ordering::Relaxed),
            registration_removed: self.registration_removed.load(Ordering::Relaxed),
            context_allocated: self.context_allocated.load(Ordering::Relaxed),
            context_released: self.context_released.load(Ordering::Relaxed),
            connect_failed: self.connect_failed.load(Ordering::Relaxed),
            timeout: self.timeout.load(Ordering::Relaxed),
            backend_error: self.backend_error.load(Ordering::Relaxed),
            channel_closed: self.channel_closed.load(Ordering::Relaxed),
            parse_error: self.parse_error.load(Ordering::Relaxed),
            no_backend: self.no_backend.load(Ordering::Relaxed),
            in_async_context: self.in_async_context.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add_query_total(&self) {
        self.query_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_query_controller(&self) {
        self.query_controller.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_query_config_service(&self) {
        self.query_config_service.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_query_fallback(&self) {
        self.query_fallback.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_handle_opened(&self) {
        self.handle_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_handle_closed(&self) {
        self.handle_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_registration_added(&self) {
        self.registration_added.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_registration_removed(&self) {
        self.registration_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_context_allocated(&self) {
        self.context_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_context_released(&self) {
        self.context_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_error(&self, e: &ResolveError) {
        let counter = match e {
            ResolveError::ConnectFailed { .. } => &self.connect_failed,
            ResolveError::Timeout => &self.timeout,
            ResolveError::BackendError(_) => &self.backend_error,
            ResolveError::ChannelClosed => &self.channel_closed,
            ResolveError::ParseError(_) => &self.parse_error,
            ResolveError::NoBackend(_) => &self.no_backend,
            ResolveError::InAsyncContext => &self.in_async_context,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
