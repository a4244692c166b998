/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod config;
pub use config::{
    BackendChoice, ControllerIpcConfig, DEFAULT_CONTROLLER_SOCKET, DEFAULT_NODELIST_FILE,
    DEFAULT_RESOLVE_TIMEOUT, NodelistFileConfig, ResolverConfig,
};

mod error;
pub use error::{BackendError, BackendErrorKind, ResolveError};

mod stats;
pub use stats::{ResolverSnapshot, ResolverStats};

mod record;
pub use record::NodeRecord;

mod event_loop;
pub use event_loop::EventLoop;

mod context;
mod handle;

pub mod backend;
pub use backend::BackendKind;

mod resolver;
pub use resolver::{Resolver, ResolverBuilder};
