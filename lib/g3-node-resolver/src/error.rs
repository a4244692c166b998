/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;

use thiserror::Error;

use crate::backend::BackendKind;

// corosync cs_error_t values
const CS_ERR_LIBRARY: i32 = 2;
const CS_ERR_NOT_EXIST: i32 = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendErrorKind {
    NotFound,
    Connection,
    AlreadyExists,
    NotSupported,
    Other,
}

impl BackendErrorKind {
    /// Classify a negative errno style return code.
    fn from_errno_rc(code: i32) -> Self {
        match code.wrapping_neg() {
            libc::ENXIO => BackendErrorKind::NotFound,
            libc::ENOTCONN | libc::ECONNABORTED | libc::ECONNREFUSED | libc::ECONNRESET => {
                BackendErrorKind::Connection
            }
            #[cfg(any(target_os = "linux", target_os = "android"))]
            libc::ECOMM => BackendErrorKind::Connection,
            #[cfg(any(target_os = "linux", target_os = "android"))]
            libc::ENOTUNIQ => BackendErrorKind::AlreadyExists,
            libc::EOPNOTSUPP => BackendErrorKind::NotSupported,
            _ => BackendErrorKind::Other,
        }
    }

    fn from_cs_error(code: i32) -> Self {
        match code {
            CS_ERR_NOT_EXIST => BackendErrorKind::NotFound,
            CS_ERR_LIBRARY => BackendErrorKind::Connection,
            _ => BackendErrorKind::from_errno_rc(code),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorKind::NotFound => "NotFound",
            BackendErrorKind::Connection => "Connection",
            BackendErrorKind::AlreadyExists => "AlreadyExists",
            BackendErrorKind::NotSupported => "NotSupported",
            BackendErrorKind::Other => "Other",
        }
    }
}

/// A failure explicitly reported by the backend, with its native code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendError {
    backend: BackendKind,
    code: i32,
}

impl BackendError {
    pub fn new(backend: BackendKind, code: i32) -> Self {
        BackendError { backend, code }
    }

    #[inline]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn kind(&self) -> BackendErrorKind {
        match self.backend {
            BackendKind::Controller => BackendErrorKind::from_errno_rc(self.code),
            BackendKind::ConfigService => BackendErrorKind::from_cs_error(self.code),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} returned code {}", self.backend, self.code)?;
        if self.backend == BackendKind::Controller && self.code < 0 {
            let os_error = io::Error::from_raw_os_error(self.code.wrapping_neg());
            write!(f, " ({os_error})")
        } else {
            write!(f, " ({})", self.kind().as_str())
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("failed to connect to {backend}: {reason}")]
    ConnectFailed {
        backend: BackendKind,
        reason: String,
    },
    #[error("timed out waiting for the node list")]
    Timeout,
    #[error("backend error: {0}")]
    BackendError(#[from] BackendError),
    #[error("channel closed before the final response")]
    ChannelClosed,
    #[error("malformed response: {0}")]
    ParseError(String),
    #[error("backend {0} is not configured")]
    NoBackend(BackendKind),
    #[error("called from within an async runtime")]
    InAsyncContext,
}

impl ResolveError {
    pub(crate) fn connect_failed<E: fmt::Display>(backend: BackendKind, e: E) -> Self {
        ResolveError::ConnectFailed {
            backend,
            reason: e.to_string(),
        }
    }

    pub(crate) fn parse<E: fmt::Display>(e: E) -> Self {
        ResolveError::ParseError(e.to_string())
    }

    pub fn get_type(&self) -> &str {
        match self {
            ResolveError::ConnectFailed { .. } => "ConnectFailed",
            ResolveError::Timeout => "Timeout",
            ResolveError::BackendError(_) => "BackendError",
            ResolveError::ChannelClosed => "ChannelClosed",
            ResolveError::ParseError(_) => "ParseError",
            ResolveError::NoBackend(_) => "NoBackend",
            ResolveError::InAsyncContext => "InAsyncContext",
        }
    }

    pub fn get_subtype(&self) -> &str {
        match self {
            ResolveError::BackendError(e) => e.kind().as_str(),
            ResolveError::ConnectFailed { backend, .. } | ResolveError::NoBackend(backend) => {
                backend.as_str()
            }
            _ => "",
        }
    }
}
