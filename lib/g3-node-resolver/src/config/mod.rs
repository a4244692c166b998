/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "yaml")]
mod yaml;

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONTROLLER_SOCKET: &str = "/run/pacemaker/controld.sock";
pub const DEFAULT_NODELIST_FILE: &str = "/etc/corosync/corosync.conf";

const DEFAULT_MAX_MESSAGE_SIZE: usize = 1 << 20;
const MINIMAL_MAX_MESSAGE_SIZE: usize = 256;
const DEFAULT_REFERENCE_PREFIX: &str = "g3nodes";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendChoice {
    Controller,
    ConfigService,
    /// Use the controller, and the configuration service if it can't be reached.
    #[default]
    PreferController,
}

impl BackendChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendChoice::Controller => "controller",
            BackendChoice::ConfigService => "config-service",
            BackendChoice::PreferController => "prefer-controller",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "controller" | "controld" | "pacemaker" => Ok(BackendChoice::Controller),
            "config-service" | "cfg" | "corosync" => Ok(BackendChoice::ConfigService),
            "prefer-controller" | "auto" => Ok(BackendChoice::PreferController),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerIpcConfig {
    pub socket_path: PathBuf,
    max_message_size: usize,
    pub reference_prefix: String,
}

impl Default for ControllerIpcConfig {
    fn default() -> Self {
        ControllerIpcConfig::new(PathBuf::from(DEFAULT_CONTROLLER_SOCKET))
    }
}

impl ControllerIpcConfig {
    pub fn new(socket_path: PathBuf) -> Self {
        ControllerIpcConfig {
            socket_path,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
        }
    }

    #[inline]
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn set_max_message_size(&mut self, size: usize) {
        self.max_message_size = size.max(MINIMAL_MAX_MESSAGE_SIZE);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodelistFileConfig {
    pub path: PathBuf,
}

impl Default for NodelistFileConfig {
    fn default() -> Self {
        NodelistFileConfig {
            path: PathBuf::from(DEFAULT_NODELIST_FILE),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    pub backend: BackendChoice,
    pub timeout: Duration,
    /// `None` disables the controller backend.
    pub controller: Option<ControllerIpcConfig>,
    /// `None` disables the shipped nodelist file service.
    pub config_service: Option<NodelistFileConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            backend: BackendChoice::default(),
            timeout: DEFAULT_RESOLVE_TIMEOUT,
            controller: Some(ControllerIpcConfig::default()),
            config_service: Some(NodelistFileConfig::default()),
        }
    }
}
