/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::IpAddr;

/// One cluster member, in the shape shared by all backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    /// Backend assigned identifier, stable for the lifetime of the member.
    pub id: String,
    pub uname: String,
    pub addr: Option<IpAddr>,
}

impl NodeRecord {
    pub fn new(id: String, uname: String) -> Self {
        NodeRecord {
            id,
            uname,
            addr: None,
        }
    }

    pub fn with_addr(mut self, addr: IpAddr) -> Self {
        self.addr = Some(addr);
        self
    }
}

impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Some(addr) => write!(f, "{} {} {addr}", self.id, self.uname),
            None => write!(f, "{} {}", self.id, self.uname),
        }
    }
}
