/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use log::trace;

use super::{ConfigService, ConfigServiceError, ConfigServiceSession};
use crate::NodeRecord;

/// Members listed in the `nodelist` section of a corosync configuration file.
pub struct NodelistFileService {
    path: PathBuf,
}

impl NodelistFileService {
    pub fn new(path: PathBuf) -> Self {
        NodelistFileService { path }
    }
}

impl ConfigService for NodelistFileService {
    fn connect(&self) -> Result<Box<dyn ConfigServiceSession>, ConfigServiceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ConfigServiceError::Unavailable(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Box::new(NodelistSession {
            content: Some(content),
        }))
    }
}

struct NodelistSession {
    content: Option<String>,
}

impl ConfigServiceSession for NodelistSession {
    fn list_members(&mut self) -> Result<Vec<NodeRecord>, ConfigServiceError> {
        match &self.content {
            Some(content) => parse_nodelist(content),
            None => Err(ConfigServiceError::Unavailable(
                "session disconnected".to_string(),
            )),
        }
    }

    fn disconnect(&mut self) {
        self.content = None;
    }
}

#[derive(Default)]
struct NodeEntry {
    nodeid: Option<String>,
    name: Option<String>,
    ring0_addr: Option<String>,
}

impl NodeEntry {
    fn set(&mut self, k: &str, v: &str) {
        match k {
            "nodeid" => self.nodeid = Some(v.to_string()),
            "name" => self.name = Some(v.to_string()),
            "ring0_addr" => self.ring0_addr = Some(v.to_string()),
            _ => {}
        }
    }

    fn into_record(self, line: usize) -> Result<NodeRecord, ConfigServiceError> {
        let Some(id) = self.nodeid else {
            return Err(ConfigServiceError::Malformed(format!(
                "node ending at line {line} has no nodeid"
            )));
        };
        if u32::from_str(&id).is_err() {
            return Err(ConfigServiceError::Malformed(format!(
                "invalid nodeid {id} at line {line}"
            )));
        }
        let uname = match (self.name, &self.ring0_addr) {
            (Some(name), _) => name,
            (None, Some(addr)) => addr.clone(),
            (None, None) => {
                return Err(ConfigServiceError::Malformed(format!(
                    "node {id} has neither name nor ring0_addr"
                )));
            }
        };
        let mut record = NodeRecord::new(id, uname);
        if let Some(addr) = self.ring0_addr.and_then(|s| IpAddr::from_str(&s).ok()) {
            record = record.with_addr(addr);
        }
        Ok(record)
    }
}

fn parse_nodelist(content: &str) -> Result<Vec<NodeRecord>, ConfigServiceError> {
    let mut sections: Vec<String> = Vec::new();
    let mut found_nodelist = false;
    let mut current: Option<NodeEntry> = None;
    let mut nodes = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = match line.find('#') {
            Some(p) => &line[..p],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_suffix('{') {
            let name = name.trim().to_string();
            if sections.len() == 1 && sections[0] == "nodelist" && name == "node" {
                current = Some(NodeEntry::default());
            }
            if sections.is_empty() && name == "nodelist" {
                found_nodelist = true;
            }
            sections.push(name);
        } else if line == "}" {
            let Some(name) = sections.pop() else {
                return Err(ConfigServiceError::Malformed(format!(
                    "unbalanced '}}' at line {line_no}"
                )));
            };
            if name == "node"
                && let Some(entry) = current.take()
            {
                let record = entry.into_record(line_no)?;
                trace!("nodelist member {record}");
                nodes.push(record);
            }
        } else if let Some((k, v)) = line.split_once(':') {
            if let Some(entry) = current.as_mut()
                && sections.len() == 2
            {
                entry.set(k.trim(), v.trim());
            }
        } else {
            return Err(ConfigServiceError::Malformed(format!(
                "invalid line {line_no}: {line}"
            )));
        }
    }

    if !sections.is_empty() {
        return Err(ConfigServiceError::Malformed(format!(
            "section {} is not closed",
            sections.join(".")
        )));
    }
    if !found_nodelist {
        return Err(ConfigServiceError::Malformed(
            "no nodelist section found".to_string(),
        ));
    }
    Ok(nodes)
}
