/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader};

use g3_node_resolver::{ControllerIpcConfig, NodelistFileConfig, ResolverConfig};

use crate::opts::ProcArgs;

fn load_doc(path: &Path) -> anyhow::Result<Yaml> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let mut docs = YamlLoader::load_from_str(&content)
        .map_err(|e| anyhow!("invalid yaml file {}: {e}", path.display()))?;
    match docs.len() {
        0 => Ok(Yaml::Null),
        1 => Ok(docs.remove(0)),
        n => Err(anyhow!("{n} yaml documents found, only one is allowed")),
    }
}

fn parse_doc(doc: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<ResolverConfig> {
    // the resolver config may be nested under a `resolver` key
    let v = match doc {
        Yaml::Hash(map) => map
            .get(&Yaml::String("resolver".to_string()))
            .unwrap_or(doc),
        _ => doc,
    };
    ResolverConfig::parse_yaml(v, lookup_dir)
}

/// Build the resolver config from the config file, then apply the command
/// line overrides.
pub fn load(args: &ProcArgs) -> anyhow::Result<ResolverConfig> {
    let mut config = match &args.config_file {
        Some(path) => {
            let doc = load_doc(path)?;
            parse_doc(&doc, path.parent())
                .context(format!("failed to load config file {}", path.display()))?
        }
        None => ResolverConfig::default(),
    };

    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(path) = &args.controller_socket {
        match &mut config.controller {
            Some(c) => c.socket_path = path.clone(),
            None => config.controller = Some(ControllerIpcConfig::new(path.clone())),
        }
    }
    if let Some(path) = &args.nodelist {
        config.config_service = Some(NodelistFileConfig { path: path.clone() });
    }
    Ok(config)
}
