/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};

use anyhow::{Context, anyhow};
use serde_json::{Value, json};

use g3_node_resolver::{NodeRecord, ResolverBuilder, ResolverConfig, ResolverSnapshot};

pub mod config;
pub mod log;
pub mod opts;

use opts::ProcArgs;

fn nodes_to_json(nodes: &[NodeRecord]) -> Value {
    let list: Vec<Value> = nodes
        .iter()
        .map(|node| match node.addr {
            Some(addr) => json!({"id": node.id, "uname": node.uname, "addr": addr.to_string()}),
            None => json!({"id": node.id, "uname": node.uname}),
        })
        .collect();
    Value::Array(list)
}

fn write_nodes<W: Write>(w: &mut W, nodes: &[NodeRecord], output_json: bool) -> io::Result<()> {
    if output_json {
        writeln!(w, "{}", nodes_to_json(nodes))
    } else {
        for node in nodes {
            writeln!(w, "{node}")?;
        }
        Ok(())
    }
}

fn print_stats(snap: &ResolverSnapshot) {
    eprintln!(
        "queries: {} (controller {}, config-service {}, fallback {})",
        snap.query_total, snap.query_controller, snap.query_config_service, snap.query_fallback
    );
    eprintln!(
        "handles: {}/{} registrations: {}/{} contexts: {}/{}",
        snap.handle_opened,
        snap.handle_closed,
        snap.registration_added,
        snap.registration_removed,
        snap.context_allocated,
        snap.context_released
    );
}

pub fn run(args: &ProcArgs, config: ResolverConfig) -> anyhow::Result<()> {
    let resolver = ResolverBuilder::new(config)
        .build()
        .context("failed to create resolver")?;

    let r = resolver.resolve();
    if args.print_stats {
        print_stats(&resolver.get_stats().snapshot());
    }
    let nodes = r.map_err(|e| anyhow!("failed to resolve cluster nodes: {e}"))?;

    let mut stdout = io::stdout().lock();
    write_nodes(&mut stdout, &nodes, args.output_json).context("failed to write output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn nodes() -> Vec<NodeRecord> {
        vec![
            NodeRecord::new("1".to_string(), "alpha".to_string())
                .with_addr(IpAddr::from([10, 0, 0, 1])),
            NodeRecord::new("2".to_string(), "beta".to_string()),
        ]
    }

    #[test]
    fn text_output() {
        let mut buf = Vec::new();
        write_nodes(&mut buf, &nodes(), false).unwrap();
        assert_eq!(buf, b"1 alpha 10.0.0.1\n2 beta\n");
    }

    #[test]
    fn json_output() {
        let mut buf = Vec::new();
        write_nodes(&mut buf, &nodes(), true).unwrap();
        let v: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(
            v,
            json!([
                {"id": "1", "uname": "alpha", "addr": "10.0.0.1"},
                {"id": "2", "uname": "beta"},
            ])
        );
    }
}
