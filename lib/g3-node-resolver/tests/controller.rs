/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

#![cfg(unix)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use g3_node_resolver::{
    BackendChoice, BackendError, BackendErrorKind, BackendKind, ResolveError, ResolverSnapshot,
};

mod common;
use common::{Action, FakeController, fragment};

const TIMEOUT: Duration = Duration::from_secs(5);

fn ids(nodes: &[g3_node_resolver::NodeRecord]) -> Vec<&str> {
    nodes.iter().map(|n| n.id.as_str()).collect()
}

fn assert_balanced(snap: &ResolverSnapshot) {
    assert_eq!(snap.alive_handles(), 0);
    assert_eq!(snap.alive_registrations(), 0);
    assert_eq!(snap.alive_contexts(), 0);
}

#[test]
fn multi_fragment_accumulate() {
    let controller = FakeController::start(vec![
        fragment(false, &[("1", "alpha")]),
        Action::Sleep(Duration::from_millis(20)),
        fragment(false, &[("2", "beta"), ("3", "gamma")]),
        Action::Sleep(Duration::from_millis(20)),
        fragment(true, &[("4", "delta")]),
    ]);
    let resolver = controller.resolver();

    let nodes = resolver
        .resolve_nodes(BackendChoice::Controller, TIMEOUT)
        .unwrap();
    assert_eq!(ids(&nodes), ["1", "2", "3", "4"]);
    assert_eq!(nodes[2].uname, "gamma");

    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.handle_opened, 1);
    assert_eq!(snap.handle_closed, 1);
    assert_eq!(snap.registration_added, 1);
    assert_eq!(snap.context_released, 1);
    assert_balanced(&snap);
}

#[test]
fn final_on_first_fragment() {
    let controller = FakeController::start(vec![
        fragment(true, &[("1", "alpha")]),
        Action::Sleep(Duration::from_secs(3)),
        fragment(true, &[("2", "beta")]),
    ]);
    let resolver = controller.resolver();

    let start = Instant::now();
    let nodes = resolver
        .resolve_nodes(BackendChoice::Controller, TIMEOUT)
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(ids(&nodes), ["1"]);
    assert_balanced(&resolver.get_stats().snapshot());
}

#[test]
fn no_duplicate_keep_order() {
    let controller = FakeController::start(vec![
        fragment(false, &[("3", "gamma"), ("1", "alpha"), ("3", "gamma-dup")]),
        fragment(true, &[("1", "alpha-dup"), ("2", "beta")]),
    ]);
    let resolver = controller.resolver();

    let nodes = resolver
        .resolve_nodes(BackendChoice::Controller, TIMEOUT)
        .unwrap();
    assert_eq!(ids(&nodes), ["3", "1", "2"]);
    assert_eq!(nodes[0].uname, "gamma");
    assert_eq!(nodes[1].uname, "alpha");
}

#[test]
fn foreign_reference_ignored() {
    let controller = FakeController::start(vec![
        Action::Raw(
            "<nodes reference=\"other-1\" final=\"true\"><node id=\"9\" uname=\"x\"/></nodes>"
                .to_string(),
        ),
        Action::Raw("<nodes final=\"true\"><node id=\"8\" uname=\"y\"/></nodes>".to_string()),
        fragment(true, &[("1", "alpha")]),
    ]);
    let resolver = controller.resolver();

    let nodes = resolver
        .resolve_nodes(BackendChoice::Controller, TIMEOUT)
        .unwrap();
    assert_eq!(ids(&nodes), ["1"]);
}

#[test]
fn malformed_foreign_message_ignored() {
    let controller = FakeController::start(vec![
        Action::Raw("<nodes reference=\"someone-else\"><node id=\"9\"/></nodes>".to_string()),
        Action::Raw("<nodes reference=\"someone-else\" rc=\"bad\">".to_string()),
        fragment(true, &[("1", "alpha")]),
    ]);
    let resolver = controller.resolver();

    let nodes = resolver
        .resolve_nodes(BackendChoice::Controller, TIMEOUT)
        .unwrap();
    assert_eq!(ids(&nodes), ["1"]);
    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.parse_error, 0);
    assert_balanced(&snap);
}

#[test]
fn channel_closed_discards_partial() {
    let controller = FakeController::start(vec![
        fragment(false, &[("1", "alpha")]),
        Action::Close,
    ]);
    let resolver = controller.resolver();

    let r = resolver.resolve_nodes(BackendChoice::Controller, TIMEOUT);
    assert_eq!(r, Err(ResolveError::ChannelClosed));

    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.channel_closed, 1);
    assert_balanced(&snap);
}

#[test]
fn timeout_tears_down() {
    let controller = FakeController::start(vec![fragment(false, &[("1", "alpha")])]);
    let resolver = controller.resolver();

    let start = Instant::now();
    let r = resolver.resolve_nodes(BackendChoice::Controller, Duration::from_millis(200));
    assert_eq!(r, Err(ResolveError::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(200));

    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.timeout, 1);
    assert_eq!(snap.handle_closed, 1);
    assert_eq!(snap.registration_removed, 1);
    assert_eq!(snap.context_released, 1);
    assert_balanced(&snap);
}

#[test]
fn timeout_races_final() {
    let controller = FakeController::start(vec![
        Action::Sleep(Duration::from_millis(100)),
        fragment(true, &[("1", "alpha")]),
    ]);
    let resolver = controller.resolver();

    let r = resolver.resolve_nodes(BackendChoice::Controller, Duration::from_millis(100));
    match r {
        Ok(nodes) => assert_eq!(ids(&nodes), ["1"]),
        Err(e) => assert_eq!(e, ResolveError::Timeout),
    }

    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.handle_closed, 1);
    assert_eq!(snap.context_released, 1);
    assert_balanced(&snap);
}

#[test]
fn zero_timeout() {
    let controller = FakeController::start(vec![
        Action::Sleep(Duration::from_millis(50)),
        fragment(true, &[("1", "alpha")]),
    ]);
    let resolver = controller.resolver();

    let r = resolver.resolve_nodes(BackendChoice::Controller, Duration::ZERO);
    assert_eq!(r, Err(ResolveError::Timeout));
    assert_balanced(&resolver.get_stats().snapshot());
}

#[test]
fn backend_error_code() {
    let controller = FakeController::start(vec![Action::Raw(format!(
        "<nodes reference=\"{{ref}}\" rc=\"-{}\"/>",
        libc::ENXIO
    ))]);
    let resolver = controller.resolver();

    let r = resolver.resolve_nodes(BackendChoice::Controller, TIMEOUT);
    let Err(ResolveError::BackendError(e)) = r else {
        panic!("unexpected result {r:?}");
    };
    assert_eq!(e.backend(), BackendKind::Controller);
    assert_eq!(e.kind(), BackendErrorKind::NotFound);
    assert_eq!(e, BackendError::new(BackendKind::Controller, -libc::ENXIO));
}

#[test]
fn malformed_fragment() {
    let controller = FakeController::start(vec![
        fragment(false, &[("1", "alpha")]),
        Action::Raw("<nodes reference=\"{ref}\"><node id=\"2\"/></nodes>".to_string()),
    ]);
    let resolver = controller.resolver();

    let r = resolver.resolve_nodes(BackendChoice::Controller, TIMEOUT);
    assert!(matches!(r, Err(ResolveError::ParseError(_))));
    assert_eq!(resolver.get_stats().snapshot().parse_error, 1);
}

#[test]
fn connect_failed_no_allocation() {
    let controller = FakeController::start(Vec::new());
    let resolver = controller.resolver();
    std::fs::remove_file(controller.socket_path()).unwrap();

    let before = resolver.get_stats().snapshot();
    let r = resolver.resolve_nodes(BackendChoice::Controller, TIMEOUT);
    assert!(matches!(
        r,
        Err(ResolveError::ConnectFailed {
            backend: BackendKind::Controller,
            ..
        })
    ));

    let after = resolver.get_stats().snapshot();
    assert_eq!(after.context_allocated, before.context_allocated);
    assert_eq!(after.registration_added, before.registration_added);
    assert_eq!(after.handle_opened, before.handle_opened);
    assert_eq!(after.connect_failed, 1);
}

#[cfg(target_os = "linux")]
#[test]
fn connect_full_backlog_bounded() {
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixListener;

    let dir = common::test_dir();
    let socket = dir.join("wedged.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    // never accepted, shrink the queue so that it fills up at once
    assert_eq!(unsafe { libc::listen(listener.as_raw_fd(), 0) }, 0);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut queued = Vec::new();
    for _ in 0..16 {
        match rt.block_on(tokio::net::UnixStream::connect(&socket)) {
            Ok(stream) => queued.push(stream),
            Err(_) => break,
        }
    }
    assert!(!queued.is_empty());

    let resolver = common::controller_resolver(socket);
    let start = Instant::now();
    let r = resolver.resolve_nodes(BackendChoice::Controller, Duration::from_millis(200));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        r,
        Err(ResolveError::ConnectFailed { .. } | ResolveError::Timeout)
    ));
    assert_balanced(&resolver.get_stats().snapshot());

    drop(queued);
    drop(listener);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn prefer_controller_no_fallback_on_backend_error() {
    let controller = FakeController::start(vec![Action::Raw(
        format!("<nodes reference=\"{{ref}}\" rc=\"-{}\"/>", libc::EOPNOTSUPP),
    )]);
    let resolver = controller.resolver();

    let r = resolver.resolve_nodes(BackendChoice::PreferController, TIMEOUT);
    assert!(matches!(r, Err(ResolveError::BackendError(_))));
    assert_eq!(resolver.get_stats().snapshot().query_fallback, 0);
}

#[test]
fn sequential_calls_use_new_handles() {
    let script = vec![fragment(true, &[("1", "alpha")])];
    let controller = FakeController::start_n(script, 3);
    let resolver = controller.resolver();

    for _ in 0..3 {
        let nodes = resolver
            .resolve_nodes(BackendChoice::Controller, TIMEOUT)
            .unwrap();
        assert_eq!(ids(&nodes), ["1"]);
    }
    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.handle_opened, 3);
    assert_eq!(snap.context_allocated, 3);
    assert_balanced(&snap);
}

#[test]
fn concurrent_calls() {
    let script = vec![
        fragment(false, &[("1", "alpha")]),
        Action::Sleep(Duration::from_millis(50)),
        fragment(true, &[("2", "beta")]),
    ];
    let controller = FakeController::start_n(script, 4);
    let resolver = Arc::new(controller.resolver());

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let resolver = resolver.clone();
            thread::spawn(move || resolver.resolve_nodes(BackendChoice::Controller, TIMEOUT))
        })
        .collect();
    for task in tasks {
        let nodes = task.join().unwrap().unwrap();
        assert_eq!(ids(&nodes), ["1", "2"]);
    }

    let snap = resolver.get_stats().snapshot();
    assert_eq!(snap.handle_opened, 4);
    assert_balanced(&snap);
}
