/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

#![allow(dead_code)]

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use g3_node_resolver::{
    ControllerIpcConfig, EventLoop, Resolver, ResolverBuilder, ResolverConfig,
};

static TEST_DIR_ID: AtomicUsize = AtomicUsize::new(0);

pub fn test_dir() -> PathBuf {
    let id = TEST_DIR_ID.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("g3nodes-test-{}-{id}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn private_event_loop() -> &'static EventLoop {
    Box::leak(Box::new(EventLoop::new().unwrap()))
}

#[derive(Clone)]
pub enum Action {
    /// A `<nodes>` document for our reference.
    Fragment {
        is_final: bool,
        nodes: Vec<(&'static str, &'static str)>,
    },
    /// A raw document, `{ref}` is replaced with the request reference.
    Raw(String),
    Sleep(Duration),
    Close,
}

pub fn fragment(is_final: bool, nodes: &[(&'static str, &'static str)]) -> Action {
    Action::Fragment {
        is_final,
        nodes: nodes.to_vec(),
    }
}

/// A controller daemon stand-in serving a fixed script on a unix socket.
pub struct FakeController {
    dir: PathBuf,
    socket: PathBuf,
}

impl FakeController {
    pub fn start(script: Vec<Action>) -> Self {
        FakeController::start_n(script, 1)
    }

    /// Serve `conns` connections, each with its own copy of the script.
    pub fn start_n(script: Vec<Action>, conns: usize) -> Self {
        let dir = test_dir();
        let socket = dir.join("controld.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        thread::spawn(move || {
            for _ in 0..conns {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let script = script.clone();
                thread::spawn(move || serve(stream, script));
            }
        });
        FakeController { dir, socket }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket
    }

    pub fn resolver(&self) -> Resolver {
        controller_resolver(self.socket.clone())
    }
}

/// A controller only resolver on its own event loop.
pub fn controller_resolver(socket: PathBuf) -> Resolver {
    let config = ResolverConfig {
        controller: Some(ControllerIpcConfig::new(socket)),
        config_service: None,
        ..Default::default()
    };
    ResolverBuilder::new(config)
        .event_loop(private_event_loop())
        .build()
        .unwrap()
}

impl Drop for FakeController {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn read_request(stream: &mut UnixStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => return None,
            Ok(_) if byte[0] == 0 => break,
            Ok(_) => buf.push(byte[0]),
        }
    }
    let request = String::from_utf8(buf).ok()?;
    let start = request.find("reference=\"")? + "reference=\"".len();
    let len = request[start..].find('"')?;
    Some(request[start..start + len].to_string())
}

fn serve(mut stream: UnixStream, script: Vec<Action>) {
    let Some(reference) = read_request(&mut stream) else {
        return;
    };
    for action in script {
        let doc = match action {
            Action::Fragment { is_final, nodes } => {
                let mut doc = format!("<nodes reference=\"{reference}\" final=\"{is_final}\">");
                for (id, uname) in nodes {
                    doc.push_str(&format!("<node id=\"{id}\" uname=\"{uname}\"/>"));
                }
                doc.push_str("</nodes>");
                doc
            }
            Action::Raw(s) => s.replace("{ref}", &reference),
            Action::Sleep(d) => {
                thread::sleep(d);
                continue;
            }
            Action::Close => return,
        };
        let mut buf = doc.into_bytes();
        buf.push(0);
        if stream.write_all(&buf).is_err() {
            return;
        }
    }
    // hold the channel until the client goes away
    let mut sink = Vec::new();
    let _ = stream.read_to_end(&mut sink);
}
