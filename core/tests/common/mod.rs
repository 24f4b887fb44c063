//! Shared fixtures: a live mock backend and a scripted in-memory transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use astro_portal_core::{HttpRequest, HttpResponse, Transport, TransportError};
use mock_server::MockOptions;

/// Starts the mock backend on a random port and returns its base URL.
pub fn spawn_backend(options: MockOptions) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, options).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Transport that replays canned outcomes and records every request it saw.
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    seen: Mutex<Vec<(HttpRequest, Duration)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: Result<HttpResponse, TransportError>) -> &Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn push_json(&self, status: u16, body: &str) -> &Self {
        self.push(Ok(json_response(status, body)))
    }

    pub fn seen(&self) -> Vec<(HttpRequest, Duration)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push((request.clone(), timeout));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted response left".to_string())))
    }
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.as_bytes().to_vec(),
    }
}

pub fn pdf_response(bytes: &[u8]) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "application/pdf".to_string())],
        body: bytes.to_vec(),
    }
}
