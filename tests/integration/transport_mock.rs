//! In-memory HTTP transport shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::Value;

use weather_indicator::providers::{HttpResponse, HttpTransport, TransportError};

/// One GET the transport served.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport answering from a URL table. Unknown URLs fail like a
/// dropped connection.
pub struct MockTransport {
    routes: Mutex<HashMap<String, HttpResponse>>,
    seen: Mutex<Vec<SeenRequest>>,
    reachable: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            seen: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
        }
    }

    pub fn respond(&self, url: &str, status: u16, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), HttpResponse::new(status, body));
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl HttpTransport for MockTransport {
    fn get_json<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(&'a str, String)],
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        self.seen.lock().unwrap().push(SeenRequest {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        let result = self
            .routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Request(format!("connection refused: {}", url)));
        Box::pin(async move { result })
    }

    fn probe<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, bool> {
        let reachable = self.reachable.load(Ordering::SeqCst);
        Box::pin(async move { reachable })
    }
}
