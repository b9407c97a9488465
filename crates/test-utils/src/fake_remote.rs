use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pollwatch::handlers::remote::{RemoteClient, RemoteError, RemoteFuture};
use serde_json::Value;

/// In-memory `RemoteClient` with canned responses keyed by URL.
///
/// Unknown URLs fail with a network error, which handlers treat as
/// transient. Every request URL is logged in order.
#[derive(Debug, Default, Clone)]
pub struct FakeRemote {
    json: Arc<Mutex<HashMap<String, Value>>>,
    bytes: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
    posts: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, url: &str, body: Value) -> Self {
        self.json.lock().unwrap().insert(url.to_string(), body);
        self
    }

    pub fn with_bytes(self, url: &str, body: Vec<u8>) -> Self {
        self.bytes.lock().unwrap().insert(url.to_string(), body);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }

    fn log(&self, url: &str) {
        self.requests.lock().unwrap().push(url.to_string());
    }

    fn unreachable(url: &str) -> RemoteError {
        RemoteError::Network {
            url: url.to_string(),
            message: "no canned response".to_string(),
        }
    }
}

impl RemoteClient for FakeRemote {
    fn get_json<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Value> {
        Box::pin(async move {
            self.log(url);
            let found = self.json.lock().unwrap().get(url).cloned();
            found.ok_or_else(|| Self::unreachable(url))
        })
    }

    fn get_bytes<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.log(url);
            let found = self.bytes.lock().unwrap().get(url).cloned();
            found.ok_or_else(|| Self::unreachable(url))
        })
    }

    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.log(url);
            self.posts.lock().unwrap().push((url.to_string(), body.clone()));
            Ok(())
        })
    }
}
