// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses and remote hosts.

use crate::constants::exit_status;
use crate::error::{K3aoError, Result as K3aoResult};
use crate::provisioning::{RemoteCommand, RemoteExecutor, RemoteOutput, RemoteTarget};
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::{Node, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request the mock API server received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = match req.into_body().collect().await {
                Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
                Err(_) => String::new(),
            };
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                body,
            });

            let (status, body) = response.unwrap_or_else(|| {
                // Default 404 for unmatched requests
                (404, status_json(404, "NotFound", "not found"))
            });

            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a Status JSON response body
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Create a mock Secret JSON response with the given (already decoded) data
pub fn secret_json(namespace: &str, name: &str, data: &[(&str, &str)]) -> String {
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };
    serde_json::to_string(&secret).unwrap()
}

/// Create a mock NodeList JSON response. Each node is (name, external-ip annotation).
pub fn node_list_json(nodes: &[(&str, Option<&str>)]) -> String {
    let items: Vec<Node> = nodes
        .iter()
        .map(|(name, ip)| Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([(
                    "node-role.kubernetes.io/master".to_string(),
                    "true".to_string(),
                )])),
                annotations: ip.map(|ip| {
                    BTreeMap::from([("k3s.io/external-ip".to_string(), ip.to_string())])
                }),
                ..Default::default()
            },
            ..Default::default()
        })
        .collect();

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "NodeList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

/// A remote call observed by [`RecordingExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub target: RemoteTarget,
    pub command: RemoteCommand,
    /// Whether the private key file could be read while the call ran
    pub key_readable: bool,
}

/// Remote executor that records calls instead of running ssh
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    failures: Arc<Mutex<Vec<(String, i32)>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any remote command containing `pattern` with `status`
    pub fn fail_on(self, pattern: &str, status: i32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push((pattern.to_string(), status));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<RemoteCommand> {
        self.calls().into_iter().map(|c| c.command).collect()
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn execute(
        &self,
        target: &RemoteTarget,
        command: &RemoteCommand,
    ) -> K3aoResult<RemoteOutput> {
        self.calls.lock().unwrap().push(RecordedCall {
            target: target.clone(),
            command: command.clone(),
            key_readable: std::fs::read_to_string(&target.key_path).is_ok(),
        });

        let remote_command = command.remote_command();
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| remote_command.contains(pattern.as_str()))
            .map(|(_, status)| *status);

        match failure {
            None => Ok(RemoteOutput::default()),
            Some(exit_status::SSH_CONNECTION_FAILURE) => Err(K3aoError::RemoteConnectionFailed {
                target: target.to_string(),
                reason: "Connection refused".to_string(),
            }),
            Some(status) => Err(K3aoError::RemoteCommandFailed {
                command: remote_command,
                exit_status: status,
                output: String::new(),
            }),
        }
    }
}
