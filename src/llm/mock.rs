// src/llm/mock.rs
//! Scripted service for tests and local runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{GenerativeService, ServiceError, ServiceFuture, ServiceRequest};

/// Replays queued answers in order and records every request it receives.
/// An exhausted script answers with a transport error.
#[derive(Clone, Default)]
pub struct MockService {
    script: Arc<Mutex<VecDeque<Result<String, ServiceError>>>>,
    seen: Arc<Mutex<Vec<ServiceRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful text answer.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queue a failure.
    pub fn fail(self, err: ServiceError) -> Self {
        self.push(Err(err))
    }

    fn push(self, item: Result<String, ServiceError>) -> Self {
        self.script.lock().expect("mock script poisoned").push_back(item);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.seen.lock().expect("mock log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().expect("mock log poisoned").len()
    }
}

impl GenerativeService for MockService {
    fn generate<'a>(&'a self, req: &'a ServiceRequest) -> ServiceFuture<'a> {
        self.seen.lock().expect("mock log poisoned").push(req.clone());
        let next = self
            .script
            .lock()
            .expect("mock script poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport("mock script exhausted".into())));
        Box::pin(async move { next })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
