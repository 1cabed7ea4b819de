//! In-memory channels for testing.
//!
//! `MockChannel` returns canned rows and, unless built with
//! [`MockChannel::unrecorded`], records every envelope it receives;
//! `FailingChannel` reports the same database error for every call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::SqlChannel;
use crate::error::{GuardError, Result};
use crate::query::ExecutionEnvelope;

/// A mock channel that returns predefined rows.
pub struct MockChannel {
    rows: JsonValue,
    envelopes: Option<Mutex<Vec<String>>>,
    calls: AtomicUsize,
}

impl MockChannel {
    /// Creates a mock channel returning a single placeholder row.
    pub fn new() -> Self {
        Self::with_rows(json!([{ "result": "mock" }]))
    }

    /// Creates a mock channel returning the given rows.
    pub fn with_rows(rows: JsonValue) -> Self {
        Self {
            rows,
            envelopes: Some(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a placeholder channel that only counts calls.
    ///
    /// Used when serving with `--channel mock`, where memory must not grow
    /// with the number of requests.
    pub fn unrecorded() -> Self {
        Self {
            envelopes: None,
            ..Self::new()
        }
    }

    /// Returns every envelope received so far, oldest first.
    ///
    /// Always empty for an unrecorded channel.
    pub fn envelopes(&self) -> Vec<String> {
        match &self.envelopes {
            Some(envelopes) => envelopes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            None => Vec::new(),
        }
    }

    /// Returns how many times the channel was called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlChannel for MockChannel {
    async fn execute(&self, envelope: &ExecutionEnvelope) -> Result<JsonValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(envelopes) = &self.envelopes {
            envelopes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(envelope.as_str().to_string());
        }
        Ok(self.rows.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A channel whose every call fails with the same database error.
pub struct FailingChannel {
    message: String,
    calls: AtomicUsize,
}

impl FailingChannel {
    /// Creates a failing channel reporting `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the channel was called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlChannel for FailingChannel {
    async fn execute(&self, _envelope: &ExecutionEnvelope) -> Result<JsonValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GuardError::query(self.message.clone()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
