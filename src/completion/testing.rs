//! Fake completion client for tests.

use super::CompletionClient;
use crate::error::{FortellError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Arguments captured from one `complete` call.
#[derive(Debug, Clone)]
pub(crate) struct CapturedCall {
    pub seq: usize,
    pub prompt: String,
    pub model: String,
    pub max_output_tokens: u32,
}

/// Scripted outcome for one fake call.
pub(crate) struct FakeReply {
    pub result: Result<String>,
    pub delay: Duration,
}

impl FakeReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            result: Ok(text.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(text: impl Into<String>, delay: Duration) -> Self {
        Self {
            result: Ok(text.into()),
            delay,
        }
    }

    pub fn error(err: FortellError) -> Self {
        Self {
            result: Err(err),
            delay: Duration::ZERO,
        }
    }
}

type Responder = dyn Fn(usize, &str) -> FakeReply + Send + Sync;

/// Completion client whose replies come from a responder closure.
///
/// The closure receives the call sequence number (0-based, in dispatch
/// order) and the prompt, so tests can script by call order or route by
/// prompt content.
pub(crate) struct FakeCompletion {
    responder: Box<Responder>,
    calls: Mutex<Vec<CapturedCall>>,
    seq: AtomicUsize,
}

impl FakeCompletion {
    pub fn new(responder: impl Fn(usize, &str) -> FakeReply + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            seq: AtomicUsize::new(0),
        }
    }

    /// Reply with the same text to every call.
    pub fn always(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| FakeReply::text(text.clone()))
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        self.calls.lock().expect("captured calls poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("captured calls poisoned").len()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, prompt: &str, model: &str, max_output_tokens: u32) -> Result<String> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .expect("captured calls poisoned")
            .push(CapturedCall {
                seq,
                prompt: prompt.to_string(),
                model: model.to_string(),
                max_output_tokens,
            });

        let reply = (self.responder)(seq, prompt);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
