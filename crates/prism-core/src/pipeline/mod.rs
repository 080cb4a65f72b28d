//! Chained pipeline dispatch.
//!
//! In a deployment each stage is triggered by the store when an object lands
//! under its input prefix. [`Pipeline`] plays the store's part locally: it
//! maps a written key to the stage listening on its prefix and hands that
//! stage the same notification payload the store would send.
//!
//! ```text
//! input/ → rotate → stage1/ → resize|zoom → stage2/ → greyscale → output/
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::router::event_payload;
use crate::stage::StageHandler;
use crate::store::ObjectStore;
use crate::types::{ObjectLocation, StageResult};

/// A stage together with the prefix it listens on.
struct Listener {
    input_prefix: String,
    handler: StageHandler,
}

/// A set of stages wired together by key prefix.
#[derive(Default)]
pub struct Pipeline {
    listeners: Vec<Listener>,
}

impl Pipeline {
    /// An empty pipeline. Add stages with [`Pipeline::with_stage`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The configured chain, with every stage sharing one store.
    pub fn from_config(config: &Config, store: Arc<dyn ObjectStore>) -> Self {
        config
            .pipeline
            .chain
            .iter()
            .fold(Self::new(), |pipeline, &kind| {
                let route = config.stage_route(kind);
                let handler = StageHandler::for_kind(kind, config, Arc::clone(&store));
                pipeline.with_stage(route.input_prefix, handler)
            })
    }

    /// Register a stage triggered by objects under `input_prefix`.
    pub fn with_stage(mut self, input_prefix: impl Into<String>, handler: StageHandler) -> Self {
        self.listeners.push(Listener {
            input_prefix: input_prefix.into(),
            handler,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Stage names in registration order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.handler.name()).collect()
    }

    /// The stage a write to `key` would trigger, if any.
    ///
    /// When several prefixes match, the longest wins.
    pub fn stage_for_key(&self, key: &str) -> Option<&StageHandler> {
        self.listeners
            .iter()
            .filter(|l| key.starts_with(&l.input_prefix))
            .max_by_key(|l| l.input_prefix.len())
            .map(|l| &l.handler)
    }

    /// Deliver the notification for a write at `location`.
    ///
    /// Returns `None` when no stage listens on the key.
    pub async fn dispatch(&self, location: &ObjectLocation) -> Option<StageResult> {
        let handler = self.stage_for_key(&location.key)?;
        tracing::debug!(stage = handler.name(), object = %location, "Dispatching");
        Some(handler.handle(&event_payload(location)).await)
    }

    /// Follow an object through the chain, one stage per hop.
    ///
    /// Stops at the first failure, when the last output has no listener, or
    /// after one hop per registered stage.
    pub async fn run_chain(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Vec<StageResult> {
        let mut results = Vec::new();
        let mut next = Some(ObjectLocation::new(bucket, key));

        while let Some(location) = next.take() {
            let Some(handler) = self.stage_for_key(&location.key) else {
                break;
            };
            if results.len() >= self.listeners.len() {
                tracing::warn!(object = %location, "Chain stopped after {} hops", results.len());
                break;
            }
            tracing::debug!(stage = handler.name(), object = %location, "Dispatching");
            let result = handler.handle(&event_payload(&location)).await;
            if result.success {
                next = result.output_location.clone();
            }
            results.push(result);
        }

        results
    }
}
