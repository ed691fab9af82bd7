use std::{fmt, sync::Arc};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::field::FieldError;

/// A graph node whose evaluation is delegated to a host handler.
///
/// `config` belongs to the handler; the bridge never looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CustomNode {
    #[serde(deserialize_with = "null_as_default")]
    #[schemars(with = "String")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    #[schemars(with = "String")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    #[schemars(with = "String")]
    pub kind: String,
    pub config: Value,
}

/// One invocation: the node plus the evaluation context at that point in the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NodeRequest {
    #[serde(deserialize_with = "null_as_default")]
    #[schemars(with = "CustomNode")]
    pub node: CustomNode,
    pub input: Value,
}

impl NodeRequest {
    pub fn new(node: CustomNode, input: Value) -> Self {
        Self { node, input }
    }
}

/// An explicit `null` reads like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What a handler hands back. `output` is merged into the evaluation
/// context by the engine, `trace_data` only shows up in traces.
///
/// `None` and `Some(Value::Null)` both encode as `null` and decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeResponse {
    pub output: Option<Value>,
    pub trace_data: Option<Value>,
}

impl NodeResponse {
    pub fn with_output(output: Value) -> Self {
        Self {
            output: Some(output),
            trace_data: None,
        }
    }

    pub fn with_trace(mut self, trace_data: Value) -> Self {
        self.trace_data = Some(trace_data);
        self
    }
}

/// Failure reported by a handler. Its `Display` text is what the engine sees.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("no handler registered for node kind `{0}`")]
    UnknownKind(String),

    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    pub fn msg(message: impl Into<String>) -> Self {
        NodeError::Failed(message.into())
    }
}

/// The one trait custom node authors implement.
///
/// Handlers are shared across native call sites, so they must be `Send + Sync`;
/// any state they keep is theirs to guard.
pub trait NodeHandler: Send + Sync {
    fn handle(&self, request: NodeRequest) -> Result<NodeResponse, NodeError>;
}

impl<H: NodeHandler + ?Sized> NodeHandler for Arc<H> {
    fn handle(&self, request: NodeRequest) -> Result<NodeResponse, NodeError> {
        (**self).handle(request)
    }
}

impl<H: NodeHandler + ?Sized> NodeHandler for Box<H> {
    fn handle(&self, request: NodeRequest) -> Result<NodeResponse, NodeError> {
        (**self).handle(request)
    }
}

/// Handler backed by a plain function or closure, see [`from_fn`].
#[derive(Clone)]
pub struct FnHandler<F>(F);

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

impl<F> NodeHandler for FnHandler<F>
where
    F: Fn(NodeRequest) -> Result<NodeResponse, NodeError> + Send + Sync,
{
    fn handle(&self, request: NodeRequest) -> Result<NodeResponse, NodeError> {
        (self.0)(request)
    }
}

pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(NodeRequest) -> Result<NodeResponse, NodeError> + Send + Sync,
{
    FnHandler(f)
}
