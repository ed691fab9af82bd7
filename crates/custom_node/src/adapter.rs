use std::{
    any::Any,
    ffi::{CStr, c_char, c_void},
    panic::{AssertUnwindSafe, catch_unwind},
    str::Utf8Error,
};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    ffi::{ZenCustomNodeResult, ZenCustomNodeVTable, adapter_callback, adapter_free},
    node::{NodeError, NodeHandler, NodeRequest},
};

/// Everything that can go wrong between receiving a request and handing back
/// a response. At the boundary only the `Display` text survives.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("request pointer is null")]
    NullRequest,

    #[error("request is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),

    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Callback(#[from] NodeError),

    #[error("{0}")]
    Encode(#[source] serde_json::Error),

    #[error("custom node handler panicked: {0}")]
    Panicked(String),

    #[error("no custom node handler installed")]
    NotInstalled,

    #[error("a custom node handler is already installed")]
    AlreadyInstalled,
}

/// Coarse origin of a [`BridgeError`], for logs on the Rust side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Callback,
    Encode,
    Panic,
    Setup,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NullRequest | BridgeError::InvalidUtf8(_) | BridgeError::Decode(_) => {
                ErrorKind::Decode
            }
            BridgeError::Callback(_) => ErrorKind::Callback,
            BridgeError::Encode(_) => ErrorKind::Encode,
            BridgeError::Panicked(_) => ErrorKind::Panic,
            BridgeError::NotInstalled | BridgeError::AlreadyInstalled => ErrorKind::Setup,
        }
    }
}

/// Wraps a [`NodeHandler`] into the shape the native engine calls.
///
/// The adapter owns nothing but the handler, so one instance can serve any
/// number of concurrent calls.
#[derive(Debug, Clone)]
pub struct NodeAdapter<H> {
    handler: H,
}

impl<H: NodeHandler> NodeAdapter<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Decode, run the handler, encode. The handler only runs on a well-formed request.
    #[tracing::instrument(name = "custom_node", skip_all, fields(node_id = tracing::field::Empty, kind = tracing::field::Empty))]
    pub fn invoke(&self, raw: &str) -> Result<String, BridgeError> {
        let request: NodeRequest = serde_json::from_str(raw).map_err(BridgeError::Decode)?;

        let span = tracing::Span::current();
        span.record("node_id", request.node.id.as_str());
        span.record("kind", request.node.kind.as_str());
        debug!("invoking custom node handler");

        let response = catch_unwind(AssertUnwindSafe(|| self.handler.handle(request)))
            .map_err(|payload| BridgeError::Panicked(panic_message(payload.as_ref())))??;

        serde_json::to_string(&response).map_err(BridgeError::Encode)
    }

    /// Run one invocation and pack the outcome into a boundary result.
    pub fn call_str(&self, raw: &str) -> ZenCustomNodeResult {
        ZenCustomNodeResult::from_outcome(self.invoke(raw))
    }

    /// # Safety
    /// `request` must be null or point to a NUL-terminated string that stays
    /// valid for the duration of the call. The adapter does not keep it.
    pub unsafe fn call(&self, request: *const c_char) -> ZenCustomNodeResult {
        if request.is_null() {
            return ZenCustomNodeResult::from_outcome(Err(BridgeError::NullRequest));
        }
        match unsafe { CStr::from_ptr(request) }.to_str() {
            Ok(raw) => self.call_str(raw),
            Err(err) => ZenCustomNodeResult::from_outcome(Err(err.into())),
        }
    }
}

impl<H: NodeHandler + 'static> NodeAdapter<H> {
    /// Move the adapter behind an opaque pointer for handle-based callers.
    /// Release it with [`adapter_free::<H>`](crate::ffi::adapter_free).
    pub fn into_raw(self) -> *mut c_void {
        Box::into_raw(Box::new(self)).cast()
    }

    /// # Safety
    /// `handle` must come from [`into_raw`](Self::into_raw) with the same `H`
    /// and must not be used again afterwards.
    pub unsafe fn from_raw(handle: *mut c_void) -> Box<Self> {
        unsafe { Box::from_raw(handle.cast()) }
    }

    /// Hand the adapter to native code together with the functions that drive it.
    pub fn into_vtable(self) -> ZenCustomNodeVTable {
        ZenCustomNodeVTable {
            handle: self.into_raw(),
            call: adapter_callback::<H>,
            free: adapter_free::<H>,
        }
    }
}

pub(crate) fn log_failure(err: &BridgeError) {
    warn!(kind = ?err.kind(), error = %err, "custom node invocation failed");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
