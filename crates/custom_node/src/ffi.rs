//! The C ABI the native engine talks to.
//!
//! # Ownership
//!
//! - Request strings belong to the caller. They are read during the call and
//!   never kept.
//! - Every non-null string inside a returned [`ZenCustomNodeResult`] was
//!   allocated here and now belongs to the caller, which must release it
//!   exactly once with [`zen_custom_node_result_free`] or
//!   [`zen_bridge_free_string`].
//! - Exactly one of `content` and `error` is non-null.

use std::{
    ffi::{CString, c_char, c_void},
    ptr,
};

use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    adapter::{BridgeError, NodeAdapter, log_failure},
    node::NodeHandler,
};

/// Dual-channel result handed back across the boundary.
#[repr(C)]
#[derive(Debug)]
pub struct ZenCustomNodeResult {
    pub content: *mut c_char,
    pub error: *mut c_char,
}

impl ZenCustomNodeResult {
    pub fn success(content: String) -> Self {
        Self {
            content: string_to_c(content),
            error: ptr::null_mut(),
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            content: ptr::null_mut(),
            error: string_to_c(message),
        }
    }

    pub(crate) fn from_outcome(outcome: Result<String, BridgeError>) -> Self {
        match outcome {
            Ok(content) => Self::success(content),
            Err(err) => {
                log_failure(&err);
                Self::failure(err.to_string())
            }
        }
    }

    pub fn is_success(&self) -> bool {
        !self.content.is_null()
    }

    /// Take back a result produced by this library, copying out the populated
    /// string and releasing both fields.
    ///
    /// # Safety
    /// Both fields must be null or come from this library, and the result
    /// must not have been released already.
    pub unsafe fn into_result(self) -> Result<String, String> {
        let content = unsafe { take_c_string(self.content) };
        let error = unsafe { take_c_string(self.error) };
        match (content, error) {
            (_, Some(error)) => Err(error),
            (Some(content), None) => Ok(content),
            (None, None) => Err("custom node returned an empty result".to_string()),
        }
    }
}

/// Function shape the engine calls for every custom node.
pub type ZenCustomNodeCallback = unsafe extern "C" fn(request: *const c_char) -> ZenCustomNodeResult;

/// Same as [`ZenCustomNodeCallback`] but with an opaque handle as first argument.
pub type ZenCustomNodeHandleCallback =
    unsafe extern "C" fn(handle: *mut c_void, request: *const c_char) -> ZenCustomNodeResult;

/// An adapter behind an opaque handle, with the functions that drive and release it.
#[repr(C)]
#[derive(Debug)]
pub struct ZenCustomNodeVTable {
    pub handle: *mut c_void,
    pub call: ZenCustomNodeHandleCallback,
    pub free: unsafe extern "C" fn(handle: *mut c_void),
}

/// # Safety
/// `handle` must come from [`NodeAdapter::into_raw`] for the same `H` and not
/// be released yet; `request` follows the rules of [`NodeAdapter::call`].
pub unsafe extern "C" fn adapter_callback<H: NodeHandler + 'static>(
    handle: *mut c_void,
    request: *const c_char,
) -> ZenCustomNodeResult {
    if handle.is_null() {
        return ZenCustomNodeResult::failure("custom node handle is null".to_string());
    }
    let adapter = unsafe { &*(handle as *const NodeAdapter<H>) };
    unsafe { adapter.call(request) }
}

/// # Safety
/// `handle` must come from [`NodeAdapter::into_raw`] for the same `H` and is
/// invalid after this call.
pub unsafe extern "C" fn adapter_free<H: NodeHandler + 'static>(handle: *mut c_void) {
    if !handle.is_null() {
        drop(unsafe { NodeAdapter::<H>::from_raw(handle) });
    }
}

static INSTALLED: OnceCell<NodeAdapter<Box<dyn NodeHandler>>> = OnceCell::new();

/// Install the process-wide handler behind [`zen_custom_node_handle`]. Only the
/// first call succeeds.
pub fn install_handler<H: NodeHandler + 'static>(handler: H) -> Result<(), BridgeError> {
    INSTALLED
        .set(NodeAdapter::new(Box::new(handler)))
        .map_err(|_| BridgeError::AlreadyInstalled)?;
    info!("custom node handler installed");
    Ok(())
}

/// Entry point for engines that take a plain [`ZenCustomNodeCallback`].
///
/// # Safety
/// `request` must be null or a valid NUL-terminated string for the duration
/// of the call. The result must be released with [`zen_custom_node_result_free`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zen_custom_node_handle(request: *const c_char) -> ZenCustomNodeResult {
    match INSTALLED.get() {
        Some(adapter) => unsafe { adapter.call(request) },
        None => ZenCustomNodeResult::from_outcome(Err(BridgeError::NotInstalled)),
    }
}

/// Release both strings of a result.
///
/// # Safety
/// Fields must be null or come from this library and not be released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zen_custom_node_result_free(result: ZenCustomNodeResult) {
    unsafe {
        zen_bridge_free_string(result.content);
        zen_bridge_free_string(result.error);
    }
}

/// Release a single string returned by this library. Null is ignored.
///
/// # Safety
/// `ptr` must be null or come from this library and not be released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zen_bridge_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Allocate a C string for the caller. Interior NUL bytes are dropped so
/// the pointer is never null.
pub(crate) fn string_to_c(s: String) -> *mut c_char {
    let c_string = CString::new(s).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c_string.into_raw()
}

unsafe fn take_c_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let owned = unsafe { CString::from_raw(ptr) };
    Some(owned.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeError, NodeRequest, NodeResponse, from_fn};
    use serde_json::{Value, json};
    use std::ffi::CStr;

    #[test]
    fn success_and_failure_populate_exactly_one_field() {
        let ok = ZenCustomNodeResult::success("{}".to_string());
        assert!(ok.is_success());
        assert!(ok.error.is_null());
        unsafe { zen_custom_node_result_free(ok) };

        let failed = ZenCustomNodeResult::failure("bad".to_string());
        assert!(!failed.is_success());
        assert!(!failed.error.is_null());
        assert_eq!(unsafe { CStr::from_ptr(failed.error) }.to_str().unwrap(), "bad");
        unsafe { zen_custom_node_result_free(failed) };
    }

    #[test]
    fn interior_nul_bytes_are_stripped() {
        let failed = ZenCustomNodeResult::failure("bad\0 input".to_string());
        assert_eq!(unsafe { failed.into_result() }.unwrap_err(), "bad input");

        let empty = ZenCustomNodeResult::failure("\0".to_string());
        assert!(!empty.error.is_null());
        assert_eq!(unsafe { empty.into_result() }.unwrap_err(), "");
    }

    #[test]
    fn empty_result_is_reported() {
        let empty = ZenCustomNodeResult {
            content: ptr::null_mut(),
            error: ptr::null_mut(),
        };
        assert!(unsafe { empty.into_result() }.is_err());
    }

    #[test]
    fn freeing_null_is_a_no_op() {
        unsafe {
            zen_bridge_free_string(ptr::null_mut());
            zen_custom_node_result_free(ZenCustomNodeResult {
                content: ptr::null_mut(),
                error: ptr::null_mut(),
            });
        }
    }

    #[test]
    fn vtable_drives_and_releases_the_adapter() {
        let adapter = NodeAdapter::new(from_fn(|req: NodeRequest| {
            match req.node.kind.as_str() {
                "echo" => Ok(NodeResponse::with_output(req.input)),
                other => Err(NodeError::UnknownKind(other.to_string())),
            }
        }));
        let vtable = adapter.into_vtable();

        let request = CString::new(json!({"node": {"kind": "echo"}, "input": [1]}).to_string()).unwrap();
        let result = unsafe { (vtable.call)(vtable.handle, request.as_ptr()) };
        let content: Value = serde_json::from_str(&unsafe { result.into_result() }.unwrap()).unwrap();
        assert_eq!(content, json!({"output": [1], "traceData": null}));

        let request = CString::new(json!({"node": {"kind": "other"}}).to_string()).unwrap();
        let result = unsafe { (vtable.call)(vtable.handle, request.as_ptr()) };
        assert_eq!(
            unsafe { result.into_result() }.unwrap_err(),
            "no handler registered for node kind `other`"
        );

        let result = unsafe { (vtable.call)(ptr::null_mut(), request.as_ptr()) };
        assert_eq!(unsafe { result.into_result() }.unwrap_err(), "custom node handle is null");

        unsafe { (vtable.free)(vtable.handle) };
    }
}
