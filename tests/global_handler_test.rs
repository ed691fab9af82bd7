//! The installed handler is process-wide, so this binary holds a single test.

use std::{ffi::CString, ptr, sync::Arc};

use serde_json::{Value, json};
use zen_bridge::{
    custom_node::{
        BridgeError, HandlebarsRenderer, ZenCustomNodeCallback, install_handler, zen_custom_node_handle,
    },
    nodes::builtin_registry,
};

#[test]
fn install_once_then_serve_through_the_exported_symbol() {
    // what an engine would be handed
    let callback: ZenCustomNodeCallback = zen_custom_node_handle;

    let request = CString::new(
        json!({
            "node": {"id": "n1", "kind": "mul", "config": {"left": 10, "right": "{{a}}", "key": "result"}},
            "input": {"a": 5}
        })
        .to_string(),
    )
    .unwrap();

    let before = unsafe { callback(request.as_ptr()).into_result() };
    assert_eq!(before.unwrap_err(), "no custom node handler installed");

    install_handler(builtin_registry(Arc::new(HandlebarsRenderer::new()))).unwrap();

    let content = unsafe { callback(request.as_ptr()).into_result() }.unwrap();
    let content: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(content, json!({"output": {"result": 50}, "traceData": null}));

    let null = unsafe { callback(ptr::null()).into_result() };
    assert_eq!(null.unwrap_err(), "request pointer is null");

    let again = install_handler(builtin_registry(Arc::new(HandlebarsRenderer::new())));
    assert!(matches!(again, Err(BridgeError::AlreadyInstalled)));

    // the first handler stays in place
    assert!(unsafe { callback(request.as_ptr()).into_result() }.is_ok());
}
