//! Bridge between a native decision engine and custom node handlers.
//!
//! The engine hands a serialized [`NodeRequest`] across a C ABI, the
//! [`NodeAdapter`] decodes it, runs the [`NodeHandler`] and hands back a
//! [`ZenCustomNodeResult`] whose strings the engine releases through
//! [`zen_custom_node_result_free`].

pub mod adapter;
pub mod ffi;
pub mod field;
pub mod node;
pub mod path;
pub mod registry;
pub mod template;

pub use adapter::{BridgeError, ErrorKind, NodeAdapter};
pub use ffi::{
    ZenCustomNodeCallback, ZenCustomNodeHandleCallback, ZenCustomNodeResult, ZenCustomNodeVTable,
    install_handler, zen_bridge_free_string, zen_custom_node_handle, zen_custom_node_result_free,
};
pub use field::{FieldError, FieldResolver, resolve, resolve_raw};
pub use node::{CustomNode, FnHandler, NodeError, NodeHandler, NodeRequest, NodeResponse, from_fn};
pub use registry::HandlerRegistry;
pub use template::{
    HandlebarsRenderer, NativeRenderer, RenderError, TemplateRenderer, ZenFreeStringCallback,
    ZenTemplateRenderCallback,
};
