//! Custom nodes shipped with the bridge.

use std::sync::Arc;

use custom_node::{HandlerRegistry, TemplateRenderer};

pub mod mul;

pub use mul::MulNode;

/// A registry holding every built-in node, rendering templates with `renderer`.
pub fn builtin_registry(renderer: Arc<dyn TemplateRenderer>) -> HandlerRegistry {
    HandlerRegistry::new().with(MulNode::KIND, MulNode::new(renderer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use custom_node::HandlebarsRenderer;

    #[test]
    fn registers_mul() {
        let registry = builtin_registry(Arc::new(HandlebarsRenderer::new()));
        assert_eq!(registry.kinds(), vec![MulNode::KIND]);
    }
}
