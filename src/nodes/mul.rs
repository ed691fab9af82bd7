use std::sync::Arc;

use custom_node::{FieldResolver, NodeError, NodeHandler, NodeRequest, NodeResponse, TemplateRenderer};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Multiplies two configured numbers.
///
/// `left` and `right` may be literals or templates over the node input,
/// `key` names the output field and is taken as written.
///
/// ### Example
///
/// With the input `{"a": 5}`, the configuration
/// ```json
/// { "left": 10, "right": "{{a}}", "key": "result" }
/// ```
/// produces the output `{"result": 50}`.
#[derive(Clone)]
pub struct MulNode {
    renderer: Arc<dyn TemplateRenderer>,
}

impl MulNode {
    pub const KIND: &'static str = "mul";

    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }
}

impl std::fmt::Debug for MulNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MulNode")
    }
}

impl NodeHandler for MulNode {
    fn handle(&self, request: NodeRequest) -> Result<NodeResponse, NodeError> {
        let fields = FieldResolver::new(&request, self.renderer.as_ref());
        let left: f64 = fields.get("left")?;
        let right: f64 = fields.get("right")?;
        let key: String = fields.get_raw("key")?;

        let product = number(left * right)
            .ok_or_else(|| NodeError::msg(format!("{left} * {right} is not a finite number")))?;
        debug!(%key, %product, "multiplied");

        let mut output = Map::new();
        output.insert(key, product);
        Ok(NodeResponse::with_output(Value::Object(output)))
    }
}

/// Whole numbers that fit an `i64` exactly encode without a fraction.
fn number(value: f64) -> Option<Value> {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.fract() == 0.0 && value.abs() <= EXACT {
        return Some(Value::from(value as i64));
    }
    Number::from_f64(value).map(Value::Number)
}
