use std::borrow::Cow;

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::{
    node::NodeRequest,
    path,
    template::{RenderError, TemplateRenderer},
};

/// Possible errors when reading a field from a node's configuration.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("path does not exist: {path}")]
    PathNotFound { path: String },

    #[error("field `{path}` has an unexpected shape: {source}")]
    TypeMismatch {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    TemplateRender(#[from] RenderError),
}

fn locate<'a>(request: &'a NodeRequest, path: &str) -> Result<Cow<'a, Value>, FieldError> {
    path::lookup(&request.node.config, path).ok_or_else(|| FieldError::PathNotFound {
        path: path.to_string(),
    })
}

fn decode<T: DeserializeOwned>(value: &Value, path: &str) -> Result<T, FieldError> {
    <T as Deserialize>::deserialize(value).map_err(|source| FieldError::TypeMismatch {
        path: path.to_string(),
        source,
    })
}

/// Read the configuration value at `path` exactly as written.
pub fn resolve_raw<T: DeserializeOwned>(request: &NodeRequest, path: &str) -> Result<T, FieldError> {
    let value = locate(request, path)?;
    decode(&value, path)
}

/// Read the configuration value at `path`, rendering it first when it is a string.
///
/// Strings are treated as templates over `request.input`; every other JSON
/// type is taken literally and the renderer is never called.
pub fn resolve<T, R>(request: &NodeRequest, path: &str, renderer: &R) -> Result<T, FieldError>
where
    T: DeserializeOwned,
    R: TemplateRenderer + ?Sized,
{
    let value = locate(request, path)?;
    match value.as_ref() {
        Value::String(template) => {
            let rendered = renderer.render(template, &request.input)?;
            decode(&rendered, path)
        }
        literal => decode(literal, path),
    }
}

/// A request paired with the renderer its templates go through.
pub struct FieldResolver<'a, R: ?Sized> {
    request: &'a NodeRequest,
    renderer: &'a R,
}

impl<'a, R: TemplateRenderer + ?Sized> FieldResolver<'a, R> {
    pub fn new(request: &'a NodeRequest, renderer: &'a R) -> Self {
        Self { request, renderer }
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FieldError> {
        resolve(self.request, path, self.renderer)
    }

    pub fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T, FieldError> {
        resolve_raw(self.request, path)
    }

    /// Like [`get`](Self::get) but `None` when the path does not exist.
    pub fn get_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, FieldError> {
        match self.get(path) {
            Ok(value) => Ok(Some(value)),
            Err(FieldError::PathNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{node::CustomNode, template::HandlebarsRenderer};
    use serde::Deserialize;
    use serde_json::json;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn request(config: Value, input: Value) -> NodeRequest {
        NodeRequest::new(
            CustomNode {
                id: "n1".into(),
                name: "node".into(),
                kind: "test".into(),
                config,
            },
            input,
        )
    }

    /// Records how often it ran and answers with a fixed value.
    struct CountingRenderer {
        calls: AtomicUsize,
        answer: Value,
    }

    impl CountingRenderer {
        fn new(answer: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer,
            }
        }
    }

    impl TemplateRenderer for CountingRenderer {
        fn render(&self, _template: &str, _context: &Value) -> Result<Value, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn raw_missing_path_is_path_not_found_for_any_type() {
        let req = request(json!({"left": 1}), json!({}));

        assert!(matches!(resolve_raw::<i64>(&req, "right"), Err(FieldError::PathNotFound { .. })));
        assert!(matches!(resolve_raw::<String>(&req, "right"), Err(FieldError::PathNotFound { .. })));
        assert!(matches!(resolve_raw::<Value>(&req, "right"), Err(FieldError::PathNotFound { .. })));
        assert!(matches!(
            resolve_raw::<Vec<bool>>(&req, "left.deeper"),
            Err(FieldError::PathNotFound { .. })
        ));

        let err = resolve_raw::<f64>(&request(Value::Null, json!({})), "left").unwrap_err();
        assert_eq!(err.to_string(), "path does not exist: left");
    }

    #[test]
    fn raw_reads_strings_without_rendering() {
        let req = request(json!({"key": "{{a}}"}), json!({"a": 10}));
        assert_eq!(resolve_raw::<String>(&req, "key").unwrap(), "{{a}}");
    }

    #[test]
    fn raw_shape_mismatch_is_type_mismatch() {
        let req = request(json!({"left": "ten", "nothing": null}), json!({}));
        assert!(matches!(resolve_raw::<f64>(&req, "left"), Err(FieldError::TypeMismatch { .. })));
        assert!(matches!(resolve_raw::<f64>(&req, "nothing"), Err(FieldError::TypeMismatch { .. })));
        assert_eq!(resolve_raw::<Option<f64>>(&req, "nothing").unwrap(), None);
    }

    #[test]
    fn raw_deserializes_structured_values() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Limits {
            min: i32,
            max: i32,
        }

        let req = request(json!({"limits": {"min": 1, "max": 9}, "tags": {"a": "b"}}), json!({}));
        assert_eq!(resolve_raw::<Limits>(&req, "limits").unwrap(), Limits { min: 1, max: 9 });
        let tags: HashMap<String, String> = resolve_raw(&req, "tags").unwrap();
        assert_eq!(tags.get("a").map(String::as_str), Some("b"));
    }

    #[test]
    fn resolve_renders_string_values_against_input() {
        let req = request(json!({"key": "{{a}}"}), json!({"a": 10}));
        let renderer = HandlebarsRenderer::new();
        assert_eq!(resolve::<i64, _>(&req, "key", &renderer).unwrap(), 10);
    }

    #[test]
    fn resolve_takes_non_strings_literally_without_rendering() {
        let req = request(json!({"left": 3.5, "flags": [true]}), json!({}));
        let renderer = CountingRenderer::new(json!("unused"));

        assert_eq!(resolve::<f64, _>(&req, "left", &renderer).unwrap(), 3.5);
        assert_eq!(resolve::<Vec<bool>, _>(&req, "flags", &renderer).unwrap(), vec![true]);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resolve_uses_the_renderers_typed_result() {
        let req = request(json!({"right": "anything"}), json!({}));
        let renderer = CountingRenderer::new(json!({"nested": [1, 2]}));

        let value: Value = resolve(&req, "right", &renderer).unwrap();
        assert_eq!(value, json!({"nested": [1, 2]}));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);

        assert!(matches!(
            resolve::<f64, _>(&req, "right", &renderer),
            Err(FieldError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn resolve_propagates_render_errors_verbatim() {
        let req = request(json!({"right": "{{"}), json!({}));
        let failing = |_: &str, _: &Value| -> Result<Value, RenderError> {
            Err(RenderError::new("unexpected end of expression"))
        };

        let err = resolve::<f64, _>(&req, "right", &failing).unwrap_err();
        assert!(matches!(err, FieldError::TemplateRender(_)));
        assert_eq!(err.to_string(), "unexpected end of expression");
    }

    #[test]
    fn resolve_missing_path_never_renders() {
        let req = request(json!({}), json!({}));
        let renderer = CountingRenderer::new(json!(1));
        assert!(matches!(
            resolve::<i64, _>(&req, "left", &renderer),
            Err(FieldError::PathNotFound { .. })
        ));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn field_resolver_binds_request_and_renderer() {
        let req = request(
            json!({"left": 10, "right": "{{a}}", "key": "result"}),
            json!({"a": 5}),
        );
        let renderer = HandlebarsRenderer::new();
        let dyn_renderer: &dyn TemplateRenderer = &renderer;
        let fields = FieldResolver::new(&req, dyn_renderer);

        assert_eq!(fields.get::<f64>("left").unwrap(), 10.0);
        assert_eq!(fields.get::<f64>("right").unwrap(), 5.0);
        assert_eq!(fields.get_raw::<String>("key").unwrap(), "result");
        assert_eq!(fields.get_opt::<f64>("scale").unwrap(), None);
        assert!(fields.get_opt::<f64>("key").is_err());
    }
}
