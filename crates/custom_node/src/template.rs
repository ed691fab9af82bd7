use std::{
    ffi::{CStr, CString, c_char},
    fmt,
};

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

use crate::{ffi::ZenCustomNodeResult, path};

/// Renders a template string against an evaluation context.
///
/// The result is typed JSON: a template that is a single expression may
/// produce a number or an object, not just text. The bridge treats the
/// grammar as opaque, so tests and embedders can plug in anything.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> Result<Value, RenderError>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Value) -> Result<Value, RenderError> + Send + Sync,
{
    fn render(&self, template: &str, context: &Value) -> Result<Value, RenderError> {
        self(template, context)
    }
}

/// Failure reported by a renderer. The message is passed on untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<handlebars::RenderError> for RenderError {
    fn from(err: handlebars::RenderError) -> Self {
        RenderError::new(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::new(err.to_string())
    }
}

/// In-process renderer built on Handlebars.
///
/// - `{{ a.b }}` alone yields the value at `a.b` with its JSON type intact
///   (`null` when missing).
/// - Anything else is rendered by Handlebars, unescaped, into a JSON string.
///
/// Strict mode turns missing values into errors in both cases.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.registry.set_strict_mode(strict);
        self
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlebarsRenderer")
            .field("strict", &self.registry.strict_mode())
            .finish()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<Value, RenderError> {
        if let Some(expr) = single_expression(template) {
            // `this` is the context itself
            let expr = match expr.as_str() {
                "this" => return Ok(context.clone()),
                other => other.strip_prefix("this.").unwrap_or(other).to_string(),
            };
            return match path::lookup(context, &expr) {
                Some(value) => Ok(value.into_owned()),
                None if self.registry.strict_mode() => Err(RenderError::new(format!(
                    "variable `{expr}` not found in context"
                ))),
                None => Ok(Value::Null),
            };
        }

        let rendered = self.registry.render_template(template, context)?;
        Ok(Value::String(rendered))
    }
}

/// The dotted path of a template made of exactly one plain `{{ path }}`.
fn single_expression(template: &str) -> Option<String> {
    let inner = template
        .trim()
        .strip_prefix("{{")?
        .strip_suffix("}}")?
        .trim();

    let plain = !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '-' | '$'));
    if !plain {
        return None;
    }

    // `items.[0]` is Handlebars for `items.0`
    Some(inner.replace(['[', ']'], ""))
}

/// Renderer exported by the native engine.
pub type ZenTemplateRenderCallback =
    unsafe extern "C" fn(template: *const c_char, context: *const c_char) -> ZenCustomNodeResult;

/// Releases strings allocated by the native engine.
pub type ZenFreeStringCallback = unsafe extern "C" fn(ptr: *mut c_char);

/// Renders through the engine's own template function.
///
/// Ownership runs the other way round here: the engine allocates the result
/// strings and this renderer hands them back to `free` after copying.
#[derive(Clone, Copy)]
pub struct NativeRenderer {
    render: ZenTemplateRenderCallback,
    free: ZenFreeStringCallback,
}

impl NativeRenderer {
    /// # Safety
    /// `render` must accept two valid NUL-terminated strings and return a
    /// result whose non-null fields were allocated so that `free` releases them.
    pub unsafe fn new(render: ZenTemplateRenderCallback, free: ZenFreeStringCallback) -> Self {
        Self { render, free }
    }

    /// Copy an engine-owned string and release it.
    unsafe fn take(&self, ptr: *mut c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        let owned = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { (self.free)(ptr) };
        Some(owned)
    }
}

impl fmt::Debug for NativeRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeRenderer")
    }
}

impl TemplateRenderer for NativeRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<Value, RenderError> {
        let c_template = CString::new(template).map_err(|e| {
            RenderError::new(format!("template contains a NUL byte at {}", e.nul_position()))
        })?;
        // serialized JSON escapes NUL, so this cannot fail on content
        let c_context = CString::new(serde_json::to_string(context)?)
            .map_err(|e| RenderError::new(e.to_string()))?;

        let result = unsafe { (self.render)(c_template.as_ptr(), c_context.as_ptr()) };
        let content = unsafe { self.take(result.content) };
        let error = unsafe { self.take(result.error) };

        match (content, error) {
            (_, Some(message)) => Err(RenderError::new(message)),
            (Some(content), None) => Ok(serde_json::from_str(&content)?),
            (None, None) => Err(RenderError::new("template renderer returned an empty result")),
        }
    }
}
