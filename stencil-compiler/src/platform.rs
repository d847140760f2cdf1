//! Platform tables consulted while building the tree.

use serde::Serialize;
use serde_json::Value;
use stencil_expr::value;

/// Runtime coercion applied to a DOM property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Hint {
    String,
    Number,
    Boolean,
}

impl Hint {
    /// Variant name, for generated paths.
    pub fn ident(self) -> &'static str {
        match self {
            Hint::String => "String",
            Hint::Number => "Number",
            Hint::Boolean => "Boolean",
        }
    }

    /// Coerces `v` to the hinted type. The string `"false"` is false.
    pub fn coerce(self, v: Value) -> Value {
        match self {
            Hint::Boolean => Value::Bool(match &v {
                Value::String(s) => s != "false",
                other => value::is_truthy(other),
            }),
            Hint::Number => value::number(value::to_number(&v)),
            Hint::String => Value::String(value::to_display(&v)),
        }
    }
}

pub trait Platform: Send + Sync {
    /// Elements that never have children and may omit their end tag.
    fn is_self_closing(&self, tag: &str) -> bool;

    fn is_svg(&self, tag: &str) -> bool;

    /// Capitalized and hyphenated tags are components, as is any `$name` tag.
    fn is_component(&self, tag: &str) -> bool {
        tag.starts_with('$') || tag.starts_with(|c: char| c.is_ascii_uppercase()) || tag.contains('-')
    }

    /// DOM property an attribute maps to on a native tag.
    fn property(&self, tag: &str, name: &str) -> Option<(&'static str, Hint)>;

    /// Value of an attribute written without `=value`.
    fn default_value(&self, name: &str, is_component: bool) -> Value {
        let _ = name;
        if is_component {
            Value::Bool(true)
        } else {
            Value::String(String::new())
        }
    }

    /// Formats a literal for a native attribute, which only carries strings.
    fn format_literal(&self, literal: &Value) -> String {
        value::to_display(literal)
    }
}

const SELF_CLOSING: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const SVG: &[&str] = &[
    "svg", "g", "defs", "desc", "symbol", "use", "image", "path", "rect", "circle", "ellipse",
    "line", "polygon", "polyline", "text", "tspan", "textPath", "clipPath", "mask", "pattern",
    "marker", "linearGradient", "radialGradient", "stop", "filter", "foreignObject",
];

// (tags, attribute, property, hint). An empty tag list applies to every tag.
const PROPERTIES: &[(&[&str], &str, &str, Hint)] = &[
    (&["input", "select", "textarea", "option"], "value", "value", Hint::String),
    (&["input"], "checked", "checked", Hint::Boolean),
    (&["option"], "selected", "selected", Hint::Boolean),
    (&["select"], "multiple", "multiple", Hint::Boolean),
    (&["input", "textarea"], "readonly", "readOnly", Hint::Boolean),
    (&["input", "textarea"], "maxlength", "maxLength", Hint::Number),
    (&["input", "textarea"], "placeholder", "placeholder", Hint::String),
    (&["textarea"], "rows", "rows", Hint::Number),
    (&["textarea"], "cols", "cols", Hint::Number),
    (&["video", "audio"], "autoplay", "autoplay", Hint::Boolean),
    (&["video", "audio"], "controls", "controls", Hint::Boolean),
    (&["video", "audio"], "loop", "loop", Hint::Boolean),
    (&["video", "audio"], "muted", "muted", Hint::Boolean),
    (&["details", "dialog"], "open", "open", Hint::Boolean),
    (&[], "disabled", "disabled", Hint::Boolean),
    (&[], "hidden", "hidden", Hint::Boolean),
    (&[], "required", "required", Hint::Boolean),
    (&[], "autofocus", "autofocus", Hint::Boolean),
    (&[], "tabindex", "tabIndex", Hint::Number),
];

/// Browser tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebPlatform;

impl Platform for WebPlatform {
    fn is_self_closing(&self, tag: &str) -> bool {
        SELF_CLOSING.contains(&tag)
    }

    fn is_svg(&self, tag: &str) -> bool {
        SVG.contains(&tag)
    }

    fn property(&self, tag: &str, name: &str) -> Option<(&'static str, Hint)> {
        PROPERTIES
            .iter()
            .find(|(tags, attr, _, _)| *attr == name && (tags.is_empty() || tags.contains(&tag)))
            .map(|(_, _, prop, hint)| (*prop, *hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_lookup_is_tag_aware() {
        let web = WebPlatform;
        assert_eq!(web.property("input", "value"), Some(("value", Hint::String)));
        assert_eq!(web.property("div", "value"), None);
        assert_eq!(web.property("button", "disabled"), Some(("disabled", Hint::Boolean)));
        assert_eq!(web.property("div", "tabindex"), Some(("tabIndex", Hint::Number)));
    }

    #[test]
    fn component_detection() {
        let web = WebPlatform;
        assert!(web.is_component("Dog"));
        assert!(web.is_component("my-dog"));
        assert!(web.is_component("$name"));
        assert!(!web.is_component("div"));
    }
}
