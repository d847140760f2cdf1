//! Todo page compiled to a render closure by the build script.

use stencil_compiler::{Host, RenderError};
use stencil_dom::VNode;

/// Source the build script compiled.
pub const TEMPLATE: &str = include_str!("todo.html");

pub fn render(host: &mut dyn Host) -> Result<Vec<VNode>, RenderError> {
    let template = include!(concat!(env!("OUT_DIR"), "/todo.rs"));
    stencil_compiler::default_compiler()
        .runtime(host)
        .render(&template)
}
