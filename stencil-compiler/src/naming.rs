//! Identifier profiles for generated source.
//!
//! The generated closure takes one positional parameter per [`Helper`], in
//! [`Helper::ALL`] order. That order is the contract with precompiled
//! templates: new helpers go at the end.

use crate::options::Profile;

/// Runtime helper passed to a generated render closure.
///
/// Variant names match the parameter type aliases in [`crate::abi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    Lookup,
    MemberStatic,
    MemberDynamic,
    Call,
    ToDisplay,
    CreateText,
    CreateComment,
    CreateElement,
    CreateComponent,
    CreateFragment,
    CreatePortal,
    RenderSlot,
    SetAttribute,
    SetProperty,
    SetStyle,
    SetProp,
    Spread,
    SetBinding,
    On,
    Model,
    Lazy,
    Transition,
    Directive,
    Getter,
    Each,
    Range,
    Import,
    StaticList,
}

impl Helper {
    pub const ALL: [Helper; 28] = [
        Helper::Lookup,
        Helper::MemberStatic,
        Helper::MemberDynamic,
        Helper::Call,
        Helper::ToDisplay,
        Helper::CreateText,
        Helper::CreateComment,
        Helper::CreateElement,
        Helper::CreateComponent,
        Helper::CreateFragment,
        Helper::CreatePortal,
        Helper::RenderSlot,
        Helper::SetAttribute,
        Helper::SetProperty,
        Helper::SetStyle,
        Helper::SetProp,
        Helper::Spread,
        Helper::SetBinding,
        Helper::On,
        Helper::Model,
        Helper::Lazy,
        Helper::Transition,
        Helper::Directive,
        Helper::Getter,
        Helper::Each,
        Helper::Range,
        Helper::Import,
        Helper::StaticList,
    ];

    /// Name of the matching alias in [`crate::abi`].
    pub fn ident(self) -> &'static str {
        match self {
            Helper::Lookup => "Lookup",
            Helper::MemberStatic => "MemberStatic",
            Helper::MemberDynamic => "MemberDynamic",
            Helper::Call => "Call",
            Helper::ToDisplay => "ToDisplay",
            Helper::CreateText => "CreateText",
            Helper::CreateComment => "CreateComment",
            Helper::CreateElement => "CreateElement",
            Helper::CreateComponent => "CreateComponent",
            Helper::CreateFragment => "CreateFragment",
            Helper::CreatePortal => "CreatePortal",
            Helper::RenderSlot => "RenderSlot",
            Helper::SetAttribute => "SetAttribute",
            Helper::SetProperty => "SetProperty",
            Helper::SetStyle => "SetStyle",
            Helper::SetProp => "SetProp",
            Helper::Spread => "Spread",
            Helper::SetBinding => "SetBinding",
            Helper::On => "On",
            Helper::Model => "Model",
            Helper::Lazy => "Lazy",
            Helper::Transition => "Transition",
            Helper::Directive => "Directive",
            Helper::Getter => "Getter",
            Helper::Each => "Each",
            Helper::Range => "Range",
            Helper::Import => "Import",
            Helper::StaticList => "StaticList",
        }
    }

    /// Position in the parameter list.
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|h| *h == self).unwrap_or_default()
    }

    /// Helpers a getter thunk receives, shadowing the outer ones.
    pub const THUNK: [Helper; 4] = [
        Helper::Lookup,
        Helper::MemberStatic,
        Helper::MemberDynamic,
        Helper::Call,
    ];
}

/// Locals declared inside generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Local {
    Nodes,
    Element,
    Component,
    Body,
    Buffer,
    Current,
    Content,
}

impl Local {
    pub const ALL: [Local; 7] = [
        Local::Nodes,
        Local::Element,
        Local::Component,
        Local::Body,
        Local::Buffer,
        Local::Current,
        Local::Content,
    ];
}

pub trait Naming {
    fn helper(&self, helper: Helper) -> &'static str;
    fn local(&self, local: Local) -> &'static str;
}

/// Descriptive names, for reading generated code.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbose;

/// Short names, for size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compact;

impl Naming for Verbose {
    fn helper(&self, helper: Helper) -> &'static str {
        match helper {
            Helper::Lookup => "lookup",
            Helper::MemberStatic => "member_static",
            Helper::MemberDynamic => "member_dynamic",
            Helper::Call => "call",
            Helper::ToDisplay => "to_display",
            Helper::CreateText => "create_text",
            Helper::CreateComment => "create_comment",
            Helper::CreateElement => "create_element",
            Helper::CreateComponent => "create_component",
            Helper::CreateFragment => "create_fragment",
            Helper::CreatePortal => "create_portal",
            Helper::RenderSlot => "render_slot",
            Helper::SetAttribute => "set_attribute",
            Helper::SetProperty => "set_property",
            Helper::SetStyle => "set_style",
            Helper::SetProp => "set_prop",
            Helper::Spread => "spread",
            Helper::SetBinding => "set_binding",
            Helper::On => "on",
            Helper::Model => "model",
            Helper::Lazy => "lazy",
            Helper::Transition => "transition",
            Helper::Directive => "directive",
            Helper::Getter => "getter",
            Helper::Each => "each",
            Helper::Range => "range",
            Helper::Import => "import",
            Helper::StaticList => "static_list",
        }
    }

    fn local(&self, local: Local) -> &'static str {
        match local {
            Local::Nodes => "nodes",
            Local::Element => "element",
            Local::Component => "component",
            Local::Body => "body",
            Local::Buffer => "buffer",
            Local::Current => "current",
            Local::Content => "content",
        }
    }
}

const LETTERS: [&str; 28] = [
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z", "A", "B",
];

impl Naming for Compact {
    fn helper(&self, helper: Helper) -> &'static str {
        LETTERS[helper.position()]
    }

    fn local(&self, local: Local) -> &'static str {
        match local {
            Local::Nodes => "_n",
            Local::Element => "_e",
            Local::Component => "_c",
            Local::Body => "_b",
            Local::Buffer => "_s",
            Local::Current => "_v",
            Local::Content => "_t",
        }
    }
}

/// Naming strategy for a profile.
pub fn for_profile(profile: Profile) -> &'static dyn Naming {
    match profile {
        Profile::Verbose => &Verbose,
        Profile::Compact => &Compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_names_follow_abi_order() {
        assert_eq!(Compact.helper(Helper::Lookup), "a");
        assert_eq!(Compact.helper(Helper::Range), "z");
        assert_eq!(Compact.helper(Helper::StaticList), "B");
    }

    #[test]
    fn names_are_unique() {
        for naming in [&Verbose as &dyn Naming, &Compact] {
            let mut names: Vec<&str> = Helper::ALL.iter().map(|h| naming.helper(*h)).collect();
            names.extend(Local::ALL.iter().map(|l| naming.local(*l)));
            let count = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), count);
        }
    }
}
