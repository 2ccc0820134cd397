//! Preprocessor guard expressions.
//!
//! Guards are plain text over `defined(SYMBOL)` atoms joined with `&&` and
//! `||`. They are used verbatim as the condition of an `#if` line and as map
//! keys, so two guards are the same only if their text is identical.

use crate::registry::Require;

// commands whose extension grew them in a later revision. the consuming build
// has to check the header's spec version on top of the extension itself.
const SPEC_VERSION_GATES: &[(&str, u32)] = &[
    ("vkCmdSetDiscardRectangleEnableEXT", 2),
    ("vkCmdSetDiscardRectangleModeEXT", 2),
    ("vkCmdSetExclusiveScissorEnableNV", 2),
];

#[inline]
pub fn defined(symbol: &str) -> String {
    format!("defined({symbol})")
}

pub fn feature_guard(feature: &str) -> String {
    defined(feature)
}

/// Rewrites a registry `depends` expression into guard text.
///
/// Every identifier becomes `defined(identifier)`, `,` becomes `||` and `+`
/// becomes `&&`. Parentheses and anything else are copied through.
pub fn translate_depends(depends: &str) -> String {
    let mut out = String::with_capacity(depends.len() * 2);
    let mut ident = String::new();
    for c in depends.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            ident.push(c);
            continue;
        }
        if !ident.is_empty() {
            out.push_str(&defined(&ident));
            ident.clear();
        }
        match c {
            ',' => out.push_str(" || "),
            '+' => out.push_str(" && "),
            other => out.push(other),
        }
    }
    if !ident.is_empty() {
        out.push_str(&defined(&ident));
    }
    out
}

#[test]
fn test_translate_depends() {
    assert_eq!(translate_depends("VK_KHR_surface"), "defined(VK_KHR_surface)");
    assert_eq!(
        translate_depends("VK_KHR_get_physical_device_properties2,VK_VERSION_1_1"),
        "defined(VK_KHR_get_physical_device_properties2) || defined(VK_VERSION_1_1)"
    );
    assert_eq!(
        translate_depends("(VK_KHR_a+VK_KHR_b),VK_VERSION_1_2"),
        "(defined(VK_KHR_a) && defined(VK_KHR_b)) || defined(VK_VERSION_1_2)"
    );
}

/// Guard of one `<require>` block of an extension.
///
/// The disjunction of a `depends` expression is only parenthesized as a whole;
/// mixed `+`/`,` expressions without explicit parentheses in the registry are
/// taken as written.
pub fn require_guard(extension: &str, require: &Require) -> String {
    let mut guard = defined(extension);
    let listed = [require.feature, require.extension];
    for dep in listed.into_iter().flatten().flat_map(|list| list.split(',')) {
        guard.push_str(&format!(" && {}", defined(dep)));
    }
    if let Some(depends) = require.depends {
        let depends = translate_depends(depends);
        if depends.contains("||") {
            guard.push_str(&format!(" && ({depends})"));
        } else {
            guard.push_str(&format!(" && {depends}"));
        }
    }
    guard
}

#[test]
fn test_require_guard() {
    let plain = Require::default();
    assert_eq!(require_guard("VK_KHR_swapchain", &plain), "defined(VK_KHR_swapchain)");

    let legacy = Require {
        feature: Some("VK_VERSION_1_1"),
        extension: Some("VK_KHR_surface,VK_KHR_display"),
        ..Require::default()
    };
    assert_eq!(
        require_guard("VK_KHR_swapchain", &legacy),
        "defined(VK_KHR_swapchain) && defined(VK_VERSION_1_1) \
         && defined(VK_KHR_surface) && defined(VK_KHR_display)"
    );

    let conjunction = Require {
        depends: Some("VK_KHR_surface+VK_VERSION_1_1"),
        ..Require::default()
    };
    assert_eq!(
        require_guard("VK_KHR_swapchain", &conjunction),
        "defined(VK_KHR_swapchain) && defined(VK_KHR_surface) && defined(VK_VERSION_1_1)"
    );

    let disjunction = Require {
        depends: Some("VK_KHR_device_group,VK_VERSION_1_1"),
        ..Require::default()
    };
    assert_eq!(
        require_guard("VK_KHR_swapchain", &disjunction),
        "defined(VK_KHR_swapchain) && (defined(VK_KHR_device_group) || defined(VK_VERSION_1_1))"
    );
}

/// Extra condition for a command that only exists from a later revision of the
/// extension, e.g. ` && VK_EXT_DISCARD_RECTANGLES_SPEC_VERSION >= 2`.
pub fn spec_version_gate(extension: &str, command: &str) -> Option<String> {
    SPEC_VERSION_GATES
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, version)| {
            format!(
                " && {}_SPEC_VERSION >= {version}",
                extension.to_ascii_uppercase()
            )
        })
}

#[test]
fn test_spec_version_gate() {
    assert_eq!(
        spec_version_gate("VK_EXT_discard_rectangles", "vkCmdSetDiscardRectangleModeEXT")
            .as_deref(),
        Some(" && VK_EXT_DISCARD_RECTANGLES_SPEC_VERSION >= 2")
    );
    assert_eq!(
        spec_version_gate("VK_EXT_discard_rectangles", "vkCmdSetDiscardRectangleEXT"),
        None
    );
}
