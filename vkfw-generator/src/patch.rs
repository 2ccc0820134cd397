use anyhow::{Context as _, bail};

/// Replaces the text between every pair of marker lines.
///
/// A marker is a line whose trimmed text starts with `marker_prefix` and ends
/// with `*/`, e.g. `/* VKFW_GEN_PFNS */`; the text in between is the region
/// name. The region ends at the next line that is identical to the marker
/// after trimming. Markers and everything outside of regions are kept as is,
/// line endings are normalized to `\n`.
pub fn patch_regions<'r, F>(
    input: &str,
    marker_prefix: &str,
    mut region: F,
) -> anyhow::Result<String>
where
    F: FnMut(&str) -> Option<&'r str>,
{
    let mut out = String::with_capacity(input.len());
    // (marker, line number) of the region being replaced
    let mut open: Option<(&str, usize)> = None;

    for (i, line) in input.split_inclusive('\n').enumerate() {
        let has_newline = line.ends_with('\n');
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim();

        if let Some((marker, _)) = open {
            if trimmed == marker {
                out.push_str(line);
                if has_newline {
                    out.push('\n');
                }
                open = None;
            }
            continue;
        }

        out.push_str(line);
        out.push('\n');
        if !has_newline {
            // the last line; a marker here can never be closed.
            out.pop();
        }

        let Some(rest) = trimmed.strip_prefix(marker_prefix) else {
            continue;
        };
        let name = rest
            .strip_suffix("*/")
            .map(str::trim)
            .with_context(|| format!("line {}: malformed marker {trimmed:?}", i + 1))?;
        let content =
            region(name).with_context(|| format!("line {}: unknown region {name:?}", i + 1))?;
        log::debug!("replacing region {name} at line {}", i + 1);
        out.push_str(content);
        open = Some((trimmed, i + 1));
    }

    if let Some((marker, line)) = open {
        bail!("line {line}: marker {marker:?} is never closed");
    }

    Ok(out)
}

#[cfg(test)]
fn lookup(name: &str) -> Option<&'static str> {
    match name {
        "PFNS" => Some("PFN_vkA pfn_vkA;\n"),
        "LOAD_DEVICE" => Some("\tpfn_vkA = (PFN_vkA) load (context, \"vkA\");\n"),
        "EMPTY" => Some(""),
        _ => None,
    }
}

#[test]
fn test_patch_replaces_between_markers() {
    const INPUT: &str = "#include <vulkan/vulkan.h>

/* VKFW_GEN_PFNS */
PFN_vkOld pfn_vkOld;
/* VKFW_GEN_PFNS */

static void
load_device (void *context)
{
\t/* VKFW_GEN_LOAD_DEVICE */
\t/* VKFW_GEN_LOAD_DEVICE */
}
";
    let patched = patch_regions(INPUT, "/* VKFW_GEN_", lookup).unwrap();
    assert_eq!(
        patched,
        "#include <vulkan/vulkan.h>

/* VKFW_GEN_PFNS */
PFN_vkA pfn_vkA;
/* VKFW_GEN_PFNS */

static void
load_device (void *context)
{
\t/* VKFW_GEN_LOAD_DEVICE */
\tpfn_vkA = (PFN_vkA) load (context, \"vkA\");
\t/* VKFW_GEN_LOAD_DEVICE */
}
"
    );

    // running again over the output changes nothing.
    assert_eq!(
        patch_regions(&patched, "/* VKFW_GEN_", lookup).unwrap(),
        patched
    );
}

#[test]
fn test_patch_normalizes_line_endings() {
    const INPUT: &str = "a\r\n/* VKFW_GEN_EMPTY */\r\nold\r\n/* VKFW_GEN_EMPTY */\r\nb";
    assert_eq!(
        patch_regions(INPUT, "/* VKFW_GEN_", lookup).unwrap(),
        "a\n/* VKFW_GEN_EMPTY */\n/* VKFW_GEN_EMPTY */\nb"
    );
}

#[test]
fn test_patch_without_markers() {
    const INPUT: &str = "int x;\n/* not a marker */\n";
    assert_eq!(patch_regions(INPUT, "/* VKFW_GEN_", lookup).unwrap(), INPUT);
}

#[test]
fn test_patch_errors() {
    let patch = |input: &str| patch_regions(input, "/* VKFW_GEN_", lookup);

    // unknown region
    assert!(patch("/* VKFW_GEN_NOPE */\n/* VKFW_GEN_NOPE */\n").is_err());
    // unclosed
    assert!(patch("/* VKFW_GEN_PFNS */\nPFN_vkOld pfn_vkOld;\n").is_err());
    // malformed
    assert!(patch("/* VKFW_GEN_PFNS\n").is_err());
}
