//! Keeps the Vulkan function tables of the VKFW loader in sync with the
//! registry (`vk.xml`).
//!
//! The registry is parsed, every command is assigned the preprocessor guard
//! it is available under, and declarations, wrappers, function pointers and
//! loader assignments are spliced into marker regions of the target files.

mod config;
mod emit;
mod guard;
pub mod logger;
mod patch;
mod registry;
mod resolve;

use std::fs;
use std::path::Path;

use anyhow::Context as _;

pub use config::*;
pub use emit::{Blocks, Region, Tier, classify_tier, emit_blocks};
pub use guard::{feature_guard, require_guard, spec_version_gate, translate_depends};
pub use patch::patch_regions;
pub use registry::*;
pub use resolve::{CommandGroups, resolve_groups};

/// Runs the registry text through the whole pipeline, up to but excluding the
/// file patching.
pub fn generate_blocks(spec: &str, api: &str) -> anyhow::Result<Blocks> {
    let registry = parse_registry(spec).context("could not parse registry")?;
    let filtered = filter_registry(&registry, api).context("could not filter registry")?;
    let groups = resolve_groups(&filtered.command_groups);
    emit_blocks(&filtered, &groups)
}

pub fn generate(config: &Config) -> anyhow::Result<()> {
    let spec = fs::read_to_string(&config.spec_path)
        .with_context(|| format!("could not read {}", config.spec_path.display()))?;
    log::info!("read {} ({} bytes)", config.spec_path.display(), spec.len());

    let blocks = generate_blocks(&spec, &config.api)?;

    // every target is patched in memory before the first one is written.
    let mut outputs: Vec<(&Path, String)> = Vec::with_capacity(config.targets.len());
    for target in config.targets.iter() {
        let input = fs::read_to_string(target)
            .with_context(|| format!("could not read {}", target.display()))?;
        let output = patch_regions(&input, &config.marker_prefix, |name| {
            blocks.get_by_name(name)
        })
        .with_context(|| format!("could not patch {}", target.display()))?;
        outputs.push((target, output));
    }

    for (target, output) in outputs {
        fs::write(target, output)
            .with_context(|| format!("could not write {}", target.display()))?;
        log::info!("wrote {}", target.display());
    }

    Ok(())
}
