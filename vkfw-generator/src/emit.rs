#![allow(clippy::write_with_newline)] // this lint is dumb

use std::fmt::Write as _;

use anyhow::Context as _;

use crate::registry::FilteredRegistry;
use crate::resolve::CommandGroups;

/// A marker-bounded block of generated text in the target files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    PrototypesH,
    PrototypesC,
    Pfns,
    LoadLoader,
    LoadInstance,
    LoadDevice,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::PrototypesH,
        Region::PrototypesC,
        Region::Pfns,
        Region::LoadLoader,
        Region::LoadInstance,
        Region::LoadDevice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrototypesH => "PROTOTYPES_H",
            Self::PrototypesC => "PROTOTYPES_C",
            Self::Pfns => "PFNS",
            Self::LoadLoader => "LOAD_LOADER",
            Self::LoadInstance => "LOAD_INSTANCE",
            Self::LoadDevice => "LOAD_DEVICE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|region| region.as_str() == name)
    }
}

/// Which handle the loader resolves a command through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Loader,
    Instance,
    Device,
}

impl Tier {
    pub fn region(&self) -> Region {
        match self {
            Self::Loader => Region::LoadLoader,
            Self::Instance => Region::LoadInstance,
            Self::Device => Region::LoadDevice,
        }
    }
}

/// Resolved through dlsym by the hand-written loader, never by generated code.
const GET_INSTANCE_PROC_ADDR: &str = "vkGetInstanceProcAddr";

/// Takes a VkDevice, yet it must come from the instance level.
const GET_DEVICE_PROC_ADDR: &str = "vkGetDeviceProcAddr";

/// `None` for commands the generated loader must not assign.
pub fn classify_tier(
    registry: &FilteredRegistry,
    name: &str,
    first_param_type: &str,
) -> Option<Tier> {
    if name == GET_INSTANCE_PROC_ADDR {
        return None;
    }
    let ty = if name == GET_DEVICE_PROC_ADDR {
        "VkInstance"
    } else {
        first_param_type
    };
    if registry.is_descendant(ty, "VkDevice") && !registry.instance_commands.contains(name) {
        Some(Tier::Device)
    } else if registry.is_descendant(ty, "VkInstance") {
        Some(Tier::Instance)
    } else {
        Some(Tier::Loader)
    }
}

/// Generated text per region, for one run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Blocks {
    blocks: [String; 6],
}

impl Blocks {
    pub fn get(&self, region: Region) -> &str {
        &self.blocks[region as usize]
    }

    /// Lookup by marker name, e.g. `LOAD_DEVICE`.
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        Region::from_name(name).map(|region| self.get(region))
    }

    fn get_mut(&mut self, region: Region) -> &mut String {
        &mut self.blocks[region as usize]
    }

    fn lens(&self) -> [usize; 6] {
        self.blocks.each_ref().map(String::len)
    }
}

fn emit_command(
    blocks: &mut Blocks,
    registry: &FilteredRegistry,
    name: &str,
) -> anyhow::Result<()> {
    let command = registry.command(name)?;
    let params = registry.params(command);
    let first_param_type = params
        .first()
        .and_then(|param| param.ty)
        .with_context(|| format!("{name} has no typed first param"))?;

    let return_type = command.proto.type_text();
    let param_decls = params
        .iter()
        .map(|param| param.text())
        .collect::<Vec<_>>()
        .join(", ");
    let param_names = params
        .iter()
        .map(|param| param.name)
        .collect::<Vec<_>>()
        .join(", ");
    let decl = format!("VKFWAPI VKAPI_ATTR {return_type} VKAPI_CALL\n{name} ({param_decls})");

    write!(blocks.get_mut(Region::PrototypesH), "{decl};\n")?;

    let ret = if return_type == "void" { "" } else { "return " };
    write!(
        blocks.get_mut(Region::PrototypesC),
        "extern \"C\"\n{decl}\n{{\n\t{ret}pfn_{name} ({param_names});\n}}\n"
    )?;

    write!(blocks.get_mut(Region::Pfns), "PFN_{name} pfn_{name};\n")?;

    match classify_tier(registry, name, first_param_type) {
        Some(tier) => {
            log::trace!("{name}: {tier:?}");
            write!(
                blocks.get_mut(tier.region()),
                "\tpfn_{name} = (PFN_{name}) load (context, \"{name}\");\n"
            )?;
        }
        None => log::trace!("{name}: not loaded"),
    }

    Ok(())
}

/// Emits every command of every group, each group wrapped in `#if`/`#endif`.
///
/// Regions that got nothing for a group have its `#if` line taken back, so
/// there are no empty conditional blocks.
pub fn emit_blocks(registry: &FilteredRegistry, groups: &CommandGroups) -> anyhow::Result<Blocks> {
    let mut blocks = Blocks::default();
    let mut emitted = 0;

    for (guard, commands) in groups.iter() {
        let ifdef = format!("#if {guard}\n");
        let before = blocks.lens();
        for region in Region::ALL {
            blocks.get_mut(region).push_str(&ifdef);
        }

        let mut commands = commands.to_vec();
        commands.sort_unstable();
        for name in commands {
            emit_command(&mut blocks, registry, name)
                .with_context(|| format!("could not emit {name}"))?;
            emitted += 1;
        }

        for (region, before) in Region::ALL.into_iter().zip(before) {
            let block = blocks.get_mut(region);
            if block.len() == before + ifdef.len() {
                block.truncate(before);
            } else {
                write!(block, "#endif /* {guard} */\n")?;
            }
        }
    }

    log::info!("emitted {emitted} commands in {} guards", groups.len());

    Ok(blocks)
}

#[cfg(test)]
const REGISTRY: &str = r#"<registry>
    <types>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkInstance</name>)</type>
        <type category="handle" parent="VkInstance"><type>VK_DEFINE_HANDLE</type>(<name>VkPhysicalDevice</name>)</type>
        <type category="handle" parent="VkPhysicalDevice"><type>VK_DEFINE_HANDLE</type>(<name>VkDevice</name>)</type>
    </types>
    <commands>
        <command>
            <proto><type>PFN_vkVoidFunction</type> <name>vkGetInstanceProcAddr</name></proto>
            <param optional="true"><type>VkInstance</type> <name>instance</name></param>
            <param>const <type>char</type>* <name>pName</name></param>
        </command>
        <command>
            <proto><type>PFN_vkVoidFunction</type> <name>vkGetDeviceProcAddr</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param>const <type>char</type>* <name>pName</name></param>
        </command>
        <command>
            <proto><type>VkResult</type> <name>vkEnumerateInstanceVersion</name></proto>
            <param><type>uint32_t</type>* <name>pApiVersion</name></param>
        </command>
        <command>
            <proto><type>void</type> <name>vkDestroyDevice</name></proto>
            <param optional="true"><type>VkDevice</type> <name>device</name></param>
            <param optional="true">const <type>VkAllocationCallbacks</type>* <name>pAllocator</name></param>
        </command>
        <command>
            <proto><type>void</type> <name>vkReleaseDisplayEXT</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
        </command>
    </commands>
    <feature api="vulkan" name="VK_VERSION_1_0" number="1.0">
        <require>
            <command name="vkGetInstanceProcAddr"/>
            <command name="vkGetDeviceProcAddr"/>
            <command name="vkDestroyDevice"/>
        </require>
    </feature>
    <feature api="vulkan" name="VK_VERSION_1_1" number="1.1">
        <require>
            <command name="vkEnumerateInstanceVersion"/>
        </require>
    </feature>
    <extensions>
        <extension name="VK_EXT_direct_mode_display" type="instance" supported="vulkan">
            <require><command name="vkReleaseDisplayEXT"/></require>
        </extension>
    </extensions>
</registry>
"#;

#[cfg(test)]
fn emit_test_registry() -> Blocks {
    let registry = crate::registry::parse_registry(REGISTRY).unwrap();
    let filtered = crate::registry::filter_registry(&registry, "vulkan").unwrap();
    let groups = crate::resolve::resolve_groups(&filtered.command_groups);
    emit_blocks(&filtered, &groups).unwrap()
}

#[test]
fn test_classify_tier() {
    let registry = crate::registry::parse_registry(REGISTRY).unwrap();
    let filtered = crate::registry::filter_registry(&registry, "vulkan").unwrap();

    assert_eq!(
        classify_tier(&filtered, "vkGetInstanceProcAddr", "VkInstance"),
        None
    );
    assert_eq!(
        classify_tier(&filtered, "vkGetDeviceProcAddr", "VkDevice"),
        Some(Tier::Instance)
    );
    assert_eq!(
        classify_tier(&filtered, "vkDestroyDevice", "VkDevice"),
        Some(Tier::Device)
    );
    assert_eq!(
        classify_tier(&filtered, "vkEnumeratePhysicalDevices", "VkInstance"),
        Some(Tier::Instance)
    );
    assert_eq!(
        classify_tier(&filtered, "vkEnumerateInstanceVersion", "uint32_t"),
        Some(Tier::Loader)
    );
    // instance extension commands stay at instance level whatever they take.
    assert_eq!(
        classify_tier(&filtered, "vkReleaseDisplayEXT", "VkDevice"),
        Some(Tier::Instance)
    );
}

#[test]
fn test_emit_prototypes() {
    let blocks = emit_test_registry();

    assert_eq!(
        blocks.get(Region::PrototypesH),
        "#if defined(VK_VERSION_1_0)
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkDestroyDevice (VkDevice device, const VkAllocationCallbacks * pAllocator);
VKFWAPI VKAPI_ATTR PFN_vkVoidFunction VKAPI_CALL
vkGetDeviceProcAddr (VkDevice device, const char * pName);
VKFWAPI VKAPI_ATTR PFN_vkVoidFunction VKAPI_CALL
vkGetInstanceProcAddr (VkInstance instance, const char * pName);
#endif /* defined(VK_VERSION_1_0) */
#if defined(VK_VERSION_1_1)
VKFWAPI VKAPI_ATTR VkResult VKAPI_CALL
vkEnumerateInstanceVersion (uint32_t * pApiVersion);
#endif /* defined(VK_VERSION_1_1) */
#if defined(VK_EXT_direct_mode_display)
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkReleaseDisplayEXT (VkDevice device);
#endif /* defined(VK_EXT_direct_mode_display) */
"
    );

    assert!(blocks.get(Region::PrototypesC).starts_with(
        "#if defined(VK_VERSION_1_0)
extern \"C\"
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkDestroyDevice (VkDevice device, const VkAllocationCallbacks * pAllocator)
{
\tpfn_vkDestroyDevice (device, pAllocator);
}
extern \"C\"
VKFWAPI VKAPI_ATTR PFN_vkVoidFunction VKAPI_CALL
vkGetDeviceProcAddr (VkDevice device, const char * pName)
{
\treturn pfn_vkGetDeviceProcAddr (device, pName);
}
"
    ));

    assert!(
        blocks
            .get(Region::Pfns)
            .contains("PFN_vkEnumerateInstanceVersion pfn_vkEnumerateInstanceVersion;\n")
    );
}

#[test]
fn test_emit_loader_tiers() {
    let blocks = emit_test_registry();

    assert_eq!(
        blocks.get(Region::LoadLoader),
        "#if defined(VK_VERSION_1_1)
\tpfn_vkEnumerateInstanceVersion = (PFN_vkEnumerateInstanceVersion) load (context, \"vkEnumerateInstanceVersion\");
#endif /* defined(VK_VERSION_1_1) */
"
    );
    assert_eq!(
        blocks.get(Region::LoadInstance),
        "#if defined(VK_VERSION_1_0)
\tpfn_vkGetDeviceProcAddr = (PFN_vkGetDeviceProcAddr) load (context, \"vkGetDeviceProcAddr\");
#endif /* defined(VK_VERSION_1_0) */
#if defined(VK_EXT_direct_mode_display)
\tpfn_vkReleaseDisplayEXT = (PFN_vkReleaseDisplayEXT) load (context, \"vkReleaseDisplayEXT\");
#endif /* defined(VK_EXT_direct_mode_display) */
"
    );
    assert_eq!(
        blocks.get(Region::LoadDevice),
        "#if defined(VK_VERSION_1_0)
\tpfn_vkDestroyDevice = (PFN_vkDestroyDevice) load (context, \"vkDestroyDevice\");
#endif /* defined(VK_VERSION_1_0) */
"
    );
    assert!(!blocks.get(Region::LoadInstance).contains("vkGetInstanceProcAddr"));
}

#[test]
fn test_emit_empty_group() {
    let mut groups = CommandGroups::default();
    groups.entry("defined(VK_NOTHING)".to_string());
    let registry = crate::registry::parse_registry(REGISTRY).unwrap();
    let filtered = crate::registry::filter_registry(&registry, "vulkan").unwrap();
    assert_eq!(emit_blocks(&filtered, &groups).unwrap(), Blocks::default());
}

#[test]
fn test_emit_unknown_command() {
    let mut groups = CommandGroups::default();
    groups.insert("defined(VK_VERSION_1_0)".to_string(), "vkMissing");
    let registry = crate::registry::parse_registry(REGISTRY).unwrap();
    let filtered = crate::registry::filter_registry(&registry, "vulkan").unwrap();
    assert!(emit_blocks(&filtered, &groups).is_err());
}

#[test]
fn test_region_names() {
    for region in Region::ALL {
        assert_eq!(Region::from_name(region.as_str()), Some(region));
    }
    assert_eq!(Region::from_name("PROTOTYPES"), None);
}
