use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vkfw_generator::{Config, Region, generate, generate_blocks};

const MAINTENANCE1: &str = r#"
        <extension name="VK_KHR_maintenance1" number="70" type="device" supported="vulkan">
            <require>
                <command name="vkTrimCommandPoolKHR"/>
            </require>
        </extension>"#;

const REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<registry>
    <comment>
Copyright 2015-2024 The Khronos Group Inc.
    </comment>
    <types comment="Vulkan type definitions">
        <type category="handle" objtypeenum="VK_OBJECT_TYPE_INSTANCE"><type>VK_DEFINE_HANDLE</type>(<name>VkInstance</name>)</type>
        <type category="handle" parent="VkInstance" objtypeenum="VK_OBJECT_TYPE_PHYSICAL_DEVICE"><type>VK_DEFINE_HANDLE</type>(<name>VkPhysicalDevice</name>)</type>
        <type category="handle" parent="VkPhysicalDevice" objtypeenum="VK_OBJECT_TYPE_DEVICE"><type>VK_DEFINE_HANDLE</type>(<name>VkDevice</name>)</type>
        <type category="handle" parent="VkDevice" objtypeenum="VK_OBJECT_TYPE_COMMAND_POOL"><type>VK_DEFINE_NON_DISPATCHABLE_HANDLE</type>(<name>VkCommandPool</name>)</type>
        <type category="handle" parent="VkCommandPool" objtypeenum="VK_OBJECT_TYPE_COMMAND_BUFFER"><type>VK_DEFINE_HANDLE</type>(<name>VkCommandBuffer</name>)</type>
        <type category="handle" parent="VkInstance" objtypeenum="VK_OBJECT_TYPE_SURFACE_KHR"><type>VK_DEFINE_NON_DISPATCHABLE_HANDLE</type>(<name>VkSurfaceKHR</name>)</type>
        <type category="handle" parent="VkSurfaceKHR" objtypeenum="VK_OBJECT_TYPE_SWAPCHAIN_KHR"><type>VK_DEFINE_NON_DISPATCHABLE_HANDLE</type>(<name>VkSwapchainKHR</name>)</type>
    </types>
    <enums name="API Constants" type="constants">
        <enum type="uint32_t" value="256" name="VK_MAX_PHYSICAL_DEVICE_NAME_SIZE"/>
    </enums>
    <commands comment="Vulkan command definitions">
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_OUT_OF_HOST_MEMORY">
            <proto><type>VkResult</type> <name>vkCreateInstance</name></proto>
            <param>const <type>VkInstanceCreateInfo</type>* <name>pCreateInfo</name></param>
            <param optional="true">const <type>VkAllocationCallbacks</type>* <name>pAllocator</name></param>
            <param><type>VkInstance</type>* <name>pInstance</name></param>
        </command>
        <command>
            <proto><type>PFN_vkVoidFunction</type> <name>vkGetInstanceProcAddr</name></proto>
            <param optional="true"><type>VkInstance</type> <name>instance</name></param>
            <param len="null-terminated">const <type>char</type>* <name>pName</name></param>
        </command>
        <command>
            <proto><type>void</type> <name>vkTrimCommandPool</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param externsync="true"><type>VkCommandPool</type> <name>commandPool</name></param>
            <param optional="true"><type>VkCommandPoolTrimFlags</type> <name>flags</name></param>
        </command>
        <command name="vkTrimCommandPoolKHR" alias="vkTrimCommandPool"/>
        <command queues="graphics" renderpass="both" cmdbufferlevel="primary,secondary">
            <proto><type>void</type> <name>vkCmdSetDiscardRectangleEXT</name></proto>
            <param externsync="true"><type>VkCommandBuffer</type> <name>commandBuffer</name></param>
            <param><type>uint32_t</type> <name>firstDiscardRectangle</name></param>
            <param><type>uint32_t</type> <name>discardRectangleCount</name></param>
            <param len="discardRectangleCount">const <type>VkRect2D</type>* <name>pDiscardRectangles</name></param>
        </command>
        <command queues="graphics" renderpass="both" cmdbufferlevel="primary,secondary">
            <proto><type>void</type> <name>vkCmdSetDiscardRectangleEnableEXT</name></proto>
            <param externsync="true"><type>VkCommandBuffer</type> <name>commandBuffer</name></param>
            <param><type>VkBool32</type> <name>discardRectangleEnable</name></param>
        </command>
        <command>
            <proto><type>void</type> <name>vkDestroySurfaceKHR</name></proto>
            <param><type>VkInstance</type> <name>instance</name></param>
            <param optional="true" externsync="true"><type>VkSurfaceKHR</type> <name>surface</name></param>
            <param optional="true">const <type>VkAllocationCallbacks</type>* <name>pAllocator</name></param>
        </command>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_OUT_OF_HOST_MEMORY,VK_ERROR_DEVICE_LOST">
            <proto><type>VkResult</type> <name>vkCreateSwapchainKHR</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param externsync="pCreateInfo-&gt;surface,pCreateInfo-&gt;oldSwapchain">const <type>VkSwapchainCreateInfoKHR</type>* <name>pCreateInfo</name></param>
            <param optional="true">const <type>VkAllocationCallbacks</type>* <name>pAllocator</name></param>
            <param><type>VkSwapchainKHR</type>* <name>pSwapchain</name></param>
        </command>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_OUT_OF_HOST_MEMORY">
            <proto><type>VkResult</type> <name>vkGetDeviceGroupPresentCapabilitiesKHR</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param><type>VkDeviceGroupPresentCapabilitiesKHR</type>* <name>pDeviceGroupPresentCapabilities</name></param>
        </command>
    </commands>
    <feature api="vulkan,vulkansc" name="VK_VERSION_1_0" number="1.0" comment="Vulkan core API interface definitions">
        <require comment="Device initialization">
            <command name="vkCreateInstance"/>
            <command name="vkGetInstanceProcAddr"/>
        </require>
    </feature>
    <feature api="vulkan,vulkansc" name="VK_VERSION_1_1" number="1.1" depends="VK_VERSION_1_0">
        <require comment="Promoted from VK_KHR_maintenance1">
            <command name="vkTrimCommandPool"/>
        </require>
    </feature>
    <extensions comment="Vulkan extension interface definitions">
        <extension name="VK_KHR_surface" number="1" type="instance" supported="vulkan,vulkansc">
            <require>
                <enum value="25" name="VK_KHR_SURFACE_SPEC_VERSION"/>
                <command name="vkDestroySurfaceKHR"/>
            </require>
        </extension>
        <extension name="VK_KHR_swapchain" number="2" type="device" depends="VK_KHR_surface" supported="vulkan,vulkansc">
            <require>
                <command name="vkCreateSwapchainKHR"/>
            </require>
            <require depends="VK_VERSION_1_1">
                <comment>This duplicates definitions in VK_KHR_device_group below</comment>
                <command name="vkGetDeviceGroupPresentCapabilitiesKHR"/>
            </require>
        </extension>
        <extension name="VK_KHR_device_group" number="61" type="device" supported="vulkan">
            <require depends="VK_KHR_surface">
                <command name="vkGetDeviceGroupPresentCapabilitiesKHR"/>
            </require>
        </extension>
        <extension name="VK_EXT_discard_rectangles" number="100" type="device" supported="vulkan">
            <require>
                <command name="vkCmdSetDiscardRectangleEXT"/>
            </require>
            <require comment="Only present in specVersion 2">
                <command name="vkCmdSetDiscardRectangleEnableEXT"/>
            </require>
        </extension>
        <extension name="VK_KHR_maintenance1" number="70" type="device" supported="vulkan">
            <require>
                <command name="vkTrimCommandPoolKHR"/>
            </require>
        </extension>
        <extension name="VK_NV_extension_1" number="1" author="NV" supported="disabled"/>
    </extensions>
</registry>
"#;

const HEADER: &str = "#ifndef VKFW_VK_FUNCTIONS_H
#define VKFW_VK_FUNCTIONS_H 1

/* VKFW_GEN_PROTOTYPES_H */
/* VKFW_GEN_PROTOTYPES_H */

#endif /* VKFW_VK_FUNCTIONS_H */
";

const SOURCE: &str = "#include <VKFW/vk_functions.h>

/* VKFW_GEN_PFNS */
/* VKFW_GEN_PFNS */

/* VKFW_GEN_PROTOTYPES_C */
/* VKFW_GEN_PROTOTYPES_C */

void
vkfw_load_loader (void *context)
{
\t/* VKFW_GEN_LOAD_LOADER */
\t/* VKFW_GEN_LOAD_LOADER */
}

void
vkfw_load_instance (void *context)
{
\t/* VKFW_GEN_LOAD_INSTANCE */
\t/* VKFW_GEN_LOAD_INSTANCE */
}

void
vkfw_load_device (void *context)
{
\t/* VKFW_GEN_LOAD_DEVICE */
\t/* VKFW_GEN_LOAD_DEVICE */
}
";

const SHARED_GUARD: &str = "(defined(VK_KHR_device_group) && defined(VK_KHR_surface)) \
                            || (defined(VK_KHR_swapchain) && defined(VK_VERSION_1_1))";

struct Workspace {
    _dir: TempDir,
    config: Config,
}

impl Workspace {
    fn new(registry: &str) -> Self {
        let dir = TempDir::new().expect("could not create temp dir");
        let root = dir.path();
        fs::create_dir_all(root.join("core")).unwrap();
        fs::create_dir_all(root.join("include/VKFW")).unwrap();
        fs::write(root.join("vk.xml"), registry).unwrap();
        fs::write(root.join("core/vk_functions.cc"), SOURCE).unwrap();
        fs::write(root.join("include/VKFW/vk_functions.h"), HEADER).unwrap();

        let config = Config {
            spec_path: root.join("vk.xml"),
            targets: vec![
                root.join("core/vk_functions.cc"),
                root.join("include/VKFW/vk_functions.h"),
            ],
            ..Config::default()
        };
        Self { _dir: dir, config }
    }

    fn source_path(&self) -> &Path {
        &self.config.targets[0]
    }

    fn header_path(&self) -> &Path {
        &self.config.targets[1]
    }

    fn read(&self) -> (String, String) {
        (
            fs::read_to_string(self.source_path()).unwrap(),
            fs::read_to_string(self.header_path()).unwrap(),
        )
    }
}

// drops every `#if <guard>` ... `#endif /* <guard> */` block.
fn without_guard_blocks(text: &str, guard: &str) -> String {
    let open = format!("#if {guard}\n");
    let close = format!("#endif /* {guard} */\n");
    let mut out = text.to_string();
    while let Some(start) = out.find(&open) {
        let end = start + out[start..].find(&close).expect("unclosed guard") + close.len();
        out.replace_range(start..end, "");
    }
    out
}

#[test]
fn header_gets_all_prototypes() {
    let workspace = Workspace::new(REGISTRY);
    generate(&workspace.config).unwrap();

    let (_, header) = workspace.read();
    assert_eq!(
        header,
        format!(
            "#ifndef VKFW_VK_FUNCTIONS_H
#define VKFW_VK_FUNCTIONS_H 1

/* VKFW_GEN_PROTOTYPES_H */
#if defined(VK_VERSION_1_0)
VKFWAPI VKAPI_ATTR VkResult VKAPI_CALL
vkCreateInstance (const VkInstanceCreateInfo * pCreateInfo, const VkAllocationCallbacks * pAllocator, VkInstance * pInstance);
VKFWAPI VKAPI_ATTR PFN_vkVoidFunction VKAPI_CALL
vkGetInstanceProcAddr (VkInstance instance, const char * pName);
#endif /* defined(VK_VERSION_1_0) */
#if defined(VK_VERSION_1_1)
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkTrimCommandPool (VkDevice device, VkCommandPool commandPool, VkCommandPoolTrimFlags flags);
#endif /* defined(VK_VERSION_1_1) */
#if defined(VK_EXT_discard_rectangles)
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkCmdSetDiscardRectangleEXT (VkCommandBuffer commandBuffer, uint32_t firstDiscardRectangle, uint32_t discardRectangleCount, const VkRect2D * pDiscardRectangles);
#endif /* defined(VK_EXT_discard_rectangles) */
#if defined(VK_EXT_discard_rectangles) && VK_EXT_DISCARD_RECTANGLES_SPEC_VERSION >= 2
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkCmdSetDiscardRectangleEnableEXT (VkCommandBuffer commandBuffer, VkBool32 discardRectangleEnable);
#endif /* defined(VK_EXT_discard_rectangles) && VK_EXT_DISCARD_RECTANGLES_SPEC_VERSION >= 2 */
#if defined(VK_KHR_maintenance1)
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkTrimCommandPoolKHR (VkDevice device, VkCommandPool commandPool, VkCommandPoolTrimFlags flags);
#endif /* defined(VK_KHR_maintenance1) */
#if defined(VK_KHR_surface)
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkDestroySurfaceKHR (VkInstance instance, VkSurfaceKHR surface, const VkAllocationCallbacks * pAllocator);
#endif /* defined(VK_KHR_surface) */
#if defined(VK_KHR_swapchain)
VKFWAPI VKAPI_ATTR VkResult VKAPI_CALL
vkCreateSwapchainKHR (VkDevice device, const VkSwapchainCreateInfoKHR * pCreateInfo, const VkAllocationCallbacks * pAllocator, VkSwapchainKHR * pSwapchain);
#endif /* defined(VK_KHR_swapchain) */
#if {SHARED_GUARD}
VKFWAPI VKAPI_ATTR VkResult VKAPI_CALL
vkGetDeviceGroupPresentCapabilitiesKHR (VkDevice device, VkDeviceGroupPresentCapabilitiesKHR * pDeviceGroupPresentCapabilities);
#endif /* {SHARED_GUARD} */
/* VKFW_GEN_PROTOTYPES_H */

#endif /* VKFW_VK_FUNCTIONS_H */
"
        )
    );
}

#[test]
fn source_gets_loader_tiers() {
    let workspace = Workspace::new(REGISTRY);
    generate(&workspace.config).unwrap();

    let (source, _) = workspace.read();
    let load_loader = "\t/* VKFW_GEN_LOAD_LOADER */
#if defined(VK_VERSION_1_0)
\tpfn_vkCreateInstance = (PFN_vkCreateInstance) load (context, \"vkCreateInstance\");
#endif /* defined(VK_VERSION_1_0) */
\t/* VKFW_GEN_LOAD_LOADER */
";
    let load_instance = "\t/* VKFW_GEN_LOAD_INSTANCE */
#if defined(VK_KHR_surface)
\tpfn_vkDestroySurfaceKHR = (PFN_vkDestroySurfaceKHR) load (context, \"vkDestroySurfaceKHR\");
#endif /* defined(VK_KHR_surface) */
\t/* VKFW_GEN_LOAD_INSTANCE */
";
    let load_device = format!(
        "\t/* VKFW_GEN_LOAD_DEVICE */
#if defined(VK_VERSION_1_1)
\tpfn_vkTrimCommandPool = (PFN_vkTrimCommandPool) load (context, \"vkTrimCommandPool\");
#endif /* defined(VK_VERSION_1_1) */
#if defined(VK_EXT_discard_rectangles)
\tpfn_vkCmdSetDiscardRectangleEXT = (PFN_vkCmdSetDiscardRectangleEXT) load (context, \"vkCmdSetDiscardRectangleEXT\");
#endif /* defined(VK_EXT_discard_rectangles) */
#if defined(VK_EXT_discard_rectangles) && VK_EXT_DISCARD_RECTANGLES_SPEC_VERSION >= 2
\tpfn_vkCmdSetDiscardRectangleEnableEXT = (PFN_vkCmdSetDiscardRectangleEnableEXT) load (context, \"vkCmdSetDiscardRectangleEnableEXT\");
#endif /* defined(VK_EXT_discard_rectangles) && VK_EXT_DISCARD_RECTANGLES_SPEC_VERSION >= 2 */
#if defined(VK_KHR_maintenance1)
\tpfn_vkTrimCommandPoolKHR = (PFN_vkTrimCommandPoolKHR) load (context, \"vkTrimCommandPoolKHR\");
#endif /* defined(VK_KHR_maintenance1) */
#if defined(VK_KHR_swapchain)
\tpfn_vkCreateSwapchainKHR = (PFN_vkCreateSwapchainKHR) load (context, \"vkCreateSwapchainKHR\");
#endif /* defined(VK_KHR_swapchain) */
#if {SHARED_GUARD}
\tpfn_vkGetDeviceGroupPresentCapabilitiesKHR = (PFN_vkGetDeviceGroupPresentCapabilitiesKHR) load (context, \"vkGetDeviceGroupPresentCapabilitiesKHR\");
#endif /* {SHARED_GUARD} */
\t/* VKFW_GEN_LOAD_DEVICE */
"
    );

    assert!(source.contains(load_loader), "{source}");
    assert!(source.contains(load_instance), "{source}");
    assert!(source.contains(&load_device), "{source}");
    assert!(!source.contains("pfn_vkGetInstanceProcAddr ="));
}

#[test]
fn source_gets_wrappers_and_pointers() {
    let workspace = Workspace::new(REGISTRY);
    generate(&workspace.config).unwrap();

    let (source, _) = workspace.read();
    assert!(source.contains(
        "extern \"C\"
VKFWAPI VKAPI_ATTR VkResult VKAPI_CALL
vkCreateInstance (const VkInstanceCreateInfo * pCreateInfo, const VkAllocationCallbacks * pAllocator, VkInstance * pInstance)
{
\treturn pfn_vkCreateInstance (pCreateInfo, pAllocator, pInstance);
}
"
    ));
    assert!(source.contains(
        "extern \"C\"
VKFWAPI VKAPI_ATTR void VKAPI_CALL
vkTrimCommandPoolKHR (VkDevice device, VkCommandPool commandPool, VkCommandPoolTrimFlags flags)
{
\tpfn_vkTrimCommandPoolKHR (device, commandPool, flags);
}
"
    ));

    // prototypes only go to the header.
    assert!(!source.contains("VkInstance * pInstance);"));

    for name in [
        "vkCreateInstance",
        "vkGetInstanceProcAddr",
        "vkTrimCommandPool",
        "vkTrimCommandPoolKHR",
        "vkCmdSetDiscardRectangleEXT",
        "vkCmdSetDiscardRectangleEnableEXT",
        "vkDestroySurfaceKHR",
        "vkCreateSwapchainKHR",
        "vkGetDeviceGroupPresentCapabilitiesKHR",
    ] {
        let pfn = format!("PFN_{name} pfn_{name};\n");
        assert_eq!(source.matches(&pfn).count(), 1, "{pfn}");
    }
}

#[test]
fn shared_command_is_declared_once() {
    let blocks = generate_blocks(REGISTRY, "vulkan").unwrap();

    for region in Region::ALL {
        let block = blocks.get(region);
        assert!(!block.contains("#if defined(VK_KHR_swapchain) && defined(VK_VERSION_1_1)\n"));
        assert!(!block.contains("#if defined(VK_KHR_device_group) && defined(VK_KHR_surface)\n"));
    }

    let header = blocks.get(Region::PrototypesH);
    assert_eq!(
        header
            .matches("vkGetDeviceGroupPresentCapabilitiesKHR (")
            .count(),
        1
    );
    assert!(header.ends_with(&format!(
        "#if {SHARED_GUARD}
VKFWAPI VKAPI_ATTR VkResult VKAPI_CALL
vkGetDeviceGroupPresentCapabilitiesKHR (VkDevice device, VkDeviceGroupPresentCapabilitiesKHR * pDeviceGroupPresentCapabilities);
#endif /* {SHARED_GUARD} */
"
    )));
}

#[test]
fn rerun_is_idempotent() {
    let workspace = Workspace::new(REGISTRY);
    generate(&workspace.config).unwrap();
    let first = workspace.read();
    generate(&workspace.config).unwrap();
    let second = workspace.read();
    assert_eq!(first, second);
}

#[test]
fn removed_extension_leaves_other_blocks_alone() {
    let workspace = Workspace::new(REGISTRY);
    generate(&workspace.config).unwrap();
    let (source, header) = workspace.read();

    assert!(REGISTRY.contains(MAINTENANCE1));
    fs::write(&workspace.config.spec_path, REGISTRY.replace(MAINTENANCE1, "")).unwrap();
    generate(&workspace.config).unwrap();
    let (trimmed_source, trimmed_header) = workspace.read();

    assert!(!trimmed_source.contains("vkTrimCommandPoolKHR"));
    assert!(!trimmed_header.contains("vkTrimCommandPoolKHR"));
    assert_eq!(
        trimmed_source,
        without_guard_blocks(&source, "defined(VK_KHR_maintenance1)")
    );
    assert_eq!(
        trimmed_header,
        without_guard_blocks(&header, "defined(VK_KHR_maintenance1)")
    );
}

#[test]
fn failed_patch_writes_nothing() {
    let workspace = Workspace::new(REGISTRY);
    let broken = SOURCE.replacen("\t/* VKFW_GEN_LOAD_DEVICE */\n", "", 1);
    fs::write(workspace.source_path(), &broken).unwrap();

    assert!(generate(&workspace.config).is_err());

    let (source, header) = workspace.read();
    assert_eq!(source, broken);
    assert_eq!(header, HEADER);
}

#[test]
fn missing_registry_fails() {
    let mut workspace = Workspace::new(REGISTRY);
    workspace.config.spec_path = PathBuf::from("/nonexistent/vk.xml");
    assert!(generate(&workspace.config).is_err());
    assert_eq!(workspace.read(), (SOURCE.to_string(), HEADER.to_string()));
}

#[test]
fn incomplete_registry_keeps_generated_text() {
    let workspace = Workspace::new(REGISTRY);
    generate(&workspace.config).unwrap();
    let generated = workspace.read();
    assert!(generated.1.contains("vkCreateInstance ("));

    let cut = REGISTRY.find(r#"<feature api="vulkan,vulkansc" name="VK_VERSION_1_1""#).unwrap();
    for registry in [&REGISTRY[..cut], ""] {
        fs::write(&workspace.config.spec_path, registry).unwrap();
        assert!(generate(&workspace.config).is_err());
        assert_eq!(workspace.read(), generated);
    }
}

#[test]
fn unknown_command_reference_fails() {
    let registry = REGISTRY.replace(
        r#"<command name="vkCreateSwapchainKHR"/>"#,
        r#"<command name="vkCreateSwapchainKHR"/><command name="vkNotDefined"/>"#,
    );
    let err = generate_blocks(&registry, "vulkan").unwrap_err();
    assert!(format!("{err:#}").contains("vkNotDefined"));
}
