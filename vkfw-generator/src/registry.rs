use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use anyhow::{Context as _, bail};
use xml_iterator::{Element, ElementIterator, StartTag, unescape};

use crate::guard;
use crate::resolve::CommandGroups;

// xml schema:
// https://registry.khronos.org/vulkan/specs/latest/registry.html

#[derive(Debug)]
pub struct Type<'a> {
    pub name: &'a str,
    pub parents: Vec<&'a str>,
    pub alias: Option<&'a str>,
}

/// A `<proto>` or a `<param>`: a C declarator split into its text pieces.
#[derive(Debug)]
pub struct Declaration<'a> {
    pub name: &'a str,
    /// Text of the `<type>` child.
    pub ty: Option<&'a str>,
    pub api: Option<&'a str>,
    pub parts: Vec<Cow<'a, str>>,
    name_index: usize,
}

impl Declaration<'_> {
    /// The whole declarator, e.g. `const VkInstanceCreateInfo * pCreateInfo`.
    pub fn text(&self) -> String {
        self.parts.join(" ")
    }

    /// Everything in front of the name, e.g. `VkResult`.
    pub fn type_text(&self) -> String {
        self.parts[..self.name_index].join(" ")
    }
}

#[derive(Debug)]
pub struct Command<'a> {
    pub api: Option<&'a str>,
    pub proto: Declaration<'a>,
    pub params: Vec<Declaration<'a>>,
}

#[derive(Debug)]
pub struct CommandAlias<'a> {
    pub name: &'a str,
    pub alias: &'a str,
}

#[derive(Debug, Default)]
pub struct Require<'a> {
    pub api: Option<&'a str>,
    pub feature: Option<&'a str>,
    pub extension: Option<&'a str>,
    pub depends: Option<&'a str>,
    pub commands: Vec<&'a str>,
}

#[derive(Debug)]
pub struct Feature<'a> {
    pub api: &'a str,
    pub name: &'a str,
    pub requires: Vec<Require<'a>>,
}

#[derive(Debug)]
pub struct Extension<'a> {
    pub name: &'a str,
    pub supported: &'a str,
    pub ty: Option<&'a str>,
    pub requires: Vec<Require<'a>>,
}

#[derive(Debug, Default)]
pub struct Registry<'a> {
    pub types: Vec<Type<'a>>,
    pub commands: Vec<Command<'a>>,
    pub aliases: Vec<CommandAlias<'a>>,
    pub features: Vec<Feature<'a>>,
    pub extensions: Vec<Extension<'a>>,
}

#[inline]
fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace())
}

/// `true` if the comma separated api list names `api`.
#[inline]
pub fn api_matches(list: &str, api: &str) -> bool {
    list.split(',').any(|part| part == api)
}

fn next_element<'a>(element_iterator: &mut ElementIterator<'a>) -> anyhow::Result<Element<'a>> {
    element_iterator.next().context("unexpected eof")
}

fn expect_text<'a>(element_iterator: &mut ElementIterator<'a>) -> anyhow::Result<&'a str> {
    let element = next_element(element_iterator)?;
    let Element::Text(text) = element else {
        bail!("unexpected element (got {element:?}, want text)");
    };
    Ok(text.trim())
}

fn expect_end_tag(element_iterator: &mut ElementIterator, tag_name: &str) -> anyhow::Result<()> {
    let element = next_element(element_iterator)?;
    match element {
        Element::EndTag(end) if end.name == tag_name => Ok(()),
        other => bail!("unexpected element (got {other:?}, want end of {tag_name})"),
    }
}

/// Consumes everything up to and including the end tag of an already opened
/// `tag_name` element.
fn skip_element(tag_name: &str, element_iterator: &mut ElementIterator) -> anyhow::Result<()> {
    let mut depth = 0usize;
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(_) => depth += 1,
            Element::EndTag(end) if depth == 0 => {
                if end.name != tag_name {
                    bail!("unexpected end: {} (want {tag_name})", end.name);
                }
                return Ok(());
            }
            Element::EndTag(_) => depth -= 1,
            _ => {}
        }
    }
}

/// All text inside an already opened `tag_name` element, comments excluded.
fn collect_text(tag_name: &str, element_iterator: &mut ElementIterator) -> anyhow::Result<String> {
    let mut parts: Vec<String> = Vec::new();
    loop {
        match next_element(element_iterator)? {
            Element::Text(text) if !is_blank(text) => parts.push(unescape(text.trim()).into()),
            Element::StartTag(start) if start.name == "comment" => {
                skip_element(start.name, element_iterator)?
            }
            Element::StartTag(start) => {
                let text = collect_text(start.name, element_iterator)?;
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            Element::EndTag(end) if end.name == tag_name => break,
            Element::EndTag(end) => bail!("unexpected end: {} (want {tag_name})", end.name),
            _ => {}
        }
    }
    Ok(parts.join(" "))
}

fn new_type<'a>(
    name: &'a str,
    parent: Option<&'a str>,
    alias: Option<&'a str>,
) -> Type<'a> {
    Type {
        name,
        parents: parent
            .map(|parent| parent.split(',').collect())
            .unwrap_or_default(),
        alias,
    }
}

// the name is either a `<name>` child (handles, structs, ...) or an attr
// (aliases, platform types, ...). nameless types are of no use here.
fn parse_type<'a>(
    start_tag: StartTag<'a>,
    element_iterator: &mut ElementIterator<'a>,
) -> anyhow::Result<Option<Type<'a>>> {
    let mut name: Option<&'a str> = None;
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(start) if start.name == "name" => {
                let text = expect_text(element_iterator)?;
                expect_end_tag(element_iterator, "name")?;
                name.get_or_insert(text);
            }
            Element::StartTag(start) => skip_element(start.name, element_iterator)?,
            Element::EndTag(end) if end.name == "type" => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    Ok(name
        .or(start_tag.attr("name"))
        .map(|name| new_type(name, start_tag.attr("parent"), start_tag.attr("alias"))))
}

fn parse_types_into<'a>(
    element_iterator: &mut ElementIterator<'a>,
    types: &mut Vec<Type<'a>>,
) -> anyhow::Result<()> {
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(start) if start.name == "type" => {
                if let Some(ty) = parse_type(start, element_iterator)? {
                    types.push(ty);
                }
            }
            Element::EmptyTag(empty) if empty.name == "type" => {
                if let Some(name) = empty.attr("name") {
                    types.push(new_type(name, empty.attr("parent"), empty.attr("alias")));
                }
            }
            Element::StartTag(start) => skip_element(start.name, element_iterator)?,
            Element::EndTag(end) if end.name == "types" => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    Ok(())
}

fn parse_declaration<'a>(
    start_tag: StartTag<'a>,
    element_iterator: &mut ElementIterator<'a>,
) -> anyhow::Result<Declaration<'a>> {
    let mut name: Option<(&'a str, usize)> = None;
    let mut ty: Option<&'a str> = None;
    let mut parts: Vec<Cow<'a, str>> = Vec::new();
    loop {
        match next_element(element_iterator)? {
            Element::Text(text) if !is_blank(text) => parts.push(unescape(text.trim())),
            Element::StartTag(start) => match start.name {
                "name" => {
                    if name.is_some() {
                        bail!("duplicate name");
                    }
                    let text = expect_text(element_iterator)?;
                    expect_end_tag(element_iterator, "name")?;
                    name = Some((text, parts.len()));
                    parts.push(Cow::Borrowed(text));
                }
                "type" => {
                    let text = expect_text(element_iterator)?;
                    expect_end_tag(element_iterator, "type")?;
                    ty.get_or_insert(text);
                    parts.push(Cow::Borrowed(text));
                }
                "comment" => skip_element("comment", element_iterator)?,
                other => {
                    let text = collect_text(other, element_iterator)?;
                    if !text.is_empty() {
                        parts.push(Cow::Owned(text));
                    }
                }
            },
            Element::EndTag(end) if end.name == start_tag.name => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    let (name, name_index) = name.with_context(|| format!("{} name is missing", start_tag.name))?;
    Ok(Declaration {
        name,
        ty,
        api: start_tag.attr("api"),
        parts,
        name_index,
    })
}

fn parse_command<'a>(
    start_tag: StartTag<'a>,
    element_iterator: &mut ElementIterator<'a>,
) -> anyhow::Result<Command<'a>> {
    let mut proto: Option<Declaration<'a>> = None;
    let mut params: Vec<Declaration<'a>> = Vec::new();
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(start) => match start.name {
                "proto" => {
                    if proto.is_some() {
                        bail!("duplicate proto");
                    }
                    proto = Some(
                        parse_declaration(start, element_iterator)
                            .context("could not parse command proto")?,
                    );
                }
                "param" => {
                    params.push(
                        parse_declaration(start, element_iterator)
                            .context("could not parse command param")?,
                    );
                }
                // implicitexternsyncparams holds params of its own.
                other => skip_element(other, element_iterator)?,
            },
            Element::EndTag(end) => match end.name {
                "command" => break,
                other => bail!("unexpected end: {other}"),
            },
            _ => {}
        }
    }
    Ok(Command {
        api: start_tag.attr("api"),
        proto: proto.context("proto is missing")?,
        params,
    })
}

fn parse_command_alias<'a>(name: Option<&'a str>, alias: &'a str) -> anyhow::Result<CommandAlias<'a>> {
    Ok(CommandAlias {
        name: name.context("alias name is missing")?,
        alias,
    })
}

fn parse_commands_into<'a>(
    element_iterator: &mut ElementIterator<'a>,
    registry: &mut Registry<'a>,
) -> anyhow::Result<()> {
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(start) if start.name == "command" => {
                if let Some(alias) = start.attr("alias") {
                    registry.aliases.push(parse_command_alias(start.attr("name"), alias)?);
                    skip_element("command", element_iterator)?;
                    continue;
                }
                let command = parse_command(start, element_iterator)
                    .context("could not parse command")?;
                registry.commands.push(command);
            }
            Element::EmptyTag(empty) if empty.name == "command" => {
                let alias = empty
                    .attr("alias")
                    .with_context(|| format!("command without body is not an alias: {empty:?}"))?;
                registry.aliases.push(parse_command_alias(empty.attr("name"), alias)?);
            }
            Element::StartTag(start) => skip_element(start.name, element_iterator)?,
            Element::EndTag(end) if end.name == "commands" => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    Ok(())
}

fn require_attrs<'a>(attr: impl Fn(&str) -> Option<&'a str>) -> Require<'a> {
    Require {
        api: attr("api"),
        feature: attr("feature"),
        extension: attr("extension"),
        depends: attr("depends"),
        commands: Vec::new(),
    }
}

fn parse_require<'a>(
    start_tag: StartTag<'a>,
    element_iterator: &mut ElementIterator<'a>,
) -> anyhow::Result<Require<'a>> {
    let mut require = require_attrs(|key| start_tag.attr(key));
    loop {
        match next_element(element_iterator)? {
            Element::EmptyTag(empty) if empty.name == "command" => {
                let name = empty.attr("name").context("command name is missing")?;
                require.commands.push(name);
            }
            Element::StartTag(start) => skip_element(start.name, element_iterator)?,
            Element::EndTag(end) if end.name == "require" => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    Ok(require)
}

// feature and extension bodies look the same: a list of require blocks plus
// things (remove, deprecate) that do not matter here.
fn parse_requires<'a>(
    tag_name: &str,
    element_iterator: &mut ElementIterator<'a>,
) -> anyhow::Result<Vec<Require<'a>>> {
    let mut requires: Vec<Require<'a>> = Vec::new();
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(start) if start.name == "require" => {
                requires.push(parse_require(start, element_iterator)?);
            }
            Element::EmptyTag(empty) if empty.name == "require" => {
                requires.push(require_attrs(|key| empty.attr(key)));
            }
            Element::StartTag(start) => skip_element(start.name, element_iterator)?,
            Element::EndTag(end) if end.name == tag_name => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    Ok(requires)
}

fn parse_feature<'a>(
    start_tag: StartTag<'a>,
    element_iterator: &mut ElementIterator<'a>,
) -> anyhow::Result<Feature<'a>> {
    let name = start_tag.attr("name").context("name is missing")?;
    let api = start_tag
        .attr("api")
        .with_context(|| format!("api of {name} is missing"))?;
    let requires = parse_requires("feature", element_iterator)
        .with_context(|| format!("could not parse feature {name}"))?;
    Ok(Feature {
        api,
        name,
        requires,
    })
}

fn extension_attrs<'a>(attr: impl Fn(&str) -> Option<&'a str>) -> anyhow::Result<Extension<'a>> {
    let name = attr("name").context("name is missing")?;
    Ok(Extension {
        name,
        supported: attr("supported").with_context(|| format!("supported of {name} is missing"))?,
        ty: attr("type"),
        requires: Vec::new(),
    })
}

fn parse_extensions_into<'a>(
    element_iterator: &mut ElementIterator<'a>,
    extensions: &mut Vec<Extension<'a>>,
) -> anyhow::Result<()> {
    loop {
        match next_element(element_iterator)? {
            Element::StartTag(start) if start.name == "extension" => {
                let mut extension = extension_attrs(|key| start.attr(key))?;
                extension.requires = parse_requires("extension", element_iterator)
                    .with_context(|| format!("could not parse extension {}", extension.name))?;
                extensions.push(extension);
            }
            Element::EmptyTag(empty) if empty.name == "extension" => {
                extensions.push(extension_attrs(|key| empty.attr(key))?);
            }
            Element::StartTag(start) => skip_element(start.name, element_iterator)?,
            Element::EndTag(end) if end.name == "extensions" => break,
            Element::EndTag(end) => bail!("unexpected end: {}", end.name),
            _ => {}
        }
    }
    Ok(())
}

pub fn parse_registry<'a>(input: &'a str) -> anyhow::Result<Registry<'a>> {
    let mut registry = Registry::default();

    let mut element_iterator = ElementIterator::new(input);
    loop {
        let element = element_iterator.next().context("registry element is missing")?;
        match element {
            Element::StartTag(start) if start.name == "registry" => break,
            Element::Text(text) if is_blank(text) => {}
            Element::Comment(_) => {}
            other => bail!("unexpected element (got {other:?}, want registry)"),
        }
    }

    // a truncated document runs out before `</registry>` and fails in
    // next_element.
    loop {
        match next_element(&mut element_iterator)? {
            Element::StartTag(start) => match start.name {
                "types" => parse_types_into(&mut element_iterator, &mut registry.types)
                    .context("could not parse types")?,
                "commands" => parse_commands_into(&mut element_iterator, &mut registry)
                    .context("could not parse commands")?,
                "feature" => {
                    let feature = parse_feature(start, &mut element_iterator)
                        .context("could not parse feature")?;
                    registry.features.push(feature);
                }
                "extensions" => {
                    parse_extensions_into(&mut element_iterator, &mut registry.extensions)
                        .context("could not parse extensions")?
                }
                other => skip_element(other, &mut element_iterator)
                    .with_context(|| format!("could not skip {other}"))?,
            },
            Element::EndTag(end) if end.name == "registry" => break,
            Element::EndTag(end) => bail!("unexpected end: {} (want registry)", end.name),
            _ => {}
        }
    }

    log::info!(
        "parsed {} types, {} commands ({} aliases), {} features, {} extensions",
        registry.types.len(),
        registry.commands.len(),
        registry.aliases.len(),
        registry.features.len(),
        registry.extensions.len(),
    );

    Ok(registry)
}

/// The part of the registry that applies to one api, keyed the way the
/// resolver and the emitter need it.
#[derive(Debug)]
pub struct FilteredRegistry<'r> {
    pub api: &'r str,
    /// Feature levels in document order, then extensions by name.
    pub command_groups: CommandGroups<'r>,
    /// Commands of extensions of type `instance`.
    pub instance_commands: HashSet<&'r str>,
    /// Aliases map to the definition of the command they alias.
    pub commands: HashMap<&'r str, &'r Command<'r>>,
    pub types: HashMap<&'r str, &'r Type<'r>>,
}

impl<'r> FilteredRegistry<'r> {
    pub fn command(&self, name: &str) -> anyhow::Result<&'r Command<'r>> {
        self.commands
            .get(name)
            .copied()
            .with_context(|| format!("command {name} is not defined"))
    }

    /// Params of `command` that exist for this api.
    pub fn params<'c>(&self, command: &'c Command<'r>) -> Vec<&'c Declaration<'r>> {
        command
            .params
            .iter()
            .filter(|param| param.api.is_none_or(|list| api_matches(list, self.api)))
            .collect()
    }

    /// `true` if `name` is `base` or reaches it through its parents (or the
    /// type it aliases).
    pub fn is_descendant(&self, name: &str, base: &str) -> bool {
        if name == base {
            return true;
        }
        let Some(ty) = self.types.get(name) else {
            return false;
        };
        ty.parents
            .iter()
            .chain(ty.alias.iter())
            .any(|parent| self.is_descendant(parent, base))
    }
}

pub fn filter_registry<'r>(
    registry: &'r Registry<'r>,
    api: &'r str,
) -> anyhow::Result<FilteredRegistry<'r>> {
    let applies = |list: Option<&str>| list.is_none_or(|list| api_matches(list, api));

    let mut command_groups = CommandGroups::default();
    for feature in registry.features.iter() {
        if !api_matches(feature.api, api) {
            log::debug!("skipping feature {} (api {})", feature.name, feature.api);
            continue;
        }
        let commands = command_groups.entry(guard::feature_guard(feature.name));
        for require in feature.requires.iter().filter(|it| applies(it.api)) {
            for &command in require.commands.iter() {
                if !commands.contains(&command) {
                    commands.push(command);
                }
            }
        }
    }

    let mut extensions: Vec<&Extension> = registry.extensions.iter().collect();
    extensions.sort_by_key(|extension| extension.name);

    let mut instance_commands: HashSet<&'r str> = HashSet::new();
    let mut skipped = 0;
    for extension in extensions {
        if !api_matches(extension.supported, api) {
            log::debug!(
                "skipping extension {} (supported {})",
                extension.name,
                extension.supported
            );
            skipped += 1;
            continue;
        }
        for require in extension.requires.iter().filter(|it| applies(it.api)) {
            let guard = guard::require_guard(extension.name, require);
            for &command in require.commands.iter() {
                match guard::spec_version_gate(extension.name, command) {
                    Some(gate) => command_groups.insert(format!("{guard}{gate}"), command),
                    None => command_groups.insert(guard.clone(), command),
                }
            }
            if extension.ty == Some("instance") {
                instance_commands.extend(require.commands.iter().copied());
            }
        }
    }
    log::info!(
        "collected {} guards for {api} ({skipped} extensions skipped)",
        command_groups.len()
    );

    let mut commands: HashMap<&'r str, &'r Command<'r>> = HashMap::new();
    for command in registry.commands.iter() {
        if applies(command.api) {
            commands.insert(command.proto.name, command);
        }
    }
    for alias in registry.aliases.iter() {
        match commands.get(alias.alias).copied() {
            Some(command) => {
                commands.insert(alias.name, command);
            }
            None => log::debug!("{} aliases unknown command {}", alias.name, alias.alias),
        }
    }

    let types: HashMap<&'r str, &'r Type<'r>> =
        registry.types.iter().map(|ty| (ty.name, ty)).collect();

    Ok(FilteredRegistry {
        api,
        command_groups,
        instance_commands,
        commands,
        types,
    })
}

#[cfg(test)]
const REGISTRY: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<registry>
    <comment>trimmed down</comment>
    <platforms comment="ignored">
        <platform name="xcb" protect="VK_USE_PLATFORM_XCB_KHR" comment="X Windows"/>
    </platforms>
    <types comment="handles">
        <type category="include" name="vk_platform">#include "vk_platform.h"</type>
        <type category="define">// MACRO
#define <name>VK_MAKE_VERSION</name>(major, minor, patch) \
    ((((uint32_t)(major)) &lt;&lt; 22U))</type>
        <type category="handle" objtypeenum="VK_OBJECT_TYPE_INSTANCE"><type>VK_DEFINE_HANDLE</type>(<name>VkInstance</name>)</type>
        <type category="handle" parent="VkInstance" objtypeenum="VK_OBJECT_TYPE_PHYSICAL_DEVICE"><type>VK_DEFINE_HANDLE</type>(<name>VkPhysicalDevice</name>)</type>
        <type category="handle" parent="VkPhysicalDevice"><type>VK_DEFINE_HANDLE</type>(<name>VkDevice</name>)</type>
        <type category="handle" parent="VkDevice"><type>VK_DEFINE_HANDLE</type>(<name>VkQueue</name>)</type>
        <type category="handle" name="VkQueueAlias" alias="VkQueue"/>
        <type category="struct" name="VkExtent2D">
            <member><type>uint32_t</type>        <name>width</name></member>
            <member><type>uint32_t</type>        <name>height</name><comment>a comment</comment></member>
        </type>
    </types>
    <commands comment="commands">
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_OUT_OF_HOST_MEMORY">
            <proto><type>VkResult</type> <name>vkCreateDevice</name></proto>
            <param><type>VkPhysicalDevice</type> <name>physicalDevice</name></param>
            <param>const <type>VkDeviceCreateInfo</type>* <name>pCreateInfo</name></param>
            <param api="vulkansc">const <type>VkAllocationCallbacks</type>* <name>pAllocator</name></param>
            <param><type>VkDevice</type>* <name>pDevice</name></param>
        </command>
        <command>
            <proto><type>void</type> <name>vkCmdSetBlendConstants</name></proto>
            <param externsync="true"><type>VkCommandBuffer</type> <name>commandBuffer</name></param>
            <param>const <type>float</type> <name>blendConstants</name>[4]</param>
            <implicitexternsyncparams>
                <param>the VkCommandPool that commandBuffer was allocated from</param>
            </implicitexternsyncparams>
        </command>
        <command name="vkCmdSetBlendConstantsEXT" alias="vkCmdSetBlendConstants"/>
    </commands>
    <feature api="vulkan,vulkansc" name="VK_VERSION_1_0" number="1.0">
        <require comment="Device commands">
            <type name="VkDevice"/>
            <command name="vkCreateDevice"/>
        </require>
        <require/>
    </feature>
    <feature api="vulkansc" name="VKSC_VERSION_1_0" number="1.0">
        <require><command name="vkGetFaultData"/></require>
    </feature>
    <extensions comment="extensions">
        <extension name="VK_KHR_b" number="2" type="device" supported="vulkan"
                   depends="VK_KHR_a">
            <require depends="VK_KHR_c,VK_VERSION_1_1">
                <comment>needs c or 1.1</comment>
                <command name="vkCmdSetBlendConstants"/>
            </require>
            <require api="vulkansc"><command name="vkScOnly"/></require>
        </extension>
        <extension name="VK_KHR_a" number="1" type="instance" supported="vulkan,vulkansc">
            <require><command name="vkCreateDevice"/></require>
        </extension>
        <extension name="VK_NV_disabled" number="3" supported="disabled"/>
    </extensions>
</registry>
"##;

#[test]
fn test_parse_registry() {
    let registry = parse_registry(REGISTRY).unwrap();

    let type_names: Vec<&str> = registry.types.iter().map(|ty| ty.name).collect();
    assert_eq!(
        type_names,
        [
            "vk_platform",
            "VK_MAKE_VERSION",
            "VkInstance",
            "VkPhysicalDevice",
            "VkDevice",
            "VkQueue",
            "VkQueueAlias",
            "VkExtent2D",
        ]
    );
    assert_eq!(registry.types[3].parents, ["VkInstance"]);
    assert_eq!(registry.types[6].alias, Some("VkQueue"));

    assert_eq!(registry.commands.len(), 2);
    let create_device = &registry.commands[0];
    assert_eq!(create_device.proto.name, "vkCreateDevice");
    assert_eq!(create_device.proto.type_text(), "VkResult");
    assert_eq!(create_device.params.len(), 4);
    assert_eq!(
        create_device.params[1].text(),
        "const VkDeviceCreateInfo * pCreateInfo"
    );
    assert_eq!(create_device.params[2].api, Some("vulkansc"));

    let blend = &registry.commands[1];
    assert_eq!(blend.params.len(), 2);
    assert_eq!(blend.params[0].ty, Some("VkCommandBuffer"));
    assert_eq!(blend.params[1].text(), "const float blendConstants [4]");
    assert_eq!(blend.params[1].type_text(), "const float");

    assert_eq!(registry.aliases.len(), 1);
    assert_eq!(registry.aliases[0].name, "vkCmdSetBlendConstantsEXT");

    assert_eq!(registry.features.len(), 2);
    assert_eq!(registry.features[0].requires.len(), 2);
    assert_eq!(registry.features[0].requires[0].commands, ["vkCreateDevice"]);

    assert_eq!(registry.extensions.len(), 3);
    assert_eq!(
        registry.extensions[0].requires[0].depends,
        Some("VK_KHR_c,VK_VERSION_1_1")
    );
    assert!(registry.extensions[2].requires.is_empty());
}

#[test]
fn test_filter_registry() {
    let registry = parse_registry(REGISTRY).unwrap();
    let filtered = filter_registry(&registry, "vulkan").unwrap();

    let guards: Vec<(&str, &[&str])> = filtered.command_groups.iter().collect();
    assert_eq!(
        guards,
        [
            ("defined(VK_VERSION_1_0)", &["vkCreateDevice"][..]),
            ("defined(VK_KHR_a)", &["vkCreateDevice"][..]),
            (
                "defined(VK_KHR_b) && (defined(VK_KHR_c) || defined(VK_VERSION_1_1))",
                &["vkCmdSetBlendConstants"][..]
            ),
        ]
    );

    assert!(filtered.instance_commands.contains("vkCreateDevice"));
    assert_eq!(filtered.instance_commands.len(), 1);

    let alias = filtered.command("vkCmdSetBlendConstantsEXT").unwrap();
    assert_eq!(alias.proto.name, "vkCmdSetBlendConstants");
    assert!(filtered.command("vkGetFaultData").is_err());

    let create_device = filtered.command("vkCreateDevice").unwrap();
    let params: Vec<&str> = filtered
        .params(create_device)
        .iter()
        .map(|param| param.name)
        .collect();
    assert_eq!(params, ["physicalDevice", "pCreateInfo", "pDevice"]);

    assert!(filtered.is_descendant("VkQueue", "VkInstance"));
    assert!(filtered.is_descendant("VkQueueAlias", "VkDevice"));
    assert!(filtered.is_descendant("VkDevice", "VkDevice"));
    assert!(!filtered.is_descendant("VkPhysicalDevice", "VkDevice"));
    assert!(!filtered.is_descendant("VkCommandBuffer", "VkDevice"));
}

#[test]
fn test_parse_registry_errors() {
    assert!(parse_registry("<registry><commands><command><proto>").is_err());
    assert!(parse_registry(r#"<registry><feature name="VK_VERSION_1_0"></feature></registry>"#).is_err());
    assert!(parse_registry("<registry><commands><command name=\"vkX\"/></commands></registry>").is_err());
    assert!(parse_registry("<registry><types><type><name>X</name></types></registry>").is_err());
}

#[test]
fn test_parse_registry_incomplete() {
    assert!(parse_registry("").is_err());
    assert!(parse_registry("  \n").is_err());
    assert!(parse_registry(r#"<?xml version="1.0" encoding="UTF-8"?>"#).is_err());
    assert!(parse_registry("<types></types>").is_err());
    assert!(parse_registry("<registry/>").is_err());

    // cut off between two features, mid tag and mid comment.
    let cut = REGISTRY.find(r#"<feature api="vulkansc""#).unwrap();
    assert!(parse_registry(&REGISTRY[..cut]).is_err());
    assert!(parse_registry(&REGISTRY[..cut + 10]).is_err());
    assert!(parse_registry("<registry><!-- unterminated").is_err());

    // anything past the root is of no interest.
    assert!(parse_registry("<!-- header --><registry></registry>\n<!-- trailer -->").is_ok());
}
