use std::collections::HashMap;

/// Guard -> command names, in insertion order.
///
/// Feature levels are inserted first in document order, then extensions by
/// name. That order is the order of the `#if` blocks in the output.
#[derive(Debug, Default)]
pub struct CommandGroups<'a> {
    groups: Vec<(String, Vec<&'a str>)>,
    index: HashMap<String, usize>,
}

impl<'a> CommandGroups<'a> {
    /// Returns the command list of `guard`, creating an empty one at the end if
    /// absent.
    pub fn entry(&mut self, guard: String) -> &mut Vec<&'a str> {
        let i = match self.index.get(&guard) {
            Some(i) => *i,
            None => {
                let i = self.groups.len();
                self.index.insert(guard.clone(), i);
                self.groups.push((guard, Vec::new()));
                i
            }
        };
        &mut self.groups[i].1
    }

    /// Adds `command` under `guard` unless it is already listed there.
    pub fn insert(&mut self, guard: String, command: &'a str) {
        let commands = self.entry(guard);
        if !commands.contains(&command) {
            commands.push(command);
        }
    }

    pub fn get(&self, guard: &str) -> Option<&[&'a str]> {
        self.index
            .get(guard)
            .map(|i| self.groups[*i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a str])> {
        self.groups
            .iter()
            .map(|(guard, commands)| (guard.as_str(), commands.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Moves every command that is reachable under more than one guard into a
/// single group keyed by the disjunction of all of those guards.
///
/// Guards keep their position even when they end up empty; the emitter drops
/// empty blocks. Disjunction groups are appended after all original guards, in
/// the order their commands were first seen.
pub fn resolve_groups<'a>(groups: &CommandGroups<'a>) -> CommandGroups<'a> {
    // command -> every guard it was declared under, first seen first.
    let mut owners: Vec<(&'a str, Vec<&str>)> = Vec::new();
    let mut owner_index: HashMap<&'a str, usize> = HashMap::new();
    for (guard, commands) in groups.iter() {
        for &command in commands {
            let i = *owner_index.entry(command).or_insert_with(|| {
                owners.push((command, Vec::new()));
                owners.len() - 1
            });
            let guards = &mut owners[i].1;
            if !guards.contains(&guard) {
                guards.push(guard);
            }
        }
    }

    let mut resolved = CommandGroups::default();
    for (guard, commands) in groups.iter() {
        let unique = commands
            .iter()
            .copied()
            .filter(|command| owners[owner_index[command]].1.len() == 1);
        resolved.entry(guard.to_string()).extend(unique);
    }

    let mut merged = 0;
    for (command, guards) in owners.iter() {
        if guards.len() < 2 {
            continue;
        }
        let guard = guards
            .iter()
            .map(|guard| format!("({guard})"))
            .collect::<Vec<_>>()
            .join(" || ");
        log::debug!("{command} is reachable under {} guards", guards.len());
        resolved.insert(guard, command);
        merged += 1;
    }
    log::info!(
        "resolved {} guards ({merged} commands merged into disjunctions)",
        resolved.len()
    );

    resolved
}

#[cfg(test)]
fn groups_of<'a>(input: &[(&str, &[&'a str])]) -> CommandGroups<'a> {
    let mut groups = CommandGroups::default();
    for (guard, commands) in input {
        groups.entry(guard.to_string()).extend(commands.iter().copied());
    }
    groups
}

#[test]
fn test_unique_commands_keep_their_guard() {
    let groups = groups_of(&[
        ("defined(VK_VERSION_1_0)", &["vkCreateInstance", "vkCreateDevice"]),
        ("defined(VK_KHR_surface)", &["vkDestroySurfaceKHR"]),
    ]);
    let resolved = resolve_groups(&groups);
    assert_eq!(resolved.len(), 2);
    assert_eq!(
        resolved.get("defined(VK_VERSION_1_0)"),
        Some(&["vkCreateInstance", "vkCreateDevice"][..])
    );
    assert_eq!(
        resolved.get("defined(VK_KHR_surface)"),
        Some(&["vkDestroySurfaceKHR"][..])
    );
}

#[test]
fn test_shared_command_moves_to_disjunction() {
    let groups = groups_of(&[
        ("defined(VULKAN_1_0)", &["vkA", "vkShared"]),
        ("defined(EXT_BAR)", &["vkB"]),
        ("defined(EXT_FOO)", &["vkShared", "vkC"]),
    ]);
    let resolved = resolve_groups(&groups);

    let guards: Vec<&str> = resolved.iter().map(|(guard, _)| guard).collect();
    assert_eq!(
        guards,
        [
            "defined(VULKAN_1_0)",
            "defined(EXT_BAR)",
            "defined(EXT_FOO)",
            "(defined(VULKAN_1_0)) || (defined(EXT_FOO))",
        ]
    );
    assert_eq!(resolved.get("defined(VULKAN_1_0)"), Some(&["vkA"][..]));
    assert_eq!(resolved.get("defined(EXT_FOO)"), Some(&["vkC"][..]));
    assert_eq!(
        resolved.get("(defined(VULKAN_1_0)) || (defined(EXT_FOO))"),
        Some(&["vkShared"][..])
    );
}

#[test]
fn test_commands_with_same_owners_share_a_disjunction() {
    let groups = groups_of(&[
        ("defined(A)", &["vkX", "vkY", "vkZ"]),
        ("defined(B)", &["vkY", "vkX"]),
        ("defined(C)", &["vkZ"]),
    ]);
    let resolved = resolve_groups(&groups);

    assert_eq!(resolved.get("defined(A)"), Some(&[][..]));
    assert_eq!(resolved.get("defined(B)"), Some(&[][..]));
    assert_eq!(resolved.get("defined(C)"), Some(&[][..]));
    assert_eq!(
        resolved.get("(defined(A)) || (defined(B))"),
        Some(&["vkX", "vkY"][..])
    );
    assert_eq!(
        resolved.get("(defined(A)) || (defined(C))"),
        Some(&["vkZ"][..])
    );

    // every command ends up in exactly one group.
    let mut seen: Vec<&str> = resolved
        .iter()
        .flat_map(|(_, commands)| commands.iter().copied())
        .collect();
    seen.sort();
    assert_eq!(seen, ["vkX", "vkY", "vkZ"]);
}

#[test]
fn test_insert_ignores_duplicates() {
    let mut groups = CommandGroups::default();
    groups.insert("defined(A)".to_string(), "vkX");
    groups.insert("defined(A)".to_string(), "vkX");
    assert_eq!(groups.get("defined(A)"), Some(&["vkX"][..]));
    assert!(resolve_groups(&groups).get("defined(A)").is_some_and(|c| c == ["vkX"]));
}
