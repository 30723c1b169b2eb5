use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the built-in listing command. Always registered, never removable.
pub const DEFAULT_COMMAND: &str = "commands";

/// Response stored for the built-in entry. The live reply is generated by
/// [`CommandRegistry::listing`].
pub const DEFAULT_COMMAND_RESPONSE: &str = "Available commands: !commands";

/// Represents a chat command with a canned response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub response: String,
    pub usage_count: u64,
    pub is_default: bool,
}

impl Command {
    pub fn new(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            response: response.into(),
            usage_count: 0,
            is_default: false,
        }
    }

    pub fn builtin() -> Self {
        Self {
            name: DEFAULT_COMMAND.to_string(),
            response: DEFAULT_COMMAND_RESPONSE.to_string(),
            usage_count: 0,
            is_default: true,
        }
    }
}

/// Registry keys are trimmed, lower-cased and stripped of a leading `!`.
pub fn normalize_name(input: &str) -> String {
    input.trim().trim_start_matches('!').trim().to_lowercase()
}

/// On-disk shape of a single command inside the `commands` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub response: String,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

/// Command registry keyed by normalized name
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from persisted records. Names that collide after
    /// normalization keep the first entry seen.
    pub fn from_records(records: BTreeMap<String, CommandRecord>) -> Self {
        let mut registry = Self::new();
        for (name, record) in records {
            let key = normalize_name(&name);
            if key.is_empty() {
                tracing::warn!("Skipping stored command with empty name");
                continue;
            }
            if registry.commands.contains_key(&key) {
                tracing::warn!("Skipping duplicate stored command '{}'", name);
                continue;
            }
            registry.commands.insert(
                key.clone(),
                Command {
                    name: key.clone(),
                    response: record.response,
                    usage_count: record.usage_count,
                    is_default: record.is_default || key == DEFAULT_COMMAND,
                },
            );
        }
        registry
    }

    pub fn to_records(&self) -> BTreeMap<String, CommandRecord> {
        self.commands
            .values()
            .map(|c| {
                (
                    c.name.clone(),
                    CommandRecord {
                        response: c.response.clone(),
                        usage_count: c.usage_count,
                        is_default: c.is_default,
                    },
                )
            })
            .collect()
    }

    /// Seed the built-in entry. Returns true when it had to be added.
    pub fn ensure_default(&mut self) -> bool {
        if self.commands.contains_key(DEFAULT_COMMAND) {
            return false;
        }
        self.commands
            .insert(DEFAULT_COMMAND.to_string(), Command::builtin());
        true
    }

    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name.clone(), command);
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(&normalize_name(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.commands.get_mut(&normalize_name(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Command> {
        self.commands.remove(&normalize_name(name))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// "Available commands: !a, !b, ..." over the sorted key set.
    pub fn listing(&self) -> String {
        let names: Vec<String> = self.commands.keys().map(|n| format!("!{}", n)).collect();
        format!("Available commands: {}", names.join(", "))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
