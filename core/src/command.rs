//! Command registry and dispatch metadata
//!
//! Handlers are plain functions registered at startup by the module crates;
//! the registry is the static replacement for dynamic handler loading. The
//! dispatch gates (registration required, suspended, oper-only) are enforced
//! by the listener before the handler runs.

use crate::reactor::Token;
use crate::server::Server;
use crate::Result;
use rustc_hash::FxHashMap;
use tracing::warn;

/// A command handler. Receives the server, the invoking connection's token
/// and the tokenized arguments (command word included at index 0).
pub type CommandHandler = fn(&mut Server, Token, &[String]) -> Result<()>;

/// One registered command.
#[derive(Clone)]
pub struct CommandEntry {
    pub name: String,
    pub handler: CommandHandler,
    pub oper_only: bool,
    pub requires_registration: bool,
    pub suspended: bool,
}

impl CommandEntry {
    /// New entry with the default flags: available to any registered user.
    pub fn new(name: &str, handler: CommandHandler) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            handler,
            oper_only: false,
            requires_registration: true,
            suspended: false,
        }
    }

    /// Allow the command before registration completes (NICK, USER, PONG...).
    pub fn allow_unregistered(mut self) -> Self {
        self.requires_registration = false;
        self
    }

    /// Restrict the command to server operators.
    pub fn oper_only(mut self) -> Self {
        self.oper_only = true;
        self
    }
}

/// Name-to-entry command table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: FxHashMap<String, CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Re-registering a name replaces the previous
    /// entry (last wins) and logs the collision.
    pub fn register(&mut self, entry: CommandEntry) {
        if self.commands.contains_key(&entry.name) {
            warn!("command {} registered twice, keeping the new handler", entry.name);
        }
        self.commands.insert(entry.name.clone(), entry);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.commands.remove(&name.to_ascii_uppercase()).is_some()
    }

    /// Exact-name lookup; callers uppercase before calling.
    pub fn lookup(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    pub fn set_suspended(&mut self, name: &str, suspended: bool) -> bool {
        self.with_entry(name, |e| e.suspended = suspended)
    }

    pub fn set_oper_only(&mut self, name: &str, oper_only: bool) -> bool {
        self.with_entry(name, |e| e.oper_only = oper_only)
    }

    pub fn set_requires_registration(&mut self, name: &str, required: bool) -> bool {
        self.with_entry(name, |e| e.requires_registration = required)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn with_entry(&mut self, name: &str, f: impl FnOnce(&mut CommandEntry)) -> bool {
        match self.commands.get_mut(&name.to_ascii_uppercase()) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_a(_: &mut Server, _: Token, _: &[String]) -> Result<()> {
        Ok(())
    }

    fn handler_b(_: &mut Server, _: Token, _: &[String]) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandEntry::new("join", handler_a));
        let entry = registry.lookup("JOIN").expect("registered");
        assert_eq!(entry.name, "JOIN");
        assert!(entry.requires_registration);
        assert!(!entry.oper_only);
        assert!(registry.lookup("PART").is_none());
    }

    #[test]
    fn test_duplicate_registration_last_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandEntry::new("KILL", handler_a));
        registry.register(CommandEntry::new("KILL", handler_b).oper_only());
        let entry = registry.lookup("KILL").unwrap();
        assert!(entry.oper_only);
        assert_eq!(entry.handler as usize, handler_b as usize);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_flag_mutation_without_unregistering() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandEntry::new("MOTD", handler_a));
        assert!(registry.set_suspended("MOTD", true));
        assert!(registry.lookup("MOTD").unwrap().suspended);
        assert!(registry.set_suspended("MOTD", false));
        assert!(!registry.lookup("MOTD").unwrap().suspended);
        assert!(!registry.set_suspended("NOSUCH", true));
    }

    #[test]
    fn test_unregister() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandEntry::new("PING", handler_a).allow_unregistered());
        assert!(registry.unregister("ping"));
        assert!(registry.lookup("PING").is_none());
        assert!(!registry.unregister("PING"));
    }
}
