//! Flag storage and mode registration
//!
//! `Bitmask` is the flag-storage primitive used for user modes, channel
//! modes, membership roles and pending-registration state. `ModeTable` maps
//! a mode character to a unique power-of-two bit in such a mask, so that
//! components can register modes at startup without a fixed enum.

use crate::{Error, Result};
use rustc_hash::FxHashMap;

/// A set of single-bit flags over a `u32`.
///
/// Add and revoke are idempotent; there are no error conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bitmask(u32);

impl Bitmask {
    pub fn new() -> Self {
        Bitmask(0)
    }

    pub fn add(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn revoke(&mut self, flag: u32) {
        self.0 &= !flag;
    }

    pub fn isset(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// How a channel mode consumes parameters and mutates state.
///
/// User mode tables only use `Simple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// Boolean flag, no parameter.
    Simple,
    /// Channel key: parameter on set and unset.
    Key,
    /// User limit: parameter on set only.
    Limit,
    /// List-style mode (bans): optional parameter; bare query lists.
    List,
    /// Membership role (op/halfop/voice): nickname parameter, stored in the
    /// member record rather than the channel mask.
    Member,
}

/// A registered mode: its character, parameter behavior and assigned bit.
#[derive(Debug, Clone, Copy)]
pub struct ModeDescriptor {
    pub character: char,
    pub kind: ModeKind,
    /// Bit slot assigned at registration time.
    pub flag: u32,
}

impl ModeDescriptor {
    /// Parameters required when the mode is being set.
    pub fn params_on_set(&self) -> usize {
        match self.kind {
            ModeKind::Simple => 0,
            ModeKind::Key | ModeKind::Limit | ModeKind::Member => 1,
            ModeKind::List => 0,
        }
    }

    /// Parameters required when the mode is being unset. Removing a limit
    /// does not require re-supplying the value.
    pub fn params_on_unset(&self) -> usize {
        match self.kind {
            ModeKind::Simple | ModeKind::Limit | ModeKind::List => 0,
            ModeKind::Key | ModeKind::Member => 1,
        }
    }
}

/// Registry mapping mode characters to bit slots in a `Bitmask`.
///
/// Slot assignment scans powers of two from 1 upward and takes the first
/// unused value, so the character-to-bit layout is determined solely by
/// registration order.
#[derive(Debug, Default)]
pub struct ModeTable {
    modes: FxHashMap<char, ModeDescriptor>,
    used_slots: u32,
}

impl ModeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mode character. Fails if the character is already present
    /// or all 32 bit slots are taken.
    pub fn register(&mut self, character: char, kind: ModeKind) -> Result<ModeDescriptor> {
        if self.modes.contains_key(&character) {
            return Err(Error::ModeTable(format!(
                "mode '{}' is already registered",
                character
            )));
        }
        let flag = self.free_slot().ok_or_else(|| {
            Error::ModeTable(format!("no free mode slot for '{}'", character))
        })?;
        let desc = ModeDescriptor {
            character,
            kind,
            flag,
        };
        self.modes.insert(character, desc);
        self.used_slots |= flag;
        Ok(desc)
    }

    /// Remove a mode character, freeing its slot for later registrations.
    pub fn deregister(&mut self, character: char) -> Result<()> {
        match self.modes.remove(&character) {
            Some(desc) => {
                self.used_slots &= !desc.flag;
                Ok(())
            }
            None => Err(Error::ModeTable(format!(
                "mode '{}' is not registered",
                character
            ))),
        }
    }

    pub fn lookup(&self, character: char) -> Option<ModeDescriptor> {
        self.modes.get(&character).copied()
    }

    pub fn has_flag(&self, character: char) -> bool {
        self.modes.contains_key(&character)
    }

    /// Render the set bits of `mask` as a mode string, e.g. `+int`.
    pub fn format(&self, mask: Bitmask) -> String {
        let mut chars: Vec<char> = self
            .modes
            .values()
            .filter(|d| mask.isset(d.flag))
            .map(|d| d.character)
            .collect();
        chars.sort_unstable();
        let mut out = String::from("+");
        out.extend(chars);
        out
    }

    fn free_slot(&self) -> Option<u32> {
        let mut slot = 1u32;
        loop {
            if self.used_slots & slot == 0 {
                return Some(slot);
            }
            slot = slot.checked_shl(1)?;
        }
    }
}
