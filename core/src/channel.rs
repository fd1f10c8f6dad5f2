//! Channel entity and mode engine

use crate::modes::{Bitmask, ModeKind, ModeTable};
use crate::numeric::Reply;
use crate::reactor::Token;
use crate::utils::match_mask;
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};

/// Per-member role flags, stored in the member record.
pub mod role {
    pub const CHANOP: u32 = 0x1;
    pub const HALFOP: u32 = 0x2;
    pub const VOICE: u32 = 0x4;
}

/// Channel mode characters registered at startup, in fixed order.
pub fn standard_channel_modes() -> ModeTable {
    let mut table = ModeTable::new();
    let order = [
        ('i', ModeKind::Simple),
        ('m', ModeKind::Simple),
        ('p', ModeKind::Simple),
        ('s', ModeKind::Simple),
        ('n', ModeKind::Simple),
        ('t', ModeKind::Simple),
        ('k', ModeKind::Key),
        ('l', ModeKind::Limit),
        ('b', ModeKind::List),
        ('o', ModeKind::Member),
        ('h', ModeKind::Member),
        ('v', ModeKind::Member),
    ];
    for (c, kind) in order {
        table
            .register(c, kind)
            .expect("channel mode table fits its slots");
    }
    table
}

fn role_for(letter: char) -> u32 {
    match letter {
        'o' => role::CHANOP,
        'h' => role::HALFOP,
        'v' => role::VOICE,
        _ => 0,
    }
}

/// Membership record: role flags plus join time.
#[derive(Debug, Clone)]
pub struct Member {
    pub roles: Bitmask,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new() -> Self {
        Self {
            roles: Bitmask::new(),
            joined_at: Utc::now(),
        }
    }

    /// `@`, `%` or `+` for NAMES, highest role first.
    pub fn prefix(&self) -> &'static str {
        if self.roles.isset(role::CHANOP) {
            "@"
        } else if self.roles.isset(role::HALFOP) {
            "%"
        } else if self.roles.isset(role::VOICE) {
            "+"
        } else {
            ""
        }
    }
}

impl Default for Member {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry in the ban list.
#[derive(Debug, Clone)]
pub struct BanEntry {
    pub mask: String,
    pub setter: String,
    pub set_at: DateTime<Utc>,
}

/// Channel topic with attribution.
#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub setter: String,
    pub set_at: DateTime<Utc>,
}

/// Channel state. Destroyed as soon as the last member leaves.
pub struct Channel {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub topic: Option<Topic>,
    pub modes: Bitmask,
    /// Meaningful only while the key mode bit is set.
    pub key: Option<String>,
    /// Meaningful only while the limit mode bit is set.
    pub limit: Option<usize>,
    pub members: FxHashMap<Token, Member>,
    pub bans: Vec<BanEntry>,
    /// Standing invitations, consumed on join.
    pub invites: FxHashSet<Token>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            topic: None,
            modes: Bitmask::new(),
            key: None,
            limit: None,
            members: FxHashMap::default(),
            bans: Vec::new(),
            invites: FxHashSet::default(),
        }
    }

    pub fn is_member(&self, token: Token) -> bool {
        self.members.contains_key(&token)
    }

    pub fn member_roles(&self, token: Token) -> Bitmask {
        self.members
            .get(&token)
            .map(|m| m.roles)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a source mask matches any ban entry.
    pub fn is_banned(&self, mask: &str) -> bool {
        self.bans.iter().any(|ban| match_mask(mask, &ban.mask))
    }

    fn find_ban(&self, mask: &str) -> Option<usize> {
        self.bans.iter().position(|b| b.mask == mask)
    }

    /// Current modes for RPL_CHANNELMODEIS: the mode string plus arguments.
    /// The key is only revealed to members.
    pub fn modes_description(&self, table: &ModeTable, to_member: bool) -> (String, Vec<String>) {
        let mut letters = String::from("+");
        let mut args = Vec::new();
        let mut set: Vec<char> = Vec::new();
        for c in ['i', 'm', 'p', 's', 'n', 't', 'k', 'l'] {
            if let Some(desc) = table.lookup(c) {
                if self.modes.isset(desc.flag) {
                    set.push(c);
                }
            }
        }
        for c in set {
            letters.push(c);
            match c {
                'k' => {
                    if let Some(key) = &self.key {
                        args.push(if to_member { key.clone() } else { "*".to_string() });
                    }
                }
                'l' => {
                    if let Some(limit) = self.limit {
                        args.push(limit.to_string());
                    }
                }
                _ => {}
            }
        }
        (letters, args)
    }
}

/// One recorded, successfully applied mode change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub adding: bool,
    pub letter: char,
    pub arg: Option<String>,
}

/// What the engine needs to know about the requesting user.
pub struct ModeActor {
    pub token: Token,
    pub mask: String,
    pub roles: Bitmask,
    pub is_oper: bool,
}

/// Result of one MODE command: replies for the requester and the recorded
/// changes to broadcast.
#[derive(Default)]
pub struct ModeOutcome {
    pub replies: Vec<Reply>,
    pub changes: Vec<ModeChange>,
}

impl Channel {
    /// Parse and apply a channel mode change, character by character.
    ///
    /// Authorization and parameter checks run per character; a failing
    /// character is skipped without touching the changes recorded so far.
    /// `resolve` maps a nickname argument to (token, display nick) for the
    /// membership modes.
    pub fn apply_mode_change(
        &mut self,
        table: &ModeTable,
        actor: &ModeActor,
        flags: &str,
        args: &[String],
        resolve: &dyn Fn(&str) -> Option<(Token, String)>,
    ) -> ModeOutcome {
        let mut outcome = ModeOutcome::default();
        let mut adding = true;
        let mut args = args.iter();

        for letter in flags.chars() {
            match letter {
                '+' => {
                    adding = true;
                    continue;
                }
                '-' => {
                    adding = false;
                    continue;
                }
                _ => {}
            }
            let Some(desc) = table.lookup(letter) else {
                outcome.replies.push(Reply::unknown_mode(letter));
                continue;
            };

            // A bare list mode is a query, not a change.
            if desc.kind == ModeKind::List && args.len() == 0 {
                for ban in &self.bans {
                    outcome.replies.push(Reply::ban_list(
                        &self.name,
                        &ban.mask,
                        &ban.setter,
                        ban.set_at.timestamp(),
                    ));
                }
                outcome.replies.push(Reply::end_of_ban_list(&self.name));
                continue;
            }

            // Voice may be handed out by halfops; everything else needs
            // chanop. Checked before any parameter is consumed.
            let allowed = if letter == 'v' {
                actor.is_oper
                    || actor.roles.isset(role::CHANOP)
                    || actor.roles.isset(role::HALFOP)
            } else {
                actor.is_oper || actor.roles.isset(role::CHANOP)
            };
            if !allowed {
                outcome.replies.push(Reply::chanop_privs_needed(&self.name));
                continue;
            }

            let needed = if adding {
                desc.params_on_set()
            } else {
                desc.params_on_unset()
            };
            if args.len() < needed {
                outcome.replies.push(Reply::need_more_params("MODE"));
                continue;
            }

            match desc.kind {
                ModeKind::Simple => {
                    if self.modes.isset(desc.flag) != adding {
                        if adding {
                            self.modes.add(desc.flag);
                        } else {
                            self.modes.revoke(desc.flag);
                        }
                        outcome.changes.push(ModeChange {
                            adding,
                            letter,
                            arg: None,
                        });
                    }
                }
                ModeKind::Key => {
                    let Some(arg) = args.next().cloned() else {
                        continue;
                    };
                    if adding {
                        if !self.modes.isset(desc.flag) || self.key.as_deref() != Some(&arg) {
                            self.modes.add(desc.flag);
                            self.key = Some(arg.clone());
                            outcome.changes.push(ModeChange {
                                adding,
                                letter,
                                arg: Some(arg),
                            });
                        }
                    } else if self.modes.isset(desc.flag) {
                        self.modes.revoke(desc.flag);
                        self.key = None;
                        outcome.changes.push(ModeChange {
                            adding,
                            letter,
                            arg: Some(arg),
                        });
                    }
                }
                ModeKind::Limit => {
                    if adding {
                        let Some(arg) = args.next().cloned() else {
                            continue;
                        };
                        let Ok(value) = arg.parse::<usize>() else {
                            continue;
                        };
                        if !self.modes.isset(desc.flag) || self.limit != Some(value) {
                            self.modes.add(desc.flag);
                            self.limit = Some(value);
                            outcome.changes.push(ModeChange {
                                adding,
                                letter,
                                arg: Some(value.to_string()),
                            });
                        }
                    } else if self.modes.isset(desc.flag) {
                        self.modes.revoke(desc.flag);
                        self.limit = None;
                        outcome.changes.push(ModeChange {
                            adding,
                            letter,
                            arg: None,
                        });
                    }
                }
                ModeKind::List => {
                    let Some(mask) = args.next().cloned() else {
                        continue;
                    };
                    if adding {
                        if self.find_ban(&mask).is_none() {
                            self.bans.push(BanEntry {
                                mask: mask.clone(),
                                setter: actor.mask.clone(),
                                set_at: Utc::now(),
                            });
                            outcome.changes.push(ModeChange {
                                adding,
                                letter,
                                arg: Some(mask),
                            });
                        }
                    } else if let Some(pos) = self.find_ban(&mask) {
                        self.bans.remove(pos);
                        outcome.changes.push(ModeChange {
                            adding,
                            letter,
                            arg: Some(mask),
                        });
                    }
                }
                ModeKind::Member => {
                    let Some(nick_arg) = args.next() else {
                        continue;
                    };
                    let Some((target, display)) = resolve(nick_arg) else {
                        outcome.replies.push(Reply::no_such_nick(nick_arg));
                        continue;
                    };
                    let Some(member) = self.members.get_mut(&target) else {
                        outcome
                            .replies
                            .push(Reply::user_not_in_channel(&display, &self.name));
                        continue;
                    };
                    let bit = role_for(letter);
                    if member.roles.isset(bit) != adding {
                        if adding {
                            member.roles.add(bit);
                        } else {
                            member.roles.revoke(bit);
                        }
                        outcome.changes.push(ModeChange {
                            adding,
                            letter,
                            arg: Some(display),
                        });
                    }
                }
            }
        }
        outcome
    }
}

/// How many mode letters fit in one broadcast MODE line.
const MODES_PER_LINE: usize = 6;

/// Batch recorded changes into MODE lines: at most six letters each, with
/// `+`/`-` markers only where the direction flips, arguments in order.
pub fn format_mode_lines(changes: &[ModeChange]) -> Vec<(String, Vec<String>)> {
    let mut lines = Vec::new();
    for batch in changes.chunks(MODES_PER_LINE) {
        let mut letters = String::new();
        let mut args = Vec::new();
        let mut direction: Option<bool> = None;
        for change in batch {
            if direction != Some(change.adding) {
                letters.push(if change.adding { '+' } else { '-' });
                direction = Some(change.adding);
            }
            letters.push(change.letter);
            if let Some(arg) = &change.arg {
                args.push(arg.clone());
            }
        }
        lines.push((letters, args));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::NumericReply;

    fn change(adding: bool, letter: char, arg: Option<&str>) -> ModeChange {
        ModeChange {
            adding,
            letter,
            arg: arg.map(|s| s.to_string()),
        }
    }

    fn op_actor(token: Token) -> ModeActor {
        let mut roles = Bitmask::new();
        roles.add(role::CHANOP);
        ModeActor {
            token,
            mask: "op!o@host".to_string(),
            roles,
            is_oper: false,
        }
    }

    fn no_resolve(_: &str) -> Option<(Token, String)> {
        None
    }

    #[test]
    fn test_batching_six_per_line() {
        let changes: Vec<ModeChange> = "impsntkl"
            .chars()
            .map(|c| change(true, c, None))
            .collect();
        let lines = format_mode_lines(&changes);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, "+impsnt");
        assert_eq!(lines[1].0, "+kl");
    }

    #[test]
    fn test_batching_direction_markers() {
        let changes = vec![
            change(true, 'i', None),
            change(true, 'n', None),
            change(false, 'm', None),
            change(true, 't', None),
        ];
        let lines = format_mode_lines(&changes);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, "+in-m+t");
    }

    #[test]
    fn test_batching_args_in_order() {
        let changes = vec![
            change(true, 'o', Some("alice")),
            change(true, 'l', Some("10")),
            change(false, 'b', Some("*!*@bad")),
        ];
        let lines = format_mode_lines(&changes);
        assert_eq!(lines[0].0, "+ol-b");
        assert_eq!(lines[0].1, vec!["alice", "10", "*!*@bad"]);
    }

    #[test]
    fn test_simple_modes_idempotent() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));
        chan.members.insert(Token(1), Member::new());

        let outcome = chan.apply_mode_change(&table, &actor, "+n", &[], &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        // Setting it again records nothing.
        let outcome = chan.apply_mode_change(&table, &actor, "+n", &[], &no_resolve);
        assert!(outcome.changes.is_empty());
        // Removing flips it exactly once.
        let outcome = chan.apply_mode_change(&table, &actor, "-n-n", &[], &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
    }

    #[test]
    fn test_unknown_mode_char() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));
        let outcome = chan.apply_mode_change(&table, &actor, "+zn", &[], &no_resolve);
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].numeric, NumericReply::ErrUnknownMode);
        // The valid character after the unknown one is still processed.
        assert_eq!(outcome.changes.len(), 1);
    }

    #[test]
    fn test_bare_ban_queries_list() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));
        chan.apply_mode_change(
            &table,
            &actor,
            "+b",
            &["*!*@bad".to_string()],
            &no_resolve,
        );

        let outcome = chan.apply_mode_change(&table, &actor, "+b", &[], &no_resolve);
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.replies.len(), 2);
        assert_eq!(outcome.replies[0].numeric, NumericReply::RplBanList);
        assert_eq!(outcome.replies[1].numeric, NumericReply::RplEndOfBanList);
    }

    #[test]
    fn test_ban_add_remove_idempotent() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));
        let mask = vec!["*!*@bad".to_string()];

        let outcome = chan.apply_mode_change(&table, &actor, "+b", &mask, &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        let outcome = chan.apply_mode_change(&table, &actor, "+b", &mask, &no_resolve);
        assert!(outcome.changes.is_empty());
        assert!(chan.is_banned("nick!user@bad"));
        let outcome = chan.apply_mode_change(&table, &actor, "-b", &mask, &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        assert!(!chan.is_banned("nick!user@bad"));
    }

    #[test]
    fn test_halfop_may_only_voice() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let mut roles = Bitmask::new();
        roles.add(role::HALFOP);
        let actor = ModeActor {
            token: Token(1),
            mask: "half!h@host".to_string(),
            roles,
            is_oper: false,
        };
        chan.members.insert(Token(2), Member::new());
        let resolve = |nick: &str| {
            if nick == "bob" {
                Some((Token(2), "bob".to_string()))
            } else {
                None
            }
        };

        let outcome =
            chan.apply_mode_change(&table, &actor, "+v", &["bob".to_string()], &resolve);
        assert_eq!(outcome.changes.len(), 1);
        assert!(chan.member_roles(Token(2)).isset(role::VOICE));

        let outcome =
            chan.apply_mode_change(&table, &actor, "+o", &["bob".to_string()], &resolve);
        assert!(outcome.changes.is_empty());
        assert_eq!(
            outcome.replies[0].numeric,
            NumericReply::ErrChanOpPrivsNeeded
        );
    }

    #[test]
    fn test_member_mode_targets_must_be_members() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));
        let resolve = |nick: &str| {
            if nick == "carol" {
                Some((Token(3), "carol".to_string()))
            } else {
                None
            }
        };

        let outcome =
            chan.apply_mode_change(&table, &actor, "+o", &["ghost".to_string()], &resolve);
        assert_eq!(outcome.replies[0].numeric, NumericReply::ErrNoSuchNick);

        let outcome =
            chan.apply_mode_change(&table, &actor, "+o", &["carol".to_string()], &resolve);
        assert_eq!(
            outcome.replies[0].numeric,
            NumericReply::ErrUserNotInChannel
        );
    }

    #[test]
    fn test_limit_removal_needs_no_argument() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));

        let outcome =
            chan.apply_mode_change(&table, &actor, "+l", &["25".to_string()], &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(chan.limit, Some(25));

        let outcome = chan.apply_mode_change(&table, &actor, "-l", &[], &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(chan.limit, None);

        // Setting without a value is a missing parameter.
        let outcome = chan.apply_mode_change(&table, &actor, "+l", &[], &no_resolve);
        assert_eq!(outcome.replies[0].numeric, NumericReply::ErrNeedMoreParams);
    }

    #[test]
    fn test_key_set_and_remove() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));

        let outcome =
            chan.apply_mode_change(&table, &actor, "+k", &["secret".to_string()], &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(chan.key.as_deref(), Some("secret"));

        let outcome =
            chan.apply_mode_change(&table, &actor, "-k", &["secret".to_string()], &no_resolve);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(chan.key, None);
    }

    #[test]
    fn test_eight_simple_adds_batch_into_two_lines() {
        let table = standard_channel_modes();
        let mut chan = Channel::new("#test");
        let actor = op_actor(Token(1));
        let args = vec!["secret".to_string(), "10".to_string()];
        let outcome = chan.apply_mode_change(&table, &actor, "+impsntkl", &args, &no_resolve);
        assert_eq!(outcome.changes.len(), 8);
        let lines = format_mode_lines(&outcome.changes);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, "+impsnt");
        assert_eq!(lines[1].0, "+kl");
        assert_eq!(lines[1].1, vec!["secret", "10"]);
    }
}
