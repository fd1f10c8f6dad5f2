//! Channel operations: JOIN, PART, KICK, MODE, TOPIC, NAMES, INVITE

use ferricd_core::channel::role;
use ferricd_core::channel::{format_mode_lines, ModeActor};
use ferricd_core::utils::casefold;
use ferricd_core::{CommandEntry, Reply, Result, Server, Token};
use std::collections::HashMap;

pub fn register(server: &mut Server) {
    server.register_command(CommandEntry::new("JOIN", join));
    server.register_command(CommandEntry::new("PART", part));
    server.register_command(CommandEntry::new("KICK", kick));
    server.register_command(CommandEntry::new("MODE", mode));
    server.register_command(CommandEntry::new("TOPIC", topic));
    server.register_command(CommandEntry::new("NAMES", names));
    server.register_command(CommandEntry::new("INVITE", invite));
}

fn join(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(targets) = args.get(1) else {
        server.send_numeric(token, Reply::need_more_params("JOIN"));
        return Ok(());
    };
    // JOIN 0 leaves every channel.
    if targets == "0" {
        let channels: Vec<String> = server
            .clients
            .get(&token)
            .map(|u| u.channels.iter().cloned().collect())
            .unwrap_or_default();
        for folded in channels {
            let name = server
                .channels
                .get(&folded)
                .map(|c| c.name.clone())
                .unwrap_or(folded);
            server.part_channel(token, &name, None);
        }
        return Ok(());
    }

    let keys: Vec<&str> = args
        .get(2)
        .map(|k| k.split(',').collect())
        .unwrap_or_default();
    for (i, name) in targets.split(',').filter(|n| !n.is_empty()).enumerate() {
        let key = keys.get(i).copied().filter(|k| !k.is_empty());
        server.join_channel(token, name, key);
    }
    Ok(())
}

fn part(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(targets) = args.get(1) else {
        server.send_numeric(token, Reply::need_more_params("PART"));
        return Ok(());
    };
    let reason = args.get(2).map(|s| s.as_str());
    for name in targets.split(',').filter(|n| !n.is_empty()) {
        server.part_channel(token, name, reason);
    }
    Ok(())
}

fn kick(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        server.send_numeric(token, Reply::need_more_params("KICK"));
        return Ok(());
    }
    let channel_name = &args[1];
    let folded = casefold(channel_name);

    let Some(kicker) = server.clients.get(&token) else {
        return Ok(());
    };
    let kicker_mask = kicker.mask();
    let default_reason = kicker.display_nick().to_string();
    let reason = args.get(3).cloned().unwrap_or(default_reason);
    let is_oper = server.is_oper(token);

    let Some(chan) = server.channels.get(&folded) else {
        server.send_numeric(token, Reply::no_such_channel(channel_name));
        return Ok(());
    };
    let display = chan.name.clone();
    if !chan.is_member(token) {
        server.send_numeric(token, Reply::not_on_channel(&display));
        return Ok(());
    }
    if !chan.member_roles(token).isset(role::CHANOP) && !is_oper {
        server.send_numeric(token, Reply::chanop_privs_needed(&display));
        return Ok(());
    }

    for target_nick in args[2].split(',').filter(|n| !n.is_empty()) {
        let Some(target) = server.find_nick(target_nick) else {
            server.send_numeric(token, Reply::no_such_nick(target_nick));
            continue;
        };
        let Some(chan) = server.channels.get(&folded) else {
            break;
        };
        if !chan.is_member(target) {
            server.send_numeric(token, Reply::user_not_in_channel(target_nick, &display));
            continue;
        }
        let target_display = server
            .clients
            .get(&target)
            .map(|u| u.display_nick().to_string())
            .unwrap_or_else(|| target_nick.to_string());
        let line = format!(
            ":{} KICK {} {} :{}",
            kicker_mask, display, target_display, reason
        );
        if let Some(chan) = server.channels.get(&folded) {
            server.broadcast_channel(chan, &line, None);
        }
        server.remove_member(target, &folded);
    }
    Ok(())
}

fn mode(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(target) = args.get(1) else {
        server.send_numeric(token, Reply::need_more_params("MODE"));
        return Ok(());
    };
    if target.starts_with('#') || target.starts_with('&') {
        channel_mode(server, token, args)
    } else {
        user_mode(server, token, args)
    }
}

fn channel_mode(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let target = &args[1];
    let folded = casefold(target);
    let is_oper = server.is_oper(token);

    let Some(user) = server.clients.get(&token) else {
        return Ok(());
    };
    let mask = user.mask();

    let Some(chan) = server.channels.get(&folded) else {
        server.send_numeric(token, Reply::no_such_channel(target));
        return Ok(());
    };
    let display = chan.name.clone();

    // Bare MODE #channel is a query.
    if args.len() < 3 {
        let to_member = chan.is_member(token);
        let (modes, mode_args) = chan.modes_description(&server.chan_modes, to_member);
        let created = chan.created_at.timestamp();
        server.send_numeric(token, Reply::channel_mode_is(&display, &modes, mode_args));
        server.send_numeric(token, Reply::creation_time(&display, created));
        return Ok(());
    }

    if !chan.is_member(token) && !is_oper {
        server.send_numeric(token, Reply::not_on_channel(&display));
        return Ok(());
    }
    let actor = ModeActor {
        token,
        mask: mask.clone(),
        roles: chan.member_roles(token),
        is_oper,
    };

    // Resolve possible nickname arguments up front; the engine works from
    // this snapshot while the channel is borrowed.
    let mut resolved: HashMap<String, (Token, String)> = HashMap::new();
    for arg in &args[3..] {
        if let Some(t) = server.find_nick(arg) {
            if let Some(u) = server.clients.get(&t) {
                resolved.insert(casefold(arg), (t, u.display_nick().to_string()));
            }
        }
    }
    let resolve = |nick: &str| resolved.get(&casefold(nick)).cloned();

    let flags = args[2].clone();
    let params: Vec<String> = args[3..].to_vec();
    let outcome = {
        let Some(chan) = server.channels.get_mut(&folded) else {
            return Ok(());
        };
        chan.apply_mode_change(&server.chan_modes, &actor, &flags, &params, &resolve)
    };

    for reply in outcome.replies {
        server.send_numeric(token, reply);
    }
    if !outcome.changes.is_empty() {
        for (letters, line_args) in format_mode_lines(&outcome.changes) {
            let mut line = format!(":{} MODE {} {}", mask, display, letters);
            for arg in line_args {
                line.push(' ');
                line.push_str(&arg);
            }
            if let Some(chan) = server.channels.get(&folded) {
                server.broadcast_channel(chan, &line, None);
            }
        }
    }
    Ok(())
}

fn user_mode(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let target = &args[1];
    let Some(user) = server.clients.get(&token) else {
        return Ok(());
    };
    let own_nick = user.display_nick().to_string();
    if casefold(target) != casefold(&own_nick) {
        server.send_numeric(token, Reply::users_dont_match());
        return Ok(());
    }

    if args.len() < 3 {
        let modes = server.user_modes.format(user.modes);
        server.send_numeric(token, Reply::umode_is(&modes));
        return Ok(());
    }

    let mut changes = Vec::new();
    let mut adding = true;
    let mut unknown = false;
    {
        let Some(user) = server.clients.get_mut(&token) else {
            return Ok(());
        };
        for c in args[2].chars() {
            match c {
                '+' => adding = true,
                '-' => adding = false,
                _ => {
                    let Some(desc) = server.user_modes.lookup(c) else {
                        unknown = true;
                        continue;
                    };
                    // Operator status is only granted through OPER.
                    if c == 'o' && adding {
                        continue;
                    }
                    if user.modes.isset(desc.flag) != adding {
                        if adding {
                            user.modes.add(desc.flag);
                        } else {
                            user.modes.revoke(desc.flag);
                        }
                        changes.push(ferricd_core::ModeChange {
                            adding,
                            letter: c,
                            arg: None,
                        });
                    }
                }
            }
        }
    }
    if unknown {
        server.send_numeric(token, Reply::umode_unknown_flag());
    }
    let dropped_oper = changes.iter().any(|c| c.letter == 'o' && !c.adding);
    if dropped_oper {
        server.stats.operators = server.stats.operators.saturating_sub(1);
    }
    if !changes.is_empty() {
        let mask = server
            .clients
            .get(&token)
            .map(|u| u.mask())
            .unwrap_or_default();
        for (letters, _) in format_mode_lines(&changes) {
            server.send_raw_to(token, &format!(":{} MODE {} :{}", mask, own_nick, letters));
        }
    }
    Ok(())
}

fn topic(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(target) = args.get(1) else {
        server.send_numeric(token, Reply::need_more_params("TOPIC"));
        return Ok(());
    };
    let folded = casefold(target);
    let Some(chan) = server.channels.get(&folded) else {
        server.send_numeric(token, Reply::no_such_channel(target));
        return Ok(());
    };
    let display = chan.name.clone();

    // Query form.
    if args.len() < 3 {
        match &chan.topic {
            Some(topic) => {
                let text = topic.text.clone();
                let setter = topic.setter.clone();
                let ts = topic.set_at.timestamp();
                server.send_numeric(token, Reply::topic(&display, &text));
                server.send_numeric(token, Reply::topic_who_time(&display, &setter, ts));
            }
            None => {
                server.send_numeric(token, Reply::no_topic(&display));
            }
        }
        return Ok(());
    }

    if !chan.is_member(token) {
        server.send_numeric(token, Reply::not_on_channel(&display));
        return Ok(());
    }
    let topic_ops_flag = server.chan_modes.lookup('t').map(|d| d.flag).unwrap_or(0);
    if chan.modes.isset(topic_ops_flag)
        && !chan.member_roles(token).isset(role::CHANOP)
        && !server.is_oper(token)
    {
        server.send_numeric(token, Reply::chanop_privs_needed(&display));
        return Ok(());
    }

    let mask = server
        .clients
        .get(&token)
        .map(|u| u.mask())
        .unwrap_or_default();
    let text = args[2].clone();
    {
        let Some(chan) = server.channels.get_mut(&folded) else {
            return Ok(());
        };
        if text.is_empty() {
            chan.topic = None;
        } else {
            chan.topic = Some(ferricd_core::Topic {
                text: text.clone(),
                setter: mask.clone(),
                set_at: chrono::Utc::now(),
            });
        }
    }
    let line = format!(":{} TOPIC {} :{}", mask, display, text);
    if let Some(chan) = server.channels.get(&folded) {
        server.broadcast_channel(chan, &line, None);
    }
    Ok(())
}

fn names(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let secret_flag = server.chan_modes.lookup('s').map(|d| d.flag).unwrap_or(0);
    let private_flag = server.chan_modes.lookup('p').map(|d| d.flag).unwrap_or(0);

    let send_channel_names = |server: &Server, folded: &str| {
        let Some(chan) = server.channels.get(folded) else {
            return;
        };
        let mut entries: Vec<String> = Vec::new();
        for (member_token, member) in &chan.members {
            if let Some(member_user) = server.clients.get(member_token) {
                entries.push(format!("{}{}", member.prefix(), member_user.display_nick()));
            }
        }
        entries.sort();
        server.send_numeric(token, Reply::name_reply(&chan.name, &entries.join(" ")));
    };

    match args.get(1) {
        Some(targets) => {
            for name in targets.split(',').filter(|n| !n.is_empty()) {
                let folded = casefold(name);
                send_channel_names(server, &folded);
                let display = server
                    .channels
                    .get(&folded)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| name.to_string());
                server.send_numeric(token, Reply::end_of_names(&display));
            }
        }
        None => {
            // Bare NAMES lists every channel visible to the requester.
            let visible: Vec<String> = server
                .channels
                .iter()
                .filter(|(_, c)| {
                    c.is_member(token)
                        || (!c.modes.isset(secret_flag) && !c.modes.isset(private_flag))
                })
                .map(|(folded, _)| folded.clone())
                .collect();
            for folded in visible {
                send_channel_names(server, &folded);
            }
            server.send_numeric(token, Reply::end_of_names("*"));
        }
    }
    Ok(())
}

fn invite(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        server.send_numeric(token, Reply::need_more_params("INVITE"));
        return Ok(());
    }
    let target_nick = &args[1];
    let channel_name = &args[2];
    let folded = casefold(channel_name);

    let Some(target) = server.find_nick(target_nick) else {
        server.send_numeric(token, Reply::no_such_nick(target_nick));
        return Ok(());
    };
    let Some(chan) = server.channels.get(&folded) else {
        server.send_numeric(token, Reply::no_such_channel(channel_name));
        return Ok(());
    };
    let display = chan.name.clone();
    if !chan.is_member(token) {
        server.send_numeric(token, Reply::not_on_channel(&display));
        return Ok(());
    }
    let invite_flag = server.chan_modes.lookup('i').map(|d| d.flag).unwrap_or(0);
    if chan.modes.isset(invite_flag)
        && !chan.member_roles(token).isset(role::CHANOP)
        && !server.is_oper(token)
    {
        server.send_numeric(token, Reply::chanop_privs_needed(&display));
        return Ok(());
    }
    if chan.is_member(target) {
        server.send_numeric(token, Reply::user_on_channel(target_nick, &display));
        return Ok(());
    }

    if let Some(chan) = server.channels.get_mut(&folded) {
        chan.invites.insert(target);
    }
    let mask = server
        .clients
        .get(&token)
        .map(|u| u.mask())
        .unwrap_or_default();
    let target_display = server
        .clients
        .get(&target)
        .map(|u| u.display_nick().to_string())
        .unwrap_or_else(|| target_nick.to_string());
    server.send_numeric(token, Reply::inviting(&target_display, &display));
    server.send_raw_to(
        target,
        &format!(":{} INVITE {} :{}", mask, target_display, display),
    );
    Ok(())
}
