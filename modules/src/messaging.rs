//! Message delivery: PRIVMSG, NOTICE, WALLOPS

use ferricd_core::channel::role;
use ferricd_core::utils::casefold;
use ferricd_core::{CommandEntry, Reply, Result, Server, Token};

pub fn register(server: &mut Server) {
    server.register_command(CommandEntry::new("PRIVMSG", privmsg));
    server.register_command(CommandEntry::new("NOTICE", notice));
    server.register_command(CommandEntry::new("WALLOPS", wallops).oper_only());
}

fn privmsg(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    deliver(server, token, args, false)
}

fn notice(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    deliver(server, token, args, true)
}

/// Common delivery path. NOTICE never generates error replies.
fn deliver(server: &mut Server, token: Token, args: &[String], is_notice: bool) -> Result<()> {
    let command = if is_notice { "NOTICE" } else { "PRIVMSG" };
    let Some(targets) = args.get(1) else {
        if !is_notice {
            server.send_numeric(token, Reply::no_recipient(command));
        }
        return Ok(());
    };
    let Some(text) = args.get(2).filter(|t| !t.is_empty()) else {
        if !is_notice {
            server.send_numeric(token, Reply::no_text_to_send());
        }
        return Ok(());
    };
    let Some(user) = server.clients.get(&token) else {
        return Ok(());
    };
    let mask = user.mask();

    for target in targets.split(',').filter(|t| !t.is_empty()) {
        if target.starts_with('#') || target.starts_with('&') {
            send_to_channel(server, token, &mask, target, command, text, is_notice);
        } else {
            send_to_user(server, token, &mask, target, command, text, is_notice);
        }
    }
    Ok(())
}

fn send_to_channel(
    server: &mut Server,
    token: Token,
    mask: &str,
    target: &str,
    command: &str,
    text: &str,
    is_notice: bool,
) {
    let folded = casefold(target);
    let Some(chan) = server.channels.get(&folded) else {
        if !is_notice {
            server.send_numeric(token, Reply::no_such_nick(target));
        }
        return;
    };
    let display = chan.name.clone();
    let is_member = chan.is_member(token);
    let is_oper = server.is_oper(token);

    let no_external = server.chan_modes.lookup('n').map(|d| d.flag).unwrap_or(0);
    let moderated = server.chan_modes.lookup('m').map(|d| d.flag).unwrap_or(0);
    if chan.modes.isset(no_external) && !is_member && !is_oper {
        if !is_notice {
            server.send_numeric(token, Reply::cannot_send_to_chan(&display));
        }
        return;
    }
    if chan.modes.isset(moderated) && !is_oper {
        let roles = chan.member_roles(token);
        let may_speak = roles.isset(role::CHANOP)
            || roles.isset(role::HALFOP)
            || roles.isset(role::VOICE);
        if !may_speak {
            if !is_notice {
                server.send_numeric(token, Reply::cannot_send_to_chan(&display));
            }
            return;
        }
    }

    let deaf_flag = server.user_mode_flag('d');
    let line = format!(":{} {} {} :{}", mask, command, display, text);
    let recipients: Vec<Token> = chan.members.keys().copied().collect();
    for recipient in recipients {
        if recipient == token {
            continue;
        }
        // Deaf users receive no channel traffic.
        if let Some(member_user) = server.clients.get(&recipient) {
            if member_user.modes.isset(deaf_flag) {
                continue;
            }
        }
        server.send_raw_to(recipient, &line);
    }
}

fn send_to_user(
    server: &mut Server,
    token: Token,
    mask: &str,
    target: &str,
    command: &str,
    text: &str,
    is_notice: bool,
) {
    let Some(recipient) = server.find_nick(target) else {
        if !is_notice {
            server.send_numeric(token, Reply::no_such_nick(target));
        }
        return;
    };
    let Some(target_user) = server.clients.get(&recipient) else {
        return;
    };
    let display = target_user.display_nick().to_string();
    let away = target_user.away.clone();
    server.send_raw_to(
        recipient,
        &format!(":{} {} {} :{}", mask, command, display, text),
    );
    if let Some(away_text) = away {
        if !is_notice {
            server.send_numeric(token, Reply::away(&display, &away_text));
        }
    }
}

fn wallops(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(text) = args.get(1) else {
        server.send_numeric(token, Reply::need_more_params("WALLOPS"));
        return Ok(());
    };
    let Some(user) = server.clients.get(&token) else {
        return Ok(());
    };
    let mask = user.mask();
    let wallops_flag = server.user_mode_flag('w');
    let line = format!(":{} WALLOPS :{}", mask, text);
    let recipients: Vec<Token> = server
        .clients
        .iter()
        .filter(|(_, u)| u.modes.isset(wallops_flag))
        .map(|(t, _)| *t)
        .collect();
    for recipient in recipients {
        server.send_raw_to(recipient, &line);
    }
    Ok(())
}
