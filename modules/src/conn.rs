//! Connection registration commands: NICK, USER, PING, PONG, QUIT, AWAY

use ferricd_core::user::pending;
use ferricd_core::utils::{casefold, is_valid_nickname};
use ferricd_core::{CommandEntry, Message, Reply, Result, Server, Token};

pub fn register(server: &mut Server) {
    server.register_command(CommandEntry::new("NICK", nick).allow_unregistered());
    server.register_command(CommandEntry::new("USER", user).allow_unregistered());
    server.register_command(CommandEntry::new("PING", ping).allow_unregistered());
    server.register_command(CommandEntry::new("PONG", pong).allow_unregistered());
    server.register_command(CommandEntry::new("QUIT", quit).allow_unregistered());
    server.register_command(CommandEntry::new("AWAY", away));
}

fn nick(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(new_nick) = args.get(1) else {
        server.send_numeric(token, Reply::no_nickname_given());
        return Ok(());
    };
    let max_len = server.config.server.max_nickname_length;
    if !is_valid_nickname(new_nick, max_len) {
        server.send_numeric(token, Reply::erroneous_nickname(new_nick));
        return Ok(());
    }
    if let Some(holder) = server.find_nick(new_nick) {
        if holder != token {
            server.send_numeric(token, Reply::nickname_in_use(new_nick));
            return Ok(());
        }
    }

    let Some(user) = server.clients.get(&token) else {
        return Ok(());
    };
    let old_mask = user.mask();
    let old_nick = user.nick.clone();
    let was_registered = user.registered;

    if let Some(old) = &old_nick {
        server.nicks.remove(&casefold(old));
    }
    server.nicks.insert(casefold(new_nick), token);

    if was_registered {
        // Announce the change to the user and everyone sharing a channel.
        let line = format!(":{} NICK :{}", old_mask, new_nick);
        let mut recipients = vec![token];
        if let Some(user) = server.clients.get(&token) {
            for folded in user.channels.clone() {
                if let Some(chan) = server.channels.get(&folded) {
                    for member in chan.members.keys() {
                        if !recipients.contains(member) {
                            recipients.push(*member);
                        }
                    }
                }
            }
        }
        for recipient in recipients {
            server.send_raw_to(recipient, &line);
        }
    }

    if let Some(user) = server.clients.get_mut(&token) {
        user.nick = Some(new_nick.clone());
        user.pending.revoke(pending::NICK);
    }
    server.check_handshake(token);
    Ok(())
}

fn user(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(user) = server.clients.get_mut(&token) else {
        return Ok(());
    };
    if user.registered {
        server.send_numeric(token, Reply::already_registered());
        return Ok(());
    }
    if args.len() < 5 {
        server.send_numeric(token, Reply::need_more_params("USER"));
        return Ok(());
    }
    // An ident-verified username is never overwritten; otherwise the
    // client-supplied one is kept with the untrusted prefix.
    if user.ident.starts_with('~') {
        let supplied: String = args[1].chars().take(10).collect();
        user.ident = format!("~{}", supplied);
    }
    user.realname = args[4].clone();
    user.pending.revoke(pending::USER);
    server.check_handshake(token);
    Ok(())
}

fn ping(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(origin) = args.get(1) else {
        server.send_numeric(token, Reply::no_origin());
        return Ok(());
    };
    let name = server.server_name().to_string();
    let reply = Message::with_prefix(
        server.server_prefix(),
        "PONG",
        vec![name, origin.clone()],
    );
    server.send_to(token, &reply);
    Ok(())
}

fn pong(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(user) = server.clients.get_mut(&token) else {
        return Ok(());
    };
    user.last_pong = chrono::Utc::now();
    let answered = args.get(1);
    if !user.registered {
        let expected = user.expected_pong.clone();
        if let (Some(expected), Some(answered)) = (expected, answered) {
            if expected == *answered {
                server.complete_registration(token);
            }
        }
    }
    Ok(())
}

fn quit(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let reason = match args.get(1) {
        Some(text) => format!("Quit: {}", text),
        None => "Quit".to_string(),
    };
    server.quit_user(token, &reason);
    Ok(())
}

fn away(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(user) = server.clients.get_mut(&token) else {
        return Ok(());
    };
    match args.get(1) {
        Some(text) if !text.is_empty() => {
            user.away = Some(text.clone());
            server.send_numeric(token, Reply::now_away());
        }
        _ => {
            user.away = None;
            server.send_numeric(token, Reply::unaway());
        }
    }
    Ok(())
}
