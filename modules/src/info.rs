//! Informational commands: MOTD, LUSERS, VERSION, ADMIN, INFO, TIME, WHOWAS

use ferricd_core::server::VERSION;
use ferricd_core::{CommandEntry, Reply, Result, Server, Token};

pub fn register(server: &mut Server) {
    server.register_command(CommandEntry::new("MOTD", motd));
    server.register_command(CommandEntry::new("LUSERS", lusers));
    server.register_command(CommandEntry::new("VERSION", version));
    server.register_command(CommandEntry::new("ADMIN", admin));
    server.register_command(CommandEntry::new("INFO", info));
    server.register_command(CommandEntry::new("TIME", time));
    server.register_command(CommandEntry::new("WHOWAS", whowas));
}

fn motd(server: &mut Server, token: Token, _args: &[String]) -> Result<()> {
    if server.motd.is_empty() {
        server.send_numeric(token, Reply::no_motd());
        return Ok(());
    }
    let name = server.server_name().to_string();
    server.send_numeric(token, Reply::motd_start(&name));
    let lines: Vec<String> = server.motd.lines().to_vec();
    for line in lines {
        server.send_numeric(token, Reply::motd_line(&line));
    }
    server.send_numeric(token, Reply::motd_end());
    Ok(())
}

fn lusers(server: &mut Server, token: Token, _args: &[String]) -> Result<()> {
    let stats = server.stats.clone();
    let registered = stats.current_clients - stats.unknown_connections;
    server.send_numeric(token, Reply::luser_client(registered, server.servers.len()));
    if stats.operators > 0 {
        server.send_numeric(token, Reply::luser_op(stats.operators));
    }
    if stats.unknown_connections > 0 {
        server.send_numeric(token, Reply::luser_unknown(stats.unknown_connections));
    }
    if !server.channels.is_empty() {
        server.send_numeric(token, Reply::luser_channels(server.channels.len()));
    }
    server.send_numeric(
        token,
        Reply::luser_me(stats.current_clients, stats.max_clients_seen),
    );
    Ok(())
}

fn version(server: &mut Server, token: Token, _args: &[String]) -> Result<()> {
    let name = server.server_name().to_string();
    server.send_numeric(token, Reply::version(VERSION, &name));
    Ok(())
}

fn admin(server: &mut Server, token: Token, _args: &[String]) -> Result<()> {
    let name = server.server_name().to_string();
    let loc1 = server.config.server.admin_location.clone();
    let loc2 = server.config.server.admin_location2.clone();
    let email = server.config.server.admin_email.clone();
    server.send_numeric(token, Reply::admin_me(&name));
    server.send_numeric(token, Reply::admin_loc1(&loc1));
    server.send_numeric(token, Reply::admin_loc2(&loc2));
    server.send_numeric(token, Reply::admin_email(&email));
    Ok(())
}

fn info(server: &mut Server, token: Token, _args: &[String]) -> Result<()> {
    let description = server.config.server.description.clone();
    let started = server.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    server.send_numeric(token, Reply::info(&description));
    server.send_numeric(token, Reply::info(&format!("Running {}", VERSION)));
    server.send_numeric(token, Reply::info(&format!("Online since {}", started)));
    server.send_numeric(token, Reply::end_of_info());
    Ok(())
}

fn time(server: &mut Server, token: Token, _args: &[String]) -> Result<()> {
    let name = server.server_name().to_string();
    let now = chrono::Utc::now().format("%A %B %d %Y -- %H:%M:%S UTC").to_string();
    server.send_numeric(token, Reply::time(&name, &now));
    Ok(())
}

fn whowas(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    let Some(nick) = args.get(1) else {
        server.send_numeric(token, Reply::no_nickname_given());
        return Ok(());
    };
    let limit = args.get(2).and_then(|n| n.parse::<usize>().ok());
    let entries = server.history.lookup(nick, limit);
    if entries.is_empty() {
        server.send_numeric(token, Reply::was_no_such_nick(nick));
    } else {
        for entry in entries {
            server.send_numeric(
                token,
                Reply::whowas_user(&entry.nick, &entry.ident, &entry.host, &entry.realname),
            );
        }
    }
    server.send_numeric(token, Reply::end_of_whowas(nick));
    Ok(())
}
