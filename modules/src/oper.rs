//! Operator authentication

use ferricd_core::utils::match_mask;
use ferricd_core::{CommandEntry, Reply, Result, Server, Token};
use tracing::{info, warn};

pub fn register(server: &mut Server) {
    server.register_command(CommandEntry::new("OPER", oper));
}

fn oper(server: &mut Server, token: Token, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        server.send_numeric(token, Reply::need_more_params("OPER"));
        return Ok(());
    }
    let name = &args[1];
    let password = &args[2];

    let Some(user) = server.clients.get(&token) else {
        return Ok(());
    };
    let mask = user.mask();

    let Some(block) = server.config.find_operator(name) else {
        warn!("OPER failed for {}: no such operator block {}", mask, name);
        server.send_numeric(token, Reply::no_oper_host());
        return Ok(());
    };
    if !match_mask(&mask, &block.mask) {
        warn!("OPER failed for {}: mask does not match {}", mask, block.mask);
        server.send_numeric(token, Reply::no_oper_host());
        return Ok(());
    }
    if !block.verify_password(password) {
        warn!("OPER failed for {}: bad password", mask);
        server.send_numeric(token, Reply::password_mismatch());
        return Ok(());
    }

    let oper_flag = server.user_mode_flag('o');
    let Some(user) = server.clients.get_mut(&token) else {
        return Ok(());
    };
    if !user.modes.isset(oper_flag) {
        user.modes.add(oper_flag);
        server.stats.operators += 1;
    }
    let nick = server
        .clients
        .get(&token)
        .map(|u| u.display_nick().to_string())
        .unwrap_or_default();
    server.send_numeric(token, Reply::youre_oper());
    server.send_raw_to(token, &format!(":{} MODE {} :+o", mask, nick));
    info!("{} is now an operator ({})", mask, name);
    Ok(())
}
