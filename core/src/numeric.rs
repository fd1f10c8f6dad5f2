//! IRC numeric replies as defined in RFC 1459

/// IRC numeric reply codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NumericReply {
    // Connection registration
    RplWelcome = 1,
    RplYourHost = 2,
    RplCreated = 3,
    RplMyInfo = 4,
    RplISupport = 5,

    // Server queries
    RplUmodeIs = 221,
    RplLUserClient = 251,
    RplLUserOp = 252,
    RplLUserUnknown = 253,
    RplLUserChannels = 254,
    RplLUserMe = 255,
    RplAdminMe = 256,
    RplAdminLoc1 = 257,
    RplAdminLoc2 = 258,
    RplAdminEmail = 259,

    RplAway = 301,
    RplUnaway = 305,
    RplNowAway = 306,
    RplWhoWasUser = 314,
    RplEndOfWhoWas = 369,

    RplChannelModeIs = 324,
    RplCreationTime = 329,
    RplNoTopic = 331,
    RplTopic = 332,
    RplTopicWhoTime = 333,
    RplInviting = 341,
    RplVersion = 351,
    RplNameReply = 353,
    RplEndOfNames = 366,
    RplBanList = 367,
    RplEndOfBanList = 368,
    RplInfo = 371,
    RplMotd = 372,
    RplEndOfInfo = 374,
    RplMotdStart = 375,
    RplMotdEnd = 376,
    RplYoureOper = 381,
    RplTime = 391,

    // Errors
    ErrNoSuchNick = 401,
    ErrNoSuchChannel = 403,
    ErrNoOrigin = 409,
    ErrCannotSendToChan = 404,
    ErrWasNoSuchNick = 406,
    ErrNoRecipient = 411,
    ErrNoTextToSend = 412,
    ErrUnknownCommand = 421,
    ErrNoMotd = 422,
    ErrNoNicknameGiven = 431,
    ErrErroneousNickname = 432,
    ErrNicknameInUse = 433,
    ErrUserNotInChannel = 441,
    ErrNotOnChannel = 442,
    ErrUserOnChannel = 443,
    ErrNotRegistered = 451,
    ErrNeedMoreParams = 461,
    ErrAlreadyRegistered = 462,
    ErrPasswordMismatch = 464,
    ErrChannelIsFull = 471,
    ErrUnknownMode = 472,
    ErrInviteOnlyChan = 473,
    ErrBannedFromChan = 474,
    ErrBadChannelKey = 475,
    ErrNoPrivileges = 481,
    ErrChanOpPrivsNeeded = 482,
    ErrNoOperHost = 491,
    ErrUmodeUnknownFlag = 501,
    ErrUsersDontMatch = 502,
}

impl NumericReply {
    /// Numeric code as it appears on the wire.
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// A numeric reply plus its parameters, before the server prefix and target
/// nick are attached at send time.
#[derive(Debug, Clone)]
pub struct Reply {
    pub numeric: NumericReply,
    pub params: Vec<String>,
}

fn s(v: &str) -> String {
    v.to_string()
}

impl Reply {
    pub fn new(numeric: NumericReply, params: Vec<String>) -> Self {
        Self { numeric, params }
    }

    pub fn welcome(network: &str, mask: &str) -> Self {
        Self::new(
            NumericReply::RplWelcome,
            vec![format!("Welcome to the {} IRC Network, {}", network, mask)],
        )
    }

    pub fn your_host(server: &str, version: &str) -> Self {
        Self::new(
            NumericReply::RplYourHost,
            vec![format!("Your host is {}, running version {}", server, version)],
        )
    }

    pub fn created(date: &str) -> Self {
        Self::new(
            NumericReply::RplCreated,
            vec![format!("This server was created {}", date)],
        )
    }

    pub fn my_info(server: &str, version: &str, user_modes: &str, channel_modes: &str) -> Self {
        Self::new(
            NumericReply::RplMyInfo,
            vec![s(server), s(version), s(user_modes), s(channel_modes)],
        )
    }

    pub fn isupport(tokens: Vec<String>) -> Self {
        let mut params = tokens;
        params.push(s("are supported by this server"));
        Self::new(NumericReply::RplISupport, params)
    }

    pub fn umode_is(modes: &str) -> Self {
        Self::new(NumericReply::RplUmodeIs, vec![s(modes)])
    }

    pub fn luser_client(users: usize, servers: usize) -> Self {
        Self::new(
            NumericReply::RplLUserClient,
            vec![format!(
                "There are {} users and 0 invisible on {} servers",
                users, servers
            )],
        )
    }

    pub fn luser_op(count: usize) -> Self {
        Self::new(
            NumericReply::RplLUserOp,
            vec![count.to_string(), s("operator(s) online")],
        )
    }

    pub fn luser_unknown(count: usize) -> Self {
        Self::new(
            NumericReply::RplLUserUnknown,
            vec![count.to_string(), s("unknown connection(s)")],
        )
    }

    pub fn luser_channels(count: usize) -> Self {
        Self::new(
            NumericReply::RplLUserChannels,
            vec![count.to_string(), s("channels formed")],
        )
    }

    pub fn luser_me(clients: usize, max: usize) -> Self {
        Self::new(
            NumericReply::RplLUserMe,
            vec![format!("I have {} clients (max {}) and 0 servers", clients, max)],
        )
    }

    pub fn admin_me(server: &str) -> Self {
        Self::new(
            NumericReply::RplAdminMe,
            vec![s(server), s("Administrative info")],
        )
    }

    pub fn admin_loc1(location: &str) -> Self {
        Self::new(NumericReply::RplAdminLoc1, vec![s(location)])
    }

    pub fn admin_loc2(location: &str) -> Self {
        Self::new(NumericReply::RplAdminLoc2, vec![s(location)])
    }

    pub fn admin_email(email: &str) -> Self {
        Self::new(NumericReply::RplAdminEmail, vec![s(email)])
    }

    pub fn away(nick: &str, message: &str) -> Self {
        Self::new(NumericReply::RplAway, vec![s(nick), s(message)])
    }

    pub fn unaway() -> Self {
        Self::new(
            NumericReply::RplUnaway,
            vec![s("You are no longer marked as being away")],
        )
    }

    pub fn now_away() -> Self {
        Self::new(
            NumericReply::RplNowAway,
            vec![s("You have been marked as being away")],
        )
    }

    pub fn whowas_user(nick: &str, user: &str, host: &str, realname: &str) -> Self {
        Self::new(
            NumericReply::RplWhoWasUser,
            vec![s(nick), s(user), s(host), s("*"), s(realname)],
        )
    }

    pub fn end_of_whowas(nick: &str) -> Self {
        Self::new(
            NumericReply::RplEndOfWhoWas,
            vec![s(nick), s("End of WHOWAS")],
        )
    }

    pub fn was_no_such_nick(nick: &str) -> Self {
        Self::new(
            NumericReply::ErrWasNoSuchNick,
            vec![s(nick), s("There was no such nickname")],
        )
    }

    pub fn channel_mode_is(channel: &str, modes: &str, args: Vec<String>) -> Self {
        let mut params = vec![s(channel), s(modes)];
        params.extend(args);
        Self::new(NumericReply::RplChannelModeIs, params)
    }

    pub fn creation_time(channel: &str, timestamp: i64) -> Self {
        Self::new(
            NumericReply::RplCreationTime,
            vec![s(channel), timestamp.to_string()],
        )
    }

    pub fn no_topic(channel: &str) -> Self {
        Self::new(
            NumericReply::RplNoTopic,
            vec![s(channel), s("No topic is set")],
        )
    }

    pub fn topic(channel: &str, text: &str) -> Self {
        Self::new(NumericReply::RplTopic, vec![s(channel), s(text)])
    }

    pub fn topic_who_time(channel: &str, setter: &str, timestamp: i64) -> Self {
        Self::new(
            NumericReply::RplTopicWhoTime,
            vec![s(channel), s(setter), timestamp.to_string()],
        )
    }

    pub fn inviting(nick: &str, channel: &str) -> Self {
        Self::new(NumericReply::RplInviting, vec![s(nick), s(channel)])
    }

    pub fn version(version: &str, server: &str) -> Self {
        Self::new(NumericReply::RplVersion, vec![s(version), s(server)])
    }

    pub fn name_reply(channel: &str, names: &str) -> Self {
        Self::new(
            NumericReply::RplNameReply,
            vec![s("="), s(channel), s(names)],
        )
    }

    pub fn end_of_names(channel: &str) -> Self {
        Self::new(
            NumericReply::RplEndOfNames,
            vec![s(channel), s("End of NAMES list")],
        )
    }

    pub fn ban_list(channel: &str, mask: &str, setter: &str, timestamp: i64) -> Self {
        Self::new(
            NumericReply::RplBanList,
            vec![s(channel), s(mask), s(setter), timestamp.to_string()],
        )
    }

    pub fn end_of_ban_list(channel: &str) -> Self {
        Self::new(
            NumericReply::RplEndOfBanList,
            vec![s(channel), s("End of channel ban list")],
        )
    }

    pub fn info(line: &str) -> Self {
        Self::new(NumericReply::RplInfo, vec![s(line)])
    }

    pub fn end_of_info() -> Self {
        Self::new(NumericReply::RplEndOfInfo, vec![s("End of INFO list")])
    }

    pub fn motd_start(server: &str) -> Self {
        Self::new(
            NumericReply::RplMotdStart,
            vec![format!("- {} Message of the day - ", server)],
        )
    }

    pub fn motd_line(line: &str) -> Self {
        Self::new(NumericReply::RplMotd, vec![format!("- {}", line)])
    }

    pub fn motd_end() -> Self {
        Self::new(NumericReply::RplMotdEnd, vec![s("End of MOTD command")])
    }

    pub fn no_motd() -> Self {
        Self::new(NumericReply::ErrNoMotd, vec![s("MOTD File is missing")])
    }

    pub fn youre_oper() -> Self {
        Self::new(
            NumericReply::RplYoureOper,
            vec![s("You are now an IRC operator")],
        )
    }

    pub fn time(server: &str, time: &str) -> Self {
        Self::new(NumericReply::RplTime, vec![s(server), s(time)])
    }

    pub fn no_such_nick(nick: &str) -> Self {
        Self::new(
            NumericReply::ErrNoSuchNick,
            vec![s(nick), s("No such nick/channel")],
        )
    }

    pub fn no_such_channel(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrNoSuchChannel,
            vec![s(channel), s("No such channel")],
        )
    }

    pub fn cannot_send_to_chan(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrCannotSendToChan,
            vec![s(channel), s("Cannot send to channel")],
        )
    }

    pub fn no_origin() -> Self {
        Self::new(NumericReply::ErrNoOrigin, vec![s("No origin specified")])
    }

    pub fn no_recipient(command: &str) -> Self {
        Self::new(
            NumericReply::ErrNoRecipient,
            vec![format!("No recipient given ({})", command)],
        )
    }

    pub fn no_text_to_send() -> Self {
        Self::new(NumericReply::ErrNoTextToSend, vec![s("No text to send")])
    }

    pub fn unknown_command(command: &str) -> Self {
        Self::new(
            NumericReply::ErrUnknownCommand,
            vec![s(command), s("Unknown command")],
        )
    }

    pub fn no_nickname_given() -> Self {
        Self::new(
            NumericReply::ErrNoNicknameGiven,
            vec![s("No nickname given")],
        )
    }

    pub fn erroneous_nickname(nick: &str) -> Self {
        Self::new(
            NumericReply::ErrErroneousNickname,
            vec![s(nick), s("Erroneous nickname")],
        )
    }

    pub fn nickname_in_use(nick: &str) -> Self {
        Self::new(
            NumericReply::ErrNicknameInUse,
            vec![s(nick), s("Nickname is already in use")],
        )
    }

    pub fn user_not_in_channel(nick: &str, channel: &str) -> Self {
        Self::new(
            NumericReply::ErrUserNotInChannel,
            vec![s(nick), s(channel), s("They aren't on that channel")],
        )
    }

    pub fn not_on_channel(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrNotOnChannel,
            vec![s(channel), s("You're not on that channel")],
        )
    }

    pub fn user_on_channel(nick: &str, channel: &str) -> Self {
        Self::new(
            NumericReply::ErrUserOnChannel,
            vec![s(nick), s(channel), s("is already on channel")],
        )
    }

    pub fn not_registered() -> Self {
        Self::new(
            NumericReply::ErrNotRegistered,
            vec![s("You have not registered")],
        )
    }

    pub fn need_more_params(command: &str) -> Self {
        Self::new(
            NumericReply::ErrNeedMoreParams,
            vec![s(command), s("Not enough parameters")],
        )
    }

    pub fn already_registered() -> Self {
        Self::new(
            NumericReply::ErrAlreadyRegistered,
            vec![s("You may not reregister")],
        )
    }

    pub fn password_mismatch() -> Self {
        Self::new(
            NumericReply::ErrPasswordMismatch,
            vec![s("Password incorrect")],
        )
    }

    pub fn channel_is_full(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrChannelIsFull,
            vec![s(channel), s("Cannot join channel (+l)")],
        )
    }

    pub fn unknown_mode(mode: char) -> Self {
        Self::new(
            NumericReply::ErrUnknownMode,
            vec![mode.to_string(), s("is unknown mode char to me")],
        )
    }

    pub fn invite_only_chan(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrInviteOnlyChan,
            vec![s(channel), s("Cannot join channel (+i)")],
        )
    }

    pub fn banned_from_chan(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrBannedFromChan,
            vec![s(channel), s("Cannot join channel (+b)")],
        )
    }

    pub fn bad_channel_key(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrBadChannelKey,
            vec![s(channel), s("Cannot join channel (+k)")],
        )
    }

    pub fn no_privileges() -> Self {
        Self::new(
            NumericReply::ErrNoPrivileges,
            vec![s("Permission Denied- You're not an IRC operator")],
        )
    }

    pub fn chanop_privs_needed(channel: &str) -> Self {
        Self::new(
            NumericReply::ErrChanOpPrivsNeeded,
            vec![s(channel), s("You're not channel operator")],
        )
    }

    pub fn no_oper_host() -> Self {
        Self::new(NumericReply::ErrNoOperHost, vec![s("No O-lines for your host")])
    }

    pub fn umode_unknown_flag() -> Self {
        Self::new(
            NumericReply::ErrUmodeUnknownFlag,
            vec![s("Unknown MODE flag")],
        )
    }

    pub fn users_dont_match() -> Self {
        Self::new(
            NumericReply::ErrUsersDontMatch,
            vec![s("Cannot change mode for other users")],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(NumericReply::RplWelcome.code(), 1);
        assert_eq!(NumericReply::ErrBannedFromChan.code(), 474);
        assert_eq!(NumericReply::ErrNotRegistered.code(), 451);
    }

    #[test]
    fn test_reply_params() {
        let r = Reply::need_more_params("JOIN");
        assert_eq!(r.numeric, NumericReply::ErrNeedMoreParams);
        assert_eq!(r.params, vec!["JOIN", "Not enough parameters"]);
    }
}
