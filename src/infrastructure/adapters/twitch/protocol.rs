//! Outbound line builders for the relay's IRC dialect

/// Default relay host.
pub const DEFAULT_HOST: &str = "irc.chat.twitch.tv";

/// Default relay port (plain-text IRC).
pub const DEFAULT_PORT: u16 = 6667;

/// Keep-alive reply token.
pub const PONG: &str = "PONG";

const TERMINATOR: &str = "\r\n";

pub fn pass(token: &str) -> String {
    format!("PASS {}{}", token, TERMINATOR)
}

pub fn nick(nick: &str) -> String {
    format!("NICK {}{}", nick, TERMINATOR)
}

pub fn join(channel: &str) -> String {
    format!("JOIN #{}{}", channel, TERMINATOR)
}

/// Chat line addressed to the channel. Embedded line breaks are flattened so
/// one call can never produce more than one protocol line.
pub fn privmsg(channel: &str, text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("PRIVMSG #{} :{}{}", channel, text, TERMINATOR)
}

/// Reply to a keep-alive PING, echoing its parameter when there is one.
pub fn pong(payload: Option<&str>) -> String {
    match payload {
        Some(payload) => format!("{} :{}{}", PONG, payload, TERMINATOR),
        None => format!("{}{}", PONG, TERMINATOR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_lines() {
        assert_eq!(pass("oauth:abc"), "PASS oauth:abc\r\n");
        assert_eq!(nick("streamer"), "NICK streamer\r\n");
        assert_eq!(join("streamer"), "JOIN #streamer\r\n");
    }

    #[test]
    fn privmsg_flattens_newlines() {
        assert_eq!(privmsg("chan", "a\nb\r\nc"), "PRIVMSG #chan :a b  c\r\n");
    }

    #[test]
    fn pong_echoes_payload() {
        assert_eq!(pong(Some("tmi.twitch.tv")), "PONG :tmi.twitch.tv\r\n");
        assert_eq!(pong(None), "PONG\r\n");
    }
}
