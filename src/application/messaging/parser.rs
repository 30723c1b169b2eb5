//! Message parser - Turns raw relay lines into structured events

use crate::application::errors::BotError;
use crate::domain::entities::{ChatEvent, ChatMessage};

/// Keep-alive request sent by the relay.
pub const PING: &str = "PING";

/// Verb marking a line that carries user chat text.
pub const PRIVMSG: &str = "PRIVMSG";

/// Parses inbound protocol lines
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageParser;

impl MessageParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one line (without its terminator).
    ///
    /// Chat lines look like `:nick!user@host PRIVMSG #channel :text`. The text
    /// is everything after the second `:`; a line with fewer than four fields
    /// or without that colon is rejected as malformed.
    pub fn parse(&self, raw: &str) -> Result<ChatEvent, BotError> {
        let line = raw.trim();

        if line.starts_with(PING) {
            return Ok(ChatEvent::Ping {
                payload: ping_payload(line),
            });
        }

        if !line.contains(PRIVMSG) {
            return Ok(ChatEvent::Other(line.to_string()));
        }

        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() < 4 {
            return Err(BotError::ProtocolParse(format!(
                "expected at least 4 fields: {}",
                line
            )));
        }

        let prefix = parts[0];
        let nick = prefix.split('!').next().unwrap_or(prefix);
        let sender: String = nick.chars().skip(1).collect();

        // First ':' after the leading sigil
        let text_start = line
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == ':')
            .map(|(i, _)| i + 1)
            .ok_or_else(|| BotError::ProtocolParse(format!("missing trailing parameter: {}", line)))?;

        let text = line[text_start..].trim();
        Ok(ChatEvent::ChatMessage(ChatMessage::new(sender, text)))
    }
}

fn ping_payload(line: &str) -> Option<String> {
    let rest = line[PING.len()..].trim();
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(event: ChatEvent) -> ChatMessage {
        match event {
            ChatEvent::ChatMessage(msg) => msg,
            other => panic!("expected chat message, got {:?}", other),
        }
    }

    #[test]
    fn parses_privmsg() {
        let parser = MessageParser::new();
        let msg = chat(parser.parse(":user!user@host PRIVMSG #channel :!commands").unwrap());

        assert_eq!(msg.sender, "user");
        assert_eq!(msg.text, "!commands");
    }

    #[test]
    fn keeps_colons_inside_text() {
        let parser = MessageParser::new();
        let msg = chat(
            parser
                .parse(":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #chan :time is 12:30 now\r")
                .unwrap(),
        );

        assert_eq!(msg.sender, "viewer");
        assert_eq!(msg.text, "time is 12:30 now");
    }

    #[test]
    fn sender_without_bang_uses_whole_prefix() {
        let parser = MessageParser::new();
        let msg = chat(parser.parse(":server PRIVMSG #chan :hello").unwrap());
        assert_eq!(msg.sender, "server");
    }

    #[test]
    fn parses_ping_with_payload() {
        let parser = MessageParser::new();
        assert_eq!(
            parser.parse("PING :relay.example").unwrap(),
            ChatEvent::Ping { payload: Some("relay.example".to_string()) }
        );
        assert_eq!(parser.parse("PING").unwrap(), ChatEvent::Ping { payload: None });
    }

    #[test]
    fn too_few_fields_is_malformed() {
        let parser = MessageParser::new();
        let err = parser.parse(":user!u@h PRIVMSG #chan").unwrap_err();
        assert!(matches!(err, BotError::ProtocolParse(_)));
    }

    #[test]
    fn missing_second_colon_is_malformed() {
        let parser = MessageParser::new();
        let err = parser.parse(":user!u@h PRIVMSG #chan hello").unwrap_err();
        assert!(matches!(err, BotError::ProtocolParse(_)));
    }

    #[test]
    fn other_lines_pass_through() {
        let parser = MessageParser::new();
        let event = parser.parse(":tmi.twitch.tv 001 bot :Welcome, GLHF!").unwrap();
        assert_eq!(event.kind(), "other");
    }
}
