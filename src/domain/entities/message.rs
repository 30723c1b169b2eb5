/// A chat line addressed to the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Token after `!` up to the first whitespace, lower-cased.
    pub fn command_token(&self) -> Option<String> {
        let rest = self.text.strip_prefix('!')?;
        let token = rest.split_whitespace().next()?;
        Some(token.to_lowercase())
    }
}

/// Structured form of one inbound protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Keep-alive PING; `payload` is its parameter, if any.
    Ping { payload: Option<String> },
    ChatMessage(ChatMessage),
    /// Anything else, kept for diagnostics only.
    Other(String),
}

impl ChatEvent {
    pub fn kind(&self) -> &str {
        match self {
            ChatEvent::Ping { .. } => "ping",
            ChatEvent::ChatMessage(_) => "chat",
            ChatEvent::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_token_lowercases_first_word() {
        let msg = ChatMessage::new("viewer", "!Discord please");
        assert_eq!(msg.command_token().as_deref(), Some("discord"));
    }

    #[test]
    fn bare_bang_has_no_token() {
        let msg = ChatMessage::new("viewer", "!");
        assert_eq!(msg.command_token(), None);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        let msg = ChatMessage::new("viewer", "hello !commands");
        assert_eq!(msg.command_token(), None);
    }
}
