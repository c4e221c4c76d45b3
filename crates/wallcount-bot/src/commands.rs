//! Chat command parsing and handling, independent of the chat transport.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;

use wallcount::{ObservationStore, Threshold};

use crate::error::BotResult;
use crate::format::describe;

pub const INVALID_NUMBER: &str = "Please provide a valid number.";

/// Command names, for help output and completion.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/count", "Show the latest climber count"),
    ("/ping on", "Notify me once the count drops to N or below (/ping on N)"),
    ("/ping off", "Cancel the pending notification"),
    ("/help", "Show this help"),
];

/// A parsed chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Count,
    /// `/ping on N`. `None` when N is not a valid count.
    PingOn(Option<u32>),
    PingOff,
    Help,
}

impl ChatCommand {
    /// Parse a chat line. Returns `None` for anything that is not a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?.trim_start_matches('/');
        let args: Vec<&str> = words.collect();

        match (head, args.as_slice()) {
            ("count", []) => Some(Self::Count),
            ("help", []) => Some(Self::Help),
            ("ping", ["off"]) => Some(Self::PingOff),
            ("ping", ["on", n]) => Some(Self::PingOn(n.parse().ok())),
            _ => None,
        }
    }
}

/// Emoji acknowledgement attached to the user's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    ThumbsUp,
    Handshake,
}

impl Reaction {
    pub fn emoji(&self) -> &'static str {
        match self {
            Reaction::ThumbsUp => "\u{1F44D}",
            Reaction::Handshake => "\u{1F91D}",
        }
    }
}

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Reaction(Reaction),
}

/// A message pushed to a chat outside of any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub chat_id: i64,
    pub text: String,
}

/// Answers chat commands against the shared observation store.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<ObservationStore>,
    notifications: UnboundedSender<Notification>,
}

impl CommandHandler {
    pub fn new(store: Arc<ObservationStore>, notifications: UnboundedSender<Notification>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Handle one line from `chat_id`. `Ok(None)` means stay silent.
    pub fn handle(&self, chat_id: i64, line: &str) -> BotResult<Option<Reply>> {
        let Some(command) = ChatCommand::parse(line) else {
            return Ok(None);
        };

        let reply = match command {
            ChatCommand::Count => self
                .store
                .last()?
                .map(|record| Reply::Text(describe(&record, Utc::now()))),
            ChatCommand::PingOn(None) => {
                tracing::warn!(chat_id, "rejected ping threshold: {line:?}");
                Some(Reply::Text(INVALID_NUMBER.to_string()))
            }
            ChatCommand::PingOn(Some(at_most)) => {
                self.arm(chat_id, at_most);
                Some(Reply::Reaction(Reaction::Handshake))
            }
            ChatCommand::PingOff => {
                self.store.clear_threshold();
                Some(Reply::Reaction(Reaction::ThumbsUp))
            }
            ChatCommand::Help => Some(Reply::Text(help_text())),
        };

        if let Some(reply) = &reply {
            tracing::info!(chat_id, ?reply, "sending reply");
        }
        Ok(reply)
    }

    fn arm(&self, chat_id: i64, at_most: u32) {
        let tx = self.notifications.clone();
        self.store.set_threshold(
            Threshold::at_most(at_most),
            Box::new(move |record| {
                let text = format!("Hey, {}", describe(record, Utc::now()));
                tx.send(Notification { chat_id, text })?;
                Ok(())
            }),
        );
    }
}

fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|(name, desc)| format!("{name:<10} {desc}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use wallcount::OccupancyRecord;

    fn handler() -> (
        CommandHandler,
        Arc<ObservationStore>,
        mpsc::UnboundedReceiver<Notification>,
    ) {
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        (CommandHandler::new(Arc::clone(&store), tx), store, rx)
    }

    fn at(minute: u32, count: u32) -> OccupancyRecord {
        use chrono::TimeZone;
        let ts = Utc.with_ymd_and_hms(2024, 5, 30, 10, minute, 0).unwrap();
        OccupancyRecord::new(count, 60, Some(ts))
    }

    #[test]
    fn test_parse() {
        assert_eq!(ChatCommand::parse("/count"), Some(ChatCommand::Count));
        assert_eq!(ChatCommand::parse("  /help "), Some(ChatCommand::Help));
        assert_eq!(ChatCommand::parse("/ping off"), Some(ChatCommand::PingOff));
        assert_eq!(ChatCommand::parse("ping on 5"), Some(ChatCommand::PingOn(Some(5))));
        assert_eq!(ChatCommand::parse("/ping on five"), Some(ChatCommand::PingOn(None)));
        assert_eq!(ChatCommand::parse("/ping on -1"), Some(ChatCommand::PingOn(None)));
        assert_eq!(ChatCommand::parse("/ping"), None);
        assert_eq!(ChatCommand::parse("/ping on"), None);
        assert_eq!(ChatCommand::parse("hello there"), None);
        assert_eq!(ChatCommand::parse(""), None);
    }

    #[test]
    fn test_count_silent_when_empty() {
        let (handler, _store, _rx) = handler();
        assert_eq!(handler.handle(1, "/count").unwrap(), None);
    }

    #[test]
    fn test_count_describes_last() {
        let (handler, store, _rx) = handler();
        store.store(&at(10, 8)).unwrap();
        match handler.handle(1, "/count").unwrap() {
            Some(Reply::Text(text)) => {
                assert!(text.ends_with("there've been 8 people on the wall"), "{text}")
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_invalid_number() {
        let (handler, store, _rx) = handler();
        assert_eq!(
            handler.handle(1, "/ping on lots").unwrap(),
            Some(Reply::Text(INVALID_NUMBER.to_string()))
        );
        assert_eq!(store.threshold(), None);
    }

    #[test]
    fn test_ping_on_notifies_once() {
        let (handler, store, mut rx) = handler();
        assert_eq!(
            handler.handle(42, "/ping on 5").unwrap(),
            Some(Reply::Reaction(Reaction::Handshake))
        );
        assert_eq!(store.threshold(), Some(Threshold::at_most(5)));

        store.store(&at(10, 9)).unwrap();
        assert!(rx.try_recv().is_err());

        store.store(&at(11, 4)).unwrap();
        let note = rx.try_recv().unwrap();
        assert_eq!(note.chat_id, 42);
        assert!(note.text.starts_with("Hey, "));
        assert!(note.text.ends_with("there've been 4 people on the wall"));

        store.store(&at(12, 2)).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(store.threshold(), None);
    }

    #[test]
    fn test_ping_off_clears() {
        let (handler, store, mut rx) = handler();
        handler.handle(1, "/ping on 5").unwrap();
        assert_eq!(
            handler.handle(1, "/ping off").unwrap(),
            Some(Reply::Reaction(Reaction::ThumbsUp))
        );
        store.store(&at(10, 0)).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_is_silent() {
        let (handler, _store, _rx) = handler();
        assert_eq!(handler.handle(1, "what's up").unwrap(), None);
        assert_eq!(handler.handle(1, "/ping sideways").unwrap(), None);
    }

    #[test]
    fn test_help_lists_commands() {
        let (handler, _store, _rx) = handler();
        let Some(Reply::Text(text)) = handler.handle(1, "/help").unwrap() else {
            panic!("help should reply with text");
        };
        for (name, _) in COMMANDS {
            assert!(text.contains(name));
        }
    }
}
