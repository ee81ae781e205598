//! # Chat Plugin
//!
//! The default collaborator behind the telnet server. It gives meaning to the
//! lines players type:
//!
//! - `gossip <text>` (and the short forms `gos`, `goss`, `gosi`...) is
//!   published as [`Event::Gossip`] for the server to fan out
//! - `quit` answers "Goodbye." and asks the server to close the connection
//! - anything else is matched against an ordered table of regex commands,
//!   falling back to a fixed "no effect" line
//! - every new connection is greeted with a welcome line
//!
//! ```rust
//! use mud_event_system::{Event, EventRouter};
//! use plugin_chat::{ChatConfig, ChatPlugin};
//! use std::sync::Arc;
//!
//! let router = Arc::new(EventRouter::new());
//! ChatPlugin::new(&ChatConfig::default()).unwrap().register(&router);
//!
//! router.publish(Event::IncomingMessage { id: 7, text: "gossip hi".into() }).unwrap();
//! router.dispatch_pending();
//! assert_eq!(router.stats().events_published, 2);
//! ```

use mud_event_system::{ConnectionId, Event, EventError, EventKind, EventRouter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, info};

const GOSSIP_PATTERN: &str = r"^goss?i?p? (.+)$";
const QUIT_COMMAND: &str = "quit";
const GOODBYE: &str = "Goodbye.";

/// One row of the command table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRule {
    /// Regular expression the whole line must match
    pub pattern: String,
    /// Line sent back to the player on a match
    pub response: String,
}

/// Chat configuration, the `[chat]` table of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_no_match")]
    pub no_match: String,
    /// Checked in order; the first full match wins
    #[serde(default)]
    pub commands: Vec<CommandRule>,
}

fn default_welcome() -> String {
    "Connected!".to_string()
}

fn default_no_match() -> String {
    "Your command had no effect.".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            no_match: default_no_match(),
            commands: vec![CommandRule {
                pattern: "^look$".to_string(),
                response: "You see nothing special.".to_string(),
            }],
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid command pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// What a line of input turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to do, the line was blank
    Nothing,
    /// Relay `text` to everyone
    Gossip(String),
    /// Say goodbye and disconnect
    Quit,
    /// Answer the sender with one line
    Say(String),
}

/// Compiled chat rules, ready to be subscribed to a router.
#[derive(Debug)]
pub struct ChatPlugin {
    gossip: Regex,
    commands: Vec<(Regex, String)>,
    welcome: String,
    no_match: String,
}

impl ChatPlugin {
    /// Compiles the command table. Every pattern is anchored so it must
    /// match the whole line.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let gossip = compile(GOSSIP_PATTERN)?;
        let commands = config
            .commands
            .iter()
            .map(|rule| Ok((compile(&format!("^(?:{})$", rule.pattern))?, rule.response.clone())))
            .collect::<Result<Vec<_>, ChatError>>()?;

        Ok(Self {
            gossip,
            commands,
            welcome: config.welcome.clone(),
            no_match: config.no_match.clone(),
        })
    }

    /// Decides how to answer one line.
    pub fn reply_to(&self, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::Nothing;
        }
        if let Some(captures) = self.gossip.captures(line) {
            return Reply::Gossip(captures[1].to_string());
        }
        if line.eq_ignore_ascii_case(QUIT_COMMAND) {
            return Reply::Quit;
        }

        let response = self
            .commands
            .iter()
            .find(|(pattern, _)| pattern.is_match(line))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.no_match.clone());
        Reply::Say(response)
    }

    /// Subscribes the welcome and input handlers.
    ///
    /// The handlers hold a weak reference back to `router`, so registering
    /// does not keep the router alive.
    pub fn register(self, router: &Arc<EventRouter>) {
        info!("💬 ChatPlugin: Registering handlers ({} commands)", self.commands.len());
        let plugin = Arc::new(self);

        let greeter = Arc::clone(&plugin);
        let publisher = Arc::downgrade(router);
        router.subscribe(EventKind::ConnectionOpened, "chat_welcome", move |event| {
            if let Event::ConnectionOpened { id, .. } = event {
                upgrade(&publisher)?.publish(Event::outgoing(*id, greeter.welcome.clone()))?;
            }
            Ok(())
        });

        let publisher = Arc::downgrade(router);
        router.subscribe(EventKind::IncomingMessage, "chat_input", move |event| {
            if let Event::IncomingMessage { id, text } = event {
                let router = upgrade(&publisher)?;
                plugin.handle_line(&router, *id, text)?;
            }
            Ok(())
        });
    }

    fn handle_line(&self, router: &EventRouter, id: ConnectionId, text: &str) -> Result<(), EventError> {
        let reply = self.reply_to(text);
        debug!("💬 Connection {} said '{}' -> {:?}", id, text, reply);

        match reply {
            Reply::Nothing => Ok(()),
            Reply::Gossip(text) => router.publish(Event::Gossip { id, text }),
            Reply::Quit => {
                router.publish(Event::outgoing(id, GOODBYE))?;
                router.publish(Event::Disconnect { id })
            }
            Reply::Say(response) => router.publish(Event::outgoing(id, response)),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, ChatError> {
    Regex::new(pattern).map_err(|source| ChatError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn upgrade(router: &Weak<EventRouter>) -> Result<Arc<EventRouter>, EventError> {
    router.upgrade().ok_or(EventError::RouterStopped)
}
