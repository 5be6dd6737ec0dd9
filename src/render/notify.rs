use crate::config::StyleboxConfig;
use crate::document::{Document, NodeId};
use crate::host;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    CharacterMessageRendered(usize),
    UserMessageRendered(usize),
    MessageEdited(usize),
    MessageUpdated(usize),
    MessageSwiped(usize),
    ChatChanged,
    GenerationEnded,
    GenerationStopped,
    StructureChanged(Option<usize>),
    Startup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Region {
    Message(usize),
    AllMessages,
    Document,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(index) => write!(f, "message {index}"),
            Self::AllMessages => write!(f, "all messages"),
            Self::Document => write!(f, "document"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub region: Region,
    pub attempts_left: u32,
    coalesced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub delay: Duration,
    pub request: ScanRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    Root(NodeId),
    Retry(Scheduled),
    Gone,
}

#[derive(Debug)]
pub struct NotificationAdapter {
    message_rendered: Duration,
    chat_changed: Duration,
    startup: Duration,
    structure_changed: Duration,
    retry_attempts: u32,
    retry_interval: Duration,
    pending: BTreeSet<Region>,
}

impl NotificationAdapter {
    pub fn from_config(config: &StyleboxConfig) -> Self {
        Self {
            message_rendered: config.message_rendered_delay(),
            chat_changed: config.chat_changed_delay(),
            startup: config.startup_delay(),
            structure_changed: config.structure_changed_delay(),
            retry_attempts: config.retry_attempts,
            retry_interval: config.retry_interval(),
            pending: BTreeSet::new(),
        }
    }

    // `None` when the signal folds into a structural scan that is already
    // pending for the same region.
    pub fn plan(&mut self, signal: HostSignal) -> Option<Scheduled> {
        let (region, delay, coalesced) = match signal {
            HostSignal::CharacterMessageRendered(index)
            | HostSignal::UserMessageRendered(index)
            | HostSignal::MessageEdited(index)
            | HostSignal::MessageUpdated(index)
            | HostSignal::MessageSwiped(index) => {
                (Region::Message(index), self.message_rendered, false)
            }
            HostSignal::ChatChanged => (Region::AllMessages, self.chat_changed, false),
            HostSignal::GenerationEnded | HostSignal::GenerationStopped => {
                (Region::AllMessages, self.message_rendered, false)
            }
            HostSignal::Startup => (Region::AllMessages, self.startup, false),
            HostSignal::StructureChanged(Some(index)) => {
                (Region::Message(index), self.structure_changed, true)
            }
            HostSignal::StructureChanged(None) => (Region::Document, self.structure_changed, true),
        };

        if coalesced && !self.pending.insert(region) {
            trace!(%region, "structural change folded into pending scan");
            return None;
        }
        Some(Scheduled {
            delay,
            request: ScanRequest {
                region,
                attempts_left: self.retry_attempts,
                coalesced,
            },
        })
    }

    pub fn locate(&mut self, document: &Document, request: ScanRequest) -> Located {
        if request.coalesced {
            self.pending.remove(&request.region);
        }

        let root = match request.region {
            Region::Message(index) => host::message_text(document, index),
            Region::AllMessages => host::chat_root(document),
            Region::Document => Some(document.body()),
        };
        if let Some(root) = root {
            return Located::Root(root);
        }

        if request.attempts_left == 0 {
            debug!(region = %request.region, "region never appeared, giving up");
            return Located::Gone;
        }
        trace!(
            region = %request.region,
            attempts_left = request.attempts_left,
            "region missing, retrying"
        );
        Located::Retry(Scheduled {
            delay: self.retry_interval,
            request: ScanRequest {
                region: request.region,
                attempts_left: request.attempts_left - 1,
                coalesced: false,
            },
        })
    }
}
