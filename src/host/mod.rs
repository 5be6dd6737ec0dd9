pub mod markdown;
pub mod stream;

use crate::document::{Document, Element, NodeId};
use crate::render::notify::HostSignal;
use self::markdown::{blocks, Block};
use tracing::debug;

pub const CHAT_ID: &str = "chat";
pub const MESSAGE_CLASS: &str = "mes";
pub const MESSAGE_TEXT_CLASS: &str = "mes_text";
pub const MESSAGE_ID_ATTR: &str = "mesid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Character,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Character => "Character",
        }
    }
}

#[derive(Debug)]
struct RenderedBlock {
    tag: &'static str,
    node: NodeId,
}

#[derive(Debug)]
struct HostMessage {
    role: Role,
    source: String,
    container: NodeId,
    text: NodeId,
    blocks: Vec<RenderedBlock>,
}

#[derive(Debug)]
pub struct HostChat {
    chat: NodeId,
    messages: Vec<HostMessage>,
    streaming: Option<usize>,
}

impl HostChat {
    pub fn mount(document: &mut Document) -> Self {
        let body = document.body();
        let chat = document.create_element(Element::new("div").with_attr("id", CHAT_ID));
        document.append_child(body, chat);
        Self {
            chat,
            messages: Vec::new(),
            streaming: None,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn message(&self, index: usize) -> Option<(Role, &str)> {
        self.messages
            .get(index)
            .map(|message| (message.role, message.source.as_str()))
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn push_message(&mut self, document: &mut Document, role: Role, text: &str) -> Vec<HostSignal> {
        let index = self.append(document, role, text);
        let rendered = match role {
            Role::User => HostSignal::UserMessageRendered(index),
            Role::Character => HostSignal::CharacterMessageRendered(index),
        };
        vec![HostSignal::StructureChanged(Some(index)), rendered]
    }

    pub fn begin_stream(&mut self, document: &mut Document) -> Vec<HostSignal> {
        let index = self.append(document, Role::Character, "");
        let container = self.messages[index].container;
        document.set_attr(container, "data-streaming", "true");
        self.streaming = Some(index);
        vec![HostSignal::StructureChanged(Some(index))]
    }

    pub fn append_stream(&mut self, document: &mut Document, delta: &str) -> Vec<HostSignal> {
        let Some(index) = self.streaming else {
            return Vec::new();
        };
        let mut text = self.messages[index].source.clone();
        text.push_str(delta);
        self.rewrite(document, index, text);
        vec![HostSignal::StructureChanged(Some(index))]
    }

    pub fn finish_stream(&mut self, document: &mut Document) -> Vec<HostSignal> {
        let Some(index) = self.streaming.take() else {
            return Vec::new();
        };
        if let Some(container) = self.messages.get(index).map(|message| message.container) {
            document.remove_attr(container, "data-streaming");
        }
        vec![
            HostSignal::CharacterMessageRendered(index),
            HostSignal::GenerationEnded,
        ]
    }

    pub fn stop_stream(&mut self, document: &mut Document) -> Vec<HostSignal> {
        let Some(index) = self.streaming.take() else {
            return Vec::new();
        };
        if let Some(container) = self.messages.get(index).map(|message| message.container) {
            document.remove_attr(container, "data-streaming");
        }
        vec![HostSignal::GenerationStopped]
    }

    pub fn edit_message(&mut self, document: &mut Document, index: usize, text: &str) -> Vec<HostSignal> {
        if index >= self.messages.len() {
            return Vec::new();
        }
        self.rewrite(document, index, text.to_string());
        vec![
            HostSignal::MessageEdited(index),
            HostSignal::MessageUpdated(index),
        ]
    }

    pub fn swipe_message(&mut self, document: &mut Document, index: usize, text: &str) -> Vec<HostSignal> {
        if index >= self.messages.len() {
            return Vec::new();
        }
        self.rewrite(document, index, text.to_string());
        vec![HostSignal::MessageSwiped(index)]
    }

    pub fn delete_message(&mut self, document: &mut Document, index: usize) -> Vec<HostSignal> {
        if index >= self.messages.len() {
            return Vec::new();
        }
        let removed = self.messages.remove(index);
        free_message(document, removed);
        self.streaming = match self.streaming {
            Some(streaming) if streaming == index => None,
            Some(streaming) if streaming > index => Some(streaming - 1),
            other => other,
        };
        for (position, message) in self.messages.iter().enumerate().skip(index) {
            document.set_attr(message.container, MESSAGE_ID_ATTR, &position.to_string());
        }
        vec![HostSignal::StructureChanged(None)]
    }

    pub fn clear(&mut self, document: &mut Document) -> Vec<HostSignal> {
        for message in self.messages.drain(..) {
            free_message(document, message);
        }
        self.streaming = None;
        vec![HostSignal::ChatChanged]
    }

    fn append(&mut self, document: &mut Document, role: Role, text: &str) -> usize {
        let index = self.messages.len();
        let mut element = Element::new("div")
            .with_class(MESSAGE_CLASS)
            .with_attr(MESSAGE_ID_ATTR, index.to_string());
        if role == Role::User {
            element = element.with_attr("is_user", "true");
        }
        let container = document.create_element(element);
        let text_node = document.create_element(Element::new("div").with_class(MESSAGE_TEXT_CLASS));
        document.append_child(container, text_node);
        document.append_child(self.chat, container);

        self.messages.push(HostMessage {
            role,
            source: String::new(),
            container,
            text: text_node,
            blocks: Vec::new(),
        });
        self.rewrite(document, index, text.to_string());
        index
    }

    fn rewrite(&mut self, document: &mut Document, index: usize, text: String) {
        let parsed = blocks(&text);
        let message = &mut self.messages[index];
        message.source = text;

        let mut kept = 0;
        for (rendered, block) in message.blocks.iter().zip(&parsed) {
            if rendered.tag != block.tag() || !document.contains(rendered.node) {
                break;
            }
            update_block(document, rendered.node, block);
            kept += 1;
        }

        for stale in message.blocks.drain(kept..) {
            document.remove(stale.node);
        }
        for block in &parsed[kept..] {
            let node = create_block(document, block);
            document.append_child(message.text, node);
            message.blocks.push(RenderedBlock {
                tag: block.tag(),
                node,
            });
        }
        debug!(message = index, kept, blocks = parsed.len(), "message patched");
    }
}

// Block nodes may have been swapped out of the message by a widget, so they
// are freed on their own as well as through the container.
fn free_message(document: &mut Document, message: HostMessage) {
    document.remove(message.container);
    for block in message.blocks {
        document.remove(block.node);
    }
}

fn create_block(document: &mut Document, block: &Block) -> NodeId {
    let node = document.create_element(Element::new(block.tag()));
    if let Block::Code { .. } = block {
        let code = document.create_element(Element::new("code"));
        document.append_child(node, code);
    }
    update_block(document, node, block);
    node
}

fn update_block(document: &mut Document, node: NodeId, block: &Block) {
    match block {
        Block::Code { lang, value } => {
            let Some(code) = document.first_child_element(node, "code") else {
                document.set_text(node, value);
                return;
            };
            match lang {
                Some(lang) => {
                    document.set_attr(code, "class", &format!("language-{lang}"));
                }
                None => {
                    document.remove_attr(code, "class");
                }
            }
            document.set_text(code, value);
        }
        other => document.set_text(node, other.text()),
    }
}

pub fn chat_root(document: &Document) -> Option<NodeId> {
    document.find_first(document.body(), |_, element| {
        element.attr("id") == Some(CHAT_ID)
    })
}

pub fn message_text(document: &Document, index: usize) -> Option<NodeId> {
    let chat = chat_root(document)?;
    let wanted = index.to_string();
    let container = document.children(chat).iter().copied().find(|node| {
        document.element(*node).is_some_and(|element| {
            element.has_class(MESSAGE_CLASS) && element.attr(MESSAGE_ID_ATTR) == Some(wanted.as_str())
        })
    })?;
    document.find_first(container, |_, element| element.has_class(MESSAGE_TEXT_CLASS))
}

pub fn message_texts(document: &Document) -> Vec<NodeId> {
    let Some(chat) = chat_root(document) else {
        return Vec::new();
    };
    document
        .children(chat)
        .iter()
        .filter_map(|node| {
            let element = document.element(*node)?;
            if !element.has_class(MESSAGE_CLASS) {
                return None;
            }
            document.find_first(*node, |_, element| element.has_class(MESSAGE_TEXT_CLASS))
        })
        .collect()
}
