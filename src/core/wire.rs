//! Conversion between stored messages and the chat-completions wire format.

use crate::api::{ContentPart, ImageUrl, WireContent, WireMessage, WireRole};
use crate::core::message::{Message, Role};

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Render `messages` for the wire, in order. Messages carrying an image become
/// a text part followed by an image part; everything else is plain text.
pub fn to_wire_format(messages: &[Message], include_system_prompt: bool) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + usize::from(include_system_prompt));

    if include_system_prompt {
        wire.push(WireMessage {
            role: WireRole::System,
            content: WireContent::Text(SYSTEM_PROMPT.to_string()),
        });
    }

    wire.extend(messages.iter().map(to_wire_message));
    wire
}

fn to_wire_message(message: &Message) -> WireMessage {
    let content = match &message.image_url {
        Some(url) => WireContent::Parts(vec![
            ContentPart::Text {
                text: message.content.clone(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.clone() },
            },
        ]),
        None => WireContent::Text(message.content.clone()),
    };

    WireMessage {
        role: to_wire_role(message.role),
        content,
    }
}

fn to_wire_role(role: Role) -> WireRole {
    match role {
        Role::User => WireRole::User,
        Role::Assistant => WireRole::Assistant,
    }
}

/// Text of a wire message; image parts are dropped and text parts joined.
pub fn wire_text(content: &WireContent) -> String {
    match content {
        WireContent::Text(text) => text.clone(),
        WireContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(""),
    }
}

/// Inverse of [`to_wire_format`] for role and text. System entries have no
/// stored counterpart and are skipped; images are one-way.
pub fn from_wire_format(wire: &[WireMessage]) -> Vec<(Role, String)> {
    wire.iter()
        .filter_map(|message| {
            let role = match message.role {
                WireRole::System => return None,
                WireRole::User => Role::User,
                WireRole::Assistant => Role::Assistant,
            };
            Some((role, wire_text(&message.content)))
        })
        .collect()
}
