// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping stored channel messages onto chat-completion messages.

use waynebot_core::{AuthorKind, ChatMessage, Message, ToolCall};

/// Convert one stored message to the shape the model sees.
///
/// Tool-call rows store `"<name>\n<args_json>"` as content and the call id
/// as the author name; tool-result rows store the call id the same way.
pub fn to_chat_message(m: &Message) -> ChatMessage {
    match m.author_type {
        AuthorKind::Human => ChatMessage::user(format!("{}: {}", m.author_name, m.content)),
        AuthorKind::Agent => ChatMessage::assistant(m.content.clone()),
        AuthorKind::ToolCall => {
            let (name, arguments) = split_tool_call(&m.content);
            ChatMessage::assistant_tool_calls(vec![ToolCall {
                id: m.author_name.clone(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }])
        }
        AuthorKind::ToolResult => ChatMessage::tool(m.author_name.clone(), m.content.clone()),
        AuthorKind::Connector => ChatMessage::user(m.content.clone()),
    }
}

/// Text counted against the history budget for a message.
pub fn message_text(m: &Message) -> String {
    match m.author_type {
        AuthorKind::Human => format!("{}: {}", m.author_name, m.content),
        _ => m.content.clone(),
    }
}

/// Split `"<name>\n<args>"`. Without a newline the whole content is the name
/// and the arguments are `{}`.
fn split_tool_call(content: &str) -> (&str, &str) {
    content.split_once('\n').unwrap_or((content, "{}"))
}
