use crate::indigo::models::{Attachment, Message};

use super::generation::{GenerationContext, HistoryEntry, OutboundAttachment};

/// Convert a conversation's history plus a new prompt (and optional
/// attachment) into the structured input the generation service expects.
///
/// Only role and text are forwarded for historical messages; a past
/// attachment becomes a presence marker rather than being re-sent. This
/// bounds the payload to the current turn's attachment size no matter how
/// many files were sent earlier in the conversation. Pure function: no
/// I/O, no mutation.
pub fn assemble(
    history: &[Message],
    prompt: &str,
    attachment: Option<&Attachment>,
) -> GenerationContext {
    GenerationContext {
        history: history
            .iter()
            .map(|message| HistoryEntry {
                role: message.role,
                text: message.content.clone(),
                attachment_present: message.attachment.is_some(),
            })
            .collect(),
        prompt: prompt.to_string(),
        attachment: attachment.map(|a| OutboundAttachment {
            uri: a.data_uri.clone(),
            name: Some(a.name.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indigo::models::Role;

    fn png_attachment() -> Attachment {
        Attachment {
            data_uri: "data:image/png;base64,aGVsbG8=".to_string(),
            name: "pic.png".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_empty_history_first_turn() {
        let context = assemble(&[], "hello", None);

        assert!(context.history.is_empty());
        assert_eq!(context.prompt, "hello");
        assert!(context.attachment.is_none());
    }

    #[test]
    fn test_history_order_and_roles_preserved() {
        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
        ];

        let context = assemble(&history, "four", None);

        let roles: Vec<Role> = context.history.iter().map(|e| e.role).collect();
        let texts: Vec<&str> = context.history.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_past_attachment_becomes_marker_only() {
        let history = vec![
            Message::user_with_attachment("see file", png_attachment()),
            Message::assistant("looks good"),
        ];

        let context = assemble(&history, "thanks", None);

        assert!(context.history[0].attachment_present);
        assert!(!context.history[1].attachment_present);
        // The payload itself is never re-sent for past turns
        let json = serde_json::to_string(&context).unwrap();
        assert!(!json.contains("base64,aGVsbG8="));
    }

    #[test]
    fn test_current_attachment_forwarded_in_full() {
        let attachment = png_attachment();
        let context = assemble(&[], "look at this", Some(&attachment));

        let outbound = context.attachment.expect("attachment should be forwarded");
        assert_eq!(outbound.uri, attachment.data_uri);
        assert_eq!(outbound.name.as_deref(), Some("pic.png"));
    }
}
