//! `HistoryStore::ToModelMessages` — converts persisted `ChatMessage`s into
//! the `LanguageModel` wire shape, dropping incomplete tool-call pairs.

use std::collections::HashSet;

use ship_domain::{ChatMessage, Part, Role};
use ship_providers::{ContentPart, ModelMessage};

pub fn to_model_messages(messages: &[ChatMessage]) -> Vec<ModelMessage> {
    let mut out = Vec::new();

    for msg in messages {
        match msg.role {
            Role::User => {
                out.push(ModelMessage::user(msg.text()));
            }
            Role::Assistant => {
                let resolved: HashSet<&str> = msg
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::ToolResult { call_id, .. } => Some(call_id.as_str()),
                        _ => None,
                    })
                    .collect();

                let mut assistant_parts = Vec::new();
                let mut tool_result_messages = Vec::new();

                for part in &msg.parts {
                    match part {
                        Part::Text { text } if !text.is_empty() => {
                            assistant_parts.push(ContentPart::Text { text: text.clone() });
                        }
                        Part::Text { .. } => {}
                        Part::ToolInvocation {
                            call_id,
                            tool_name,
                            arguments,
                        } => {
                            // Drop incomplete tool-call pairs: a model
                            // provider will reject a tool_use with no
                            // matching tool_result in the next turn.
                            if resolved.contains(call_id.as_str()) {
                                assistant_parts.push(ContentPart::ToolUse {
                                    id: call_id.clone(),
                                    name: tool_name.clone(),
                                    input: arguments.clone(),
                                });
                            }
                        }
                        Part::ToolResult {
                            call_id, output, is_error, ..
                        } => {
                            tool_result_messages.push(ModelMessage::tool_result(
                                call_id.clone(),
                                serde_json::to_string(output).unwrap_or_default(),
                                *is_error,
                            ));
                        }
                    }
                }

                if !assistant_parts.is_empty() {
                    out.push(ModelMessage::assistant_parts(assistant_parts));
                }
                out.extend(tool_result_messages);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_converts_to_plain_text() {
        let messages = vec![ChatMessage::user("hello")];
        let converted = to_model_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].text(), "hello");
    }

    #[test]
    fn drops_unresolved_tool_invocation() {
        let messages = vec![ChatMessage::assistant(vec![Part::ToolInvocation {
            call_id: "c1".into(),
            tool_name: "shell".into(),
            arguments: serde_json::json!({}),
        }])];
        let converted = to_model_messages(&messages);
        assert!(converted.is_empty());
    }

    #[test]
    fn keeps_resolved_tool_call_and_emits_tool_result_message() {
        let messages = vec![ChatMessage::assistant(vec![
            Part::text("checking"),
            Part::ToolInvocation {
                call_id: "c1".into(),
                tool_name: "shell".into(),
                arguments: serde_json::json!({"cmd": "ls"}),
            },
            Part::ToolResult {
                call_id: "c1".into(),
                tool_name: "shell".into(),
                output: serde_json::json!({"stdout": "a.txt"}),
                is_error: false,
            },
        ])];
        let converted = to_model_messages(&messages);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].text(), "checking");
    }
}
