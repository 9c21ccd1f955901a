use crate::models::chat::{ ChatMessage, ROLE_ASSISTANT, ROLE_USER };
use thiserror::Error;

pub const INST_OPEN: &str = "[INST]";
pub const INST_CLOSE: &str = "[/INST]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("conversation contains no messages")]
    EmptyConversation,
}

/// Content of the last `user` message, or of the final message when the
/// conversation has no user turn.
pub fn extract_last_prompt(messages: &[ChatMessage]) -> Result<&str, PromptError> {
    if let Some(msg) = messages.iter().rev().find(|m| m.is_user()) {
        return Ok(&msg.content);
    }
    messages
        .last()
        .map(|m| m.content.as_str())
        .ok_or(PromptError::EmptyConversation)
}

pub fn format_instruction(prompt: &str) -> String {
    format!("{} {} {}", INST_OPEN, prompt.trim(), INST_CLOSE)
}

/// Removes every echo of the formatted prompt from decoded model output.
pub fn strip_prompt_echo(decoded: &str, full_prompt: &str) -> String {
    decoded.replace(full_prompt, "").trim().to_string()
}

/// Renders a whole conversation the way training examples are fed to the
/// model: instruction-wrapped user turns followed by raw assistant turns.
/// Roles other than user and assistant are dropped.
pub fn format_training_conversation(messages: &[ChatMessage]) -> String {
    let mut text = String::new();
    for msg in messages {
        match msg.role.as_str() {
            ROLE_USER => text.push_str(&format_instruction(&msg.content)),
            ROLE_ASSISTANT => {
                text.push(' ');
                text.push_str(msg.content.trim());
            }
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_message_wins_over_later_assistant_turns() {
        let messages = vec![
            ChatMessage::new("system", "you write SQL"),
            ChatMessage::new("user", "first question"),
            ChatMessage::new("assistant", "SELECT 1;"),
            ChatMessage::new("user", "second question"),
            ChatMessage::new("assistant", "SELECT 2;"),
        ];
        assert_eq!(extract_last_prompt(&messages), Ok("second question"));
    }

    #[test]
    fn falls_back_to_final_message_without_user_turn() {
        let messages = vec![
            ChatMessage::new("system", "you write SQL"),
            ChatMessage::new("assistant", "how can I help"),
        ];
        assert_eq!(extract_last_prompt(&messages), Ok("how can I help"));
    }

    #[test]
    fn empty_conversation_is_an_error() {
        assert_eq!(extract_last_prompt(&[]), Err(PromptError::EmptyConversation));
    }

    #[test]
    fn instruction_template_trims_prompt() {
        assert_eq!(
            format_instruction("  list all users \n"),
            "[INST] list all users [/INST]"
        );
    }

    #[test]
    fn echo_is_removed_and_result_trimmed() {
        let prompt = format_instruction("count rows");
        let decoded = format!("{}  SELECT COUNT(*) FROM t; ", prompt);
        assert_eq!(strip_prompt_echo(&decoded, &prompt), "SELECT COUNT(*) FROM t;");
    }

    #[test]
    fn training_conversation_concatenates_turns() {
        let messages = vec![
            ChatMessage::new("system", "ignored"),
            ChatMessage::new("user", " how many orders? "),
            ChatMessage::new("assistant", " SELECT COUNT(*) FROM orders; "),
            ChatMessage::new("user", "and customers"),
            ChatMessage::new("assistant", "SELECT COUNT(*) FROM customers;"),
        ];
        assert_eq!(
            format_training_conversation(&messages),
            "[INST] how many orders? [/INST] SELECT COUNT(*) FROM orders;\
             [INST] and customers [/INST] SELECT COUNT(*) FROM customers;"
        );
    }
}
