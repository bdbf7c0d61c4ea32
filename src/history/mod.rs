use crate::error::RelayError;
use crate::models::chat::{ Conversation, Role, Turn };
use log::debug;
use uuid::Uuid;

/// Append-only transcript for the single process-lifetime session.
///
/// Turns must alternate user/assistant starting with user, and sequence
/// numbers must be gapless. Both checks are defensive: the relay is the only
/// caller and constructs turns that satisfy them.
pub struct ConversationStore {
    conversation: Conversation,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            conversation: Conversation {
                id: Uuid::new_v4().to_string(),
                turns: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    /// Sequence number the next appended turn must carry.
    pub fn next_sequence(&self) -> u64 {
        self.conversation.turns.len() as u64
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), RelayError> {
        let expected_role = match self.conversation.turns.last() {
            None => Role::User,
            Some(prev) =>
                match prev.role {
                    Role::User => Role::Assistant,
                    Role::Assistant => Role::User,
                }
        };
        if turn.role != expected_role {
            return Err(
                RelayError::InvariantViolation(
                    format!(
                        "expected {} turn at position {}, got {}",
                        expected_role,
                        self.next_sequence(),
                        turn.role
                    )
                )
            );
        }
        if turn.sequence != self.next_sequence() {
            return Err(
                RelayError::InvariantViolation(
                    format!("expected sequence {}, got {}", self.next_sequence(), turn.sequence)
                )
            );
        }

        debug!(
            "conversation {}: appended {} turn #{}",
            self.conversation.id,
            turn.role,
            turn.sequence
        );
        self.conversation.turns.push(turn);
        Ok(())
    }

    /// Full transcript in conversation order.
    pub fn history(&self) -> &[Turn] {
        &self.conversation.turns
    }

    /// Suffix of the transcript supplied as prompt context. A limit of 0
    /// means the full transcript.
    pub fn context(&self, limit: usize) -> Vec<Turn> {
        let turns = &self.conversation.turns;
        if limit == 0 || turns.len() <= limit {
            turns.to_vec()
        } else {
            turns[turns.len() - limit..].to_vec()
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_context_for_prompt(context: &[Turn]) -> String {
    let mut result = String::new();
    for turn in context {
        let role_display = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        result.push_str(&format!("{}: {}\n", role_display, turn.text));
    }
    result
}
