use crate::cli::Args;
use crate::error::RelayError;
use crate::history::ConversationStore;
use crate::llm::chat::{ new_client, ChatClient };
use crate::llm::{ LlmConfig, LlmType };

use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use crate::models::chat::Turn;

/// Relays user turns to the model backend and keeps the transcript.
///
/// The service itself is stateless between calls; all conversation state
/// lives in the owned `ConversationStore`.
pub struct RelayService {
    chat_client: Arc<dyn ChatClient>,
    store: Mutex<ConversationStore>,
    backend_timeout: Duration,
    history_context_limit: usize,
}

impl RelayService {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={:?}, BaseURL={:?}",
            args.chat_llm_type,
            chat_config.completion_model.as_deref().unwrap_or("adapter default"),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        Ok(
            Self::with_client(
                chat_client,
                Duration::from_secs(args.backend_timeout_secs),
                args.history_context_limit
            )
        )
    }

    pub fn with_client(
        chat_client: Arc<dyn ChatClient>,
        backend_timeout: Duration,
        history_context_limit: usize
    ) -> Self {
        Self {
            chat_client,
            store: Mutex::new(ConversationStore::new()),
            backend_timeout,
            history_context_limit,
        }
    }

    /// Submit one user turn and obtain the assistant's reply.
    ///
    /// On backend failure no assistant turn is appended, so error text never
    /// pollutes the context supplied to later calls.
    pub async fn handle_turn(&self, user_text: &str) -> Result<String, RelayError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(RelayError::InvalidInput);
        }

        // The lock is held across the whole append-read-call-append sequence
        // so concurrent submissions serialize and the alternation invariant
        // holds. Single session, so there is no unrelated work to stall.
        let mut store = self.store.lock().await;
        let sequence = store.next_sequence();
        store.append(Turn::user(text, sequence))?;
        let context = store.context(self.history_context_limit);

        let reply = match
            timeout(self.backend_timeout, self.chat_client.complete(&context)).await
        {
            Err(_) => {
                warn!(
                    "conversation {}: model backend timed out after {:?}",
                    store.id(),
                    self.backend_timeout
                );
                return Err(RelayError::BackendTimeout(self.backend_timeout));
            }
            Ok(Err(e)) => {
                warn!("conversation {}: model backend call failed: {}", store.id(), e);
                return Err(RelayError::Backend(e.to_string()));
            }
            Ok(Ok(completion)) => completion.response,
        };

        let sequence = store.next_sequence();
        store.append(Turn::assistant(reply.clone(), sequence))?;
        Ok(reply)
    }

    /// Snapshot of the full transcript.
    pub async fn history(&self) -> Vec<Turn> {
        self.store.lock().await.history().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::CompletionResponse;
    use crate::models::chat::Role;
    use async_trait::async_trait;
    use std::error::Error as StdError;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl ChatClient for FixedBackend {
        async fn complete(
            &self,
            _context: &[Turn]
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Ok(CompletionResponse { response: self.0.to_string() })
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatClient for FailingBackend {
        async fn complete(
            &self,
            _context: &[Turn]
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Err("quota exceeded".into())
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl ChatClient for SlowBackend {
        async fn complete(
            &self,
            _context: &[Turn]
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CompletionResponse { response: "too late".to_string() })
        }
    }

    struct ContextProbe {
        seen: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChatClient for ContextProbe {
        async fn complete(
            &self,
            context: &[Turn]
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            self.seen.lock().unwrap().push(context.len());
            Ok(CompletionResponse { response: "ok".to_string() })
        }
    }

    fn relay_with(client: Arc<dyn ChatClient>) -> RelayService {
        RelayService::with_client(client, Duration::from_secs(5), 0)
    }

    #[tokio::test]
    async fn successful_turn_appends_user_and_assistant() {
        let relay = relay_with(Arc::new(FixedBackend("Hi there")));

        let reply = relay.handle_turn("Hello").await.unwrap();
        assert_eq!(reply, "Hi there");

        let history = relay.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "Hello");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].text, "Hi there");
    }

    #[tokio::test]
    async fn whitespace_only_message_is_rejected_before_the_store() {
        let relay = relay_with(Arc::new(FixedBackend("unused")));

        let err = relay.handle_turn("").await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput));

        let err = relay.handle_turn("   \n\t").await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput));

        assert!(relay.history().await.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_leaves_user_turn_without_a_reply() {
        let relay = relay_with(Arc::new(FailingBackend));

        let err = relay.handle_turn("test").await.unwrap_err();
        match err {
            RelayError::Backend(msg) => assert!(msg.contains("quota exceeded")),
            other => panic!("expected Backend error, got {:?}", other),
        }

        let history = relay.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "test");
    }

    #[tokio::test]
    async fn backend_timeout_maps_to_typed_error() {
        let relay = RelayService::with_client(
            Arc::new(SlowBackend),
            Duration::from_millis(50),
            0
        );

        let err = relay.handle_turn("test").await.unwrap_err();
        assert!(matches!(err, RelayError::BackendTimeout(_)));

        let history = relay.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "test");
    }

    #[tokio::test]
    async fn transcript_alternates_over_many_interactions() {
        let relay = relay_with(Arc::new(FixedBackend("ok")));

        for i in 0..5 {
            relay.handle_turn(&format!("message {}", i)).await.unwrap();
        }

        let history = relay.history().await;
        assert_eq!(history.len(), 10);
        for (i, turn) in history.iter().enumerate() {
            assert_eq!(turn.sequence, i as u64);
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn concurrent_turns_never_interleave() {
        let relay = Arc::new(relay_with(Arc::new(FixedBackend("ok"))));

        let first = tokio::spawn({
            let relay = Arc::clone(&relay);
            async move { relay.handle_turn("first").await }
        });
        let second = tokio::spawn({
            let relay = Arc::clone(&relay);
            async move { relay.handle_turn("second").await }
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let history = relay.history().await;
        assert_eq!(history.len(), 4);
        for (i, turn) in history.iter().enumerate() {
            assert_eq!(turn.sequence, i as u64);
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn context_limit_bounds_the_prompt_suffix() {
        let probe = Arc::new(ContextProbe { seen: std::sync::Mutex::new(Vec::new()) });
        let relay = RelayService::with_client(
            Arc::clone(&probe) as Arc<dyn ChatClient>,
            Duration::from_secs(5),
            2
        );

        relay.handle_turn("one").await.unwrap();
        relay.handle_turn("two").await.unwrap();
        relay.handle_turn("three").await.unwrap();

        // First call sees the lone user turn; later calls are capped at 2.
        assert_eq!(*probe.seen.lock().unwrap(), vec![1, 2, 2]);
    }
}
