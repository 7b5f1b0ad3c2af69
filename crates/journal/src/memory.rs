use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::JournalError;
use crate::message::JournalMessage;
use crate::traits::Journal;

/// A journal held in memory, for ephemeral runs and tests.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    messages: Mutex<Vec<JournalMessage>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<JournalMessage>) -> Self {
        MemoryJournal {
            messages: Mutex::new(messages),
        }
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, message: &JournalMessage) -> Result<(), JournalError> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }

    async fn replay(&self) -> Result<Vec<JournalMessage>, JournalError> {
        Ok(self.messages.lock().await.clone())
    }
}
