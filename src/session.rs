use crate::api::{ChatClient, ChatSession, InlineData};
use crate::errors::{ErrorCategory, LuminaResult};
use crate::history::HistoryStore;
use crate::models::{FileMeta, Message, OutgoingAttachment, Source};
use futures::StreamExt;
use std::collections::HashSet;

/// Owns one conversation: the in-memory message list, the remote session it
/// streams from, and the persisted copy. Single writer; at most one turn is
/// in flight, enforced by the busy flag.
pub struct ChatManager {
    username: String,
    messages: Vec<Message>,
    session: ChatSession,
    store: HistoryStore,
    busy: bool,
}

impl ChatManager {
    /// Loads the stored conversation for `username`, or synthesizes and
    /// persists a welcome message when there is none. Store failures degrade
    /// to the welcome state and are only logged.
    pub async fn initialize(username: &str, client: &ChatClient, store: HistoryStore) -> Self {
        let session = client.create_session();

        let loaded = match store.load_conversation(username).await {
            Ok(history) => history,
            Err(e) => {
                log::error!("Failed to load chat history for '{}': {}", username, e);
                None
            }
        };

        let messages = match loaded {
            Some(history) if !history.is_empty() => history,
            _ => {
                let welcome = vec![Message::welcome(username)];
                if let Err(e) = store.save_conversation(username, &welcome).await {
                    log::error!("Failed to save welcome state for '{}': {}", username, e);
                }
                welcome
            }
        };

        ChatManager {
            username: username.to_string(),
            messages,
            session,
            store,
            busy: false,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Runs one turn: appends the user message and a streaming placeholder,
    /// accumulates chunks into the placeholder (calling `on_update` per
    /// chunk), then persists. Transport failures are classified into a
    /// visible assistant message and never propagate.
    pub async fn send_message<F>(
        &mut self,
        text: &str,
        attachment: Option<OutgoingAttachment>,
        mut on_update: F,
    ) where
        F: FnMut(&[Message]),
    {
        if (text.trim().is_empty() && attachment.is_none()) || self.busy {
            return;
        }
        self.busy = true;

        let mut user_message = Message::user(&self.username, text);
        let inline = attachment.map(|att| {
            user_message.file = Some(FileMeta {
                name: att.name.clone(),
                mime_type: att.mime_type.clone(),
                preview_path: att.preview_path.clone(),
            });
            InlineData::from_bytes(&att.mime_type, &att.bytes)
        });
        self.messages.push(user_message);

        let placeholder = Message::assistant_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.messages.push(placeholder);
        on_update(&self.messages);

        match self
            .run_turn(text, inline, &placeholder_id, &mut on_update)
            .await
        {
            Ok(reply_text) => self.session.commit_reply(&reply_text),
            Err(err) => {
                let category = ErrorCategory::classify(&err);
                log::error!("Chat turn failed ({:?}): {}", category, err);
                self.messages.retain(|m| m.id != placeholder_id);
                self.messages
                    .push(Message::assistant_error(category.user_message()));
            }
        }

        self.persist().await;
        self.busy = false;
        on_update(&self.messages);
    }

    async fn run_turn<F>(
        &mut self,
        text: &str,
        inline: Option<InlineData>,
        placeholder_id: &str,
        on_update: &mut F,
    ) -> LuminaResult<String>
    where
        F: FnMut(&[Message]),
    {
        let mut stream = self.session.stream_turn(text, inline).await?;

        // Dedup by URI while keeping first-seen order.
        let mut seen = HashSet::new();
        let mut sources: Vec<Source> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if let Some(msg) = self.messages.iter_mut().find(|m| m.id == placeholder_id) {
                msg.text.push_str(&chunk.text);
            }
            for source in chunk.sources {
                if seen.insert(source.uri.clone()) {
                    sources.push(source);
                }
            }
            on_update(&self.messages);
        }

        let mut reply_text = String::new();
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == placeholder_id) {
            msg.streaming = false;
            if !sources.is_empty() {
                msg.sources = Some(sources);
            }
            reply_text = msg.text.clone();
        }

        Ok(reply_text)
    }

    async fn persist(&self) {
        if let Err(e) = self
            .store
            .save_conversation(&self.username, &self.messages)
            .await
        {
            log::error!("Failed to save chat history for '{}': {}", self.username, e);
        }
    }
}
