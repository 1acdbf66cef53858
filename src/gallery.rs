// src/gallery.rs

use crate::constants::IMAGE_HISTORY_LIMIT;
use crate::errors::{ErrorCategory, LuminaError};
use crate::history::HistoryStore;
use crate::image::ImageClient;
use crate::models::{push_capped, AspectRatio, ImageHistoryItem};

/// Per-user image panel state: the capped newest-first history and the
/// inline error from the most recent attempt. Failures are never retried
/// automatically.
pub struct ImageGallery {
    username: String,
    client: ImageClient,
    store: HistoryStore,
    items: Vec<ImageHistoryItem>,
    last_error: Option<String>,
}

impl ImageGallery {
    pub async fn load(username: &str, client: ImageClient, store: HistoryStore) -> Self {
        let items = match store.load_image_history(username).await {
            Ok(items) => items,
            Err(e) => {
                log::error!("Failed to load image history for '{}': {}", username, e);
                Vec::new()
            }
        };

        ImageGallery {
            username: username.to_string(),
            client,
            store,
            items,
            last_error: None,
        }
    }

    pub fn items(&self) -> &[ImageHistoryItem] {
        &self.items
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Generates an image and records it in the history. On failure the
    /// history is untouched and `last_error` carries the panel text.
    pub async fn generate(
        &mut self,
        prompt: &str,
        ratio: AspectRatio,
    ) -> Option<&ImageHistoryItem> {
        if prompt.trim().is_empty() {
            return None;
        }
        self.last_error = None;

        match self.client.generate(prompt, ratio).await {
            Ok(data_url) => {
                let item = ImageHistoryItem::new(prompt, data_url, ratio);
                push_capped(&mut self.items, item, IMAGE_HISTORY_LIMIT);

                if let Err(e) = self
                    .store
                    .save_image_history(&self.username, &self.items)
                    .await
                {
                    log::error!("Failed to save image history for '{}': {}", self.username, e);
                }

                self.items.first()
            }
            Err(err) => {
                log::error!("Image generation failed: {}", err);
                self.last_error = Some(match &err {
                    LuminaError::Generation(msg) => msg.clone(),
                    other => ErrorCategory::classify(other).user_message().to_string(),
                });
                None
            }
        }
    }

    /// Recalls a previously generated image.
    pub fn select(&self, id: &str) -> Option<&ImageHistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub async fn clear(&mut self) {
        self.items.clear();
        if let Err(e) = self.store.clear_image_history(&self.username).await {
            log::error!(
                "Failed to clear image history for '{}': {}",
                self.username,
                e
            );
        }
    }
}
