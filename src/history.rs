use crate::db::Db;
use crate::errors::LuminaResult;
use crate::models::{ImageHistoryItem, Message};
use sqlx::{Pool, Row, Sqlite};

const LAST_USER_KEY: &str = "last-user";

/// Durable per-user state: conversation history, generated-image history and
/// the last-used identity. Every write replaces the whole stored value, so a
/// reader always sees a consistent snapshot.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    pool: Pool<Sqlite>,
}

impl HistoryStore {
    pub fn new(db: &Db) -> Self {
        HistoryStore {
            pool: db.pool.clone(),
        }
    }

    /// Loads the stored conversation for `username`. A corrupt payload is
    /// treated the same as no history at all.
    pub async fn load_conversation(&self, username: &str) -> LuminaResult<Option<Vec<Message>>> {
        let row = sqlx::query("select payload from conversations where username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload")?;

        match serde_json::from_str(&payload) {
            Ok(messages) => Ok(Some(messages)),
            Err(e) => {
                log::warn!("Corrupt conversation payload for '{}': {}", username, e);
                Ok(None)
            }
        }
    }

    /// Overwrites the stored conversation for `username`. Serialization drops
    /// transient attachment references, so only metadata reaches disk.
    pub async fn save_conversation(
        &self,
        username: &str,
        messages: &[Message],
    ) -> LuminaResult<()> {
        let payload = serde_json::to_string(messages)?;

        sqlx::query(
            "insert or replace into conversations (username, payload, updated_at) \
             values (?1, ?2, datetime('now'))",
        )
        .bind(username)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_image_history(&self, username: &str) -> LuminaResult<Vec<ImageHistoryItem>> {
        let row = sqlx::query("select payload from image_history where username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };
        let payload: String = row.try_get("payload")?;

        match serde_json::from_str(&payload) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::warn!("Corrupt image history payload for '{}': {}", username, e);
                Ok(Vec::new())
            }
        }
    }

    pub async fn save_image_history(
        &self,
        username: &str,
        items: &[ImageHistoryItem],
    ) -> LuminaResult<()> {
        let payload = serde_json::to_string(items)?;

        sqlx::query(
            "insert or replace into image_history (username, payload, updated_at) \
             values (?1, ?2, datetime('now'))",
        )
        .bind(username)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn clear_image_history(&self, username: &str) -> LuminaResult<()> {
        sqlx::query("delete from image_history where username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn load_last_user(&self) -> LuminaResult<Option<String>> {
        let row = sqlx::query("select value from app_state where key = ?1")
            .bind(LAST_USER_KEY)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    pub async fn save_last_user(&self, username: &str) -> LuminaResult<()> {
        sqlx::query("insert or replace into app_state (key, value) values (?1, ?2)")
            .bind(LAST_USER_KEY)
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn clear_last_user(&self) -> LuminaResult<()> {
        sqlx::query("delete from app_state where key = ?1")
            .bind(LAST_USER_KEY)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{push_capped, AspectRatio, FileMeta, Message};
    use std::path::PathBuf;
    use tempfile::tempdir;

    async fn open_store(dir: &tempfile::TempDir) -> HistoryStore {
        let db_path = dir.path().join("test.sqlite");
        let db = Db::init(db_path.to_str().unwrap()).await.unwrap();
        HistoryStore::new(&db)
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut user = Message::user("Sara", "hello");
        user.file = Some(FileMeta {
            name: "cat.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            preview_path: Some(PathBuf::from("/tmp/cat.jpg")),
        });
        let assistant = Message::assistant_error("hi back");
        let messages = vec![user.clone(), assistant.clone()];

        store.save_conversation("Sara", &messages).await.unwrap();
        let restored = store.load_conversation("Sara").await.unwrap().unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].id, user.id);
        assert_eq!(restored[0].sender, "Sara");
        assert_eq!(restored[0].text, "hello");
        assert_eq!(restored[0].timestamp, user.timestamp);
        assert_eq!(restored[1].id, assistant.id);

        let file = restored[0].file.as_ref().unwrap();
        assert_eq!(file.name, "cat.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert!(file.preview_path.is_none());
    }

    #[tokio::test]
    async fn test_missing_user_has_no_history() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(store.load_conversation("nobody").await.unwrap().is_none());
        assert!(store.load_image_history("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_payload_reads_as_absent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        sqlx::query(
            "insert into conversations (username, payload, updated_at) \
             values ('Sara', 'not json at all', datetime('now'))",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        assert!(store.load_conversation("Sara").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_whole_value() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .save_conversation("Sara", &[Message::user("Sara", "first")])
            .await
            .unwrap();
        let two = vec![Message::user("Sara", "first"), Message::user("Sara", "second")];
        store.save_conversation("Sara", &two).await.unwrap();

        let restored = store.load_conversation("Sara").await.unwrap().unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[1].text, "second");
    }

    #[tokio::test]
    async fn test_image_history_roundtrip_and_clear() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut items = Vec::new();
        for i in 0..3 {
            push_capped(
                &mut items,
                crate::models::ImageHistoryItem::new(
                    &format!("prompt {i}"),
                    "data:image/jpeg;base64,AAAA".to_string(),
                    AspectRatio::Widescreen,
                ),
                50,
            );
        }

        store.save_image_history("Sara", &items).await.unwrap();
        let restored = store.load_image_history("Sara").await.unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored[0].prompt, "prompt 2");
        assert_eq!(restored[0].aspect_ratio, AspectRatio::Widescreen);

        store.clear_image_history("Sara").await.unwrap();
        assert!(store.load_image_history("Sara").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_user_lifecycle() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(store.load_last_user().await.unwrap().is_none());
        store.save_last_user("Sara").await.unwrap();
        assert_eq!(store.load_last_user().await.unwrap().unwrap(), "Sara");
        store.clear_last_user().await.unwrap();
        assert!(store.load_last_user().await.unwrap().is_none());
    }
}
