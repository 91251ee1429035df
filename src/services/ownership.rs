use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::models::GalleryItem;
use crate::database::{Store, StoreError};
use crate::storage::{FileError, FileStore};
use crate::types::Identity;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("{0}")]
    BadRequest(String),

    #[error("item not found")]
    NotFound,

    #[error("item belongs to another user")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    File(#[from] FileError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryMutation {
    Delete,
    SetFavorite(bool),
}

impl GalleryMutation {
    /// Parses a `{"isFavorite": <bool>}` body. Only a JSON boolean is
    /// accepted; `"true"`, `1` and `null` are all rejected.
    pub fn favorite_from_body(body: &[u8]) -> Result<Self, MutationError> {
        let invalid = || MutationError::BadRequest("Invalid favorite status".to_string());
        let value: Value = serde_json::from_slice(body).map_err(|_| invalid())?;
        match value.get("isFavorite") {
            Some(Value::Bool(flag)) => Ok(GalleryMutation::SetFavorite(*flag)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Deleted,
    Updated(GalleryItem),
}

/// Applies mutations to gallery items on behalf of their owner.
///
/// The sequence is fetch, compare owner, then apply. It is not atomic: a
/// concurrent delete between the fetch and the write surfaces as `NotFound`.
#[derive(Clone)]
pub struct MutationService {
    store: Arc<dyn Store>,
    files: FileStore,
}

impl MutationService {
    pub fn new(store: Arc<dyn Store>, files: FileStore) -> Self {
        Self { store, files }
    }

    pub async fn mutate(
        &self,
        identity: &Identity,
        item_id: &str,
        mutation: GalleryMutation,
    ) -> Result<MutationOutcome, MutationError> {
        let item = self
            .store
            .find_gallery_item(item_id)
            .await?
            .ok_or(MutationError::NotFound)?;

        if !identity.owns(&item.user_id) {
            warn!(item_id, caller = %identity, "rejected mutation of foreign gallery item");
            return Err(MutationError::Forbidden);
        }

        match mutation {
            GalleryMutation::Delete => {
                self.files.remove(&item.file_url).await?;
                if !self.store.delete_gallery_item(&item.id).await? {
                    return Err(MutationError::NotFound);
                }
                info!(item_id, owner = %identity, "deleted gallery item");
                Ok(MutationOutcome::Deleted)
            }
            GalleryMutation::SetFavorite(flag) => {
                let updated = self
                    .store
                    .set_gallery_favorite(&item.id, flag)
                    .await?
                    .ok_or(MutationError::NotFound)?;
                Ok(MutationOutcome::Updated(updated))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{MediaType, NewGalleryItem};
    use crate::database::MemoryStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        files: FileStore,
        store: Arc<dyn Store>,
        service: MutationService,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::new(dir.path(), 1024);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = MutationService::new(store.clone(), files.clone());
        Fixture {
            _dir: dir,
            files,
            store,
            service,
        }
    }

    async fn upload(fx: &Fixture, owner: &str) -> GalleryItem {
        let file_url = fx.files.save_upload("image/png", b"data").await.unwrap();
        fx.store
            .insert_gallery_item(NewGalleryItem {
                user_id: owner.into(),
                title: "sunset".into(),
                description: String::new(),
                file_url,
                media_type: MediaType::Image,
            })
            .await
            .unwrap()
    }

    #[test]
    fn favorite_body_must_be_a_boolean() {
        assert_eq!(
            GalleryMutation::favorite_from_body(br#"{"isFavorite": true}"#).unwrap(),
            GalleryMutation::SetFavorite(true)
        );
        for body in [
            &br#"{"isFavorite": "true"}"#[..],
            br#"{"isFavorite": 1}"#,
            br#"{"isFavorite": null}"#,
            br#"{}"#,
            b"not json",
        ] {
            assert!(matches!(
                GalleryMutation::favorite_from_body(body),
                Err(MutationError::BadRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn owner_deletes_record_and_file() {
        let fx = fixture();
        let item = upload(&fx, "u1").await;
        let path = fx.files.resolve(&item.file_url).unwrap();

        let outcome = fx
            .service
            .mutate(&Identity::new("u1"), &item.id, GalleryMutation::Delete)
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::Deleted);
        assert!(!path.exists());
        assert!(fx.store.find_gallery_item(&item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_file() {
        let fx = fixture();
        let item = upload(&fx, "u1").await;
        std::fs::remove_file(fx.files.resolve(&item.file_url).unwrap()).unwrap();

        let outcome = fx
            .service
            .mutate(&Identity::new("u1"), &item.id, GalleryMutation::Delete)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Deleted);
    }

    #[tokio::test]
    async fn foreign_item_is_forbidden_and_untouched() {
        let fx = fixture();
        let item = upload(&fx, "u1").await;
        let path = fx.files.resolve(&item.file_url).unwrap();

        let err = fx
            .service
            .mutate(&Identity::new("u2"), &item.id, GalleryMutation::Delete)
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Forbidden));
        assert!(path.exists());
        assert_eq!(fx.store.find_gallery_item(&item.id).await.unwrap(), Some(item.clone()));

        let err = fx
            .service
            .mutate(&Identity::new("u2"), &item.id, GalleryMutation::SetFavorite(true))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Forbidden));
        assert!(!fx.store.find_gallery_item(&item.id).await.unwrap().unwrap().is_favorite);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .mutate(&Identity::new("u1"), "missing", GalleryMutation::SetFavorite(true))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::NotFound));
    }

    #[tokio::test]
    async fn owner_sets_favorite() {
        let fx = fixture();
        let item = upload(&fx, "u1").await;
        let outcome = fx
            .service
            .mutate(&Identity::new("u1"), &item.id, GalleryMutation::SetFavorite(true))
            .await
            .unwrap();
        match outcome {
            MutationOutcome::Updated(updated) => {
                assert!(updated.is_favorite);
                assert_eq!(updated.id, item.id);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
