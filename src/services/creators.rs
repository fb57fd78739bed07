use crate::db::{is_foreign_key_violation, is_unique_violation, CreatorStore, PointStore};
use crate::error::{AppError, Result};
use crate::models::{Creator, CreatorQuery, CreatorUpdate};
use crate::services::authorization::ensure_can_mutate;

pub async fn list(creators: &dyn CreatorStore, query: &CreatorQuery) -> Result<Vec<Creator>> {
    Ok(creators.list_creators(query).await?)
}

pub async fn get(creators: &dyn CreatorStore, id: i64) -> Result<Creator> {
    creators
        .find_creator(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Creator not found".to_string()))
}

/// Applies a profile change made by the creator itself
pub async fn update(
    creators: &dyn CreatorStore,
    id: i64,
    changes: CreatorUpdate,
    requester: &Creator,
) -> Result<Creator> {
    let mut creator = get(creators, id).await?;
    ensure_can_mutate(requester, &creator, "creator")?;

    if let Some(name) = changes.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        creator.name = name.to_string();
    }

    if let Some(email) = changes.email {
        let email = email.trim();
        if !looks_like_email(email) {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }

        if let Some(owner) = creators.find_creator_by_email(email).await? {
            if owner.id != creator.id {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        creator.email = email.to_string();
    }

    let saved = creators
        .save_creator(&creator)
        .await
        .map_err(unique_violation_as_conflict)?;

    tracing::info!(creator_id = saved.id, "Creator profile updated");

    Ok(saved)
}

/// Deletes the requester's own account. Blocked while it owns points.
pub async fn delete(
    creators: &dyn CreatorStore,
    points: &dyn PointStore,
    id: i64,
    requester: &Creator,
) -> Result<()> {
    let creator = get(creators, id).await?;
    ensure_can_mutate(requester, &creator, "creator")?;

    let owned = points.count_points_by_creator(creator.id).await?;
    if owned > 0 {
        return Err(still_owns_points());
    }

    // A point published after the count still trips the foreign key
    creators.delete_creator(creator.id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            still_owns_points()
        } else {
            AppError::Database(e)
        }
    })?;

    tracing::info!(creator_id = creator.id, "Creator deleted");

    Ok(())
}

/// Administrative toggle of the verified flag
pub async fn set_verified(
    creators: &dyn CreatorStore,
    id: i64,
    verified: bool,
    admin: &Creator,
) -> Result<Creator> {
    let mut creator = get(creators, id).await?;
    creator.verified = verified;

    let saved = creators.save_creator(&creator).await?;

    tracing::info!(
        creator_id = saved.id,
        admin_id = admin.id,
        verified,
        "Creator verification changed"
    );

    Ok(saved)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn still_owns_points() -> AppError {
    AppError::Conflict("Cannot delete creator with existing donation points".to_string())
}

fn unique_violation_as_conflict(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Email already registered".to_string())
    } else {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::{DonationPoint, NewCreator, NewPoint};
    use crate::services::geo::Coordinates;
    use crate::services::search::PointFilter;
    use async_trait::async_trait;

    type StoreResult<T> = std::result::Result<T, sqlx::Error>;

    /// Reports no owned points, as if one were published right after the count
    struct StaleCount(MemoryStore);

    #[async_trait]
    impl PointStore for StaleCount {
        async fn insert_point(
            &self,
            creator_id: i64,
            data: NewPoint,
        ) -> StoreResult<DonationPoint> {
            self.0.insert_point(creator_id, data).await
        }

        async fn find_point(&self, id: i64) -> StoreResult<Option<DonationPoint>> {
            self.0.find_point(id).await
        }

        async fn list(&self, filter: &PointFilter) -> StoreResult<Vec<DonationPoint>> {
            self.0.list(filter).await
        }

        async fn save_point(&self, point: &DonationPoint) -> StoreResult<DonationPoint> {
            self.0.save_point(point).await
        }

        async fn append_images(
            &self,
            id: i64,
            images: &[String],
        ) -> StoreResult<Option<DonationPoint>> {
            self.0.append_images(id, images).await
        }

        async fn delete_point(&self, id: i64) -> StoreResult<bool> {
            self.0.delete_point(id).await
        }

        async fn count_points_by_creator(&self, _creator_id: i64) -> StoreResult<i64> {
            Ok(0)
        }
    }

    fn pantry() -> NewPoint {
        NewPoint {
            organization_name: "Pantry".to_string(),
            address: "1 Elm".to_string(),
            coordinates: Coordinates::new(1.0, 1.0).unwrap(),
            description: None,
            start_date: None,
            end_date: None,
        }
    }

    async fn add_creator(store: &MemoryStore, name: &str, email: &str) -> Creator {
        store
            .insert_creator(NewCreator {
                name: name.to_string(),
                email: email.to_string(),
                google_id: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("a@b.org"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.org"));
        assert!(!looks_like_email("a b@c.org"));
        assert!(!looks_like_email("a@b@c.org"));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(get(&store, 99).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_self() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;

        let updated = update(
            &store,
            me.id,
            CreatorUpdate {
                name: Some("  New Name ".to_string()),
                email: None,
            },
            &me,
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.email, "me@example.com");
    }

    #[tokio::test]
    async fn test_update_other_creator_is_forbidden() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;
        let other = add_creator(&store, "Other", "other@example.com").await;

        let result = update(&store, other.id, CreatorUpdate::default(), &me).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;
        add_creator(&store, "Other", "other@example.com").await;

        let result = update(
            &store,
            me.id,
            CreatorUpdate {
                name: None,
                email: Some("other@example.com".to_string()),
            },
            &me,
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(get(&store, me.id).await.unwrap().email, "me@example.com");
    }

    #[tokio::test]
    async fn test_same_email_for_self_succeeds() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;

        let updated = update(
            &store,
            me.id,
            CreatorUpdate {
                name: None,
                email: Some("me@example.com".to_string()),
            },
            &me,
        )
        .await
        .unwrap();

        assert_eq!(updated.email, "me@example.com");
    }

    #[tokio::test]
    async fn test_delete_blocked_while_owning_points() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;
        let point = store.insert_point(me.id, pantry()).await.unwrap();

        let blocked = delete(&store, &store, me.id, &me).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));

        store.delete_point(point.id).await.unwrap();

        delete(&store, &store, me.id, &me).await.unwrap();
        assert!(matches!(get(&store, me.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_point_published_after_count_still_blocks_delete() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;
        store.insert_point(me.id, pantry()).await.unwrap();

        let result = delete(&store, &StaleCount(store.clone()), me.id, &me).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(get(&store, me.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_other_is_forbidden() {
        let store = MemoryStore::new();
        let me = add_creator(&store, "Me", "me@example.com").await;
        let other = add_creator(&store, "Other", "other@example.com").await;

        let result = delete(&store, &store, other.id, &me).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_set_verified() {
        let store = MemoryStore::new();
        let admin = add_creator(&store, "Admin", "admin@example.com").await;
        let target = add_creator(&store, "Target", "t@example.com").await;

        let verified = set_verified(&store, target.id, true, &admin).await.unwrap();
        assert!(verified.verified);

        let unverified = set_verified(&store, target.id, false, &admin).await.unwrap();
        assert!(!unverified.verified);
    }
}
