use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use shared::auth::Claims;
use shared::storage::{guess_content_type, key_from_url, public_file_url, ObjectStore};
use shared::types::UserPublic;
use shared::upload::{image_extension, multipart_error, read_field_limited};
use shared::{CommonError, CommonResult};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::parse_id;
use crate::models::{
    validation_error, AvatarResponse, ProfileResponse, PublicProfile, UpdateProfileRequest,
};
use crate::AppState;

/// Get current user's profile with upload, download and favorite counts
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> CommonResult<Json<ProfileResponse>> {
    let user_id = claims.user_id()?;

    let user = state.user_service.get_user(user_id).await?;
    let stats = state.user_service.profile_stats(user_id).await?;

    Ok(Json(ProfileResponse {
        user: user.into(),
        stats,
    }))
}

/// Update current user's profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> CommonResult<Json<Value>> {
    req.validate().map_err(validation_error)?;
    if req.is_empty() {
        return Err(CommonError::ValidationFailed("Nothing to update".to_string()));
    }

    let user_id = claims.user_id()?;
    if let Some(image) = req.image.as_deref() {
        check_image_owner(image, &state.config.uploads.public_base_url, user_id)?;
    }

    let user = state.user_service.update_profile(user_id, req).await?;

    Ok(Json(json!({ "success": true, "user": UserPublic::from(user) })))
}

/// Public profile of any user
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CommonResult<Json<PublicProfile>> {
    let user_id = parse_id(&id, "user")?;

    let user = state.user_service.get_user(user_id).await?;
    let stats = state.user_service.profile_stats(user_id).await?;

    Ok(Json(PublicProfile::new(user, stats.uploads)))
}

/// `POST /api/user/profile/avatar` - multipart `image` field
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> CommonResult<Json<AvatarResponse>> {
    let user_id = claims.user_id()?;
    let limits = &state.config.uploads;

    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(field.file_name().unwrap_or_default()).to_string());

        let extension = image_extension(&content_type).ok_or_else(|| {
            CommonError::ValidationFailed("Avatar must be a JPEG, PNG, WebP or GIF".to_string())
        })?;

        let data = read_field_limited(field, limits.max_image_size, "Image").await?;
        image = Some((data, content_type, extension));
    }

    let (data, content_type, extension) = match image {
        Some((data, _, _)) if data.is_empty() => {
            return Err(CommonError::ValidationFailed("No image provided".to_string()))
        }
        Some(image) => image,
        None => return Err(CommonError::ValidationFailed("No image provided".to_string())),
    };

    let key = format!("{}{}.{}", avatar_prefix(user_id), Uuid::new_v4(), extension);
    state.store.put_object(&key, data, &content_type).await?;

    let url = public_file_url(&limits.public_base_url, &key);

    let previous = match state.user_service.set_avatar(user_id, &url).await {
        Ok(previous) => previous,
        Err(e) => {
            if let Err(cleanup) = state.store.delete_object(&key).await {
                tracing::warn!("Failed to delete {}: {}", key, cleanup);
            }
            return Err(e);
        }
    };

    remove_replaced_avatar(
        state.store.as_ref(),
        &limits.public_base_url,
        user_id,
        previous,
    )
    .await;

    tracing::info!(%user_id, "Avatar updated: {}", key);

    Ok(Json(AvatarResponse {
        success: true,
        image: url,
    }))
}

/// Storage prefix holding one user's avatars
fn avatar_prefix(user_id: Uuid) -> String {
    format!("avatars/{}/", user_id)
}

/// Storage key behind `url` when it is one of `user_id`'s own avatars
fn own_avatar_key(url: &str, base_url: &str, user_id: Uuid) -> Option<String> {
    if !url.starts_with(&public_file_url(base_url, "")) {
        return None;
    }
    key_from_url(url).filter(|key| {
        key.starts_with(&avatar_prefix(user_id)) && !key.split('/').any(|segment| segment == "..")
    })
}

/// External images are fine. Images in our storage must be the caller's own avatars.
fn check_image_owner(image: &str, base_url: &str, user_id: Uuid) -> CommonResult<()> {
    let stored_here = image.starts_with(&public_file_url(base_url, ""));
    if stored_here && own_avatar_key(image, base_url, user_id).is_none() {
        return Err(CommonError::ValidationFailed(
            "Image must be one of your own avatars".to_string(),
        ));
    }
    Ok(())
}

/// Delete the avatar that was just replaced, if it belonged to this user
async fn remove_replaced_avatar(
    store: &dyn ObjectStore,
    base_url: &str,
    user_id: Uuid,
    previous: Option<String>,
) {
    let Some(old_key) = previous.and_then(|old| own_avatar_key(&old, base_url, user_id)) else {
        return;
    };

    if let Err(e) = store.delete_object(&old_key).await {
        tracing::warn!(%user_id, "Failed to delete old avatar {}: {}", old_key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use shared::storage::MemoryStore;

    const BASE_URL: &str = "http://localhost:3000";

    fn avatar_url(owner: Uuid, name: &str) -> (String, String) {
        let key = format!("{}{}", avatar_prefix(owner), name);
        (public_file_url(BASE_URL, &key), key)
    }

    #[test]
    fn test_own_avatar_key() {
        let me = Uuid::new_v4();
        let (url, key) = avatar_url(me, "a.png");

        assert_eq!(own_avatar_key(&url, BASE_URL, me), Some(key));
        assert_eq!(own_avatar_key(&url, BASE_URL, Uuid::new_v4()), None);
        assert_eq!(
            own_avatar_key(&url.replace(BASE_URL, "https://cdn.example.com"), BASE_URL, me),
            None
        );
    }

    #[test]
    fn test_foreign_avatar_is_not_ours_to_delete() {
        let me = Uuid::new_v4();
        let victim = Uuid::new_v4();
        let (victim_url, _) = avatar_url(victim, "b.png");
        let legacy = public_file_url(BASE_URL, "avatars/11111111-1111-1111-1111-111111111111.png");

        assert_eq!(own_avatar_key(&victim_url, BASE_URL, me), None);
        assert_eq!(own_avatar_key(&legacy, BASE_URL, me), None);
        let (climbing, _) = avatar_url(me, &format!("../{}/b.png", victim));
        assert_eq!(own_avatar_key(&climbing, BASE_URL, me), None);
        assert_eq!(own_avatar_key("https://avatars.githubusercontent.com/u/1", BASE_URL, me), None);
    }

    #[test]
    fn test_profile_image_ownership() {
        let me = Uuid::new_v4();
        let (mine, _) = avatar_url(me, "a.png");
        let (theirs, _) = avatar_url(Uuid::new_v4(), "b.png");
        let upload = public_file_url(BASE_URL, "files/module/x.zip");

        assert!(check_image_owner(&mine, BASE_URL, me).is_ok());
        assert!(check_image_owner("https://avatars.githubusercontent.com/u/1", BASE_URL, me).is_ok());

        let err = check_image_owner(&theirs, BASE_URL, me).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert!(check_image_owner(&upload, BASE_URL, me).is_err());
    }

    #[tokio::test]
    async fn test_replaced_avatar_is_deleted_only_for_its_owner() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let (my_url, my_key) = avatar_url(me, "old.png");
        let (victim_url, victim_key) = avatar_url(Uuid::new_v4(), "victim.png");

        for key in [&my_key, &victim_key] {
            store
                .put_object(key, Bytes::from_static(b"\x89PNG"), "image/png")
                .await
                .unwrap();
        }

        remove_replaced_avatar(&store, BASE_URL, me, Some(victim_url)).await;
        assert_eq!(store.keys().await.len(), 2);

        remove_replaced_avatar(&store, BASE_URL, me, Some(my_url)).await;
        assert_eq!(store.keys().await, vec![victim_key]);

        remove_replaced_avatar(&store, BASE_URL, me, None).await;
        assert_eq!(store.keys().await.len(), 1);
    }
}
