//! 档案处理器

use axum::extract::State;

use super::{Auth, HandlerResult};
use crate::user_manager::server::UserManagerState;
use crate::user_manager::services::ProfilesService;
use crate::user_manager::services::users::{
    CreateProfileRequest, ProfileResponse, UpdateProfileRequest,
};
use crate::web::{Authenticated, PositiveId, StrictJson, created, success};

pub async fn create_profile(
    State(state): State<UserManagerState>,
    auth: Auth,
    StrictJson(request): StrictJson<CreateProfileRequest>,
) -> HandlerResult<ProfileResponse> {
    let principal = auth?.0;
    Ok(created(
        ProfilesService::new(&state).create(&principal, request).await?,
    ))
}

pub async fn get_profile(
    State(state): State<UserManagerState>,
    PositiveId(user_id): PositiveId,
    Authenticated(principal): Authenticated,
) -> HandlerResult<ProfileResponse> {
    Ok(success(
        ProfilesService::new(&state).get(&principal, user_id).await?,
    ))
}

pub async fn update_profile(
    State(state): State<UserManagerState>,
    PositiveId(user_id): PositiveId,
    auth: Auth,
    StrictJson(request): StrictJson<UpdateProfileRequest>,
) -> HandlerResult<ProfileResponse> {
    let principal = auth?.0;
    Ok(success(
        ProfilesService::new(&state)
            .update(&principal, user_id, request)
            .await?,
    ))
}

pub async fn delete_profile(
    State(state): State<UserManagerState>,
    PositiveId(user_id): PositiveId,
    Authenticated(principal): Authenticated,
) -> HandlerResult<ProfileResponse> {
    Ok(success(
        ProfilesService::new(&state).delete(&principal, user_id).await?,
    ))
}
