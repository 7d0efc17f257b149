use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::Claims,
    error::{ApiError, ApiResult},
    models::{ActorJson, CreateActor, CreateMovie, MovieJson, UpdateActor, UpdateMovie},
};

const VIEW_MOVIES: &str = "view:movies";
const POST_MOVIES: &str = "post:movies";
const UPDATE_MOVIES: &str = "update:movies";
const DELETE_MOVIES: &str = "delete:movies";
const VIEW_ACTORS: &str = "view:actors";
const POST_ACTORS: &str = "post:actors";
const UPDATE_ACTORS: &str = "update:actors";
const DELETE_ACTORS: &str = "delete:actors";

fn body_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => ApiError::Unprocessable(err.body_text()),
        other => ApiError::BadRequest(other.body_text()),
    }
}

fn missing_fields(fields: Vec<&'static str>) -> ApiError {
    ApiError::BadRequest(format!("Missing required fields: {}.", fields.join(", ")))
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    claims.require(VIEW_MOVIES)?;

    let movies: Vec<MovieJson> = state
        .store
        .movies()
        .await?
        .into_iter()
        .map(|(movie, actors)| MovieJson::new(movie, actors))
        .collect();

    Ok(Json(json!({ "success": true, "movies": movies })))
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateMovie>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    claims.require(POST_MOVIES)?;

    let Json(body) = body.map_err(body_error)?;
    let new = body.validate().map_err(missing_fields)?;
    let movie = state.store.create_movie(new).await?;

    Ok(Json(json!({ "success": true, "created": MovieJson::new(movie, Vec::new()) })))
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    body: Result<Json<UpdateMovie>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    claims.require(UPDATE_MOVIES)?;

    let Json(fields) = body.map_err(body_error)?;
    let (movie, actors) = state.store.update_movie(id, fields).await?;

    Ok(Json(json!({ "success": true, "updated": MovieJson::new(movie, actors) })))
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require(DELETE_MOVIES)?;

    let deleted = state.store.delete_movie(id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

pub async fn list_actors(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    claims.require(VIEW_ACTORS)?;

    let actors: Vec<ActorJson> =
        state.store.actors().await?.into_iter().map(ActorJson::from).collect();

    Ok(Json(json!({ "success": true, "actors": actors })))
}

pub async fn create_actor(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateActor>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    claims.require(POST_ACTORS)?;

    let Json(body) = body.map_err(body_error)?;
    let new = body.validate().map_err(missing_fields)?;
    let actor = state.store.create_actor(new).await?;

    Ok(Json(json!({ "success": true, "created": ActorJson::from(actor) })))
}

pub async fn update_actor(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    body: Result<Json<UpdateActor>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    claims.require(UPDATE_ACTORS)?;

    let Json(fields) = body.map_err(body_error)?;
    let actor = state.store.update_actor(id, fields).await?;

    Ok(Json(json!({ "success": true, "updated": ActorJson::from(actor) })))
}

pub async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    claims.require(DELETE_ACTORS)?;

    let deleted = state.store.delete_actor(id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
