use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    Json,
};
use common_auth::RequirePermission;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::drink::{Drink, DrinkPayload, DrinkValidationError, ShortDrink};
use crate::permissions::{DeleteDrinks, GetDrinksDetail, PatchDrinks, PostDrinks};
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: Vec<T>,
}

impl<T> DrinksResponse<T> {
    fn ok(drinks: Vec<T>) -> Json<Self> {
        Json(Self { success: true, drinks })
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i64,
}

fn store_failure(err: StoreError) -> ApiError {
    warn!(error = %err, "menu store operation failed");
    match err {
        StoreError::Conflict(_) => ApiError::unprocessable("duplicate_title").with_detail(err),
        _ => ApiError::unprocessable("store_failure"),
    }
}

fn invalid_drink(err: DrinkValidationError) -> ApiError {
    ApiError::unprocessable("invalid_drink").with_detail(err)
}

// Well-formed JSON with the wrong shape is unprocessable; anything else about
// the body is a bad request.
fn body_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            ApiError::unprocessable("invalid_drink").with_detail(err.body_text())
        }
        other => ApiError::bad_request("invalid_body").with_detail(other.body_text()),
    }
}

// Non-numeric ids can never name a drink.
fn drink_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::not_found("drink_not_found"))
}

/// Load all drinks, treating an empty menu as not found.
async fn menu(state: &AppState) -> ApiResult<Vec<Drink>> {
    let drinks = state.store.list().await.map_err(store_failure)?;
    if drinks.is_empty() {
        return Err(ApiError::not_found("menu_empty"));
    }
    Ok(drinks)
}

pub async fn list_drinks(State(state): State<AppState>) -> ApiResult<Json<DrinksResponse<ShortDrink>>> {
    let drinks = menu(&state).await?;
    Ok(DrinksResponse::ok(drinks.iter().map(Drink::short).collect()))
}

pub async fn list_drink_details(
    State(state): State<AppState>,
    _caller: RequirePermission<GetDrinksDetail>,
) -> ApiResult<Json<DrinksResponse<Drink>>> {
    let drinks = menu(&state).await?;
    Ok(DrinksResponse::ok(drinks))
}

pub async fn create_drink(
    State(state): State<AppState>,
    caller: RequirePermission<PostDrinks>,
    body: Result<Json<Option<Map<String, Value>>>, JsonRejection>,
) -> ApiResult<Json<DrinksResponse<Drink>>> {
    // Only `{}` and `null` count as empty; any other object is judged as a drink.
    let fields = match body.map_err(body_rejection)? {
        Json(Some(fields)) if !fields.is_empty() => fields,
        Json(_) => return Err(ApiError::bad_request("empty_body")),
    };
    let payload: DrinkPayload = serde_json::from_value(Value::Object(fields))
        .map_err(|err| ApiError::unprocessable("invalid_drink").with_detail(err))?;
    let new_drink = payload.into_new_drink().map_err(invalid_drink)?;

    let drink = state.store.create(new_drink).await.map_err(store_failure)?;
    info!(drink_id = drink.id, title = %drink.title, subject = caller.subject(), "drink created");
    Ok(DrinksResponse::ok(vec![drink]))
}

pub async fn update_drink(
    State(state): State<AppState>,
    caller: RequirePermission<PatchDrinks>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Option<DrinkPayload>>, JsonRejection>,
) -> ApiResult<Json<DrinksResponse<Drink>>> {
    let id = drink_id(path)?;
    if state.store.get(id).await.map_err(store_failure)?.is_none() {
        return Err(ApiError::not_found("drink_not_found"));
    }

    let payload = match payload.map_err(body_rejection)? {
        Json(Some(payload)) => payload,
        Json(None) => return Err(ApiError::bad_request("empty_body")),
    };
    let changes = payload.into_changes().map_err(invalid_drink)?;

    let drink = state
        .store
        .update(id, changes)
        .await
        .map_err(store_failure)?
        .ok_or_else(|| ApiError::not_found("drink_not_found"))?;
    info!(drink_id = drink.id, subject = caller.subject(), "drink updated");
    Ok(DrinksResponse::ok(vec![drink]))
}

pub async fn delete_drink(
    State(state): State<AppState>,
    caller: RequirePermission<DeleteDrinks>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = drink_id(path)?;
    if state.store.get(id).await.map_err(store_failure)?.is_none() {
        return Err(ApiError::not_found("drink_not_found"));
    }
    if !state.store.delete(id).await.map_err(store_failure)? {
        return Err(ApiError::not_found("drink_not_found"));
    }
    info!(drink_id = id, subject = caller.subject(), "drink deleted");
    Ok(Json(DeleteResponse { success: true, delete: id }))
}
