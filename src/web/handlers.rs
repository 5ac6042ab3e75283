use super::filters::{AvgFilter, Params, VisitFilter, round5};
use super::{AppState, WebError, WebResult};
use crate::consistency::WriteTarget;
use crate::core::{DbError, Record};
use crate::model::{self, EntityKind, LOCATIONS, MARK, PLACE, USERS, VISITED_AT, VISITS};
use crate::storage::{AggregateKind, Cond, Query};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query as QueryParams, State};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

fn parse_id(raw: &str) -> Result<i64, WebError> {
    raw.parse::<i64>()
        .map_err(|_| WebError::Database(DbError::not_found(format!("no entity '{}'", raw))))
}

async fn fetch(state: &AppState, collection: &str, id: i64) -> WebResult<Arc<Record>> {
    let results = state
        .store()
        .select(&Query::new(collection).filter(model::ID, Cond::Eq, id))
        .await?;
    results
        .single()
        .map(|item| Arc::clone(&item.record))
        .ok_or_else(|| DbError::not_found(format!("{} {}", collection, id)).into())
}

async fn get_entity(state: &AppState, kind: EntityKind, raw: &str) -> WebResult<Json<JsonValue>> {
    let record = fetch(state, kind.collection(), parse_id(raw)?).await?;
    Ok(Json(JsonValue::Object(record.to_json(kind.public_fields())?)))
}

async fn write_entity(
    state: &AppState,
    kind: EntityKind,
    raw: &str,
    body: &[u8],
) -> WebResult<Json<JsonValue>> {
    let target = WriteTarget::parse(raw)?;
    let body: JsonValue = serde_json::from_slice(body)
        .map_err(|err| WebError::Input(format!("can't parse json: {}", err)))?;
    state.coordinator.create_or_update(kind, target, &body).await?;
    Ok(Json(json!({})))
}

pub async fn get_user(State(state): State<AppState>, Path(raw): Path<String>) -> WebResult<Json<JsonValue>> {
    get_entity(&state, EntityKind::User, &raw).await
}

pub async fn get_location(State(state): State<AppState>, Path(raw): Path<String>) -> WebResult<Json<JsonValue>> {
    get_entity(&state, EntityKind::Location, &raw).await
}

pub async fn get_visit(State(state): State<AppState>, Path(raw): Path<String>) -> WebResult<Json<JsonValue>> {
    get_entity(&state, EntityKind::Visit, &raw).await
}

pub async fn post_user(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> WebResult<Json<JsonValue>> {
    write_entity(&state, EntityKind::User, &raw, &body).await
}

pub async fn post_location(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> WebResult<Json<JsonValue>> {
    write_entity(&state, EntityKind::Location, &raw, &body).await
}

pub async fn post_visit(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> WebResult<Json<JsonValue>> {
    write_entity(&state, EntityKind::Visit, &raw, &body).await
}

/// `GET /users/{id}/visits`
pub async fn user_visits(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    QueryParams(params): QueryParams<Params>,
) -> WebResult<Json<JsonValue>> {
    let user_id = parse_id(&raw)?;
    fetch(&state, USERS, user_id).await?;
    let filter = VisitFilter::from_params(&params)?;

    let query = filter
        .apply(Query::new(VISITS).filter(model::USER, Cond::Eq, user_id))
        .sort(VISITED_AT, false);
    let results = state.store().select(&query).await?;

    let visits = results
        .records()
        .map(|visit| -> Result<JsonValue, DbError> {
            Ok(json!({
                "mark": visit.get_i64(MARK)?,
                "visited_at": visit.get_i64(VISITED_AT)?,
                "place": visit.get_str(PLACE)?,
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "visits": visits })))
}

/// `GET /locations/{id}/avg`
pub async fn location_avg(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    QueryParams(params): QueryParams<Params>,
) -> WebResult<Json<JsonValue>> {
    let location_id = parse_id(&raw)?;
    fetch(&state, LOCATIONS, location_id).await?;
    let filter = AvgFilter::from_params(&params)?;

    let query = filter
        .apply(Query::new(VISITS).filter(model::LOCATION, Cond::Eq, location_id), state.now)?
        .aggregate(AggregateKind::Avg, MARK);
    let results = state.store().select(&query).await?;

    let avg = round5(results.aggregation(0).unwrap_or(0.0));
    Ok(Json(json!({ "avg": avg_number(avg) })))
}

/// Whole averages are written without a fractional part.
fn avg_number(avg: f64) -> JsonValue {
    if avg.fract() == 0.0 {
        json!(avg as i64)
    } else {
        json!(avg)
    }
}
