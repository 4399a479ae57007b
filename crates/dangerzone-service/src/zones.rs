//! Zone registry endpoints under `/api/zones`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{debug, info};

use dangerzone_lib::{Error as LibError, Zone};
use dangerzone_service_shared::{
    from_lib_error, record_zone_created, record_zone_deleted, record_zone_query, AppState,
    CheckPointRequest, CreateZoneRequest, NearbyQuery, ProblemDetails, RequestId,
    ServiceResponse, Validate, WithinQuery,
};

type HandlerResult<T> = Result<T, Box<ProblemDetails>>;

#[derive(Debug, Serialize)]
pub struct ZoneBody {
    pub zone: Zone,
}

#[derive(Debug, Serialize)]
pub struct ZoneList {
    pub count: usize,
    pub zones: Vec<Zone>,
}

impl From<Vec<Zone>> for ZoneList {
    fn from(zones: Vec<Zone>) -> Self {
        Self {
            count: zones.len(),
            zones,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub is_in_danger_zone: bool,
    pub dangerous_zones: Vec<Zone>,
    pub message: String,
}

impl CheckResult {
    pub fn from_hits(zones: Vec<Zone>) -> Self {
        let message = if zones.is_empty() {
            "Location is safe".to_string()
        } else {
            format!(
                "Warning: location is inside {} danger zone(s)",
                zones.len()
            )
        };
        Self {
            is_in_danger_zone: !zones.is_empty(),
            dangerous_zones: zones,
            message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub message: String,
    pub zone: Zone,
}

fn lib_problem(state: &AppState, error: &LibError, request_id: &RequestId) -> Box<ProblemDetails> {
    Box::new(from_lib_error(error, request_id.as_str(), state.environment()))
}

fn body_problem(rejection: JsonRejection, request_id: &RequestId) -> Box<ProblemDetails> {
    debug!(request_id = %request_id, error = %rejection, "rejected request body");
    Box::new(ProblemDetails::bad_request(
        rejection.body_text(),
        request_id.as_str(),
    ))
}

fn query_problem(rejection: QueryRejection, request_id: &RequestId) -> Box<ProblemDetails> {
    Box::new(ProblemDetails::bad_request(
        rejection.body_text(),
        request_id.as_str(),
    ))
}

/// `POST /api/zones`
pub async fn create_zone(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Result<Json<CreateZoneRequest>, JsonRejection>,
) -> HandlerResult<(StatusCode, ServiceResponse<ZoneBody>)> {
    let Json(request) = body.map_err(|e| body_problem(e, &request_id))?;
    let new_zone = request.validate(request_id.as_str())?;

    let zone = state
        .store()
        .create(new_zone)
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    record_zone_created();
    info!(request_id = %request_id, zone_id = %zone.id, "zone created via api");
    Ok((StatusCode::CREATED, ServiceResponse::new(ZoneBody { zone })))
}

/// `GET /api/zones`
pub async fn list_zones(
    State(state): State<AppState>,
    request_id: RequestId,
) -> HandlerResult<ServiceResponse<ZoneList>> {
    let zones = state
        .store()
        .list()
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    record_zone_query("list", zones.len());
    Ok(ServiceResponse::new(zones.into()))
}

/// `GET /api/zones/nearby?lat&lng&maxDistance`
pub async fn nearby_zones(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> HandlerResult<ServiceResponse<ZoneList>> {
    let Query(query) = query.map_err(|e| query_problem(e, &request_id))?;
    let (point, max_distance) = query.validate(request_id.as_str())?;

    let zones = state
        .store()
        .find_near(point, max_distance)
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    record_zone_query("nearby", zones.len());
    debug!(
        request_id = %request_id,
        lat = point.lat,
        lng = point.lng,
        results = zones.len(),
        "nearby query"
    );
    Ok(ServiceResponse::new(zones.into()))
}

/// `POST /api/zones/check`
pub async fn check_point(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Result<Json<CheckPointRequest>, JsonRejection>,
) -> HandlerResult<ServiceResponse<CheckResult>> {
    let Json(request) = body.map_err(|e| body_problem(e, &request_id))?;
    let point = request.validate(request_id.as_str())?;

    let zones = state
        .store()
        .find_containing(point)
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    record_zone_query("contains", zones.len());
    Ok(ServiceResponse::new(CheckResult::from_hits(zones)))
}

/// `GET /api/zones/within?minLat&minLng&maxLat&maxLng`
pub async fn zones_within(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<WithinQuery>, QueryRejection>,
) -> HandlerResult<ServiceResponse<ZoneList>> {
    let Query(query) = query.map_err(|e| query_problem(e, &request_id))?;
    let bbox = query.validate(request_id.as_str())?;

    let zones = state
        .store()
        .find_within(bbox)
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    record_zone_query("within", zones.len());
    Ok(ServiceResponse::new(zones.into()))
}

/// `GET /api/zones/{id}`
pub async fn get_zone(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> HandlerResult<ServiceResponse<ZoneBody>> {
    let zone = state
        .store()
        .get(&id)
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    Ok(ServiceResponse::new(ZoneBody { zone }))
}

/// `DELETE /api/zones/{id}`
pub async fn delete_zone(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> HandlerResult<ServiceResponse<DeleteResult>> {
    let zone = state
        .store()
        .delete_by_id(&id)
        .await
        .map_err(|e| lib_problem(&state, &e, &request_id))?;

    record_zone_deleted();
    info!(request_id = %request_id, zone_id = %zone.id, "zone deleted via api");
    Ok(ServiceResponse::new(DeleteResult {
        message: "Zone deleted successfully".to_string(),
        zone,
    }))
}
