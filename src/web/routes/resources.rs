use crate::core::distance::sort_by_distance;
use crate::domain::model::{Coordinate, GeocodedResource, RawResourceRecord};
use crate::web::error::ApiError;
use crate::web::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct ProximityQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Stored resources replace loaded ones with the same id.
fn merge_stored(resources: &mut Vec<GeocodedResource>, stored: Vec<GeocodedResource>) {
    for resource in stored {
        match resources.iter_mut().find(|r| r.id == resource.id) {
            Some(existing) => *existing = resource,
            None => resources.push(resource),
        }
    }
}

/// GET /api/resources
pub async fn list_resources(
    State(state): State<SharedState>,
    Query(query): Query<ProximityQuery>,
) -> Json<Vec<GeocodedResource>> {
    let mut resources = state.loader.load_resources().await;

    match state.repository.get_resources().await {
        Ok(stored) => merge_stored(&mut resources, stored),
        Err(e) => tracing::warn!("Stored resources unavailable: {}", e),
    }

    if let (Some(lat), Some(lng)) = (query.lat, query.lng) {
        sort_by_distance(&mut resources, &Coordinate { lat, lng });
    }

    Json(resources)
}

/// POST /api/resources
pub async fn create_resource(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Json<GeocodedResource>, ApiError> {
    if !body.is_object() {
        return Err(ApiError::BadRequest(
            "Resource must be a JSON object".to_string(),
        ));
    }

    let mut record = RawResourceRecord::from(body);
    if record.id().is_none() {
        record.set("id", Value::String(uuid::Uuid::new_v4().to_string()));
    }
    record.set("IsRecordComplete_", Value::String("Yes".to_string()));
    record.set("LastDateUpdated", Value::String(Utc::now().to_rfc3339()));

    let (outcome, _) = state.loader.batch().geocode_one(record).await;
    let resource = outcome
        .into_resource()
        .ok_or_else(|| ApiError::internal("Failed to create resource"))?;

    state.repository.upsert_resource(resource.clone()).await?;
    tracing::info!("📍 Saved resource {}", resource.id);

    Ok(Json(resource))
}

fn with_upload_id(row: Value) -> RawResourceRecord {
    let mut record = RawResourceRecord::from(row);
    if record.id().is_none() {
        record.set("id", Value::String(uuid::Uuid::new_v4().to_string()));
    }
    record
}

/// GET /api/resources/:id
pub async fn get_resource(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GeocodedResource>, ApiError> {
    if let Some(resource) = state.repository.get_resource(&id).await? {
        return Ok(Json(resource));
    }

    // Spreadsheet resources are listed without being stored.
    state
        .loader
        .load_resources()
        .await
        .into_iter()
        .find(|resource| resource.id == id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))
}

/// POST /api/upload
///
/// Each resource is written on its own; a failure part-way leaves the
/// earlier writes in place. Rows without an id get a fresh uuid so they
/// never shadow positional spreadsheet ids.
pub async fn upload_resources(
    State(state): State<SharedState>,
    Json(rows): Json<Vec<Value>>,
) -> Result<Json<Value>, ApiError> {
    let rows = rows.into_iter().map(with_upload_id).collect();
    let report = state.loader.process(rows).await;
    let dropped = report.dropped_count();

    let mut count = 0;
    for resource in report.into_resources() {
        state.repository.upsert_resource(resource).await?;
        count += 1;
    }

    tracing::info!("📤 Uploaded {} resources ({} dropped)", count, dropped);
    Ok(Json(json!({
        "message": "Data uploaded successfully",
        "count": count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, address: &str) -> GeocodedResource {
        GeocodedResource::new(
            id.to_string(),
            RawResourceRecord::default(),
            Coordinate { lat: 35.0, lng: -80.0 },
            address.to_string(),
        )
    }

    #[test]
    fn test_merge_stored() {
        let mut resources = vec![resource("resource-1", "loaded"), resource("resource-2", "loaded")];
        merge_stored(
            &mut resources,
            vec![resource("resource-2", "stored"), resource("abc", "stored")],
        );

        assert_eq!(resources.len(), 3);
        assert_eq!(resources[1].geocoded_address, "stored");
        assert_eq!(resources[2].id, "abc");
    }

    #[test]
    fn test_upload_rows_get_unique_ids() {
        let first = with_upload_id(json!({"Organization": "Uploaded Shelter"}));
        let second = with_upload_id(json!({"Organization": "Uploaded Shelter"}));
        let kept = with_upload_id(json!({"id": "keep-me", "Organization": "Kept"}));

        let first_id = first.id().unwrap();
        assert!(!first_id.starts_with("resource-"));
        assert_ne!(first_id, second.id().unwrap());
        assert_eq!(kept.id().unwrap(), "keep-me");
    }
}
