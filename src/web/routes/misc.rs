use crate::core::Storage;
use crate::domain::model::{Coordinate, RawResourceRecord};
use crate::web::error::ApiError;
use crate::web::state::SharedState;
use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct LogErrorsRequest {
    pub errors: String,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Browser-side geocoding result
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientGeocode {
    pub location: Option<Location>,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoordinateUpdate {
    #[serde(default)]
    pub organization: String,
    pub address: Option<String>,
    pub geocoded: Option<ClientGeocode>,
}

impl CoordinateUpdate {
    /// Coordinate and display address, only when both coordinates are present.
    fn target(&self) -> Option<(Coordinate, String)> {
        let geocoded = self.geocoded.as_ref()?;
        let location = geocoded.location.as_ref()?;
        let (lat, lng) = (location.lat?, location.lng?);
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }

        let address = geocoded
            .formatted_address
            .clone()
            .or_else(|| self.address.clone())
            .unwrap_or_default();
        Some((Coordinate { lat, lng }, address))
    }
}

/// GET /api/misc/resource-spreadsheet：原始資料列，不做地理編碼
pub async fn resource_spreadsheet(
    State(state): State<SharedState>,
) -> Result<Json<Vec<RawResourceRecord>>, ApiError> {
    let rows = state.loader.source().fetch_rows().await?;
    Ok(Json(rows))
}

/// POST /api/log-errors
///
/// Saves a client-side geocoding error report as a timestamped text file
/// under `data.errors_dir`.
pub async fn log_errors(
    State(state): State<SharedState>,
    Json(request): Json<LogErrorsRequest>,
) -> Result<Json<Value>, ApiError> {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let filepath = format!(
        "{}/geocoding-errors-{}.txt",
        state.config.data.errors_dir.trim_end_matches('/'),
        timestamp
    );

    state
        .storage
        .write_file(&filepath, request.errors.as_bytes())
        .await?;
    tracing::info!("📝 Wrote geocoding error log {}", filepath);

    Ok(Json(json!({ "success": true, "filepath": filepath })))
}

/// POST /api/update-coordinates
///
/// Applies coordinates resolved elsewhere to every stored resource of the
/// named organization. Entries without an organization or coordinates are
/// skipped.
pub async fn update_coordinates(
    State(state): State<SharedState>,
    Json(updates): Json<Vec<CoordinateUpdate>>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("Starting coordinate update for {} resources", updates.len());
    let stored = state.repository.get_resources().await?;

    let mut count = 0;
    for update in &updates {
        let organization = update.organization.trim();
        if organization.is_empty() {
            tracing::warn!("Skipping coordinate update with missing organization");
            continue;
        }
        let Some((coordinate, address)) = update.target() else {
            tracing::warn!("Skipping {}: missing geocoded coordinates", organization);
            continue;
        };

        for resource in stored
            .iter()
            .filter(|r| r.organization().map(str::trim) == Some(organization))
        {
            let mut resource = resource.clone();
            resource.latitude = coordinate.lat;
            resource.longitude = coordinate.lng;
            resource.geocoded_address = address.clone();
            resource
                .fields
                .insert("lastUpdated".to_string(), json!(Utc::now().to_rfc3339()));
            state.repository.upsert_resource(resource).await?;
            count += 1;
        }
    }

    tracing::info!("✅ Updated coordinates for {} resources", count);
    Ok(Json(json!({
        "success": true,
        "message": format!("Updated coordinates for {} resources", count),
        "count": count,
    })))
}

/// POST /api/csp-report
///
/// Browsers post these as `application/csp-report`, so the body is parsed by
/// hand and an unreadable report is still acknowledged.
pub async fn csp_report(body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(report) => {
            let report = &report["csp-report"];
            tracing::warn!(
                blocked_uri = %report["blocked-uri"],
                violated_directive = %report["violated-directive"],
                document_uri = %report["document-uri"],
                "CSP violation"
            );
        }
        Err(e) => tracing::warn!("Unreadable CSP report: {}", e),
    }
    Json(json!({ "status": "logged" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(value: Value) -> CoordinateUpdate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_update_target_prefers_formatted_address() {
        let target = update(json!({
            "organization": "Clinic",
            "address": "1 Main St",
            "geocoded": {"location": {"lat": 35.5, "lng": -80.1}, "formattedAddress": "1 Main St, Raleigh, NC"}
        }))
        .target();
        assert_eq!(
            target,
            Some((Coordinate { lat: 35.5, lng: -80.1 }, "1 Main St, Raleigh, NC".to_string()))
        );

        let target = update(json!({
            "organization": "Clinic",
            "address": "1 Main St",
            "geocoded": {"location": {"lat": 35.5, "lng": -80.1}}
        }))
        .target();
        assert_eq!(target.map(|(_, address)| address).as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_update_target_requires_both_coordinates() {
        let missing_lng = update(json!({
            "organization": "Clinic",
            "geocoded": {"location": {"lat": 35.5}}
        }));
        assert_eq!(missing_lng.target(), None);

        let no_geocode = update(json!({"organization": "Clinic"}));
        assert_eq!(no_geocode.target(), None);
    }
}
