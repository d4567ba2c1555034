use crate::core::batch::BatchGeocoder;
use crate::domain::model::{GeocodeOutcome, GeocodedResource, LoadReport, RawResourceRecord};
use crate::domain::ports::{Geocoder, ResourceSource};
use serde_json::Value;
use std::sync::Arc;

enum Slot {
    Kept,
    Dropped(GeocodeOutcome),
}

/// 產生地圖要顯示的資源清單
pub struct ResourceLoader<G: Geocoder + ?Sized + 'static> {
    source: Arc<dyn ResourceSource>,
    batch: BatchGeocoder<G>,
}

impl<G: Geocoder + ?Sized + 'static> ResourceLoader<G> {
    pub fn new(source: Arc<dyn ResourceSource>, batch: BatchGeocoder<G>) -> Self {
        Self { source, batch }
    }

    pub fn batch(&self) -> &BatchGeocoder<G> {
        &self.batch
    }

    pub fn source(&self) -> &Arc<dyn ResourceSource> {
        &self.source
    }

    /// Never fails: an unreachable or malformed source yields an empty list.
    pub async fn load_resources(&self) -> Vec<GeocodedResource> {
        self.load_report().await.into_resources()
    }

    pub async fn load_report(&self) -> LoadReport {
        tracing::info!("📂 Loading resource data...");
        match self.source.fetch_rows().await {
            Ok(rows) => {
                tracing::info!("📂 Loaded {} raw rows", rows.len());
                self.process(rows).await
            }
            Err(e) => {
                tracing::error!("❌ Error loading resources: {}", e);
                LoadReport::default()
            }
        }
    }

    /// Drops rows without an organization, assigns ids to the rest and
    /// geocodes them. Outcomes keep the input order.
    pub async fn process(&self, rows: Vec<RawResourceRecord>) -> LoadReport {
        let mut slots = Vec::with_capacity(rows.len());
        let mut kept = Vec::new();

        for mut row in rows {
            if row.organization().is_none() {
                tracing::debug!("Skipping row without organization");
                slots.push(Slot::Dropped(GeocodeOutcome::Dropped {
                    record: row,
                    reason: "Missing organization name".to_string(),
                }));
                continue;
            }
            if row.id().is_none() {
                let id = format!("resource-{}", kept.len() + 1);
                row.set("id", Value::String(id));
            }
            kept.push(row);
            slots.push(Slot::Kept);
        }

        tracing::info!(
            "Processing {} valid resources ({} dropped)...",
            kept.len(),
            slots.len() - kept.len()
        );

        let report = self.batch.run(kept).await;
        let mut geocoded = report.outcomes.into_iter();
        let outcomes = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Kept => geocoded.next(),
                Slot::Dropped(outcome) => Some(outcome),
            })
            .collect();

        LoadReport {
            outcomes,
            errors: report.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::GeocodingResult;
    use crate::utils::error::{ReferralError, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct EchoGeocoder;

    #[async_trait]
    impl Geocoder for EchoGeocoder {
        async fn try_geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
            Ok(Some(GeocodingResult {
                lat: 35.5,
                lng: -79.5,
                formatted_address: address.to_uppercase(),
            }))
        }
    }

    struct StaticSource(Vec<serde_json::Value>);

    #[async_trait]
    impl ResourceSource for StaticSource {
        async fn fetch_rows(&self) -> Result<Vec<RawResourceRecord>> {
            Ok(self.0.iter().cloned().map(RawResourceRecord::from).collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ResourceSource for BrokenSource {
        async fn fetch_rows(&self) -> Result<Vec<RawResourceRecord>> {
            Err(ReferralError::SourceError {
                message: "connection refused".to_string(),
            })
        }
    }

    fn loader(source: impl ResourceSource + 'static) -> ResourceLoader<EchoGeocoder> {
        let batch = BatchGeocoder::new(Arc::new(EchoGeocoder))
            .with_batch_delay(Duration::from_millis(1));
        ResourceLoader::new(Arc::new(source), batch)
    }

    #[tokio::test]
    async fn test_empty_organization_is_dropped() {
        let loader = loader(StaticSource(vec![json!({"Organization": "", "Address": "1 Main St"})]));
        let report = loader.load_report().await;

        assert_eq!(report.dropped_count(), 1);
        assert!(report.resources().is_empty());
        assert!(loader.load_resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_ids_follow_surviving_rows() {
        let loader = loader(StaticSource(vec![
            json!({"Organization": "First", "Address": "1 Main St"}),
            json!({"Organization": "   ", "Address": "2 Main St"}),
            json!({"Organization": "Second", "Address": "3 Main St"}),
            json!({"Organization": "Third", "id": "custom-7"}),
        ]));
        let report = loader.load_report().await;

        assert_eq!(report.outcomes.len(), 4);
        assert!(report.outcomes[1].is_dropped());

        let resources = report.resources();
        let ids: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["resource-1", "resource-2", "custom-7"]);
        assert_eq!(resources[1].geocoded_address, "3 MAIN ST, NC");
    }

    #[tokio::test]
    async fn test_one_output_per_named_row() {
        let rows: Vec<_> = (0..13)
            .map(|i| json!({"Organization": format!("Org {}", i), "City": "Cary"}))
            .collect();
        let resources = loader(StaticSource(rows)).load_resources().await;
        assert_eq!(resources.len(), 13);
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_empty_list() {
        let resources = loader(BrokenSource).load_resources().await;
        assert!(resources.is_empty());
    }
}
