use crate::core::address::AddressFormatter;
use crate::domain::model::{
    BatchReport, Coordinate, FallbackReason, GeocodeOutcome, GeocodedResource, GeocodingError,
    GeocodingResult, RawResourceRecord,
};
use crate::domain::ports::Geocoder;
use crate::utils::error::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// North Carolina center, used when a record cannot be placed.
pub const FALLBACK_COORDINATE: Coordinate = Coordinate {
    lat: 35.2271,
    lng: -80.8431,
};
pub const LOCATION_NOT_SPECIFIED: &str = "Location not specified";
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

enum Plan {
    Ready(GeocodeOutcome),
    Lookup {
        id: String,
        record: RawResourceRecord,
        address: String,
    },
}

type Lookup = std::result::Result<Option<GeocodingResult>, String>;

/// 分批地理編碼：每批並行查詢，批次之間固定延遲
pub struct BatchGeocoder<G: Geocoder + ?Sized + 'static> {
    geocoder: Arc<G>,
    formatter: AddressFormatter,
    batch_size: usize,
    batch_delay: Duration,
    fallback: Coordinate,
}

impl<G: Geocoder + ?Sized + 'static> BatchGeocoder<G> {
    pub fn new(geocoder: Arc<G>) -> Self {
        Self {
            geocoder,
            formatter: AddressFormatter::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            fallback: FALLBACK_COORDINATE,
        }
    }

    pub fn with_formatter(mut self, formatter: AddressFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    pub fn with_fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn formatter(&self) -> &AddressFormatter {
        &self.formatter
    }

    /// Geocodes every record and returns only the enriched resources.
    pub async fn batch_geocode(&self, records: Vec<RawResourceRecord>) -> Vec<GeocodedResource> {
        self.run(records).await.into_resources()
    }

    /// Geocodes a single record without any inter-batch delay.
    pub async fn geocode_one(
        &self,
        record: RawResourceRecord,
    ) -> (GeocodeOutcome, Vec<GeocodingError>) {
        let mut errors = Vec::new();
        let outcome = match self.plan(0, record) {
            Plan::Ready(outcome) => outcome,
            Plan::Lookup {
                id,
                record,
                address,
            } => {
                let lookup = self
                    .geocoder
                    .try_geocode(&address)
                    .await
                    .map_err(|e| e.to_string());
                self.settle(id, record, address, lookup, &mut errors)
            }
        };
        (outcome, errors)
    }

    /// Every input record yields exactly one `Resolved` or `Fallback` outcome,
    /// in input order. Diagnostics belong to this run only.
    pub async fn run(&self, records: Vec<RawResourceRecord>) -> BatchReport {
        let started_at = Utc::now();
        let total = records.len();
        let total_batches = total.div_ceil(self.batch_size);
        let mut outcomes = Vec::with_capacity(total);
        let mut errors = Vec::new();

        tracing::info!(
            "🗺️ Geocoding {} resources in {} batch(es) of up to {}",
            total,
            total_batches,
            self.batch_size
        );

        let mut remaining = records.into_iter().enumerate().peekable();
        let mut batch_no = 0;
        while remaining.peek().is_some() {
            if batch_no > 0 {
                tracing::debug!("Waiting {:?} between batches", self.batch_delay);
                tokio::time::sleep(self.batch_delay).await;
            }
            batch_no += 1;

            let chunk: Vec<(usize, RawResourceRecord)> =
                remaining.by_ref().take(self.batch_size).collect();
            tracing::debug!(
                "Processing batch {}/{} ({} records)",
                batch_no,
                total_batches,
                chunk.len()
            );

            let plans: Vec<Plan> = chunk
                .into_iter()
                .map(|(index, record)| self.plan(index, record))
                .collect();
            outcomes.extend(self.resolve_batch(plans, &mut errors).await);
        }

        let report = BatchReport {
            outcomes,
            errors,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            "✅ Geocoded {} resources ({} fallback, {} diagnostics)",
            report.outcomes.len(),
            report.fallback_count(),
            report.errors.len()
        );
        report
    }

    fn plan(&self, index: usize, record: RawResourceRecord) -> Plan {
        let id = record
            .id()
            .unwrap_or_else(|| format!("resource-{}", index + 1));
        let address = self.formatter.format(&record);

        if let Some(coordinate) = record.coordinates() {
            let label = record.field("geocodedAddress").unwrap_or(address);
            return Plan::Ready(GeocodeOutcome::Resolved(GeocodedResource::new(
                id, record, coordinate, label,
            )));
        }

        if address.is_empty() {
            tracing::warn!(
                "No address information for resource: {}",
                record.organization().unwrap_or_default()
            );
            let resource = GeocodedResource::new(
                id,
                record,
                self.fallback,
                LOCATION_NOT_SPECIFIED.to_string(),
            );
            return Plan::Ready(GeocodeOutcome::Fallback {
                resource,
                reason: FallbackReason::MissingAddress,
            });
        }

        Plan::Lookup {
            id,
            record,
            address,
        }
    }

    /// 先全部送出，再依輸入順序整理結果。
    ///
    /// Lookups live in a `JoinSet` owned by this call, so dropping the run
    /// aborts whatever is still in flight.
    async fn resolve_batch(
        &self,
        plans: Vec<Plan>,
        errors: &mut Vec<GeocodingError>,
    ) -> Vec<GeocodeOutcome> {
        let mut lookups = JoinSet::new();
        for (slot, plan) in plans.iter().enumerate() {
            if let Plan::Lookup { address, .. } = plan {
                let geocoder = Arc::clone(&self.geocoder);
                let query = address.clone();
                lookups.spawn(async move { (slot, geocoder.try_geocode(&query).await) });
            }
        }

        let mut results: Vec<Option<Lookup>> = plans.iter().map(|_| None).collect();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((slot, lookup)) => results[slot] = Some(lookup.map_err(|e| e.to_string())),
                Err(e) => tracing::error!("Geocoding task failed: {}", e),
            }
        }

        plans
            .into_iter()
            .zip(results)
            .map(|(plan, lookup)| match plan {
                Plan::Ready(outcome) => outcome,
                Plan::Lookup {
                    id,
                    record,
                    address,
                } => {
                    let lookup =
                        lookup.unwrap_or_else(|| Err("Geocoding task failed".to_string()));
                    self.settle(id, record, address, lookup, errors)
                }
            })
            .collect()
    }

    fn settle(
        &self,
        id: String,
        record: RawResourceRecord,
        address: String,
        lookup: Lookup,
        errors: &mut Vec<GeocodingError>,
    ) -> GeocodeOutcome {
        let reason = match lookup {
            Ok(Some(result)) => {
                let coordinate = result.coordinate();
                return GeocodeOutcome::Resolved(GeocodedResource::new(
                    id,
                    record,
                    coordinate,
                    result.formatted_address,
                ));
            }
            Ok(None) => FallbackReason::NoResults,
            Err(message) => FallbackReason::Failed(message),
        };

        let organization = record.organization().unwrap_or_default();
        tracing::warn!(
            "Failed to geocode address for {} ({}): {}",
            organization,
            address,
            reason
        );
        errors.push(GeocodingError {
            address: address.clone(),
            organization,
            error: reason.to_string(),
            timestamp: Utc::now(),
        });

        GeocodeOutcome::Fallback {
            resource: GeocodedResource::new(id, record, self.fallback, address),
            reason,
        }
    }
}

/// 將診斷紀錄輸出為 CSV
pub fn write_errors_csv<W: std::io::Write>(errors: &[GeocodingError], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["organization", "address", "error", "timestamp"])?;
    for error in errors {
        csv_writer.write_record([
            error.organization.as_str(),
            error.address.as_str(),
            error.error.as_str(),
            &error.timestamp.to_rfc3339(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ReferralError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic geocoder: known addresses resolve, `"fail"` addresses
    /// error out, anything else has no results.
    struct StubGeocoder {
        known: HashMap<String, GeocodingResult>,
        calls: AtomicUsize,
    }

    impl StubGeocoder {
        fn new() -> Self {
            Self {
                known: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, address: &str, lat: f64, lng: f64) -> Self {
            self.known.insert(
                address.to_string(),
                GeocodingResult {
                    lat,
                    lng,
                    formatted_address: format!("{} (resolved)", address),
                },
            );
            self
        }
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn try_geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if address.contains("fail") {
                return Err(ReferralError::GeocodingError {
                    address: address.to_string(),
                    message: "HTTP error! status: 500".to_string(),
                });
            }
            Ok(self.known.get(address).cloned())
        }
    }

    fn record(value: serde_json::Value) -> RawResourceRecord {
        RawResourceRecord::from(value)
    }

    fn orchestrator(stub: StubGeocoder) -> BatchGeocoder<StubGeocoder> {
        BatchGeocoder::new(Arc::new(stub)).with_batch_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_resolved_record() {
        let batch = orchestrator(StubGeocoder::new().with("1 Main St, Cary, NC", 35.79, -78.78));
        let report = batch
            .run(vec![record(json!({"Organization": "A", "Address": "1 Main St", "City": "Cary"}))])
            .await;

        assert_eq!(report.outcomes.len(), 1);
        let resource = report.outcomes[0].resource().unwrap();
        assert!(matches!(report.outcomes[0], GeocodeOutcome::Resolved(_)));
        assert_eq!(resource.id, "resource-1");
        assert_eq!(resource.latitude, 35.79);
        assert_eq!(resource.geocoded_address, "1 Main St, Cary, NC (resolved)");
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_missing_address_gets_fallback_label() {
        let batch = orchestrator(StubGeocoder::new());
        let report = batch
            .run(vec![record(json!({
                "Organization": "A Clinic", "Address": "", "City": "", "Zip": ""
            }))])
            .await;

        match &report.outcomes[0] {
            GeocodeOutcome::Fallback { resource, reason } => {
                assert_eq!(*reason, FallbackReason::MissingAddress);
                assert_eq!(resource.coordinate(), FALLBACK_COORDINATE);
                assert_eq!(resource.geocoded_address, LOCATION_NOT_SPECIFIED);
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_joined_address() {
        let stub = StubGeocoder::new();
        let batch = orchestrator(stub);
        let report = batch
            .run(vec![
                record(json!({"Organization": "Nowhere", "Address": "9 Lost Rd"})),
                record(json!({"Organization": "Broken", "Address": "1 fail St"})),
            ])
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(GeocodeOutcome::is_fallback));
        let broken = report.outcomes[1].resource().unwrap();
        assert_eq!(broken.geocoded_address, "1 fail St, NC");
        assert_eq!(broken.coordinate(), FALLBACK_COORDINATE);

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].organization, "Nowhere");
        assert_eq!(report.errors[0].error, "No results found");
        assert!(report.errors[1].error.contains("500"));
    }

    #[tokio::test]
    async fn test_existing_coordinates_skip_geocoding() {
        let stub = Arc::new(StubGeocoder::new());
        let batch = BatchGeocoder::new(Arc::clone(&stub));
        let report = batch
            .run(vec![record(json!({
                "Organization": "Placed",
                "Address": "1 Main St",
                "latitude": 36.0,
                "longitude": -79.0,
                "geocodedAddress": "1 Main St, Greensboro, NC"
            }))])
            .await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        let resource = report.outcomes[0].resource().unwrap();
        assert_eq!(resource.coordinate(), Coordinate { lat: 36.0, lng: -79.0 });
        assert_eq!(resource.geocoded_address, "1 Main St, Greensboro, NC");
    }

    #[tokio::test]
    async fn test_output_matches_input_across_batches() {
        let mut stub = StubGeocoder::new();
        let mut records = Vec::new();
        for i in 0..25 {
            let street = format!("{} Main St", i);
            stub = stub.with(&format!("{}, NC", street), 35.0 + i as f64, -80.0);
            records.push(record(json!({"Organization": format!("Org {}", i), "Address": street})));
        }
        records.push(record(json!({"Organization": "No results", "Address": "404 Void"})));

        let batch = orchestrator(stub).with_batch_size(10);
        let resources = batch.batch_geocode(records).await;

        assert_eq!(resources.len(), 26);
        for (i, resource) in resources.iter().take(25).enumerate() {
            assert_eq!(resource.id, format!("resource-{}", i + 1));
            assert_eq!(resource.latitude, 35.0 + i as f64);
        }
        assert_eq!(resources[25].coordinate(), FALLBACK_COORDINATE);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let input = vec![
            record(json!({"Organization": "A", "Address": "1 Main St", "City": "Cary"})),
            record(json!({"Organization": "B", "Address": "1 fail St"})),
            record(json!({"Organization": "C"})),
        ];
        let batch = orchestrator(StubGeocoder::new().with("1 Main St, Cary, NC", 35.79, -78.78));

        let first = batch.run(input.clone()).await;
        let second = batch.run(input).await;

        assert_eq!(first.outcomes, second.outcomes);
        assert_eq!(first.errors.len(), 1);
        assert_eq!(second.errors.len(), 1);
    }

    struct SlowGeocoder {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Geocoder for SlowGeocoder {
        async fn try_geocode(&self, _address: &str) -> Result<Option<GeocodingResult>> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_dropped_run_aborts_lookups() {
        let finished = Arc::new(AtomicUsize::new(0));
        let batch = BatchGeocoder::new(Arc::new(SlowGeocoder {
            finished: Arc::clone(&finished),
        }));
        let records = (0..3)
            .map(|i| record(json!({"Organization": format!("Org {}", i), "Address": "1 Main St"})))
            .collect();

        let run = tokio::time::timeout(Duration::from_millis(20), batch.run(records)).await;
        assert!(run.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_configured_fallback_coordinate() {
        let home = Coordinate { lat: 34.2, lng: -77.9 };
        let batch = orchestrator(StubGeocoder::new()).with_fallback(home);
        let report = batch
            .run(vec![
                record(json!({"Organization": "No address"})),
                record(json!({"Organization": "No results", "Address": "404 Void"})),
            ])
            .await;

        assert!(report.outcomes.iter().all(GeocodeOutcome::is_fallback));
        for outcome in &report.outcomes {
            assert_eq!(outcome.resource().unwrap().coordinate(), home);
        }
    }

    #[test]
    fn test_write_errors_csv() {
        let errors = vec![GeocodingError {
            address: "1 fail St, NC".to_string(),
            organization: "Broken, Inc".to_string(),
            error: "No results found".to_string(),
            timestamp: Utc::now(),
        }];
        let mut out = Vec::new();
        write_errors_csv(&errors, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("organization,address,error,timestamp"));
        assert!(lines.next().unwrap().starts_with("\"Broken, Inc\",\"1 fail St, NC\",No results found,"));
    }
}
