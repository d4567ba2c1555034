use crate::core::batch::write_errors_csv;
use crate::core::loader::ResourceLoader;
use crate::core::{Geocoder, LoadReport, Pipeline, RawResourceRecord, Storage};
use crate::utils::error::Result;

/// 離線批次：讀取試算表 JSON → 地理編碼 → 寫出結果與診斷 CSV
pub struct GeocodePipeline<S: Storage, G: Geocoder + ?Sized + 'static> {
    storage: S,
    loader: ResourceLoader<G>,
    output_file: String,
    errors_file: Option<String>,
}

impl<S: Storage, G: Geocoder + ?Sized + 'static> GeocodePipeline<S, G> {
    pub fn new(storage: S, loader: ResourceLoader<G>, output_file: impl Into<String>) -> Self {
        Self {
            storage,
            loader,
            output_file: output_file.into(),
            errors_file: None,
        }
    }

    pub fn with_errors_file(mut self, errors_file: impl Into<String>) -> Self {
        self.errors_file = Some(errors_file.into());
        self
    }
}

#[async_trait::async_trait]
impl<S: Storage, G: Geocoder + ?Sized + 'static> Pipeline for GeocodePipeline<S, G> {
    async fn extract(&self) -> Result<Vec<RawResourceRecord>> {
        let rows = self.loader.source().fetch_rows().await?;
        tracing::debug!("Extracted {} raw rows", rows.len());
        Ok(rows)
    }

    async fn transform(&self, data: Vec<RawResourceRecord>) -> Result<LoadReport> {
        Ok(self.loader.process(data).await)
    }

    async fn load(&self, result: LoadReport) -> Result<String> {
        if let Some(errors_file) = &self.errors_file {
            let mut csv_data = Vec::new();
            write_errors_csv(&result.errors, &mut csv_data)?;
            tracing::debug!(
                "Writing {} diagnostics ({} bytes) to {}",
                result.errors.len(),
                csv_data.len(),
                errors_file
            );
            self.storage.write_file(errors_file, &csv_data).await?;
        }

        let resources = result.into_resources();
        let json_data = serde_json::to_vec_pretty(&resources)?;
        tracing::debug!("Writing {} resources to {}", resources.len(), self.output_file);
        self.storage.write_file(&self.output_file, &json_data).await?;

        Ok(self.output_file.clone())
    }
}
