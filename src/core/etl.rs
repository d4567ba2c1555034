use crate::core::Pipeline;
use crate::utils::error::Result;

pub struct GeocodeEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> GeocodeEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting geocoding run...");

        // Extract
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", raw_data.len());

        // Transform
        let report = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Transformed {} records ({} dropped, {} fallback)",
            report.outcomes.len(),
            report.dropped_count(),
            report.fallback_count()
        );

        // Load
        let output_path = self.pipeline.load(report).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }
}
