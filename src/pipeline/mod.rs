//! Screening pipeline.
//!
//! Orchestrates encode, inference call, response parsing, bitmap decoding,
//! scoring and storage for one fundus image. Every failure leaves the pipeline
//! as `ScreeningError::ScreeningFailed` carrying the original cause.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::client::{HttpWireClient, WireClient};
use crate::codec::{Codec, WireCodec};
use crate::config::ScreeningConfig;
use crate::error::{Result, ScreeningError};
use crate::metrics::{ClinicalStatus, DdlsStage, ScreeningMetrics};
use crate::response::ResponseParser;
use crate::storage::{ImageStore, LocalImageStore};
use crate::RawImage;

/// Result of a successful screening.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningResult {
    /// Retrieval URL of the annotated bitmap.
    pub image_url: String,
    /// Storage identifier of the annotated bitmap.
    pub image_id: String,
    /// Rim-to-cup distance ratio.
    pub distance_ratio: f64,
    /// Rim-to-cup perimeter ratio.
    pub perimeter_ratio: f64,
    /// Rim-to-cup area ratio.
    pub area_ratio: f64,
    /// Neuroretinal rim perimeter.
    pub rim_perimeter: f64,
    /// Excavation (cup) perimeter.
    pub cup_perimeter: f64,
    /// Neuroretinal rim area.
    pub rim_area: f64,
    /// Excavation (cup) area.
    pub cup_area: f64,
    /// Clinical status, serialized as its numeric code.
    #[serde(serialize_with = "status_code")]
    pub status: ClinicalStatus,
    /// DDLS stage.
    pub stage: DdlsStage,
}

impl ScreeningResult {
    fn assemble(image_url: String, image_id: String, metrics: &ScreeningMetrics) -> Self {
        Self {
            image_url,
            image_id,
            distance_ratio: metrics.ratios.distance_ratio,
            perimeter_ratio: metrics.ratios.perimeter_ratio,
            area_ratio: metrics.ratios.area_ratio,
            rim_perimeter: metrics.geometry.rim_perimeter,
            cup_perimeter: metrics.geometry.cup_perimeter,
            rim_area: metrics.geometry.rim_area,
            cup_area: metrics.geometry.cup_area,
            status: metrics.status,
            stage: metrics.stage,
        }
    }
}

fn status_code<S: Serializer>(
    status: &ClinicalStatus,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_i32(status.code())
}

/// Globally unique object name for an annotated bitmap.
pub fn generate_image_id() -> String {
    format!(
        "{}_{}.png",
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        Uuid::new_v4()
    )
}

/// Screening pipeline over a wire client and an image store.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
pub struct ScreeningPipeline<C: WireClient, S: ImageStore> {
    /// Pipeline configuration.
    config: ScreeningConfig,
    codec: WireCodec,
    parser: ResponseParser,
    client: C,
    store: S,
}

impl<C: WireClient, S: ImageStore> ScreeningPipeline<C, S> {
    /// Create a pipeline from explicit collaborators.
    pub fn new(config: ScreeningConfig, client: C, store: S) -> Self {
        let parser = ResponseParser::from_config(&config);
        Self {
            config,
            codec: WireCodec::new(),
            parser,
            client,
            store,
        }
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// Image store used for annotated bitmaps.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Screen an image file from disk.
    pub fn screen_file<P: AsRef<Path>>(&self, path: P) -> Result<ScreeningResult> {
        let path = path.as_ref();
        log::info!("Screening: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| {
            ScreeningError::InvalidFormat(format!("Failed to read {}: {}", path.display(), e))
                .into_screening_failure()
        })?;
        self.screen_encoded(&bytes)
    }

    /// Screen an uploaded image in any format the `image` crate decodes.
    pub fn screen_encoded(&self, bytes: &[u8]) -> Result<ScreeningResult> {
        let raw = RawImage::from_encoded(bytes).map_err(|e| self.fail(e))?;
        self.screen_raw(&raw)
    }

    /// Screen an already decoded raw image.
    pub fn screen_raw(&self, image: &RawImage) -> Result<ScreeningResult> {
        self.run(image).map_err(|e| self.fail(e))
    }

    fn fail(&self, err: ScreeningError) -> ScreeningError {
        let failed = err.into_screening_failure();
        log::warn!("{}", failed);
        failed
    }

    fn run(&self, image: &RawImage) -> Result<ScreeningResult> {
        let start = Instant::now();

        let message = self.codec.encode(image)?;
        let body = self.client.send(message)?;
        let response = self.parser.parse(&body)?;
        drop(body);

        // Score before touching storage so a bad response never leaves an object behind.
        let metrics = ScreeningMetrics::compute(&response)?;
        let bitmap = response.bitmap_bytes()?;
        drop(response);
        let annotated = self.codec.decode(&bitmap, image.width, image.height)?;
        drop(bitmap);

        let image_id = generate_image_id();
        self.store.upload_image(&annotated, &image_id)?;
        let image_url = match self.store.generate_presigned_url(&image_id) {
            Ok(url) => url,
            Err(e) => {
                self.rollback(&image_id);
                return Err(e);
            }
        };

        log::info!(
            "Screened {}x{} image in {} ms: stage {} ({})",
            image.width,
            image.height,
            start.elapsed().as_millis(),
            metrics.stage,
            metrics.status
        );

        Ok(ScreeningResult::assemble(image_url, image_id, &metrics))
    }

    fn rollback(&self, image_id: &str) {
        match self.store.delete_image(image_id) {
            Ok(_) => log::warn!("Removed {} after failed URL generation", image_id),
            Err(e) => log::warn!("Failed to remove {}: {}", image_id, e),
        }
    }
}

/// Builder for the HTTP + local storage pipeline.
pub struct PipelineBuilder {
    config: ScreeningConfig,
    store_root: Option<std::path::PathBuf>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ScreeningConfig::default(),
            store_root: None,
        }
    }

    /// Set the screening configuration.
    pub fn config(mut self, config: ScreeningConfig) -> Self {
        self.config = config;
        self
    }

    /// Store bitmaps under this directory instead of the configured bucket.
    pub fn store_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.store_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Validate the configuration and build the pipeline.
    pub fn build(self) -> Result<ScreeningPipeline<HttpWireClient, LocalImageStore>> {
        self.config.validate()?;
        let client = HttpWireClient::new(&self.config)?;
        let store = match &self.store_root {
            Some(root) => LocalImageStore::new(root)?,
            None => LocalImageStore::new(&self.config.bucket)?,
        };
        Ok(ScreeningPipeline::new(self.config, client, store))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
