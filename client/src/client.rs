//! Client for the plant-disease prediction service.
//!
//! Every operation returns an [`ApiResult`]: the decoded JSON payload on
//! success, or an [`ErrorDescriptor`] for any failure. Nothing else crosses
//! this boundary.

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::{Config, Endpoint, HeaderPreset};
use crate::heatmap::HeatmapQuery;
use crate::http::dispatch;
use crate::models::{FeedbackPolarity, FeedbackSubmission, ImageUpload, Location};
use crate::{ApiResult, Error, ErrorDescriptor, Result};

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// Client for the prediction, feedback, heatmap and metrics endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Config,
}

impl ApiClient {
    /// Create a new client with the configured timeouts.
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Create a client from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit an image for classification.
    pub async fn predict(&self, image: ImageUpload, location: Option<Location>) -> ApiResult {
        let result = self.try_predict(image, location.unwrap_or_default()).await;
        finish(Endpoint::Predict, result)
    }

    async fn try_predict(&self, image: ImageUpload, location: Location) -> Result<Value> {
        if image.bytes.is_empty() {
            return Err(Error::Validation("an image is required".to_string()));
        }

        let part = Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.media_type)
            .map_err(|e| Error::Validation(format!("invalid media type: {}", e)))?;

        let mut form = Form::new().part(IMAGE_FIELD, part);
        if let Some(lat) = location.latitude() {
            form = form.text("latitude", lat.to_string());
        }
        if let Some(lon) = location.longitude() {
            form = form.text("longitude", lon.to_string());
        }

        let request = self.request(Method::POST, Endpoint::Predict, HeaderPreset::Multipart);
        dispatch(Endpoint::Predict, request.multipart(form)).await
    }

    /// Record the user's judgment of a prediction.
    ///
    /// `suggested_class` is only sent with negative feedback.
    pub async fn submit_feedback(
        &self,
        prediction_id: &Value,
        original_prediction: &Value,
        polarity: FeedbackPolarity,
        suggested_class: Option<&str>,
    ) -> ApiResult {
        let submission = FeedbackSubmission::new(
            prediction_id.clone(),
            original_prediction.clone(),
            polarity,
            suggested_class.map(str::to_string),
        );
        self.send_feedback(&submission).await
    }

    /// Send a prepared feedback submission.
    pub async fn send_feedback(&self, submission: &FeedbackSubmission) -> ApiResult {
        let request = self
            .request(Method::POST, Endpoint::Feedback, HeaderPreset::Form)
            .form(&submission.form_fields());
        finish(Endpoint::Feedback, dispatch(Endpoint::Feedback, request).await)
    }

    /// Fetch heatmap data for a filter kind and its loosely typed parameters.
    pub async fn get_heatmap_data(
        &self,
        filter_kind: &str,
        params: &Map<String, Value>,
    ) -> ApiResult {
        match HeatmapQuery::from_kind(filter_kind, params) {
            Ok(query) => self.fetch_heatmap(&query).await,
            Err(e) => finish(Endpoint::Heatmap, Err(e)),
        }
    }

    /// Fetch heatmap data for a typed query.
    pub async fn fetch_heatmap(&self, query: &HeatmapQuery) -> ApiResult {
        if let Err(e) = query.validate() {
            return finish(Endpoint::Heatmap, Err(e));
        }

        let request = self
            .request(Method::GET, Endpoint::Heatmap, HeaderPreset::Json)
            .query(&query.query_params());
        finish(Endpoint::Heatmap, dispatch(Endpoint::Heatmap, request).await)
    }

    /// Fetch service metrics.
    pub async fn get_metrics(&self) -> ApiResult {
        let request = self.request(Method::GET, Endpoint::Metrics, HeaderPreset::Json);
        finish(Endpoint::Metrics, dispatch(Endpoint::Metrics, request).await)
    }

    fn request(
        &self,
        method: Method,
        endpoint: Endpoint,
        preset: HeaderPreset,
    ) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.config.endpoint(endpoint));
        match preset.content_type() {
            Some(content_type) => builder.header(CONTENT_TYPE, content_type),
            None => builder,
        }
    }
}

/// Flatten an internal result into the public contract, logging the outcome.
fn finish(endpoint: Endpoint, result: Result<Value>) -> ApiResult {
    match result {
        Ok(payload) => {
            info!(endpoint = endpoint.path(), "Request succeeded");
            Ok(payload)
        }
        Err(e) => {
            if matches!(e, Error::Validation(_)) {
                warn!(endpoint = endpoint.path(), error = %e, "Request rejected before sending");
            }
            Err(ErrorDescriptor::from(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> ApiClient {
        ApiClient::new(Config::with_base_url("http://127.0.0.1:9").timeout(Duration::from_secs(1)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_image_rejected_without_request() {
        let result = client().predict(ImageUpload::jpeg(Vec::new()), None).await;
        assert_eq!(
            result,
            Err(ErrorDescriptor::new("invalid request: an image is required"))
        );
    }

    #[tokio::test]
    async fn test_unknown_heatmap_kind_rejected_without_request() {
        let result = client().get_heatmap_data("by_weather", &Map::new()).await;
        let err = result.unwrap_err();
        assert!(err.error.starts_with("invalid request: unknown heatmap filter kind"));
    }

    #[tokio::test]
    async fn test_invalid_typed_query_rejected() {
        let query = HeatmapQuery::ByDays {
            days: 0,
            page: 1,
            per_page: 50,
        };
        let err = client().fetch_heatmap(&query).await.unwrap_err();
        assert_eq!(err.error, "invalid request: days must be at least 1");
    }
}
