//! Request and response models for the prediction service.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Optional geolocation attached to a prediction.
///
/// Each coordinate is independently optional; absent ones are left out of the
/// request entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl Location {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self> {
        if let Some(lat) = latitude {
            check_latitude(lat)?;
        }
        if let Some(lon) = longitude {
            check_longitude(lon)?;
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// A location with both coordinates present.
    pub fn point(latitude: f64, longitude: f64) -> Result<Self> {
        Self::new(Some(latitude), Some(longitude))
    }

    /// Parse free-text coordinates; blank input counts as absent.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        Self::new(
            parse_coordinate("latitude", latitude)?,
            parse_coordinate("longitude", longitude)?,
        )
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none()
    }
}

fn parse_coordinate(name: &str, raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| Error::Validation(format!("{} is not a number: {:?}", name, raw)))
}

/// Read a JSON number, or a string holding one.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn check_latitude(lat: f64) -> Result<()> {
    if lat.is_finite() && (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "latitude must be within [-90, 90], got {}",
            lat
        )))
    }
}

pub(crate) fn check_longitude(lon: f64) -> Result<()> {
    if lon.is_finite() && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "longitude must be within [-180, 180], got {}",
            lon
        )))
    }
}

/// An image to submit for classification.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub media_type: String,
}

impl ImageUpload {
    pub const DEFAULT_FILENAME: &'static str = "image.jpg";
    pub const DEFAULT_MEDIA_TYPE: &'static str = "image/jpeg";

    /// Wrap raw JPEG bytes using the default filename.
    pub fn jpeg(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: Self::DEFAULT_FILENAME.to_string(),
            media_type: Self::DEFAULT_MEDIA_TYPE.to_string(),
        }
    }

    /// Read an image from disk, inferring the media type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let media_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            _ => {
                return Err(Error::Validation(format!(
                    "unsupported image type: {}",
                    path.display()
                )))
            }
        };

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Validation(format!("failed to read {}: {}", path.display(), e))
        })?;

        Ok(Self {
            bytes,
            filename: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(Self::DEFAULT_FILENAME)
                .to_string(),
            media_type: media_type.to_string(),
        })
    }
}

/// Classification block of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub class_name: String,
    #[serde(default)]
    pub class_name_internal: Option<String>,
    pub confidence: f64,
}

/// Coarse confidence bands, matching the Low / Medium / High scale shown
/// next to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl Classification {
    /// Confidence as a percentage rounded to two decimals.
    pub fn confidence_percent(&self) -> f64 {
        (self.confidence * 100.0 * 100.0).round() / 100.0
    }

    /// Below 50% is low, below 80% medium, anything higher is high.
    pub fn confidence_band(&self) -> ConfidenceBand {
        let pct = self.confidence_percent();
        if pct < 50.0 {
            ConfidenceBand::Low
        } else if pct < 80.0 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::High
        }
    }
}

/// Explanatory details for the predicted disease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseDetails {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub causes: Option<String>,
    #[serde(default)]
    pub solutions: Vec<String>,
}

/// One entry of the feedback prompt list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPrompt {
    #[serde(default)]
    pub class_name: Vec<String>,
}

/// Typed view of a prediction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Opaque identifier echoed back with feedback
    pub id: Value,
    pub classification: Classification,
    pub disease_details: DiseaseDetails,
    #[serde(default)]
    pub feedback_prompt_list: Vec<FeedbackPrompt>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl PredictionResult {
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    /// Labels a user may pick as the corrected classification.
    pub fn feedback_options(&self) -> Vec<String> {
        let options: Vec<String> = self
            .feedback_prompt_list
            .iter()
            .filter_map(|p| p.class_name.first().cloned())
            .collect();
        if options.is_empty() {
            self.suggestions.clone()
        } else {
            options
        }
    }
}

/// Service counters shown on the metrics dashboard.
///
/// Every counter is optional; missing or non-numeric values decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_scans: Option<f64>,
    /// Percentage of scans that produced a classification
    pub success_rate: Option<f64>,
    pub active_users: Option<f64>,
    /// Seconds
    pub avg_response_time: Option<f64>,
    pub disease_types: Option<f64>,
    /// Percentage of predictions confirmed by feedback
    pub accuracy: Option<f64>,
}

impl Metrics {
    pub fn from_value(value: &Value) -> Self {
        let counter = |key: &str| value.get(key).and_then(as_number);
        Self {
            total_scans: counter("total_scans"),
            success_rate: counter("success_rate"),
            active_users: counter("active_users"),
            avg_response_time: counter("avg_response_time"),
            disease_types: counter("disease_types"),
            accuracy: counter("accuracy"),
        }
    }

    /// Named counters that are present, in dashboard order.
    pub fn counters(&self) -> Vec<(&'static str, f64)> {
        [
            ("total_scans", self.total_scans),
            ("success_rate", self.success_rate),
            ("active_users", self.active_users),
            ("avg_response_time", self.avg_response_time),
            ("disease_types", self.disease_types),
            ("accuracy", self.accuracy),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

/// Whether the user judged a prediction accurate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPolarity {
    #[default]
    Positive,
    Negative,
}

impl FeedbackPolarity {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackPolarity::Positive => "positive",
            FeedbackPolarity::Negative => "negative",
        }
    }
}

impl fmt::Display for FeedbackPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackPolarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(FeedbackPolarity::Positive),
            "negative" => Ok(FeedbackPolarity::Negative),
            other => Err(Error::Validation(format!(
                "feedback must be 'positive' or 'negative', got {:?}",
                other
            ))),
        }
    }
}

/// A user's accuracy judgment on a prior prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSubmission {
    pub prediction_id: Value,
    pub original_prediction: Value,
    pub polarity: FeedbackPolarity,
    pub suggested_class: Option<String>,
}

impl FeedbackSubmission {
    /// The suggestion is dropped unless the polarity is negative.
    pub fn new(
        prediction_id: Value,
        original_prediction: Value,
        polarity: FeedbackPolarity,
        suggested_class: Option<String>,
    ) -> Self {
        let suggested_class = match polarity {
            FeedbackPolarity::Negative => suggested_class,
            FeedbackPolarity::Positive => None,
        };
        Self {
            prediction_id,
            original_prediction,
            polarity,
            suggested_class,
        }
    }

    /// Form fields in the order the feedback endpoint expects them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", plain_text(&self.prediction_id)),
            ("original_prediction", self.original_prediction.to_string()),
            ("user_feedback", self.polarity.as_str().to_string()),
        ];
        if let Some(suggestion) = &self.suggested_class {
            fields.push(("user_suggestion", suggestion.clone()));
        }
        fields
    }
}

/// Render a JSON scalar without quotes so string ids travel as-is.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_prediction() -> Value {
        json!({
            "id": "pred-42",
            "classification": {
                "class_name": "Tomato Early Blight",
                "class_name_internal": "tomato_early_blight",
                "confidence": 0.87654
            },
            "disease_details": {
                "description": "Fungal leaf spot",
                "causes": "Alternaria solani",
                "solutions": ["Remove infected leaves", "Apply fungicide"]
            },
            "feedback_prompt_list": [
                {"class_name": ["Tomato Late Blight", "tomato_late_blight"]},
                {"class_name": ["Tomato Healthy"]}
            ],
            "suggestions": ["Water at the base"]
        })
    }

    #[test]
    fn test_location_validates_ranges() {
        assert!(Location::point(45.0, -120.0).is_ok());
        assert!(Location::point(91.0, 0.0).is_err());
        assert!(Location::point(0.0, -180.5).is_err());
        assert!(Location::new(Some(f64::NAN), None).is_err());
    }

    #[test]
    fn test_location_parse_blank_is_absent() {
        let loc = Location::parse("  ", "77.5").unwrap();
        assert_eq!(loc.latitude(), None);
        assert_eq!(loc.longitude(), Some(77.5));
        assert!(Location::parse("", "").unwrap().is_empty());
        assert!(Location::parse("north", "").is_err());
    }

    #[test]
    fn test_prediction_decodes_and_lists_options() {
        let prediction = PredictionResult::from_value(&sample_prediction()).unwrap();
        assert_eq!(prediction.id, json!("pred-42"));
        assert_eq!(prediction.disease_details.solutions.len(), 2);
        assert_eq!(
            prediction.feedback_options(),
            vec!["Tomato Late Blight", "Tomato Healthy"]
        );
        assert_eq!(prediction.classification.confidence_percent(), 87.65);
        assert_eq!(
            prediction.classification.confidence_band(),
            ConfidenceBand::High
        );
    }

    #[test]
    fn test_feedback_options_fall_back_to_suggestions() {
        let mut value = sample_prediction();
        value["feedback_prompt_list"] = json!([]);
        let prediction = PredictionResult::from_value(&value).unwrap();
        assert_eq!(prediction.feedback_options(), vec!["Water at the base"]);
    }

    #[test]
    fn test_prediction_missing_classification_is_malformed() {
        let err = PredictionResult::from_value(&json!({"id": 1})).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_positive_feedback_drops_suggestion() {
        let submission = FeedbackSubmission::new(
            json!(7),
            json!({"class_name": "Rust"}),
            FeedbackPolarity::Positive,
            Some("Mildew".to_string()),
        );
        assert_eq!(submission.suggested_class, None);
        let fields = submission.form_fields();
        assert_eq!(
            fields,
            vec![
                ("id", "7".to_string()),
                ("original_prediction", r#"{"class_name":"Rust"}"#.to_string()),
                ("user_feedback", "positive".to_string()),
            ]
        );
    }

    #[test]
    fn test_negative_feedback_keeps_suggestion() {
        let submission = FeedbackSubmission::new(
            json!("abc"),
            json!({}),
            FeedbackPolarity::Negative,
            Some("Mildew".to_string()),
        );
        let fields = submission.form_fields();
        assert_eq!(fields[0], ("id", "abc".to_string()));
        assert_eq!(fields[3], ("user_suggestion", "Mildew".to_string()));
    }

    #[test]
    fn test_metrics_decode_leniently() {
        let metrics = Metrics::from_value(&json!({
            "total_scans": 1200,
            "success_rate": "97.5",
            "active_users": 48,
            "avg_response_time": 1.8,
            "disease_types": null,
            "accuracy": "n/a",
            "uptime_days": 30
        }));
        assert_eq!(metrics.total_scans, Some(1200.0));
        assert_eq!(metrics.success_rate, Some(97.5));
        assert_eq!(metrics.disease_types, None);
        assert_eq!(metrics.accuracy, None);
        assert_eq!(
            metrics.counters(),
            vec![
                ("total_scans", 1200.0),
                ("success_rate", 97.5),
                ("active_users", 48.0),
                ("avg_response_time", 1.8),
            ]
        );
        assert_eq!(Metrics::from_value(&json!([])), Metrics::default());
    }

    #[tokio::test]
    async fn test_image_from_path_infers_media_type() {
        let path = std::env::temp_dir().join(format!("plantdoc-leaf-{}.PNG", std::process::id()));
        tokio::fs::write(&path, [0x89, b'P', b'N', b'G']).await.unwrap();

        let image = ImageUpload::from_path(&path).await.unwrap();
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.bytes.len(), 4);
        assert!(image.filename.starts_with("plantdoc-leaf-"));
        tokio::fs::remove_file(&path).await.unwrap();

        let err = ImageUpload::from_path("notes.txt").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_polarity_parsing() {
        assert_eq!(
            "Negative".parse::<FeedbackPolarity>().unwrap(),
            FeedbackPolarity::Negative
        );
        assert!("meh".parse::<FeedbackPolarity>().is_err());
    }
}
