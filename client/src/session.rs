//! Caller-owned state for the predict-then-feedback flow.

use serde_json::Value;

use crate::models::{FeedbackPolarity, FeedbackSubmission, PredictionResult};
use crate::{Error, Result};

/// Feedback state for one user session.
///
/// Owned by the caller and passed to whatever renders the feedback form.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSession {
    prediction: Option<(PredictionResult, Value)>,
    polarity: FeedbackPolarity,
    suggestion: Option<String>,
}

impl FeedbackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh prediction payload and reset any prior feedback.
    pub fn record_prediction(&mut self, payload: Value) -> Result<&PredictionResult> {
        let prediction = PredictionResult::from_value(&payload)?;
        let classification = payload
            .get("classification")
            .cloned()
            .unwrap_or(Value::Null);

        self.polarity = FeedbackPolarity::Positive;
        self.suggestion = None;
        let (prediction, _) = &*self.prediction.insert((prediction, classification));
        Ok(prediction)
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        self.prediction.as_ref().map(|(p, _)| p)
    }

    pub fn polarity(&self) -> FeedbackPolarity {
        self.polarity
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Labels offered for a corrected classification.
    pub fn options(&self) -> Vec<String> {
        self.prediction()
            .map(PredictionResult::feedback_options)
            .unwrap_or_default()
    }

    /// Switching to positive discards any held suggestion.
    pub fn set_polarity(&mut self, polarity: FeedbackPolarity) {
        self.polarity = polarity;
        if polarity == FeedbackPolarity::Positive {
            self.suggestion = None;
        }
    }

    /// Pick a corrected classification from the prediction's options.
    pub fn select_suggestion(&mut self, label: &str) -> Result<()> {
        if self.polarity != FeedbackPolarity::Negative {
            return Err(Error::Validation(
                "a correction can only be suggested for negative feedback".to_string(),
            ));
        }
        if !self.options().iter().any(|o| o == label) {
            return Err(Error::Validation(format!(
                "{:?} is not one of the offered classifications",
                label
            )));
        }
        self.suggestion = Some(label.to_string());
        Ok(())
    }

    /// Build the submission for the current state.
    pub fn submission(&self) -> Result<FeedbackSubmission> {
        let (prediction, classification) = self.prediction.as_ref().ok_or_else(|| {
            Error::Validation("no prediction available; make a prediction first".to_string())
        })?;

        Ok(FeedbackSubmission::new(
            prediction.id.clone(),
            classification.clone(),
            self.polarity,
            self.suggestion.clone(),
        ))
    }
}
