//! Client library for the plant-disease identification service.
//!
//! This crate is the network boundary of the plantdoc front-end: it submits
//! images for prediction, records feedback, and fetches heatmap data and
//! metrics, normalizing every outcome into a payload or an error descriptor.

pub mod client;
pub mod config;
pub mod error;
pub mod heatmap;
mod http;
pub mod models;
pub mod session;

pub use client::ApiClient;
pub use config::{Config, Endpoint, HeaderPreset};
pub use error::{into_json, ApiResult, Error, ErrorDescriptor, Result};
pub use heatmap::{ClusterSummary, HeatmapPoint, HeatmapQuery, HeatmapResult};
pub use models::{
    Classification, ConfidenceBand, DiseaseDetails, FeedbackPolarity, FeedbackSubmission,
    ImageUpload, Location, Metrics, PredictionResult,
};
pub use session::FeedbackSession;
