//! Heatmap queries and results.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{as_number, check_latitude, check_longitude};
use crate::{Error, Result};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Map center used when a result has no clusters.
pub const DEFAULT_MAP_CENTER: (f64, f64) = (13.01654, 77.57069);

/// A filtered request for heatmap data.
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapQuery {
    ByDays {
        days: u32,
        page: u32,
        per_page: u32,
    },
    ByLocation {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },
    SeasonalClusters {
        seasonal: bool,
        clusters: u32,
    },
    NearbyPoints {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        days: u32,
    },
}

impl HeatmapQuery {
    /// Observations from the last `days` days, first page.
    pub fn by_days(days: u32) -> Self {
        HeatmapQuery::ByDays {
            days,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HeatmapQuery::ByDays { .. } => "by_days",
            HeatmapQuery::ByLocation { .. } => "by_location",
            HeatmapQuery::SeasonalClusters { .. } => "seasonal_clusters",
            HeatmapQuery::NearbyPoints { .. } => "nearby_points",
        }
    }

    /// Build a query from a filter-kind tag and loosely typed parameters.
    ///
    /// The tag is matched case-insensitively with spaces treated as
    /// underscores, so `"Nearby Points"` selects `nearby_points`.
    pub fn from_kind(kind: &str, params: &Map<String, Value>) -> Result<Self> {
        let normalized = kind.trim().to_lowercase().replace(' ', "_");
        let query = match normalized.as_str() {
            "by_days" => HeatmapQuery::ByDays {
                days: required_count(params, "days")?,
                page: optional_count(params, "page")?.unwrap_or(DEFAULT_PAGE),
                per_page: optional_count(params, "per_page")?.unwrap_or(DEFAULT_PER_PAGE),
            },
            "by_location" => HeatmapQuery::ByLocation {
                latitude: required_number(params, "latitude")?,
                longitude: required_number(params, "longitude")?,
                radius_km: required_number(params, "radius")?,
            },
            "seasonal_clusters" => HeatmapQuery::SeasonalClusters {
                seasonal: required_flag(params, "seasonal")?,
                clusters: required_count(params, "clusters")?,
            },
            "nearby_points" => HeatmapQuery::NearbyPoints {
                latitude: required_number(params, "latitude")?,
                longitude: required_number(params, "longitude")?,
                radius_km: required_number(params, "radius")?,
                days: required_count(params, "days")?,
            },
            _ => {
                return Err(Error::Validation(format!(
                    "unknown heatmap filter kind: {:?}",
                    kind
                )))
            }
        };
        query.validate()?;
        Ok(query)
    }

    /// Check the parameter constraints for this kind.
    pub fn validate(&self) -> Result<()> {
        match self {
            HeatmapQuery::ByDays {
                days,
                page,
                per_page,
            } => {
                positive("days", *days)?;
                positive("page", *page)?;
                positive("per_page", *per_page)
            }
            HeatmapQuery::ByLocation {
                latitude,
                longitude,
                radius_km,
            } => {
                check_latitude(*latitude)?;
                check_longitude(*longitude)?;
                check_radius(*radius_km)
            }
            HeatmapQuery::SeasonalClusters { clusters, .. } => positive("clusters", *clusters),
            HeatmapQuery::NearbyPoints {
                latitude,
                longitude,
                radius_km,
                days,
            } => {
                check_latitude(*latitude)?;
                check_longitude(*longitude)?;
                check_radius(*radius_km)?;
                positive("days", *days)
            }
        }
    }

    /// Query-string parameters sent to the heatmap endpoint.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            HeatmapQuery::ByDays {
                days,
                page,
                per_page,
            } => vec![
                ("days", days.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
            HeatmapQuery::ByLocation {
                latitude,
                longitude,
                radius_km,
            } => vec![
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("radius", radius_km.to_string()),
            ],
            HeatmapQuery::SeasonalClusters { seasonal, clusters } => vec![
                ("seasonal", u8::from(*seasonal).to_string()),
                ("clusters", clusters.to_string()),
            ],
            HeatmapQuery::NearbyPoints {
                latitude,
                longitude,
                radius_km,
                days,
            } => vec![
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("radius", radius_km.to_string()),
                ("days", days.to_string()),
            ],
        }
    }
}

fn positive(name: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::Validation(format!("{} must be at least 1", name)));
    }
    Ok(())
}

fn check_radius(radius_km: f64) -> Result<()> {
    if radius_km.is_finite() && radius_km > 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "radius must be a positive number of km, got {}",
            radius_km
        )))
    }
}

fn param<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    params
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::Validation(format!("missing parameter: {}", key)))
}

fn required_number(params: &Map<String, Value>, key: &str) -> Result<f64> {
    let value = param(params, key)?;
    as_number(value)
        .ok_or_else(|| Error::Validation(format!("{} must be a number, got {}", key, value)))
}

fn as_count(key: &str, value: &Value) -> Result<u32> {
    as_number(value)
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
        .ok_or_else(|| {
            Error::Validation(format!("{} must be a whole number, got {}", key, value))
        })
}

fn required_count(params: &Map<String, Value>, key: &str) -> Result<u32> {
    as_count(key, param(params, key)?)
}

fn optional_count(params: &Map<String, Value>, key: &str) -> Result<Option<u32>> {
    match params.get(key).filter(|v| !v.is_null()) {
        Some(value) => as_count(key, value).map(Some),
        None => Ok(None),
    }
}

fn required_flag(params: &Map<String, Value>, key: &str) -> Result<bool> {
    let value = param(params, key)?;
    let flag = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(true),
            Some(x) if x == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    };
    flag.ok_or_else(|| Error::Validation(format!("{} must be a boolean flag, got {}", key, value)))
}

/// One reported observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: Option<f64>,
    pub disease: Option<String>,
    pub color: Option<String>,
}

/// Summary of one cluster of observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub center: (f64, f64),
    pub size: f64,
    pub cluster_id: Option<Value>,
    pub diseases: BTreeMap<String, u64>,
}

/// Observations and cluster summaries returned by the heatmap endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatmapResult {
    pub points: Vec<HeatmapPoint>,
    pub clusters: Vec<ClusterSummary>,
}

impl HeatmapResult {
    /// Decode a heatmap payload, skipping entries without usable coordinates.
    pub fn from_value(value: &Value) -> Self {
        let points = entries(value, "points")
            .filter_map(|p| {
                let point = decode_point(p);
                if point.is_none() {
                    debug!("Skipping heatmap point without valid coordinates: {}", p);
                }
                point
            })
            .collect();

        let clusters = entries(value, "clusters")
            .filter_map(|c| {
                let cluster = decode_cluster(c);
                if cluster.is_none() {
                    debug!("Skipping cluster without a valid center: {}", c);
                }
                cluster
            })
            .collect();

        Self { points, clusters }
    }

    /// Center of the first cluster, or the default center.
    pub fn map_center(&self) -> (f64, f64) {
        self.clusters
            .first()
            .map(|c| c.center)
            .unwrap_or(DEFAULT_MAP_CENTER)
    }

    /// Disease counts summed across every cluster.
    pub fn disease_totals(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for cluster in &self.clusters {
            for (name, count) in &cluster.diseases {
                *totals.entry(name.clone()).or_insert(0) += count;
            }
        }
        totals
    }
}

fn entries<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
}

fn coordinates(value: &Value) -> Option<(f64, f64)> {
    let lat = as_number(value.get("latitude")?)?;
    let lon = as_number(value.get("longitude")?)?;
    if check_latitude(lat).is_ok() && check_longitude(lon).is_ok() {
        Some((lat, lon))
    } else {
        None
    }
}

fn decode_point(value: &Value) -> Option<HeatmapPoint> {
    let (latitude, longitude) = coordinates(value)?;
    Some(HeatmapPoint {
        latitude,
        longitude,
        confidence: value.get("confidence").and_then(as_number),
        disease: value
            .get("disease")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        color: value
            .get("color")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

fn decode_cluster(value: &Value) -> Option<ClusterSummary> {
    let center = coordinates(value.get("center")?)?;
    let diseases = value
        .get("diseases")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(name, count)| count.as_u64().map(|c| (name.clone(), c)))
                .collect()
        })
        .unwrap_or_default();

    Some(ClusterSummary {
        center,
        size: value.get("size").and_then(as_number).unwrap_or(0.0),
        cluster_id: value.get("cluster_id").cloned(),
        diseases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_by_days_defaults_paging() {
        let query = HeatmapQuery::from_kind("by_days", &params(json!({"days": 15}))).unwrap();
        assert_eq!(
            query.query_params(),
            vec![
                ("days", "15".to_string()),
                ("page", "1".to_string()),
                ("per_page", "50".to_string()),
            ]
        );
    }

    #[test]
    fn test_nearby_points_sends_exactly_four_params() {
        let query = HeatmapQuery::from_kind(
            "nearby_points",
            &params(json!({"latitude": 1.0, "longitude": 2.0, "radius": 5, "days": 7})),
        )
        .unwrap();
        assert_eq!(
            query.query_params(),
            vec![
                ("latitude", "1".to_string()),
                ("longitude", "2".to_string()),
                ("radius", "5".to_string()),
                ("days", "7".to_string()),
            ]
        );
    }

    #[test]
    fn test_by_location_sends_coordinates_and_radius() {
        let query = HeatmapQuery::from_kind(
            "by_location",
            &params(json!({"latitude": 34.0522, "longitude": -118.2437, "radius": 10.5})),
        )
        .unwrap();
        assert_eq!(query.kind(), "by_location");
        assert_eq!(
            query.query_params(),
            vec![
                ("latitude", "34.0522".to_string()),
                ("longitude", "-118.2437".to_string()),
                ("radius", "10.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_kind_accepts_display_labels_and_string_values() {
        let query = HeatmapQuery::from_kind(
            "Seasonal Clusters",
            &params(json!({"seasonal": "1", "clusters": "3"})),
        )
        .unwrap();
        assert_eq!(
            query,
            HeatmapQuery::SeasonalClusters {
                seasonal: true,
                clusters: 3
            }
        );
        assert_eq!(
            query.query_params(),
            vec![("seasonal", "1".to_string()), ("clusters", "3".to_string())]
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = HeatmapQuery::from_kind("by_weather", &Map::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(HeatmapQuery::from_kind("by_days", &params(json!({"days": 0}))).is_err());
        assert!(HeatmapQuery::from_kind("by_days", &params(json!({"days": 2.5}))).is_err());
        assert!(HeatmapQuery::from_kind("by_days", &Map::new()).is_err());
        assert!(HeatmapQuery::from_kind(
            "by_location",
            &params(json!({"latitude": 95.0, "longitude": 0.0, "radius": 10}))
        )
        .is_err());
        assert!(HeatmapQuery::from_kind(
            "by_location",
            &params(json!({"latitude": 10.0, "longitude": 0.0, "radius": -1}))
        )
        .is_err());
        assert!(HeatmapQuery::from_kind(
            "seasonal_clusters",
            &params(json!({"seasonal": "maybe", "clusters": 2}))
        )
        .is_err());
    }

    #[test]
    fn test_result_skips_invalid_points_and_centers_on_first_cluster() {
        let result = HeatmapResult::from_value(&json!({
            "points": [
                {"latitude": 13.0, "longitude": 77.5, "confidence": 0.9},
                {"latitude": "12.5", "longitude": "77.1", "disease": "Rust"},
                {"latitude": 123.0, "longitude": 0.0},
                {"latitude": null, "longitude": 1.0}
            ],
            "clusters": [
                {
                    "center": {"latitude": 12.9, "longitude": 77.6},
                    "size": 4,
                    "cluster_id": 0,
                    "diseases": {"Rust": 3, "Blight": 1}
                },
                {
                    "center": {"latitude": 13.1, "longitude": 77.4},
                    "size": 2,
                    "cluster_id": 1,
                    "diseases": {"Rust": 2}
                }
            ]
        }));

        assert_eq!(result.points.len(), 2);
        assert_eq!(result.points[1].disease.as_deref(), Some("Rust"));
        assert_eq!(result.map_center(), (12.9, 77.6));

        let totals = result.disease_totals();
        assert_eq!(totals.get("Rust"), Some(&5));
        assert_eq!(totals.get("Blight"), Some(&1));
    }

    #[test]
    fn test_empty_result_uses_default_center() {
        let result = HeatmapResult::from_value(&json!({}));
        assert!(result.points.is_empty());
        assert_eq!(result.map_center(), DEFAULT_MAP_CENTER);
    }
}
