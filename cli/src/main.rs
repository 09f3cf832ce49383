//! plantdoc - command-line front-end for the plant-disease identification service.
//!
//! Commands:
//! - predict <image> [--lat <deg>] [--lon <deg>]
//! - feedback <prediction.json> <positive|negative> [suggestion]
//! - heatmap <kind> [key=value ...]
//! - metrics
//!
//! Results are printed as JSON; failures come out as `{"error": "..."}`.
//! A short human-readable summary of successful results goes to stderr.

use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use plantdoc_client::{
    into_json, ApiClient, ApiResult, ErrorDescriptor, FeedbackPolarity, FeedbackSession,
    HeatmapQuery, HeatmapResult, ImageUpload, Location, Metrics, PredictionResult,
};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  plantdoc predict <image> [--lat <deg>] [--lon <deg>]
  plantdoc feedback <prediction.json> <positive|negative> [suggestion]
  plantdoc heatmap <by_days|by_location|seasonal_clusters|nearby_points> [key=value ...]
  plantdoc metrics";

#[derive(Debug, PartialEq)]
enum Command {
    Predict {
        image: String,
        latitude: Option<String>,
        longitude: Option<String>,
    },
    Feedback {
        prediction_file: String,
        polarity: FeedbackPolarity,
        suggestion: Option<String>,
    },
    Heatmap {
        kind: String,
        params: Map<String, Value>,
    },
    Metrics,
}

/// Which typed view a successful payload is summarized with.
#[derive(Debug, Clone, Copy, PartialEq)]
enum View {
    Prediction,
    Feedback,
    Heatmap,
    Metrics,
}

impl Command {
    fn view(&self) -> View {
        match self {
            Command::Predict { .. } => View::Prediction,
            Command::Feedback { .. } => View::Feedback,
            Command::Heatmap { .. } => View::Heatmap,
            Command::Metrics => View::Metrics,
        }
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let (name, rest) = args.split_first().ok_or_else(|| anyhow!("missing command"))?;

    match name.as_str() {
        "predict" => {
            let (image, flags) = rest
                .split_first()
                .ok_or_else(|| anyhow!("predict needs an image path"))?;
            let mut latitude = None;
            let mut longitude = None;
            let mut flags = flags.iter();
            while let Some(flag) = flags.next() {
                let value = flags
                    .next()
                    .ok_or_else(|| anyhow!("{} needs a value", flag))?
                    .clone();
                match flag.as_str() {
                    "--lat" => latitude = Some(value),
                    "--lon" => longitude = Some(value),
                    other => bail!("unknown flag: {}", other),
                }
            }
            Ok(Command::Predict {
                image: image.clone(),
                latitude,
                longitude,
            })
        }
        "feedback" => match rest {
            [file, polarity, suggestion @ ..] if suggestion.len() <= 1 => Ok(Command::Feedback {
                prediction_file: file.clone(),
                polarity: polarity.parse()?,
                suggestion: suggestion.first().cloned(),
            }),
            _ => bail!("feedback needs a prediction file and a polarity"),
        },
        "heatmap" => {
            let (kind, pairs) = rest
                .split_first()
                .ok_or_else(|| anyhow!("heatmap needs a filter kind"))?;
            let mut params = Map::new();
            for pair in pairs {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected key=value, got {:?}", pair))?;
                params.insert(key.to_string(), Value::String(value.to_string()));
            }
            Ok(Command::Heatmap {
                kind: kind.clone(),
                params,
            })
        }
        "metrics" if rest.is_empty() => Ok(Command::Metrics),
        other => bail!("unknown command: {}", other),
    }
}

/// Human-readable lines describing a successful payload.
fn summary_lines(view: View, payload: &Value) -> Vec<String> {
    match view {
        View::Prediction => match PredictionResult::from_value(payload) {
            Ok(prediction) => {
                let classification = &prediction.classification;
                let mut lines = vec![format!(
                    "{}: {:.2}% confidence ({:?})",
                    classification.class_name,
                    classification.confidence_percent(),
                    classification.confidence_band()
                )];
                if !prediction.disease_details.solutions.is_empty() {
                    lines.push(format!(
                        "Treatment: {}",
                        prediction.disease_details.solutions.join("; ")
                    ));
                }
                lines
            }
            Err(_) => Vec::new(),
        },
        View::Feedback => vec!["Thank you for your feedback!".to_string()],
        View::Heatmap => {
            let heatmap = HeatmapResult::from_value(payload);
            let (lat, lon) = heatmap.map_center();
            let mut lines = vec![format!(
                "{} points, {} clusters, centered at {:.5}, {:.5}",
                heatmap.points.len(),
                heatmap.clusters.len(),
                lat,
                lon
            )];
            lines.extend(
                heatmap
                    .disease_totals()
                    .into_iter()
                    .map(|(name, count)| format!("{}: {}", name, count)),
            );
            lines
        }
        View::Metrics => Metrics::from_value(payload)
            .counters()
            .into_iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect(),
    }
}

async fn run(client: &ApiClient, command: Command) -> anyhow::Result<ApiResult> {
    let result = match command {
        Command::Predict {
            image,
            latitude,
            longitude,
        } => {
            let location = Location::parse(
                latitude.as_deref().unwrap_or_default(),
                longitude.as_deref().unwrap_or_default(),
            )?;
            let upload = ImageUpload::from_path(&image).await?;
            info!("Submitting {} ({} bytes)", upload.filename, upload.bytes.len());
            client
                .predict(upload, (!location.is_empty()).then_some(location))
                .await
        }
        Command::Feedback {
            prediction_file,
            polarity,
            suggestion,
        } => {
            let raw = tokio::fs::read_to_string(&prediction_file)
                .await
                .with_context(|| format!("Failed to read {}", prediction_file))?;
            let payload: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", prediction_file))?;

            let mut session = FeedbackSession::new();
            session.record_prediction(payload)?;
            session.set_polarity(polarity);
            if let Some(label) = suggestion {
                session.select_suggestion(&label)?;
            }
            client.send_feedback(&session.submission()?).await
        }
        Command::Heatmap { kind, params } => match HeatmapQuery::from_kind(&kind, &params) {
            Ok(query) => {
                info!(kind = query.kind(), "Fetching heatmap data");
                client.fetch_heatmap(&query).await
            }
            Err(e) => Err(ErrorDescriptor::from(e)),
        },
        Command::Metrics => client.get_metrics().await,
    };
    Ok(result)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    let client = match ApiClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let view = command.view();
    let result = match run(&client, command).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    if let Ok(payload) = &result {
        for line in summary_lines(view, payload) {
            eprintln!("{}", line);
        }
    }

    let failed = result.is_err();
    let output = into_json(result);
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Failed to render result: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
