//! HTTP helpers that turn transport outcomes into [`Error`] values.

use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Endpoint;
use crate::{Error, Result};

/// Map a transport failure onto the error taxonomy.
///
/// Timeouts are checked first: a connect attempt that times out reports both.
pub(crate) fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_connect() {
        Error::Connection
    } else {
        Error::Transport(err.to_string())
    }
}

/// Send a request and decode a successful JSON response.
pub(crate) async fn dispatch(endpoint: Endpoint, request: RequestBuilder) -> Result<Value> {
    debug!(endpoint = endpoint.path(), "Sending request");

    let result = match request.send().await {
        Ok(response) => read_json(response).await,
        Err(e) => Err(classify(e)),
    };

    if let Err(e) = &result {
        warn!(
            endpoint = endpoint.path(),
            status = e.status_code(),
            error = %e,
            "Request failed"
        );
    }
    result
}

/// Decode the body of a response, treating any 2xx status as success.
pub(crate) async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::status(status.as_u16(), &body));
    }

    let bytes = response.bytes().await.map_err(classify)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Undecodable response body: {}", e);
        Error::MalformedResponse(e.to_string())
    })
}
