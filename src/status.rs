use log::{debug, warn};
use serde_json::{Map, Value};

use crate::errors::Error;
use crate::transport::Response;

/// Check a response against the status codes an endpoint documents as successful.
///
/// The response is handed back untouched when its status is accepted. Otherwise the body is read
/// as the JSON error payload (an empty object if it is empty or not JSON) and the call fails with
/// [Error::UnexpectedResponse].
pub(crate) async fn expect_status(
    response: Response,
    endpoint: &str,
    expected: &[u16],
) -> Result<Response, Error> {
    let actual = response.status();
    if expected.contains(&actual) {
        debug!("{} responded with expected status {}", endpoint, actual);
        return Ok(response);
    }

    let payload = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            if !bytes.is_empty() {
                warn!("Error payload from {} is not JSON: {}", endpoint, e);
            }
            Value::Object(Map::new())
        }),
        Err(e) => {
            warn!("Could not read error payload from {}: {}", endpoint, e);
            Value::Object(Map::new())
        }
    };

    Err(Error::UnexpectedResponse {
        endpoint: endpoint.to_string(),
        actual,
        expected: expected.first().copied().unwrap_or_default(),
        payload,
    })
}
