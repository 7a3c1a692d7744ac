use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ProviderError;

/// Send `request` and decode a JSON body, mapping every failure onto
/// [`ProviderError`] so callers can tell transient failures from permanent ones.
pub async fn send_json<R>(
    provider: &str,
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<R, ProviderError>
where
    R: DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e, timeout))?;

    let status = response.status();
    debug!(provider, status = status.as_u16(), "provider responded");

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|e| ProviderError::invalid_response(provider, format!("failed to parse response: {e}")))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
