use super::protocol::{ENDPOINT_SUBMIT, SubmitRecordRequest, SubmitRecordResponse};
use crate::error::ForwardingError;

use async_trait::async_trait;

/// Outbound half of the RPC channel: delivers a record to the node at `address`.
///
/// Implementations make exactly one attempt. Whatever timeout applies is the
/// transport's own default.
#[async_trait]
pub trait RecordTransport: Send + Sync {
    async fn submit(
        &self,
        address: &str,
        request: &SubmitRecordRequest,
    ) -> Result<SubmitRecordResponse, ForwardingError>;
}

/// JSON-over-HTTP transport talking to another node's [`ENDPOINT_SUBMIT`].
#[derive(Clone, Default)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn url(&self, address: &str) -> String {
        format!("http://{}{}", address, ENDPOINT_SUBMIT)
    }
}

#[async_trait]
impl RecordTransport for HttpTransport {
    async fn submit(
        &self,
        address: &str,
        request: &SubmitRecordRequest,
    ) -> Result<SubmitRecordResponse, ForwardingError> {
        let transport_error = |e: reqwest::Error| ForwardingError::Transport {
            address: address.to_string(),
            message: e.to_string(),
        };

        let response = self
            .http_client
            .post(self.url(address))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body: SubmitRecordResponse = response.json().await.map_err(transport_error)?;

        if !status.is_success() || !body.is_success() {
            return Err(ForwardingError::Rejected {
                address: address.to_string(),
                detail: body
                    .detail
                    .unwrap_or_else(|| format!("status {}", status)),
            });
        }
        Ok(body)
    }
}
