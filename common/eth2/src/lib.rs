//! This crate provides:
//!
//! 1. The types returned by the standard beacon node HTTP API endpoints the attacker service
//!    depends on.
//! 2. A wrapper around `reqwest` that forms a HTTP client for those endpoints.
//! 3. A minimal JSON-RPC client for reading the head of an execution node.

pub mod types;

use self::types::*;
pub use reqwest;
use reqwest::{header::ACCEPT, IntoUrl, Response};
pub use reqwest::{StatusCode, Url};
pub use sensitive_url::{SensitiveError, SensitiveUrl};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::time::Duration;

/// Every endpoint used here lives under the `/eth/v1` prefix.
const API_PREFIX: [&str; 2] = ["eth", "v1"];

#[derive(Debug)]
pub enum Error {
    /// The `reqwest` client raised an error.
    HttpClient(reqwest::Error),
    /// The server returned an error message where the body was able to be parsed.
    ServerMessage(ErrorMessage),
    /// The server returned an error message where the body was unable to be parsed.
    StatusCode(StatusCode),
    /// The supplied URL is badly formatted. It should look something like `http://127.0.0.1:5052`.
    InvalidUrl(SensitiveUrl),
    /// The server returned an invalid JSON response.
    InvalidJson(serde_json::Error),
    /// The execution node answered a JSON-RPC call with an error object.
    JsonRpc { code: i64, message: String },
    /// The execution node answered with a result we could not interpret.
    InvalidJsonRpcResult(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::HttpClient(error)
    }
}

impl Error {
    /// If the error has a HTTP status code, return it.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpClient(error) => error.status(),
            Error::ServerMessage(msg) => StatusCode::try_from(msg.code).ok(),
            Error::StatusCode(status) => Some(*status),
            Error::InvalidUrl(_) => None,
            Error::InvalidJson(_) => None,
            Error::JsonRpc { .. } => None,
            Error::InvalidJsonRpcResult(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Per-endpoint request timeouts.
#[derive(Clone, Debug)]
pub struct Timeouts {
    pub proposer_duties: Duration,
    pub attester_duties: Duration,
    pub default: Duration,
}

impl Timeouts {
    pub fn set_all(timeout: Duration) -> Self {
        Timeouts {
            proposer_duties: timeout,
            attester_duties: timeout,
            default: timeout,
        }
    }
}

/// A wrapper around `reqwest::Client` which provides convenience methods for interfacing with a
/// standard beacon node HTTP server.
#[derive(Clone)]
pub struct BeaconNodeHttpClient {
    client: reqwest::Client,
    server: SensitiveUrl,
    timeouts: Timeouts,
}

impl fmt::Display for BeaconNodeHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.server.fmt(f)
    }
}

impl AsRef<str> for BeaconNodeHttpClient {
    fn as_ref(&self) -> &str {
        self.server.as_ref()
    }
}

impl BeaconNodeHttpClient {
    pub fn new(server: SensitiveUrl, timeouts: Timeouts) -> Self {
        Self {
            client: reqwest::Client::new(),
            server,
            timeouts,
        }
    }

    /// Append `segments` to the server URL under the API prefix.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.server.full.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.clone()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn get_response<U: IntoUrl>(&self, url: U, timeout: Duration) -> Result<Response, Error> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        ok_or_error(response).await
    }

    async fn get_json<T: DeserializeOwned, U: IntoUrl>(
        &self,
        url: U,
        timeout: Duration,
    ) -> Result<T, Error> {
        Ok(self.get_response(url, timeout).await?.json().await?)
    }

    /// As `get_json`, but a 404 becomes `Ok(None)`.
    async fn get_json_opt<T: DeserializeOwned, U: IntoUrl>(
        &self,
        url: U,
    ) -> Result<Option<T>, Error> {
        match self.get_response(url, self.timeouts.default).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn post_json<T: DeserializeOwned, U: IntoUrl, V: Serialize>(
        &self,
        url: U,
        body: &V,
        timeout: Duration,
    ) -> Result<T, Error> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        Ok(ok_or_error(response).await?.json().await?)
    }

    /// `GET beacon/genesis`
    pub async fn get_beacon_genesis(&self) -> Result<GenericResponse<GenesisData>, Error> {
        let url = self.endpoint(&["beacon", "genesis"])?;
        self.get_json(url, self.timeouts.default).await
    }

    /// `GET beacon/blocks/{block_id}/root`
    ///
    /// Returns `Ok(None)` on a 404 error.
    pub async fn get_beacon_blocks_root(
        &self,
        block_id: BlockId,
    ) -> Result<Option<GenericResponse<RootData>>, Error> {
        let url = self.endpoint(&["beacon", "blocks", &block_id.to_string(), "root"])?;
        self.get_json_opt(url).await
    }

    /// `GET config/spec`
    pub async fn get_config_spec(&self) -> Result<GenericResponse<ConfigSpecData>, Error> {
        let url = self.endpoint(&["config", "spec"])?;
        self.get_json(url, self.timeouts.default).await
    }

    /// `GET validator/duties/proposer/{epoch}`
    pub async fn get_validator_duties_proposer(
        &self,
        epoch: Epoch,
    ) -> Result<DutiesResponse<Vec<ProposerData>>, Error> {
        let url = self.endpoint(&["validator", "duties", "proposer", &epoch.to_string()])?;
        self.get_json(url, self.timeouts.proposer_duties).await
    }

    /// `POST validator/duties/attester/{epoch}`
    pub async fn post_validator_duties_attester(
        &self,
        epoch: Epoch,
        indices: &[u64],
    ) -> Result<DutiesResponse<Vec<AttesterData>>, Error> {
        let url = self.endpoint(&["validator", "duties", "attester", &epoch.to_string()])?;
        self.post_json(
            url,
            &ValidatorIndexDataRef(indices),
            self.timeouts.attester_duties,
        )
        .await
    }
}

/// A JSON-RPC client for the few execution node calls the attacker service makes.
#[derive(Clone)]
pub struct ExecutionHttpClient {
    client: reqwest::Client,
    server: SensitiveUrl,
    timeout: Duration,
}

impl fmt::Display for ExecutionHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.server.fmt(f)
    }
}

impl ExecutionHttpClient {
    pub fn new(server: SensitiveUrl, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            server,
            timeout,
        }
    }

    async fn rpc_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, Error> {
        let body = JsonRequestBody {
            jsonrpc: "2.0",
            method,
            params,
            id: serde_json::json!(1),
        };

        let response = self
            .client
            .post(self.server.full.clone())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let body: JsonResponseBody = ok_or_error(response).await?.json().await?;

        if let Some(error) = body.error {
            return Err(Error::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(body.result).map_err(Error::InvalidJson)
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64, Error> {
        let hex: String = self
            .rpc_request("eth_blockNumber", serde_json::json!([]))
            .await?;
        parse_quantity(&hex)
    }
}

/// Parse an execution-layer hex "quantity" such as `0x1b4`.
pub fn parse_quantity(quantity: &str) -> Result<u64, Error> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidJsonRpcResult(format!("missing 0x prefix: {}", quantity)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::InvalidJsonRpcResult(format!("{}: {}", quantity, e)))
}

/// Returns `Ok(response)` if the response is a `200 OK` response. Otherwise, creates an
/// appropriate error message.
pub async fn ok_or_error(response: Response) -> Result<Response, Error> {
    let status = response.status();

    if status == StatusCode::OK {
        Ok(response)
    } else if let Ok(message) = response.json().await {
        Err(Error::ServerMessage(message))
    } else {
        Err(Error::StatusCode(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_server_prefix() {
        let server = SensitiveUrl::parse("http://localhost:5052/proxy/").unwrap();
        let client = BeaconNodeHttpClient::new(server, Timeouts::set_all(Duration::from_secs(1)));
        let url = client.endpoint(&["config", "spec"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5052/proxy/eth/v1/config/spec");

        let server = SensitiveUrl::parse("http://localhost:5052").unwrap();
        let client = BeaconNodeHttpClient::new(server, Timeouts::set_all(Duration::from_secs(1)));
        let url = client.endpoint(&["beacon", "genesis"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5052/eth/v1/beacon/genesis");
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("1b4").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn server_message_carries_status() {
        let err = Error::ServerMessage(ErrorMessage {
            code: 404,
            message: "NOT_FOUND".into(),
            stacktraces: vec![],
        });
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }
}
