use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use url::Url;

use crate::{error::Error, settings::EtherscanSettings};

/// Explorer replies at most this many rows per account-transaction request;
/// a page of exactly this size means more data is pending.
pub const PAGE_SIZE: usize = 10_000;

const NOT_VERIFIED: &str = "Contract source code not verified";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxListKind {
    Normal,
    Internal,
}

impl TxListKind {
    fn action(self) -> &'static str {
        match self {
            TxListKind::Normal => "txlist",
            TxListKind::Internal => "txlistinternal",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TxListKind::Normal => "NORMAL",
            TxListKind::Internal => "INTERNAL",
        }
    }
}

/// One row of the account transaction lists. The explorer reports every
/// field as a string; only the columns the pipeline consumes are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountTx {
    pub hash: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    message: String,
    result: Value,
}

/// Client for the Etherscan-compatible explorer API, shared by the
/// transaction enumerator and the ABI registry.
#[derive(Clone)]
pub struct EtherscanClient {
    base_url: Url,
    api_key: String,
    request_delay: Duration,
    client: ClientWithMiddleware,
}

impl EtherscanClient {
    pub fn new(settings: &EtherscanSettings) -> Result<Self, Error> {
        let base_url = Url::parse(&settings.base_url)?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self {
            base_url,
            api_key: settings.api_key.clone(),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            client,
        })
    }

    /// One page of normal or internal transactions of an account inside
    /// `[start_block, end_block]`. An empty result with status `0` is a
    /// regular "no transactions found" answer, not an error.
    pub async fn tx_list(
        &self,
        kind: TxListKind,
        address: &str,
        start_block: u64,
        end_block: u64,
    ) -> Result<Vec<AccountTx>, Error> {
        let response = self
            .request(&[
                ("module", "account"),
                ("action", kind.action()),
                ("address", address),
                ("startblock", &start_block.to_string()),
                ("endblock", &end_block.to_string()),
            ])
            .await?;
        if response.status == "1" {
            return serde_json::from_value(response.result).map_err(|err| {
                Error::Protocol(format!("malformed transaction list for {address}: {err}"))
            });
        }
        if response.result.as_array().map_or(false, Vec::is_empty) {
            tracing::debug!(address, "0 transactions for the contract");
            return Ok(Vec::new());
        }
        Err(Error::Protocol(format!(
            "explorer rejected {} transaction list for {address}: {}",
            kind.label(),
            response.message
        )))
    }

    /// The verified ABI of a contract as raw JSON. The source-not-verified
    /// answer is definitive: it is reported as [`Error::NotVerified`] and
    /// must not be retried by callers.
    pub async fn get_abi(&self, address: &str) -> Result<String, Error> {
        let response = self
            .request(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address),
            ])
            .await?;
        let result = match response.result {
            Value::String(result) => result,
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected getabi result for {address}: {other}"
                )))
            }
        };
        if result == NOT_VERIFIED {
            return Err(Error::NotVerified(address.to_string()));
        }
        if response.status != "1" {
            return Err(Error::Protocol(format!(
                "explorer rejected getabi for {address}: {}",
                response.message
            )));
        }
        Ok(result)
    }

    async fn request(&self, params: &[(&str, &str)]) -> Result<ApiResponse, Error> {
        // Recovery time between requests keeps the explorer from throttling
        // the run; transient failures are retried by the middleware.
        sleep(self.request_delay).await;
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("apikey", &self.api_key);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "explorer returned status {}",
                response.status()
            )));
        }
        response
            .json::<ApiResponse>()
            .await
            .map_err(|err| Error::Protocol(format!("malformed explorer response: {err}")))
    }
}
