use std::{future::Future, time::Duration};

use ethers::{
    providers::{Http, Middleware, Provider, ProviderError, RpcError},
    types::{Filter, Log},
};
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    error::Error,
    settings::NodeSettings,
    types::{parse_address, parse_hash},
};

/// JSON-RPC client against the archive node. Every operation retries up to
/// the configured attempt budget with a fixed delay; a well-formed JSON-RPC
/// error response is treated as a definitive verdict and not retried.
#[derive(Clone)]
pub struct NodeClient {
    provider: Provider<Http>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl NodeClient {
    pub fn new(settings: &NodeSettings) -> Result<Self, Error> {
        let url = settings.url();
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|err| Error::Config(format!("invalid node url {url}: {err}")))?;
        Ok(Self {
            provider,
            max_attempts: settings.max_attempts.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        })
    }

    /// Connection preflight; also handy as a cheap smoke call in tests.
    pub async fn block_number(&self) -> Result<u64, Error> {
        let number = self
            .retry("eth_blockNumber", || self.provider.get_block_number())
            .await?;
        Ok(number.as_u64())
    }

    /// Recomputes the call tree of one transaction with the call tracer.
    ///
    /// A response is valid only when the result is an object carrying a
    /// `type` field; anything else (transport error, malformed JSON, missing
    /// `type`) consumes one attempt. After the budget is exhausted the
    /// transaction is reported invalid and the caller skips it.
    pub async fn trace_transaction(&self, tx_hash: &str) -> Result<Value, Error> {
        let params = [
            json!(tx_hash),
            json!({"tracer": "callTracer", "tracerConfig": {"withLog": true}}),
        ];
        let mut attempt = 0;
        loop {
            let outcome: Result<Value, ProviderError> = self
                .provider
                .request("debug_traceTransaction", params.clone())
                .await;
            match outcome {
                Ok(value)
                    if value
                        .as_object()
                        .map_or(false, |node| node.contains_key("type")) =>
                {
                    return Ok(value)
                }
                Ok(_) => {
                    tracing::warn!(tx_hash, attempt, "unexpected trace shape, retrying");
                }
                Err(err) => {
                    if let Some(rpc_err) = err.as_error_response() {
                        return Err(Error::Protocol(format!(
                            "node rejected trace request for {tx_hash}: {rpc_err}"
                        )));
                    }
                    tracing::warn!(tx_hash, attempt, error = %err, "trace request failed, retrying");
                }
            }
            attempt += 1;
            if attempt >= self.max_attempts {
                return Err(Error::Protocol(format!(
                    "no valid trace for {tx_hash} after {attempt} attempts"
                )));
            }
            sleep(self.retry_delay).await;
        }
    }

    /// Event logs of one contract over an inclusive block window. Callers
    /// chunk the range so each request stays bounded.
    pub async fn get_logs(
        &self,
        address: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, Error> {
        let address = parse_address(address)?;
        let filter = Filter::new()
            .address(address)
            .from_block(from_block)
            .to_block(to_block);
        self.retry("eth_getLogs", || self.provider.get_logs(&filter))
            .await
    }

    pub async fn transaction_index(&self, tx_hash: &str) -> Result<Option<u64>, Error> {
        let hash = parse_hash(tx_hash)?;
        let transaction = self
            .retry("eth_getTransactionByHash", || {
                self.provider.get_transaction(hash)
            })
            .await?;
        Ok(transaction
            .and_then(|tx| tx.transaction_index)
            .map(|index| index.as_u64()))
    }

    pub async fn block_timestamp(&self, block_number: u64) -> Result<u64, Error> {
        let block = self
            .retry("eth_getBlockByNumber", || {
                self.provider.get_block(block_number)
            })
            .await?
            .ok_or_else(|| Error::Protocol(format!("block {block_number} not found")))?;
        Ok(block.timestamp.as_u64())
    }

    /// Deployed bytecode at the latest block. Self-destructed contracts
    /// return empty code even though they once existed, so callers must
    /// treat the answer as advisory.
    pub async fn get_code(&self, address: &str) -> Result<Vec<u8>, Error> {
        let address = parse_address(address)?;
        let code = self
            .retry("eth_getCode", || self.provider.get_code(address, None))
            .await?;
        Ok(code.to_vec())
    }

    async fn retry<T, F, Fut>(&self, op: &'static str, request: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if let Some(rpc_err) = err.as_error_response() {
                        return Err(Error::Protocol(format!("{op}: node returned {rpc_err}")));
                    }
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(Error::Transport(format!(
                            "{op}: {err} (after {attempt} attempts)"
                        )));
                    }
                    tracing::warn!(op, attempt, error = %err, "node request failed, retrying");
                    sleep(self.retry_delay).await;
                }
            }
        }
    }
}
