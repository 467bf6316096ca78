use crate::cashaddr;
use crate::types::{RecipientAddress, TransactionAddresses, TransactionOutput};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://gql.chaingraph.pat.mn/v1/graphql";

/// Fetches run in fixed-size groups with a pause in between so we stay
/// polite to the public endpoint.
const FETCH_GROUP_SIZE: usize = 5;
const FETCH_GROUP_DELAY: Duration = Duration::from_millis(500);

const GET_TRANSACTION_QUERY: &str = r#"
  query GetTransaction($txHash: bytea!) {
    transaction(where: { hash: { _eq: $txHash } }) {
      hash
      block_inclusions {
        block {
          height
          timestamp
        }
      }
      inputs {
        input_index
        outpoint_transaction_hash
        outpoint_index
        unlocking_bytecode
        value_satoshis
      }
      outputs {
        output_index
        locking_bytecode
        value_satoshis
      }
    }
  }
"#;

/// TransactionDataSource
///
/// A generic trait across transaction data providers. `None` means the
/// provider does not know the transaction; transport and protocol failures
/// are errors.
#[async_trait]
pub trait TransactionDataSource {
    async fn transaction_addresses(&self, tx_hash: &str) -> Result<Option<TransactionAddresses>>;
}

/// Map a transaction's outputs to the recipient addresses they pay.
///
/// Outputs whose bytecode is not a standard payment pattern (OP_RETURN,
/// multisig, anything non-standard) are skipped, not errors. The result is
/// ordered by output index.
pub fn extract_recipients(outputs: &[TransactionOutput], prefix: &str) -> Vec<RecipientAddress> {
    let mut ordered: Vec<&TransactionOutput> = outputs.iter().collect();
    ordered.sort_by_key(|output| output.output_index);

    ordered
        .into_iter()
        .filter_map(|output| {
            cashaddr::locking_script_address(&output.locking_bytecode, prefix).map(|address| {
                RecipientAddress {
                    address,
                    value_satoshis: output.value_satoshis.clone(),
                }
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct TransactionData {
    transaction: Vec<TransactionRecord>,
}

#[derive(Deserialize)]
struct TransactionRecord {
    #[serde(default)]
    block_inclusions: Vec<BlockInclusion>,
    outputs: Vec<TransactionOutput>,
}

#[derive(Deserialize)]
struct BlockInclusion {
    block: BlockInfo,
}

#[derive(Deserialize)]
struct BlockInfo {
    // Hasura serves bigint columns as either numbers or strings depending
    // on configuration, so coerce after the fact.
    height: serde_json::Value,
    timestamp: serde_json::Value,
}

fn coerce_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn coerce_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// ChaingraphDataSource
///
/// Transaction data provider backed by a Chaingraph GraphQL endpoint.
/// Transaction hashes travel as `\x`-prefixed bytea literals on the wire.
pub struct ChaingraphDataSource {
    client: Client,
    endpoint: String,
    prefix: String,
}

impl ChaingraphDataSource {
    pub fn new(endpoint: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            prefix: prefix.into(),
        }
    }

    async fn query<T>(&self, query: &str, variables: serde_json::Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .context("chaingraph request failed")?
            .error_for_status()
            .context("chaingraph returned an HTTP error")?;

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .context("failed to decode chaingraph response")?;

        if let Some(errors) = body.errors {
            let message = errors
                .into_iter()
                .next()
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(anyhow!("chaingraph GraphQL error: {message}"));
        }

        body.data.ok_or_else(|| anyhow!("chaingraph returned no data"))
    }
}

#[async_trait]
impl TransactionDataSource for ChaingraphDataSource {
    async fn transaction_addresses(&self, tx_hash: &str) -> Result<Option<TransactionAddresses>> {
        let variables = json!({ "txHash": format!("\\x{tx_hash}") });
        let data: TransactionData = self.query(GET_TRANSACTION_QUERY, variables).await?;

        let Some(tx) = data.transaction.into_iter().next() else {
            warn!("transaction not found: {tx_hash}");
            return Ok(None);
        };

        let recipients = extract_recipients(&tx.outputs, &self.prefix);
        let block = tx.block_inclusions.first();

        Ok(Some(TransactionAddresses {
            tx_hash: tx_hash.to_string(),
            block_height: block.and_then(|b| coerce_u64(&b.block.height)),
            timestamp: block.and_then(|b| coerce_string(&b.block.timestamp)),
            recipients,
        }))
    }
}

/// Fetch addresses for many transactions with bounded concurrency.
///
/// Hashes are processed in groups of `FETCH_GROUP_SIZE`; within a group all
/// requests run concurrently and the group completes once every request has
/// settled. A failed or not-found fetch yields no entry for that hash and
/// never aborts its siblings. No retries.
pub async fn batch_transaction_addresses<D>(
    source: &D,
    tx_hashes: &[String],
) -> HashMap<String, TransactionAddresses>
where
    D: TransactionDataSource + Sync,
{
    let mut results = HashMap::new();

    for (group_index, group) in tx_hashes.chunks(FETCH_GROUP_SIZE).enumerate() {
        if group_index > 0 {
            tokio::time::sleep(FETCH_GROUP_DELAY).await;
        }

        let fetches = join_all(group.iter().map(|h| source.transaction_addresses(h))).await;

        for (tx_hash, fetched) in group.iter().zip(fetches) {
            match fetched {
                Ok(Some(addresses)) => {
                    results.insert(tx_hash.clone(), addresses);
                }
                Ok(None) => {}
                Err(e) => warn!("fetch failed for {tx_hash}: {e:#}"),
            }
        }

        info!(
            "fetched {}/{} transactions",
            results.len(),
            (group_index * FETCH_GROUP_SIZE + group.len()).min(tx_hashes.len())
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(index: u64, bytecode: &str, value: &str) -> TransactionOutput {
        TransactionOutput {
            output_index: index,
            locking_bytecode: bytecode.to_string(),
            value_satoshis: value.to_string(),
        }
    }

    const HASH_HEX: &str = "76a04053bda0a88bda5177b86a15c3b29f559873";

    #[test]
    fn extracts_recipients_in_output_order() {
        let outputs = vec![
            output(2, &format!("a914{HASH_HEX}87"), "3000"),
            output(0, &format!("76a914{HASH_HEX}88ac"), "1000"),
            // OP_RETURN data carrier, silently dropped
            output(1, "6a0474657374", "0"),
        ];

        let recipients = extract_recipients(&outputs, "bitcoincash");
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].value_satoshis, "1000");
        assert_eq!(
            recipients[0].address,
            "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2"
        );
        assert_eq!(recipients[1].value_satoshis, "3000");
        assert!(recipients[1].address.starts_with("bitcoincash:"));
    }

    #[test]
    fn extracts_nothing_from_non_standard_outputs() {
        let outputs = vec![output(0, "6a0474657374", "0"), output(1, "", "0")];
        assert!(extract_recipients(&outputs, "bitcoincash").is_empty());
    }

    struct MockDataSource {
        known: HashMap<String, Vec<RecipientAddress>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl TransactionDataSource for MockDataSource {
        async fn transaction_addresses(
            &self,
            tx_hash: &str,
        ) -> Result<Option<TransactionAddresses>> {
            if self.failing.iter().any(|h| h == tx_hash) {
                return Err(anyhow!("provider unavailable"));
            }
            Ok(self.known.get(tx_hash).map(|recipients| {
                TransactionAddresses {
                    tx_hash: tx_hash.to_string(),
                    block_height: Some(700_000),
                    timestamp: Some("1609459200".to_string()),
                    recipients: recipients.clone(),
                }
            }))
        }
    }

    #[tokio::test]
    async fn batch_continues_past_failures_and_misses() {
        let recipient = RecipientAddress {
            address: "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2".to_string(),
            value_satoshis: "1000".to_string(),
        };
        let mut known = HashMap::new();
        known.insert("aa".to_string(), vec![recipient.clone()]);
        known.insert("bb".to_string(), vec![recipient]);

        let source = MockDataSource {
            known,
            failing: vec!["cc".to_string()],
        };

        let hashes: Vec<String> = ["aa", "cc", "dd", "bb"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let results = batch_transaction_addresses(&source, &hashes).await;

        assert_eq!(results.len(), 2);
        assert!(results.contains_key("aa"));
        assert!(results.contains_key("bb"));
        assert!(!results.contains_key("cc"));
        assert!(!results.contains_key("dd"));
        assert_eq!(results["aa"].block_height, Some(700_000));
    }

    #[test]
    fn coerces_hasura_bigints() {
        assert_eq!(coerce_u64(&json!(700000)), Some(700_000));
        assert_eq!(coerce_u64(&json!("700000")), Some(700_000));
        assert_eq!(coerce_u64(&json!(null)), None);
        assert_eq!(
            coerce_string(&json!(1609459200u64)).as_deref(),
            Some("1609459200")
        );
        assert_eq!(
            coerce_string(&json!("1609459200")).as_deref(),
            Some("1609459200")
        );
    }
}
