use crate::data_sources::{TransactionDataSource, batch_transaction_addresses};
use crate::entities::{AliasTable, extract_entities};
use crate::types::{Campaign, CampaignStatus};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// RawCampaign
///
/// A campaign record as scraped, before validation. Numeric fields arrive
/// as whatever the scraper produced, so they are coerced (never trusted) at
/// this boundary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCampaign {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub time: Option<String>,
    pub url: String,
    #[serde(default)]
    pub archive: Vec<String>,
    #[serde(default)]
    pub announcement: Vec<String>,
    #[serde(default)]
    pub tx: Option<String>,
    #[serde(default)]
    pub recipient_addresses: Vec<String>,
    #[serde(default)]
    pub block_height: Value,
    #[serde(default)]
    pub transaction_timestamp: Option<String>,
}

fn coerce_amount(value: &Value) -> f64 {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0.0)
}

fn coerce_block_height(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Derive a stable, collision-resistant campaign id from content.
///
/// Identical inputs always hash identically; campaigns differing only in
/// tx or time get distinct ids. The unique component prefers the tx hash,
/// falls back to the listed time, then to nothing.
pub fn generate_id(url: &str, title: &str, tx: Option<&str>, time: Option<&str>) -> String {
    let unique = tx.or(time).unwrap_or("");
    let digest = Sha256::digest(format!("{url}-{title}-{unique}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Coerce one raw record into a strict `Campaign`: normalized status,
/// content-hash id, extracted entities, defaulted numerics.
pub fn transform_campaign(raw: RawCampaign, table: &AliasTable) -> Campaign {
    let id = generate_id(
        &raw.url,
        &raw.title,
        raw.tx.as_deref(),
        raw.time.as_deref(),
    );
    let entities = extract_entities(&raw.title, raw.description.as_deref(), &raw.url, table);

    Campaign {
        id,
        platform: "flipstarter".to_string(),
        title: raw.title,
        description: raw.description,
        category: raw.category,
        amount: coerce_amount(&raw.amount),
        status: CampaignStatus::from_raw(&raw.status),
        time: raw.time,
        url: raw.url,
        archive: raw.archive,
        announcement: raw.announcement,
        tx: raw.tx,
        entities,
        recipient_addresses: raw.recipient_addresses,
        block_height: coerce_block_height(&raw.block_height),
        transaction_timestamp: raw.transaction_timestamp,
    }
}

/// Load a JSON array of raw campaign records from disk.
///
/// A record that fails to parse is logged and skipped; it never aborts the
/// rest of the import.
pub fn load_campaigns(path: impl AsRef<Path>, table: &AliasTable) -> Result<Vec<Campaign>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read campaigns file {}", path.display()))?;
    let records: Vec<Value> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let mut campaigns = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<RawCampaign>(record) {
            Ok(raw) => campaigns.push(transform_campaign(raw, table)),
            Err(e) => {
                warn!("skipping campaign record {index}: {e}");
                skipped += 1;
            }
        }
    }

    info!("loaded {} campaigns ({} skipped)", campaigns.len(), skipped);
    Ok(campaigns)
}

/// Attach recipient addresses and block data to campaigns that carry a
/// transaction hash but no addresses yet. Fetch failures leave the
/// campaign unenriched; the pipeline proceeds with partial results.
pub async fn enrich_campaigns<D>(campaigns: &mut [Campaign], source: &D)
where
    D: TransactionDataSource + Sync,
{
    let tx_hashes: Vec<String> = campaigns
        .iter()
        .filter(|c| c.recipient_addresses.is_empty())
        .filter_map(|c| c.tx.clone())
        .collect();
    if tx_hashes.is_empty() {
        return;
    }

    info!("fetching outputs for {} transactions", tx_hashes.len());
    let fetched = batch_transaction_addresses(source, &tx_hashes).await;

    for campaign in campaigns.iter_mut() {
        let Some(tx) = &campaign.tx else { continue };
        if campaign.recipient_addresses.is_empty()
            && let Some(addresses) = fetched.get(tx)
        {
            campaign.recipient_addresses = addresses
                .recipients
                .iter()
                .map(|r| r.address.clone())
                .collect();
            campaign.block_height = addresses.block_height;
            campaign.transaction_timestamp = addresses.timestamp.clone();
        }
    }
}

/// CampaignStats
///
/// Aggregate view over the whole campaign set.
#[derive(Debug, Clone)]
pub struct CampaignStats {
    pub total_campaigns: usize,
    pub total_bch: f64,
    pub success_rate: f64,
    pub total_entities: usize,
    pub avg_campaign_size: f64,
    pub flipstarter_campaigns: usize,
    pub fundme_campaigns: usize,
}

pub fn campaign_stats(campaigns: &[Campaign], total_entities: usize) -> CampaignStats {
    let total_bch: f64 = campaigns.iter().map(|c| c.amount).sum();
    let successes = campaigns.iter().filter(|c| c.status.is_success()).count();

    CampaignStats {
        total_campaigns: campaigns.len(),
        total_bch,
        success_rate: if campaigns.is_empty() {
            0.0
        } else {
            successes as f64 / campaigns.len() as f64
        },
        total_entities,
        avg_campaign_size: if campaigns.is_empty() {
            0.0
        } else {
            total_bch / campaigns.len() as f64
        },
        flipstarter_campaigns: campaigns.iter().filter(|c| c.platform == "flipstarter").count(),
        fundme_campaigns: campaigns.iter().filter(|c| c.platform == "fundme").count(),
    }
}

impl Display for CampaignStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} campaigns for {} BCH ({:.0}% successful), {} entities",
            self.total_campaigns,
            self.total_bch,
            self.success_rate * 100.0,
            self.total_entities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecipientAddress, TransactionAddresses};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    fn raw(value: Value) -> RawCampaign {
        serde_json::from_value(value).expect("valid raw campaign")
    }

    #[test]
    fn id_is_deterministic_and_content_sensitive() {
        let a = generate_id("https://x.flipstarter.cash", "BCHN 2020", Some("aabb"), None);
        let b = generate_id("https://x.flipstarter.cash", "BCHN 2020", Some("aabb"), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        // Same url/title but a different tx or time yields a distinct id.
        let c = generate_id("https://x.flipstarter.cash", "BCHN 2020", Some("ccdd"), None);
        assert_ne!(a, c);
        let d = generate_id("https://x.flipstarter.cash", "BCHN 2020", None, Some("2020-06-01"));
        assert_ne!(a, d);
    }

    #[test]
    fn coerces_degraded_numeric_fields() {
        let campaign = transform_campaign(
            raw(json!({
                "title": "BCHN 2020",
                "url": "https://bchn.flipstarter.cash",
                "amount": "not-a-number",
                "status": "Completed",
                "blockHeight": "654321"
            })),
            &AliasTable::known_entities(),
        );

        assert_eq!(campaign.amount, 0.0);
        assert_eq!(campaign.status, CampaignStatus::Success);
        assert_eq!(campaign.block_height, Some(654_321));
        assert_eq!(campaign.entities, vec!["BCHN".to_string()]);
    }

    #[test]
    fn accepts_string_amounts() {
        let campaign = transform_campaign(
            raw(json!({
                "title": "t",
                "url": "https://example.com",
                "amount": "12.5",
                "status": "running"
            })),
            &AliasTable::known_entities(),
        );
        assert_eq!(campaign.amount, 12.5);
        assert_eq!(campaign.status, CampaignStatus::Running);
    }

    struct MockSource {
        known: HashMap<String, TransactionAddresses>,
    }

    #[async_trait]
    impl TransactionDataSource for MockSource {
        async fn transaction_addresses(
            &self,
            tx_hash: &str,
        ) -> Result<Option<TransactionAddresses>> {
            Ok(self.known.get(tx_hash).cloned())
        }
    }

    #[tokio::test]
    async fn enrichment_attaches_addresses_and_block_data() {
        let table = AliasTable::known_entities();
        let mut campaigns = vec![
            transform_campaign(
                raw(json!({
                    "title": "with tx",
                    "url": "https://a.example",
                    "amount": 10.0,
                    "status": "success",
                    "tx": "aabb"
                })),
                &table,
            ),
            transform_campaign(
                raw(json!({
                    "title": "no tx",
                    "url": "https://b.example",
                    "amount": 5.0,
                    "status": "expired"
                })),
                &table,
            ),
        ];

        let mut known = HashMap::new();
        known.insert(
            "aabb".to_string(),
            TransactionAddresses {
                tx_hash: "aabb".to_string(),
                block_height: Some(650_000),
                timestamp: Some("1600000000".to_string()),
                recipients: vec![RecipientAddress {
                    address: "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2".to_string(),
                    value_satoshis: "1000".to_string(),
                }],
            },
        );

        enrich_campaigns(&mut campaigns, &MockSource { known }).await;

        assert_eq!(campaigns[0].recipient_addresses.len(), 1);
        assert_eq!(campaigns[0].block_height, Some(650_000));
        assert_eq!(
            campaigns[0].transaction_timestamp.as_deref(),
            Some("1600000000")
        );
        assert!(campaigns[1].recipient_addresses.is_empty());
        assert_eq!(campaigns[1].block_height, None);
    }

    #[test]
    fn stats_cover_the_campaign_set() {
        let table = AliasTable::known_entities();
        let campaigns = vec![
            transform_campaign(
                raw(json!({"title": "a", "url": "u1", "amount": 10.0, "status": "success"})),
                &table,
            ),
            transform_campaign(
                raw(json!({"title": "b", "url": "u2", "amount": 30.0, "status": "expired"})),
                &table,
            ),
        ];

        let stats = campaign_stats(&campaigns, 3);
        assert_eq!(stats.total_campaigns, 2);
        assert_eq!(stats.total_bch, 40.0);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.avg_campaign_size, 20.0);
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.flipstarter_campaigns, 2);
        assert_eq!(stats.fundme_campaigns, 0);
    }
}
