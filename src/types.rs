use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// CampaignStatus
///
/// Normalized campaign outcome. Raw records carry free-text status strings;
/// `from_raw` folds the known spellings case-insensitively and everything
/// else lands in Unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Success,
    Expired,
    Running,
    Unknown,
}

impl CampaignStatus {
    pub fn from_raw(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "success" | "completed" => CampaignStatus::Success,
            "expired" | "failed" => CampaignStatus::Expired,
            "running" | "active" => CampaignStatus::Running,
            _ => CampaignStatus::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, CampaignStatus::Success)
    }
}

impl Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignStatus::Success => "success",
            CampaignStatus::Expired => "expired",
            CampaignStatus::Running => "running",
            CampaignStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Campaign
///
/// One crowdfunding campaign after ingestion: coerced fields, a stable
/// content-hash id, extracted entity names, and (once enriched from the
/// transaction provider) the addresses that received its funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub platform: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    /// Goal amount in BCH.
    pub amount: f64,
    pub status: CampaignStatus,
    pub time: Option<String>,
    pub url: String,
    #[serde(default)]
    pub archive: Vec<String>,
    #[serde(default)]
    pub announcement: Vec<String>,
    pub tx: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub recipient_addresses: Vec<String>,
    pub block_height: Option<u64>,
    pub transaction_timestamp: Option<String>,
}

impl Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Campaign {{ id: {}, title: {}, amount: {} BCH, status: {} }}",
            self.id, self.title, self.amount, self.status
        )
    }
}

/// TransactionOutput
///
/// One output of a transaction as reported by the data provider. The
/// locking bytecode is opaque hex (possibly `\x`-escaped) and the value is
/// kept as a string to avoid precision loss on large satoshi amounts.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionOutput {
    pub output_index: u64,
    pub locking_bytecode: String,
    pub value_satoshis: String,
}

/// RecipientAddress
///
/// A successfully decoded fund-recipient output: the CashAddr plus the
/// satoshi value it received. Outputs with unrecognized bytecode never
/// become one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientAddress {
    pub address: String,
    pub value_satoshis: String,
}

impl Display for RecipientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} sat)", self.address, self.value_satoshis)
    }
}

/// TransactionAddresses
///
/// Everything we keep from one provider lookup: the recipients extracted
/// from the outputs plus the first confirming block's height and timestamp.
#[derive(Debug, Clone)]
pub struct TransactionAddresses {
    pub tx_hash: String,
    pub block_height: Option<u64>,
    pub timestamp: Option<String>,
    pub recipients: Vec<RecipientAddress>,
}
