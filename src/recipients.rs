use crate::cashaddr::shorten_address;
use crate::types::Campaign;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display};

/// RecipientNode
///
/// One distinct fund-receiving address with its aggregate campaign
/// participation. `total_bch` counts successful campaigns only; goal
/// amounts of failed or running campaigns never count as funds received.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientNode {
    pub address: String,
    pub campaigns: Vec<String>,
    pub total_bch: f64,
    pub campaign_count: usize,
    pub successful_campaigns: usize,
    pub success_rate: f64,
    /// Shortened address for display.
    pub label: String,
}

/// Group campaigns by recipient address and derive per-address totals.
///
/// Nodes only exist for observed recipient addresses, so every node has at
/// least one campaign.
pub fn build_recipient_map(campaigns: &[Campaign]) -> HashMap<String, RecipientNode> {
    struct Accumulator<'a> {
        campaigns: Vec<&'a Campaign>,
        total_bch: f64,
    }

    let mut by_address: HashMap<&str, Accumulator> = HashMap::new();

    for campaign in campaigns {
        for address in &campaign.recipient_addresses {
            let acc = by_address.entry(address).or_insert_with(|| Accumulator {
                campaigns: Vec::new(),
                total_bch: 0.0,
            });
            acc.campaigns.push(campaign);
            if campaign.status.is_success() {
                acc.total_bch += campaign.amount;
            }
        }
    }

    by_address
        .into_iter()
        .map(|(address, acc)| {
            let successful = acc
                .campaigns
                .iter()
                .filter(|c| c.status.is_success())
                .count();
            let node = RecipientNode {
                address: address.to_string(),
                campaigns: acc.campaigns.iter().map(|c| c.id.clone()).collect(),
                total_bch: acc.total_bch,
                campaign_count: acc.campaigns.len(),
                successful_campaigns: successful,
                success_rate: successful as f64 / acc.campaigns.len() as f64,
                label: shorten_address(address),
            };
            (address.to_string(), node)
        })
        .collect()
}

/// Only the recipients that appear in two or more campaigns — the signature
/// ecosystem-relationship signal.
pub fn multi_campaign_recipients(
    recipient_map: &HashMap<String, RecipientNode>,
) -> HashMap<String, RecipientNode> {
    recipient_map
        .iter()
        .filter(|(_, node)| node.campaign_count >= 2)
        .map(|(address, node)| (address.clone(), node.clone()))
        .collect()
}

/// RecipientStats
///
/// Aggregate view over the whole recipient map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientStats {
    pub total_recipients: usize,
    pub multi_campaign_recipients: usize,
    pub total_bch_received: f64,
    pub avg_campaigns_per_recipient: f64,
    pub top_recipients: Vec<RecipientNode>,
}

pub fn recipient_stats(recipient_map: &HashMap<String, RecipientNode>) -> RecipientStats {
    let recipients: Vec<&RecipientNode> = recipient_map.values().collect();

    let mut by_total: Vec<RecipientNode> = recipients.iter().map(|r| (*r).clone()).collect();
    by_total.sort_by(|a, b| b.total_bch.total_cmp(&a.total_bch));
    by_total.truncate(10);

    RecipientStats {
        total_recipients: recipients.len(),
        multi_campaign_recipients: recipients.iter().filter(|r| r.campaign_count >= 2).count(),
        total_bch_received: recipients.iter().map(|r| r.total_bch).sum(),
        avg_campaigns_per_recipient: if recipients.is_empty() {
            0.0
        } else {
            recipients.iter().map(|r| r.campaign_count).sum::<usize>() as f64
                / recipients.len() as f64
        },
        top_recipients: by_total,
    }
}

impl Display for RecipientStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} recipients ({} in multiple campaigns), {} BCH received",
            self.total_recipients, self.multi_campaign_recipients, self.total_bch_received
        )?;
        for recipient in &self.top_recipients {
            writeln!(
                f,
                "  {} received {} BCH across {} campaigns",
                recipient.label, recipient.total_bch, recipient.campaign_count
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CampaignStatus;

    const ADDR_A: &str = "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2";
    const ADDR_B: &str = "bitcoincash:qz7tywh9j0n77ed63232en9vnxq5jr40gulr5m9p0m";

    fn campaign(id: &str, addresses: &[&str], status: CampaignStatus, amount: f64) -> Campaign {
        Campaign {
            id: id.to_string(),
            platform: "flipstarter".to_string(),
            title: String::new(),
            description: None,
            category: Vec::new(),
            amount,
            status,
            time: None,
            url: String::new(),
            archive: Vec::new(),
            announcement: Vec::new(),
            tx: None,
            entities: Vec::new(),
            recipient_addresses: addresses.iter().map(|a| a.to_string()).collect(),
            block_height: None,
            transaction_timestamp: None,
        }
    }

    #[test]
    fn aggregates_shared_address_across_campaigns() {
        let campaigns = vec![
            campaign("c1", &[ADDR_A], CampaignStatus::Success, 10.0),
            campaign("c2", &[ADDR_A], CampaignStatus::Expired, 5.0),
        ];

        let map = build_recipient_map(&campaigns);
        assert_eq!(map.len(), 1);

        let node = &map[ADDR_A];
        assert_eq!(node.campaign_count, 2);
        assert_eq!(node.campaigns, vec!["c1", "c2"]);
        assert_eq!(node.total_bch, 10.0, "expired goal amount must not count");
        assert_eq!(node.successful_campaigns, 1);
        assert_eq!(node.success_rate, 0.5);
    }

    #[test]
    fn multi_campaign_subset_needs_two_campaigns() {
        let campaigns = vec![
            campaign("c1", &[ADDR_A, ADDR_B], CampaignStatus::Success, 10.0),
            campaign("c2", &[ADDR_A], CampaignStatus::Success, 5.0),
        ];

        let map = build_recipient_map(&campaigns);
        let multi = multi_campaign_recipients(&map);

        assert!(multi.contains_key(ADDR_A));
        assert!(!multi.contains_key(ADDR_B));
        assert_eq!(multi.len(), 1);
    }

    #[test]
    fn stats_summarize_the_map() {
        let campaigns = vec![
            campaign("c1", &[ADDR_A, ADDR_B], CampaignStatus::Success, 10.0),
            campaign("c2", &[ADDR_A], CampaignStatus::Success, 5.0),
        ];

        let stats = recipient_stats(&build_recipient_map(&campaigns));
        assert_eq!(stats.total_recipients, 2);
        assert_eq!(stats.multi_campaign_recipients, 1);
        assert_eq!(stats.total_bch_received, 25.0);
        assert_eq!(stats.avg_campaigns_per_recipient, 1.5);
        assert_eq!(stats.top_recipients[0].address, ADDR_A);
    }

    #[test]
    fn campaigns_without_addresses_create_no_nodes() {
        let campaigns = vec![campaign("c1", &[], CampaignStatus::Success, 10.0)];
        assert!(build_recipient_map(&campaigns).is_empty());
    }
}
