use crate::entities::EntityMap;
use crate::recipients::build_recipient_map;
use crate::types::{Campaign, CampaignStatus};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Graph};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::info;

/// FundingGraph
///
/// Directed graph of fund flows: campaign nodes point at the recipient
/// addresses their funds went to. Node and edge weights are the plain data
/// values an external renderer consumes.
pub type FundingGraph = Graph<GraphNode, GraphEdge, Directed>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Campaign,
    Recipient,
    Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Fund flow from a campaign to a recipient address.
    Received,
    /// Campaign/entity relations, reserved for entity-edge population.
    Created,
    Related,
}

/// Per-node detail the renderer shows on hover/selection. `value` and the
/// node kind drive sizing and shape; this carries the rest.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum NodeMetadata {
    #[serde(rename_all = "camelCase")]
    Campaign {
        platform: String,
        status: CampaignStatus,
        url: String,
        time: Option<String>,
        transaction_timestamp: Option<String>,
        has_addresses: bool,
    },
    #[serde(rename_all = "camelCase")]
    Recipient {
        address: String,
        campaigns: usize,
        total_bch: f64,
        success_rate: f64,
        successful_campaigns: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Drives visual sizing: goal amount for campaigns, total BCH received
    /// for recipients.
    pub value: f64,
    pub metadata: NodeMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub weight: f64,
}

/// GraphData
///
/// The flattened node/edge lists handed to the external renderer.
#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Build the funding graph from scratch: one node per campaign, one per
/// distinct recipient address, one `received` edge per (campaign, address)
/// pair. The entity map is resolved and passed in for the reserved
/// campaign-entity extension; the base graph emits no entity edges. No
/// caching — every call recomputes from source data.
pub fn build_graph(campaigns: &[Campaign], entities: &EntityMap) -> FundingGraph {
    let recipients = build_recipient_map(campaigns);
    info!(
        "building graph from {} campaigns, {} recipient addresses, {} entities",
        campaigns.len(),
        recipients.len(),
        entities.len()
    );

    let mut graph = FundingGraph::new();
    let mut campaign_idx: HashMap<&str, NodeIndex> = HashMap::new();

    for campaign in campaigns {
        let node = GraphNode {
            id: campaign.id.clone(),
            label: campaign.title.clone(),
            kind: NodeKind::Campaign,
            value: campaign.amount,
            metadata: NodeMetadata::Campaign {
                platform: campaign.platform.clone(),
                status: campaign.status,
                url: campaign.url.clone(),
                time: campaign.time.clone(),
                transaction_timestamp: campaign.transaction_timestamp.clone(),
                has_addresses: !campaign.recipient_addresses.is_empty(),
            },
        };
        campaign_idx.insert(campaign.id.as_str(), graph.add_node(node));
    }

    // Sort addresses so node and edge order is stable run to run.
    let mut addresses: Vec<&String> = recipients.keys().collect();
    addresses.sort();

    for address in addresses {
        let recipient = &recipients[address];
        let node = GraphNode {
            id: format!("addr-{address}"),
            label: recipient.label.clone(),
            kind: NodeKind::Recipient,
            value: recipient.total_bch,
            metadata: NodeMetadata::Recipient {
                address: recipient.address.clone(),
                campaigns: recipient.campaign_count,
                total_bch: recipient.total_bch,
                success_rate: recipient.success_rate,
                successful_campaigns: recipient.successful_campaigns,
            },
        };
        let recipient_idx = graph.add_node(node);

        for campaign_id in &recipient.campaigns {
            if let Some(&source_idx) = campaign_idx.get(campaign_id.as_str()) {
                graph.add_edge(
                    source_idx,
                    recipient_idx,
                    GraphEdge {
                        id: format!("edge-{campaign_id}-{address}"),
                        source: campaign_id.clone(),
                        target: format!("addr-{address}"),
                        kind: EdgeKind::Received,
                        weight: 1.0,
                    },
                );
            }
        }
    }

    info!(
        "graph has {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

/// Flatten the funding graph into the node/edge lists the renderer takes.
pub fn graph_data(graph: &FundingGraph) -> GraphData {
    GraphData {
        nodes: graph
            .node_indices()
            .map(|idx| graph[idx].clone())
            .collect(),
        edges: graph
            .edge_references()
            .map(|edge| edge.weight().clone())
            .collect(),
    }
}

/// Write the funding graph into a DOT string for visualization.
///
/// Useful for small to medium sized graphs with
/// `https://dreampuf.github.io/GraphvizOnline/?engine=dot`
pub fn write_graph_to_dot(graph: &FundingGraph) -> String {
    let mut dot = String::new();
    writeln!(dot, "digraph FundingGraph {{").unwrap();
    writeln!(dot, "  node [shape=ellipse];").unwrap();
    writeln!(dot, "  edge [dir=forward];").unwrap();
    writeln!(dot).unwrap();

    for node_idx in graph.node_indices() {
        let node = &graph[node_idx];
        writeln!(dot, "  \"{}\" [label=\"{}\"];", node.id, node.label).unwrap();
    }

    writeln!(dot).unwrap();

    for edge in graph.edge_references() {
        let weight = edge.weight();
        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [label=\"received\"];",
            weight.source, weight.target
        )
        .unwrap();
    }

    writeln!(dot, "}}").unwrap();
    dot
}
