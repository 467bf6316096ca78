use crate::types::{Campaign, CampaignStatus};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::debug;

static SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-z0-9-]+)\.(flipstarter|fundme)").expect("subdomain regex is valid")
});

/// Platform and generic subdomains that never name an entity.
const GENERIC_SUBDOMAINS: [&str; 5] = ["flipstarter", "fundme", "www", "api", "fund"];

struct AliasEntry {
    canonical: String,
    /// Lowercase alternate spellings.
    aliases: Vec<String>,
}

impl AliasEntry {
    fn names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.canonical.to_lowercase()).chain(self.aliases.iter().cloned())
    }
}

/// AliasTable
///
/// The authoritative mapping from canonical entity names to their known
/// alternate spellings. Passed explicitly into extraction and resolution so
/// tests can substitute their own tables. Only names in this table ever
/// become entities; incidental subdomains never auto-create one.
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    pub fn new(entries: impl IntoIterator<Item = (&'static str, Vec<&'static str>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(canonical, aliases)| AliasEntry {
                    canonical: canonical.to_string(),
                    aliases: aliases.into_iter().map(|a| a.to_lowercase()).collect(),
                })
                .collect(),
        }
    }

    /// The known teams and contributors of the BCH ecosystem (not the
    /// crowdfunding platforms themselves).
    pub fn known_entities() -> Self {
        Self::new([
            ("BCHN", vec!["bchn", "bitcoin cash node"]),
            ("Electron Cash", vec!["electron cash", "electroncash"]),
            ("General Protocols", vec!["general protocols", "generalprotocols"]),
            ("Bitcoin Verde", vec!["verde", "bitcoin verde"]),
            ("Knuth", vec!["knuth"]),
            ("BCHD", vec!["bchd"]),
            ("Bitcoin ABC", vec!["abc", "bitcoin abc"]),
            ("Imaginary", vec!["imaginary", "imaginary.cash"]),
            ("Bitcoin Cash Podcast", vec!["bitcoin cash podcast", "bch podcast"]),
            ("read.cash", vec!["read.cash", "readcash"]),
            ("Cashual Wallet", vec!["cashual"]),
            ("Neutrino", vec!["neutrino"]),
        ])
    }

    /// Resolve a name to its canonical form; unknown names are treated as
    /// already canonical and returned unchanged.
    pub fn canonical_name(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        for entry in &self.entries {
            if entry.canonical.to_lowercase() == lower || entry.aliases.contains(&lower) {
                return entry.canonical.clone();
            }
        }
        name.to_string()
    }

    /// True when both (lowercased) names belong to the same alias group.
    fn share_alias_group(&self, a: &str, b: &str) -> bool {
        self.entries.iter().any(|entry| {
            let names: Vec<String> = entry.names().collect();
            names.iter().any(|n| n == a) && names.iter().any(|n| n == b)
        })
    }

    fn canonical_for_subdomain(&self, subdomain: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| {
                entry.aliases.iter().any(|a| a == subdomain)
                    || entry.canonical.to_lowercase() == subdomain
            })
            .map(|entry| entry.canonical.as_str())
    }
}

/// Extract canonical entity names from a campaign's text fields.
///
/// An entity matches when any of its names appears as a substring of the
/// lowercased title+description+url. A `<name>.flipstarter` / `<name>.fundme`
/// subdomain also counts, but only when the subdomain itself is in the alias
/// table; unknown subdomains are deliberately ignored.
pub fn extract_entities(
    title: &str,
    description: Option<&str>,
    url: &str,
    table: &AliasTable,
) -> Vec<String> {
    let text = format!("{} {} {}", title, description.unwrap_or(""), url).to_lowercase();

    let mut entities = BTreeSet::new();
    for entry in &table.entries {
        if entry.names().any(|name| text.contains(&name)) {
            entities.insert(entry.canonical.clone());
        }
    }

    let url_lower = url.to_lowercase();
    if let Some(caps) = SUBDOMAIN_RE.captures(&url_lower) {
        let subdomain = &caps[1];
        if !GENERIC_SUBDOMAINS.contains(&subdomain)
            && let Some(canonical) = table.canonical_for_subdomain(subdomain)
        {
            entities.insert(canonical.to_string());
        }
    }

    entities.into_iter().collect()
}

/// Best-effort fuzzy equivalence of two entity names.
///
/// Categorical rules, first hit wins: exact case-insensitive match, literal
/// substring containment, acronym match in either direction, co-occurrence
/// in one alias group. No distance metric, no thresholds.
pub fn match_entities(name_a: &str, name_b: &str, table: &AliasTable) -> bool {
    let a = name_a.trim().to_lowercase();
    let b = name_b.trim().to_lowercase();

    if a == b {
        return true;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }

    let acronym_a = initials(name_a);
    let acronym_b = initials(name_b);
    if acronym_a == b || acronym_b == a {
        return true;
    }

    table.share_alias_group(&a, &b)
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_lowercase()
}

/// Entity
///
/// A named ecosystem participant with its aggregate campaign statistics.
/// `total_bch` sums the goal amounts of successful campaigns only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub campaigns: Vec<String>,
    pub total_bch: f64,
    pub success_rate: f64,
    pub aliases: Vec<String>,
}

/// EntityMap
///
/// Arena of entities plus a name index. Several names (the canonical name
/// and any aliases discovered during resolution) may point at the same
/// arena slot, so no single key owns an entity.
pub struct EntityMap {
    entities: Vec<Entity>,
    lookup: HashMap<String, usize>,
}

impl EntityMap {
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.lookup.get(name).map(|&idx| &self.entities[idx])
    }

    /// Iterate distinct entities (each arena slot once, regardless of how
    /// many names index it).
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities_for_campaign(&self, campaign_id: &str) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|entity| entity.campaigns.iter().any(|id| id == campaign_id))
            .collect()
    }
}

/// Resolve every campaign's extracted names into a shared entity map.
///
/// A new name first tries the index, then a fuzzy match against existing
/// entities; a fuzzy hit records the name as an alias and indexes it to the
/// same slot. Campaign ids attach at most once per entity, and the goal
/// amount accrues at attach time using that campaign's own status, so the
/// totals do not depend on the order in which aliases are discovered.
pub fn build_entity_map(campaigns: &[Campaign], table: &AliasTable) -> EntityMap {
    let mut entities: Vec<Entity> = Vec::new();
    let mut lookup: HashMap<String, usize> = HashMap::new();

    for campaign in campaigns {
        for raw_name in &campaign.entities {
            let name = table.canonical_name(raw_name);

            let idx = match lookup.get(&name) {
                Some(&idx) => idx,
                None => {
                    let fuzzy = entities.iter().position(|entity| {
                        match_entities(&name, &entity.name, table)
                            || entity
                                .aliases
                                .iter()
                                .any(|alias| match_entities(&name, alias, table))
                    });
                    match fuzzy {
                        Some(idx) => {
                            if !entities[idx].aliases.contains(&name) {
                                debug!("aliasing {} -> {}", name, entities[idx].name);
                                entities[idx].aliases.push(name.clone());
                            }
                            lookup.insert(name.clone(), idx);
                            idx
                        }
                        None => {
                            entities.push(Entity {
                                name: name.clone(),
                                campaigns: Vec::new(),
                                total_bch: 0.0,
                                success_rate: 0.0,
                                aliases: Vec::new(),
                            });
                            lookup.insert(name.clone(), entities.len() - 1);
                            entities.len() - 1
                        }
                    }
                }
            };

            let entity = &mut entities[idx];
            if !entity.campaigns.contains(&campaign.id) {
                entity.campaigns.push(campaign.id.clone());
                if campaign.status.is_success() {
                    entity.total_bch += campaign.amount;
                }
            }
        }
    }

    let status_by_id: HashMap<&str, CampaignStatus> = campaigns
        .iter()
        .map(|c| (c.id.as_str(), c.status))
        .collect();

    for entity in &mut entities {
        let successes = entity
            .campaigns
            .iter()
            .filter(|id| {
                status_by_id
                    .get(id.as_str())
                    .is_some_and(|status| status.is_success())
            })
            .count();
        entity.success_rate = if entity.campaigns.is_empty() {
            0.0
        } else {
            successes as f64 / entity.campaigns.len() as f64
        };
    }

    EntityMap { entities, lookup }
}
