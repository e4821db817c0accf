// ── Membership rule workflows ──
//
// Rules live in the lazy `CollectionRules` property, so reads always go
// through a keyed collection fetch. Adds skip rules that already exist and
// downgrade the service's duplicate responses to warnings.

use cmas_api::NamePattern;
use cmas_api::models::{CollectionRule, RuleKind, SmsCollection};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::site::SiteServer;

/// Rules split by kind. Every input rule lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePartition {
    pub direct: Vec<CollectionRule>,
    pub query: Vec<CollectionRule>,
    pub include: Vec<CollectionRule>,
    pub exclude: Vec<CollectionRule>,
    /// Rule types this client does not model.
    pub other: Vec<CollectionRule>,
}

impl RulePartition {
    pub fn len(&self) -> usize {
        self.direct.len()
            + self.query.len()
            + self.include.len()
            + self.exclude.len()
            + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn partition_rules(rules: Vec<CollectionRule>) -> RulePartition {
    let mut out = RulePartition::default();
    for rule in rules {
        let bucket = match rule.kind() {
            Some(RuleKind::Direct) => &mut out.direct,
            Some(RuleKind::Query) => &mut out.query,
            Some(RuleKind::Include) => &mut out.include,
            Some(RuleKind::Exclude) => &mut out.exclude,
            None => &mut out.other,
        };
        bucket.push(rule);
    }
    out
}

fn select_rules(
    rules: Vec<CollectionRule>,
    kind: Option<RuleKind>,
    name: Option<&NamePattern>,
) -> Vec<CollectionRule> {
    rules
        .into_iter()
        .filter(|r| kind.is_none_or(|k| r.kind() == Some(k)))
        .filter(|r| name.is_none_or(|p| r.rule_name.as_deref().is_some_and(|n| p.matches(n))))
        .collect()
}

/// An item a batch left alone, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub item: String,
    pub reason: String,
}

/// Result of a rule add: what went in and what was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub collection_id: String,
    pub applied: Vec<String>,
    pub skipped: Vec<Skipped>,
}

impl BatchOutcome {
    fn new(collection_id: &str) -> Self {
        Self {
            collection_id: collection_id.to_owned(),
            ..Self::default()
        }
    }

    fn skip(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        let item = item.into();
        let reason = reason.into();
        warn!(collection_id = %self.collection_id, %item, %reason, "skipped membership rule");
        self.skipped.push(Skipped { item, reason });
    }
}

impl SiteServer {
    /// Rules of one collection, optionally narrowed by kind and rule name.
    pub async fn get_membership_rules(
        &self,
        collection: &str,
        kind: Option<RuleKind>,
        name: Option<&NamePattern>,
    ) -> Result<Vec<CollectionRule>, CoreError> {
        let (_, rules) = self.load_rules(collection).await?;
        Ok(select_rules(rules, kind, name))
    }

    /// Add one direct rule per device. Devices may be names or resource IDs.
    ///
    /// Every device is resolved before the first rule is posted, so an
    /// unknown device fails the call with nothing written.
    pub async fn add_direct_rules(
        &self,
        collection: &str,
        devices: &[String],
    ) -> Result<BatchOutcome, CoreError> {
        let (target, rules) = self.load_rules(collection).await?;
        let existing: Vec<u32> = partition_rules(rules)
            .direct
            .iter()
            .filter_map(|r| r.resource_id)
            .collect();

        let mut resolved = Vec::with_capacity(devices.len());
        for device in devices {
            resolved.push(self.resolve_device(device).await?);
        }

        let mut outcome = BatchOutcome::new(&target.collection_id);
        for device in resolved {
            let label = device
                .name
                .clone()
                .unwrap_or_else(|| device.resource_id.to_string());
            if existing.contains(&device.resource_id) {
                outcome.skip(label, "already a direct member");
                continue;
            }

            let rule = CollectionRule::direct(device.resource_id, label.clone());
            self.apply_rule(&target, &rule, label, &mut outcome).await?;
        }
        Ok(outcome)
    }

    pub async fn add_query_rule(
        &self,
        collection: &str,
        rule_name: &str,
        query_expression: &str,
    ) -> Result<BatchOutcome, CoreError> {
        if query_expression.trim().is_empty() {
            return Err(CoreError::validation("query expression must not be empty"));
        }

        let (target, rules) = self.load_rules(collection).await?;
        let mut outcome = BatchOutcome::new(&target.collection_id);
        let duplicate = partition_rules(rules).query.iter().any(|r| {
            r.rule_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(rule_name))
        });
        if duplicate {
            outcome.skip(rule_name, "a query rule with this name already exists");
            return Ok(outcome);
        }

        let rule = CollectionRule::query(rule_name, query_expression);
        self.apply_rule(&target, &rule, rule_name.to_owned(), &mut outcome)
            .await?;
        Ok(outcome)
    }

    pub async fn add_include_rule(
        &self,
        collection: &str,
        include: &str,
    ) -> Result<BatchOutcome, CoreError> {
        self.add_reference_rule(collection, include, RuleKind::Include)
            .await
    }

    pub async fn add_exclude_rule(
        &self,
        collection: &str,
        exclude: &str,
    ) -> Result<BatchOutcome, CoreError> {
        self.add_reference_rule(collection, exclude, RuleKind::Exclude)
            .await
    }

    /// Delete every rule matching `kind` and `name`. Returns the deleted rules.
    pub async fn remove_membership_rules(
        &self,
        collection: &str,
        kind: Option<RuleKind>,
        name: Option<&NamePattern>,
    ) -> Result<Vec<CollectionRule>, CoreError> {
        let (target, rules) = self.load_rules(collection).await?;
        let matching = select_rules(rules, kind, name);
        if matching.is_empty() {
            let what = name.map_or_else(|| collection.to_owned(), |n| n.to_string());
            return Err(CoreError::not_found("membership rule", what));
        }

        for rule in &matching {
            self.client()
                .delete_membership_rule(&target.collection_id, rule)
                .await?;
            info!(
                collection_id = %target.collection_id,
                rule = rule.rule_name.as_deref().unwrap_or_default(),
                "removed membership rule"
            );
        }
        Ok(matching)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Resolve the collection, then re-fetch it by key for its rules.
    async fn load_rules(
        &self,
        collection: &str,
    ) -> Result<(SmsCollection, Vec<CollectionRule>), CoreError> {
        let listed = self.resolve_collection(collection).await?;
        let mut full = self.client().get_collection(&listed.collection_id).await?;
        let rules = full.collection_rules.take().unwrap_or_default();
        Ok((full, rules))
    }

    async fn add_reference_rule(
        &self,
        collection: &str,
        referenced: &str,
        kind: RuleKind,
    ) -> Result<BatchOutcome, CoreError> {
        let (target, rules) = self.load_rules(collection).await?;
        let other = self.resolve_collection(referenced).await?;
        if other.collection_id.eq_ignore_ascii_case(&target.collection_id) {
            return Err(CoreError::validation(
                "a collection cannot include or exclude itself",
            ));
        }

        let mut outcome = BatchOutcome::new(&target.collection_id);
        let partition = partition_rules(rules);
        let (existing, rule) = match kind {
            RuleKind::Exclude => (
                partition.exclude.iter().any(|r| {
                    r.exclude_collection_id.as_deref() == Some(other.collection_id.as_str())
                }),
                CollectionRule::exclude(&other.collection_id, &other.name),
            ),
            _ => (
                partition.include.iter().any(|r| {
                    r.include_collection_id.as_deref() == Some(other.collection_id.as_str())
                }),
                CollectionRule::include(&other.collection_id, &other.name),
            ),
        };

        if existing {
            outcome.skip(
                other.name.clone(),
                format!(
                    "already has an {} rule for this collection",
                    kind.to_string().to_lowercase()
                ),
            );
            return Ok(outcome);
        }

        self.apply_rule(&target, &rule, other.name, &mut outcome)
            .await?;
        Ok(outcome)
    }

    /// Post one rule, recording a duplicate response as a skip.
    async fn apply_rule(
        &self,
        target: &SmsCollection,
        rule: &CollectionRule,
        label: String,
        outcome: &mut BatchOutcome,
    ) -> Result<(), CoreError> {
        match self
            .client()
            .add_membership_rule(&target.collection_id, rule)
            .await
        {
            Ok(()) => {
                info!(collection_id = %target.collection_id, rule = %label, "added membership rule");
                outcome.applied.push(label);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                outcome.skip(label, e.to_string());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn unknown() -> CollectionRule {
        CollectionRule {
            odata_type: "#AdminService.SMS_CollectionRuleFuture".into(),
            rule_name: Some("future".into()),
            ..CollectionRule::default()
        }
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let rules = vec![
            CollectionRule::direct(1, "PC01"),
            CollectionRule::query("Laptops", "select * from SMS_R_System"),
            CollectionRule::include("PS100003", "Lab"),
            CollectionRule::direct(2, "PC02"),
            CollectionRule::exclude("PS100004", "Servers"),
            unknown(),
        ];
        let partition = partition_rules(rules.clone());

        assert_eq!(partition.len(), rules.len());
        assert_eq!(partition.direct.len(), 2);
        assert_eq!(partition.query.len(), 1);
        assert_eq!(partition.include.len(), 1);
        assert_eq!(partition.exclude.len(), 1);
        assert_eq!(partition.other, vec![unknown()]);

        let mut union: Vec<CollectionRule> = partition
            .direct
            .into_iter()
            .chain(partition.query)
            .chain(partition.include)
            .chain(partition.exclude)
            .chain(partition.other)
            .collect();
        let mut expected = rules;
        let key = |r: &CollectionRule| (r.odata_type.clone(), r.rule_name.clone());
        union.sort_by_key(key);
        expected.sort_by_key(key);
        assert_eq!(union, expected);
    }

    #[test]
    fn empty_partition() {
        assert!(partition_rules(Vec::new()).is_empty());
    }
}
