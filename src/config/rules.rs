// src/config/rules.rs
//! Raw push rules as written in the config file, before expansion.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use tracing::warn;

use crate::feed::types::GroupId;

/// One entry of `bilibili.push.<uid>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PushRule {
    /// Bare group number: activity and live pushes, no @all.
    Group(GroupId),
    Detailed(DetailedRule),
    /// Anything else; logged and skipped during expansion.
    Unrecognized(IgnoredAny),
}

/// Value under one uid key: a rule list, or anything else (skipped).
#[derive(Deserialize)]
#[serde(untagged)]
enum UidRules {
    Rules(Vec<PushRule>),
    Other(IgnoredAny),
}

/// `bilibili.push`: uid keys whose value is not a list are dropped with a warning
/// instead of failing the whole config.
pub fn deserialize_push<'de, D>(de: D) -> Result<BTreeMap<String, Vec<PushRule>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, UidRules>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .filter_map(|(uid, rules)| match rules {
            UidRules::Rules(rules) => Some((uid, rules)),
            UidRules::Other(_) => {
                warn!(target: "config", uid = %uid, "push entry is not a list; skipped");
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DetailedRule {
    pub gid: GroupId,
    #[serde(default)]
    pub dynamic: bool,
    /// Only video-type activity items (ignored when `dynamic` is set).
    #[serde(default)]
    pub video: bool,
    #[serde(default, alias = "dynamicAtAll")]
    pub dynamic_at_all: bool,
    #[serde(default)]
    pub live: bool,
    #[serde(default, alias = "liveAtAll")]
    pub live_at_all: bool,
    #[serde(default)]
    pub seasons: Vec<u64>,
    #[serde(default, alias = "seasonAtAll")]
    pub season_at_all: bool,
}
