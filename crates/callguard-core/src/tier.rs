//! Security tiers and user permissions.
//!
//! Two vocabularies describe the same three dispositions:
//!
//! - [`Tier`] is what the command classifier speaks (`Disabled`,
//!   `AskPermission`, `AllowedWithoutPermission`).
//! - [`Permission`] is what users write in their policies (`exclude`,
//!   `ask`, `allow`).
//!
//! They convert losslessly into each other. Keeping them apart makes the
//! reconciliation step explicit: user policy and dynamic classification are
//! different authorities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classifier tier, ordered from least to most restrictive.
///
/// The derived `Ord` is the security order, so `max` picks the more
/// restrictive tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    AllowedWithoutPermission,
    AskPermission,
    Disabled,
}

impl Tier {
    /// The more restrictive of two tiers.
    pub fn most_restrictive(self, other: Tier) -> Tier {
        self.max(other)
    }

    pub fn is_disabled(self) -> bool {
        self == Tier::Disabled
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::AllowedWithoutPermission => "allowedWithoutPermission",
            Tier::AskPermission => "askPermission",
            Tier::Disabled => "disabled",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most restrictive tier of a sequence.
///
/// `Disabled` if any is `Disabled`, else `AskPermission` if any is
/// `AskPermission`, else `AllowedWithoutPermission` (also for an empty
/// sequence).
pub fn most_restrictive<I>(tiers: I) -> Tier
where
    I: IntoIterator<Item = Tier>,
{
    tiers
        .into_iter()
        .max()
        .unwrap_or(Tier::AllowedWithoutPermission)
}

/// User-facing permission attached to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Allow,
    Ask,
    Exclude,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Allow => "allow",
            Permission::Ask => "ask",
            Permission::Exclude => "exclude",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown permission '{0}' (expected allow, ask or exclude)")]
pub struct ParsePermissionError(pub String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Permission::Allow),
            "ask" => Ok(Permission::Ask),
            "exclude" => Ok(Permission::Exclude),
            _ => Err(ParsePermissionError(s.to_string())),
        }
    }
}

impl From<Permission> for Tier {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::Allow => Tier::AllowedWithoutPermission,
            Permission::Ask => Tier::AskPermission,
            Permission::Exclude => Tier::Disabled,
        }
    }
}

impl From<Tier> for Permission {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::AllowedWithoutPermission => Permission::Allow,
            Tier::AskPermission => Permission::Ask,
            Tier::Disabled => Permission::Exclude,
        }
    }
}
