// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Platform identities and linked (cross-save) profiles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform a membership lives on.
///
/// Bungie encodes this as an integer everywhere (paths, JSON bodies and the
/// `crossSaveOverride` field), so it round-trips through `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum MembershipType {
    None,
    Xbox,
    Psn,
    Steam,
    Blizzard,
    Stadia,
    Epic,
    Demon,
    BungieNext,
    All,
    Other(i32),
}

impl From<i32> for MembershipType {
    fn from(value: i32) -> Self {
        match value {
            0 => MembershipType::None,
            1 => MembershipType::Xbox,
            2 => MembershipType::Psn,
            3 => MembershipType::Steam,
            4 => MembershipType::Blizzard,
            5 => MembershipType::Stadia,
            6 => MembershipType::Epic,
            10 => MembershipType::Demon,
            254 => MembershipType::BungieNext,
            -1 => MembershipType::All,
            other => MembershipType::Other(other),
        }
    }
}

impl From<MembershipType> for i32 {
    fn from(value: MembershipType) -> Self {
        match value {
            MembershipType::None => 0,
            MembershipType::Xbox => 1,
            MembershipType::Psn => 2,
            MembershipType::Steam => 3,
            MembershipType::Blizzard => 4,
            MembershipType::Stadia => 5,
            MembershipType::Epic => 6,
            MembershipType::Demon => 10,
            MembershipType::BungieNext => 254,
            MembershipType::All => -1,
            MembershipType::Other(other) => other,
        }
    }
}

impl MembershipType {
    pub fn code(self) -> i32 {
        self.into()
    }
}

/// One player account on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub membership_id: String,
    pub membership_type: MembershipType,
}

impl Identity {
    pub fn new(membership_id: impl Into<String>, membership_type: MembershipType) -> Self {
        Self {
            membership_id: membership_id.into(),
            membership_type,
        }
    }

    /// Cache key of the player record owning this identity.
    pub fn player_id(&self) -> PlayerId {
        PlayerId(format!(
            "{}-{}",
            self.membership_id,
            self.membership_type.code()
        ))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.membership_type.code(), self.membership_id)
    }
}

/// `membershipId-membershipType`, the natural key of the `players` collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a name search: an identity plus its cross-save setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedProfile {
    pub identity: Identity,
    /// Platform that owns the cross-save progression, or `None`
    pub cross_save_override: MembershipType,
    pub display_name: String,
    pub display_name_code: Option<u16>,
    pub is_public: bool,
}
