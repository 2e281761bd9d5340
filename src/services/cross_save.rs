// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pick the canonical identity out of a set of linked platform profiles.

use crate::error::AppError;
use crate::models::{Identity, LinkedProfile, MembershipType};

/// Outcome of resolving one searched name.
#[derive(Debug, Clone, PartialEq)]
pub enum CrossSaveResolution {
    /// No profile at all.
    NotFound,
    /// Exactly one identity to query.
    Canonical(Identity),
    /// Several profiles and no override: the caller must choose.
    Ambiguous(Vec<Identity>),
    /// An override names a platform missing from the set. `fallback` is the
    /// first entry; data fetched through it may be incomplete.
    Incomplete { fallback: Identity },
}

impl CrossSaveResolution {
    /// The canonical identity, or a typed error for every other outcome.
    ///
    /// `Incomplete` is accepted: the fallback is reported, not fabricated.
    pub fn into_canonical(self) -> Result<Identity, AppError> {
        match self {
            CrossSaveResolution::Canonical(identity) => Ok(identity),
            CrossSaveResolution::Incomplete { fallback } => Ok(fallback),
            CrossSaveResolution::NotFound => {
                Err(AppError::NotFound("No player matches this name".to_string()))
            }
            CrossSaveResolution::Ambiguous(candidates) => Err(AppError::Unresolved(format!(
                "{} linked profiles without a cross-save override",
                candidates.len()
            ))),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CrossSaveResolution::Canonical(_))
    }
}

/// Resolve a set of linked profiles.
pub fn resolve(profiles: &[LinkedProfile]) -> CrossSaveResolution {
    let Some(first) = profiles.first() else {
        return CrossSaveResolution::NotFound;
    };

    if profiles.len() == 1 {
        return CrossSaveResolution::Canonical(first.identity.clone());
    }

    let override_type = profiles
        .iter()
        .map(|p| p.cross_save_override)
        .find(|o| *o != MembershipType::None);

    let Some(override_type) = override_type else {
        return CrossSaveResolution::Ambiguous(
            profiles.iter().map(|p| p.identity.clone()).collect(),
        );
    };

    match profiles
        .iter()
        .find(|p| p.identity.membership_type == override_type)
    {
        Some(profile) => CrossSaveResolution::Canonical(profile.identity.clone()),
        None => {
            tracing::warn!(
                override_type = override_type.code(),
                profiles = profiles.len(),
                "Cross-save override names a platform not in the result set"
            );
            CrossSaveResolution::Incomplete {
                fallback: first.identity.clone(),
            }
        }
    }
}

/// Whether a profile carries its own progression: no cross-save, or the
/// cross-save owner itself. Used to show each clan member once.
pub fn is_canonical_profile(profile: &LinkedProfile) -> bool {
    profile.cross_save_override == MembershipType::None
        || profile.cross_save_override == profile.identity.membership_type
}
