// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use serde::{Deserialize, Serialize};

/// Activity (map) definition, stored in the `maps` collection by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDefinition {
    pub reference_id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Relative image path on bungie.net
    pub image: Option<String>,
}
