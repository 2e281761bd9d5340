// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Player record: identities, characters, clan and activity logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{ActivityLog, Identity, PlayerId};

/// Character class (`DestinyClass`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum CharacterClass {
    Titan,
    Hunter,
    Warlock,
    Unknown,
}

impl From<u8> for CharacterClass {
    fn from(value: u8) -> Self {
        match value {
            0 => CharacterClass::Titan,
            1 => CharacterClass::Hunter,
            2 => CharacterClass::Warlock,
            _ => CharacterClass::Unknown,
        }
    }
}

impl From<CharacterClass> for u8 {
    fn from(value: CharacterClass) -> Self {
        match value {
            CharacterClass::Titan => 0,
            CharacterClass::Hunter => 1,
            CharacterClass::Warlock => 2,
            CharacterClass::Unknown => 3,
        }
    }
}

/// One in-game character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub character_id: String,
    pub class: CharacterClass,
    /// Power level
    pub light: u32,
    pub date_last_played: DateTime<Utc>,
}

/// Clan reference kept on the player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClanRef {
    pub group_id: String,
    pub name: String,
    pub call_sign: String,
}

/// Clan details as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClanInfo {
    pub group_id: String,
    pub name: String,
    pub call_sign: String,
    pub motto: String,
    pub creation_date: Option<DateTime<Utc>>,
    /// Counts one entry per platform membership, not per player
    pub member_count: u32,
}

impl ClanInfo {
    pub fn to_ref(&self) -> ClanRef {
        ClanRef {
            group_id: self.group_id.clone(),
            name: self.name.clone(),
            call_sign: self.call_sign.clone(),
        }
    }
}

/// One clan roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClanMember {
    pub identity: Identity,
    pub display_name: String,
    pub display_name_code: Option<u16>,
    pub is_online: bool,
}

/// Player record, stored as one blob in the `players` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Canonical identity (also the cache key)
    pub identity: Identity,
    /// Other platform identities linked to this player
    #[serde(default)]
    pub linked_identities: Vec<Identity>,
    pub display_name: String,
    pub display_name_code: Option<u16>,
    /// Characters keyed by character id
    #[serde(default)]
    pub characters: BTreeMap<String, Character>,
    pub clan: Option<ClanRef>,
    /// Activity logs keyed by character id
    #[serde(default)]
    pub activity_logs: BTreeMap<String, ActivityLog>,
    pub last_update: DateTime<Utc>,
}

impl Player {
    /// A player seen for the first time (search result or activity fetch).
    pub fn new(identity: Identity, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            linked_identities: Vec::new(),
            display_name: String::new(),
            display_name_code: None,
            characters: BTreeMap::new(),
            clan: None,
            activity_logs: BTreeMap::new(),
            last_update: now,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.identity.player_id()
    }

    /// Activity log of one character, if any was fetched.
    pub fn log(&self, character_id: &str) -> Option<&ActivityLog> {
        self.activity_logs.get(character_id)
    }

    /// Mutable log of one character, created empty on first use.
    pub fn log_mut(&mut self, character_id: &str) -> &mut ActivityLog {
        self.activity_logs
            .entry(character_id.to_string())
            .or_default()
    }

    /// The character played most recently.
    pub fn last_played_character(&self) -> Option<&Character> {
        self.characters.values().max_by_key(|c| c.date_last_played)
    }

    /// Character ids, most recently played first.
    pub fn character_ids_by_recency(&self) -> Vec<String> {
        let mut characters: Vec<&Character> = self.characters.values().collect();
        characters.sort_by(|a, b| b.date_last_played.cmp(&a.date_last_played));
        characters.into_iter().map(|c| c.character_id.clone()).collect()
    }

    /// Replace the character list. Activity logs are left alone, including
    /// those of deleted characters: their matches were still played.
    pub fn set_characters(&mut self, characters: Vec<Character>, now: DateTime<Utc>) {
        self.characters = characters
            .into_iter()
            .map(|c| (c.character_id.clone(), c))
            .collect();
        self.last_update = now;
    }
}
