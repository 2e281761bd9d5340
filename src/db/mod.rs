//! Database layer (on-device sled cache).

pub mod cache;

pub use cache::CacheDb;

/// Collection names as constants.
pub mod collections {
    /// Player records (keyed by `membershipId-membershipType`)
    pub const PLAYERS: &str = "players";
    /// Post-game carnage reports (keyed by instance id)
    pub const CARNAGE_REPORTS: &str = "carnageReports";
    /// Activity definitions (keyed by reference id)
    pub const MAPS: &str = "maps";
}
