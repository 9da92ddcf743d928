//! Portal characteristics and business domain constants.

/// Queue backlog severity thresholds.
///
/// RED thresholds are strict (`count > threshold`); the YELLOW bounds are
/// inclusive (`count >= bound`) and only apply to queues that are not
/// already RED.
pub mod queues {
    /// RED threshold for the member review queue
    pub const RED_MEMBER: u64 = 20;

    /// RED threshold for the listing-fee review queue
    pub const RED_LISTING_FEE: u64 = 20;

    /// RED threshold for the general review queue
    pub const RED_GENERAL: u64 = 250;

    /// RED threshold for the manager review queue
    pub const RED_MANAGER: u64 = 100;

    /// RED threshold for the fraud review queue
    pub const RED_FRAUD: u64 = 70;

    /// RED threshold for the edited-ads review queue
    pub const RED_EDITED: u64 = 250;

    /// RED threshold for the verification queue
    pub const RED_VERIFICATION: u64 = 2000;

    /// YELLOW bound for the general queue
    pub const YELLOW_GENERAL: u64 = 200;

    /// YELLOW bound for the edited-ads queue
    pub const YELLOW_EDITED: u64 = 150;
}

/// Agent activity tracking constants.
pub mod tracking {
    /// Minutes without count progress before an agent is marked idle
    pub const IDLE_THRESHOLD_MINS: i64 = 15;

    /// Hourly ad count below which a low-performance warning is logged
    pub const LOW_PERFORMANCE_HOURLY: u64 = 100;

    /// Permission strings are re-scraped once per this many ticks
    pub const PERMISSION_REFRESH_TICKS: u32 = 60;
}

/// Session log buffer constants.
pub mod logs {
    /// Maximum retained session log entries (newest first, oldest dropped)
    pub const MAX_SESSION_LOGS: usize = 100;
}
