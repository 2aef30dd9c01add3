/// Delay between two presentation retries, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Retries attempted before a deferred update is abandoned
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 10;

/// Separator used to build per-portfolio position keys for diagnostics
pub const POSITION_KEY_SEPARATOR: &str = ":";

/// Push message type tags
pub mod message_types {
    pub const ACCOUNTS: &str = "accounts";
    pub const PORTFOLIO_VALUES: &str = "portfolio_values";
    pub const PORTFOLIO_POSITIONS: &str = "portfolio_positions";
}

/// Builds the diagnostics key of a position. Positions are tracked per
/// portfolio, the same security in two portfolios is two entities.
pub fn position_key(portfolio_uuid: &str, security_uuid: &str) -> String {
    format!("{portfolio_uuid}{POSITION_KEY_SEPARATOR}{security_uuid}")
}
