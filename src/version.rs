// Version information for curatebench, taken from Cargo metadata

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_string() -> String {
    format!("v{}", VERSION)
}

/// User-Agent sent with every backend request
pub fn user_agent() -> String {
    format!("curatebench/{}", VERSION)
}
