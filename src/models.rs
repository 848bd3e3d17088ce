use time::OffsetDateTime;

/// Unit token reported by this scale family
pub const WEIGHT_UNIT: &str = "kg";

/// Sanity bounds of the device, inclusive
pub const MIN_WEIGHT: f64 = 0.0;
pub const MAX_WEIGHT: f64 = 500.0;

/// The latest successfully parsed sample. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub weight: f64,
    pub unit: &'static str,
    pub captured_at: OffsetDateTime,
}

impl Reading {
    pub fn new(weight: f64) -> Self {
        Reading {
            weight,
            unit: WEIGHT_UNIT,
            captured_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Point-in-time health summary of the acquisition engine
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub running: bool,
    pub connected: bool,
    pub port: String,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn new(port: &str) -> Self {
        ConnectionStatus {
            running: false,
            connected: false,
            port: port.to_string(),
            last_error: None,
        }
    }
}
