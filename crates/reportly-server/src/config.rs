use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub default_days: u32,
    pub source: SourceKind,
    pub api_url: String,
    pub timeout_secs: u64,
    pub seed: u64,
}

/// Which report backend the server is wired to.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Holds the analytics property id read from `REPORTLY_PROPERTY_ID`.
    Live(String),
    Synthetic,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("REPORTLY_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("REPORTLY_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            default_days: std::env::var("REPORTLY_DEFAULT_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            source: {
                let raw =
                    std::env::var("REPORTLY_SOURCE").unwrap_or_else(|_| "synthetic".to_string());
                match raw.as_str() {
                    "live" => {
                        let property_id = std::env::var("REPORTLY_PROPERTY_ID").map_err(|_| {
                            "REPORTLY_PROPERTY_ID required when REPORTLY_SOURCE=live".to_string()
                        })?;
                        SourceKind::Live(property_id)
                    }
                    _ => SourceKind::Synthetic,
                }
            },
            api_url: std::env::var("REPORTLY_API_URL")
                .unwrap_or_else(|_| "https://analyticsdata.googleapis.com".to_string()),
            timeout_secs: std::env::var("REPORTLY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            seed: std::env::var("REPORTLY_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse()
                .unwrap_or(42),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
