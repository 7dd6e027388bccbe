use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
    #[serde(default)]
    pub earnings: EarningsConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

fn default_connect_retries() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8766,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ResolverConfig {
    /// Load the whole node set once per resolve instead of one lookup per step.
    #[serde(default)]
    pub preload_tree: bool,
}

/// Hotness tuning: `score = weighted_engagement / (age_hours + age_offset_hours)^gravity`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrendingConfig {
    pub weight_views: f64,
    pub weight_likes: f64,
    pub weight_comments: f64,
    pub weight_shares: f64,
    pub gravity: f64,
    pub age_offset_hours: f64,
    pub candidate_window: u32,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            weight_views: 1.0,
            weight_likes: 3.0,
            weight_comments: 4.0,
            weight_shares: 5.0,
            gravity: 1.8,
            age_offset_hours: 2.0,
            candidate_window: 500,
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecommendationConfig {
    pub social_weight: f64,
    pub content_weight: f64,
    pub candidate_window: u32,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            social_weight: 0.6,
            content_weight: 0.4,
            candidate_window: 300,
            default_limit: 10,
            max_limit: 50,
        }
    }
}

/// Per-engagement payout rates, in currency units per event.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EarningsConfig {
    pub view_rate: f64,
    pub like_rate: f64,
    pub share_rate: f64,
    pub comment_rate: f64,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        Self {
            view_rate: 0.001,
            like_rate: 0.01,
            share_rate: 0.05,
            comment_rate: 0.02,
        }
    }
}

/// Bounds on the in-process anonymous session registry.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Oldest-touched sessions are dropped beyond this many.
    pub max_sessions: usize,
    /// Sessions untouched for this long are dropped.
    pub idle_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_ttl_secs: 3600,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }

    /// Configuration used by in-memory mode and tests: no database, default tuning.
    pub fn in_memory() -> Self {
        Self {
            service: ServiceConfig {
                socket_path: "/tmp/branchtale.sock".to_string(),
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                connect_retries: 0,
            },
            http: HttpConfig::default(),
            resolver: ResolverConfig::default(),
            trending: TrendingConfig::default(),
            recommendations: RecommendationConfig::default(),
            earnings: EarningsConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}
