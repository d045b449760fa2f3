use std::time::Duration;

use crate::model::SourceConfig;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

pub fn default_config() -> SourceConfig {
    SourceConfig {
        remote_url: None,
        local_path: Some("product_recommendations.csv".into()),
        refresh_interval: DEFAULT_REFRESH_INTERVAL,
        fetch_timeout: DEFAULT_FETCH_TIMEOUT,
    }
}
