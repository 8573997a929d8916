use std::path::{Path, PathBuf};

use clap::Args;
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Debug, Clone, Args, Default)]
pub struct Config {
    /// Base URL of the gallery API
    #[arg(
        long,
        env = "FOOD_GALLERY_API",
        default_value = "http://localhost:8080/api"
    )]
    api_url: String,
    /// Directory for client-side state (session, liked posts, offline tips)
    #[arg(long, env = "FOOD_GALLERY_STATE", default_value = ".food-gallery")]
    state_dir: PathBuf,
    /// Browse seeded in-memory data instead of talking to the API
    #[arg(long)]
    mock: bool,
    /// Simulated latency of the mock backend, in milliseconds
    #[arg(long, name = "mock-delay", default_value = "300")]
    mock_delay: u64,
    /// Limit request concurrency
    #[arg(short, long, default_value = "5")]
    limit: usize,
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Config {
    /// Create a logger with the configured verbosity level
    pub fn init_logger(&self) {
        env_logger::Builder::new()
            .filter_level(self.verbose.log_level_filter())
            .format_target(false)
            .init();
    }

    /// Base URL without a trailing slash
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub const fn mock(&self) -> bool {
        self.mock
    }

    pub const fn mock_delay(&self) -> u64 {
        self.mock_delay
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[cfg(test)]
    pub fn for_tests(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            state_dir: PathBuf::from(".food-gallery"),
            mock: false,
            mock_delay: 0,
            limit: 5,
            verbose: Verbosity::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_drops_trailing_slash() {
        let config = Config::for_tests("http://localhost:8080/api/");
        assert_eq!(config.api_url(), "http://localhost:8080/api");
    }
}
