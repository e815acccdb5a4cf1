use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::{Options, SlowConsumerStrategy};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Maximum number of messages queued for a single subscriber
    #[arg(long, env, default_value_t = sse::options::DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Milliseconds a delivery may wait on a full subscriber queue before it counts as failed
    #[arg(long, env, default_value_t = 1000)]
    pub write_timeout_ms: u64,

    /// What to do with subscribers whose queue is full
    #[arg(
        long,
        env,
        default_value_t = SlowConsumerStrategy::DropMessages,
        value_parser = clap::builder::PossibleValuesParser::new([
            "wait", "drop_messages", "disconnect_subscriber",
        ])
            .map(|s| s.parse::<SlowConsumerStrategy>().unwrap()),
    )]
    pub slow_consumer_strategy: SlowConsumerStrategy,

    /// Seconds between two notifications of the built-in notification source
    #[arg(long, env, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub notification_interval_secs: u64,

    /// Seconds to wait for the message source to stop during shutdown
    #[arg(long, env, default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    /// Hub options assembled from the command line / environment.
    pub fn hub_options(&self) -> Options {
        Options::default()
            .with_channel_capacity(self.channel_capacity)
            .with_write_timeout(Duration::from_millis(self.write_timeout_ms))
            .with_slow_consumer_strategy(self.slow_consumer_strategy)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_hub_options() {
        let config = Config::parse_from(["notification_hub"]);
        let options = config.hub_options();

        assert_eq!(options.channel_capacity, 200);
        assert_eq!(options.write_timeout, Duration::from_secs(1));
        assert_eq!(
            options.slow_consumer_strategy,
            SlowConsumerStrategy::DropMessages
        );
        assert_eq!(config.interface(), "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn test_hub_flags_are_parsed() {
        let config = Config::parse_from([
            "notification_hub",
            "--channel-capacity",
            "1",
            "--write-timeout-ms",
            "50",
            "--slow-consumer-strategy",
            "disconnect_subscriber",
            "--notification-interval-secs",
            "2",
        ]);
        let options = config.hub_options();

        assert_eq!(options.channel_capacity, 1);
        assert_eq!(options.write_timeout, Duration::from_millis(50));
        assert_eq!(
            options.slow_consumer_strategy,
            SlowConsumerStrategy::DisconnectSubscriber
        );
        assert_eq!(config.notification_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_notification_interval_is_rejected() {
        let parsed = Config::try_parse_from([
            "notification_hub",
            "--notification-interval-secs",
            "0",
        ]);

        assert!(parsed.is_err());
    }

    #[test]
    fn test_rust_env_parsing() {
        assert_eq!("Production".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("nope".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
