use crate::config::{Config, RustEnv};
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ColorChoice, ConfigBuilder, TerminalMode};

/// Modules to filter out from logging when not in Trace mode.
/// The HTTP stack logs every request and keep-alive tick, which buries hub output.
const FILTERED_MODULES: &[&str] = &["tower", "hyper", "axum", "tokio_util", "mio"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger.
    ///
    /// Dependency logs are only shown at Trace level. Outside development the
    /// output is uncoloured and goes to stdout so log collectors get plain lines.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let (terminal_mode, color_choice) = Self::terminal_settings(&config.runtime_env);

        simplelog::TermLogger::init(
            Self::convert_level_filter(config.log_level_filter),
            Self::build_log_config(Self::should_filter_dependencies(config.log_level_filter)),
            terminal_mode,
            color_choice,
        )
    }

    fn convert_level_filter(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn terminal_settings(env: &RustEnv) -> (TerminalMode, ColorChoice) {
        match env {
            RustEnv::Development => (TerminalMode::Mixed, ColorChoice::Auto),
            RustEnv::Staging | RustEnv::Production => (TerminalMode::Stdout, ColorChoice::Never),
        }
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder
            .set_time_format_rfc3339()
            .set_target_level(simplelog::LevelFilter::Error);

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_modules_cover_http_stack() {
        for module in ["tower", "hyper", "axum"] {
            assert!(
                FILTERED_MODULES.contains(&module),
                "{module} should be filtered"
            );
        }
    }

    #[test]
    fn test_workspace_crates_are_never_filtered() {
        for module in ["sse", "service", "web", "events", "notification_hub"] {
            assert!(
                !FILTERED_MODULES
                    .iter()
                    .any(|filtered| module.starts_with(filtered)),
                "{module} must not be filtered"
            );
        }
    }

    #[test]
    fn test_only_trace_shows_dependency_logs() {
        assert!(!Logger::should_filter_dependencies(LevelFilter::Trace));
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(Logger::should_filter_dependencies(level), "{level}");
        }
    }

    #[test]
    fn test_terminal_settings_per_environment() {
        assert!(matches!(
            Logger::terminal_settings(&RustEnv::Development),
            (TerminalMode::Mixed, ColorChoice::Auto)
        ));
        assert!(matches!(
            Logger::terminal_settings(&RustEnv::Production),
            (TerminalMode::Stdout, ColorChoice::Never)
        ));
    }

    #[test]
    fn test_convert_level_filter_preserves_ordering() {
        assert_eq!(
            Logger::convert_level_filter(LevelFilter::Warn) as u8,
            simplelog::LevelFilter::Warn as u8
        );
        assert_eq!(
            Logger::convert_level_filter(LevelFilter::Trace) as u8,
            simplelog::LevelFilter::Trace as u8
        );
    }

    #[test]
    fn test_build_log_config_does_not_panic() {
        let _filtered = Logger::build_log_config(true);
        let _unfiltered = Logger::build_log_config(false);
    }
}
