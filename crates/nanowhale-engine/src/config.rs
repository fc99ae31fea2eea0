use std::time::Duration;

use serde::Deserialize;

/// How to reach the container engine
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Program that runs engine subcommands (`wsl` on Windows)
    pub program: String,

    /// Arguments placed before every engine subcommand (`docker` on Windows)
    pub args: Vec<String>,

    /// Command line printing the engine host's current UTC time as RFC3339
    pub clock: Vec<String>,

    /// Upper bound for request/response commands
    pub command_timeout_secs: u64,
}

const CLOCK_FORMAT: &str = "+%Y-%m-%dT%H:%M:%S.%NZ";

impl Default for EngineConfig {
    #[cfg(windows)]
    fn default() -> Self {
        Self {
            program: "wsl".to_string(),
            args: vec!["docker".to_string()],
            clock: vec![
                "wsl".to_string(),
                "date".to_string(),
                "-u".to_string(),
                CLOCK_FORMAT.to_string(),
            ],
            command_timeout_secs: 60,
        }
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            args: Vec::new(),
            clock: vec!["date".to_string(), "-u".to_string(), CLOCK_FORMAT.to_string()],
            command_timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            program = "podman"
            command_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.program, "podman");
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.clock, EngineConfig::default().clock);
    }
}
