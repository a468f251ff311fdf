//! 日志初始化
//!
//! 日志写到标准错误，标准输出留给终端界面和凭条。

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 生效的过滤指令：命令行 > `RUST_LOG` > 配置
pub fn filter_directive(config: &LoggingConfig, cli_level: Option<&str>) -> String {
    let non_blank = |directive: &String| !directive.trim().is_empty();
    cli_level
        .map(str::to_string)
        .filter(non_blank)
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok().filter(non_blank))
        .unwrap_or_else(|| config.level.clone())
}

/// 初始化全局日志订阅器
pub fn init_logging(config: &LoggingConfig, cli_level: Option<&str>) -> Result<()> {
    let directive = filter_directive(config, cli_level);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter: {}", directive))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "full" => builder.try_init(),
        _ => builder.compact().with_target(false).try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::debug!("Logging initialised with filter {}", directive);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_level_wins() {
        let config = LoggingConfig::default();
        assert_eq!(filter_directive(&config, Some("debug")), "debug");
    }

    #[test]
    fn test_blank_cli_level_falls_back() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        let directive = filter_directive(&config, Some("  "));
        assert!(directive == "warn" || std::env::var(EnvFilter::DEFAULT_ENV).is_ok());
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config, Some("kiosk=verbose")).is_err());
    }
}
