//! 配置管理
//!
//! 配置按层叠加：内置默认值 → 可选配置文件 → 环境变量 (`KIOSK__SECTION__FIELD`)。

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use kiosk_core::Language;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "KIOSK";

/// 终端完整配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct KioskConfig {
    pub kiosk: KioskSection,
    pub scan: ScanSection,
    pub cpf: CpfConfig,
    pub queue: QueueConfig,
    pub receipt: ReceiptConfig,
    pub logging: LoggingConfig,
}

/// 终端基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskSection {
    /// 显示名称
    pub name: String,
    /// 语言偏好文件
    pub preference_path: PathBuf,
    /// 宿主区域设置，未设置时读取 `LANG`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_locale: Option<String>,
}

/// 人脸扫描参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanSection {
    pub tick_interval_ms: u64,
    pub progress_step: u8,
    pub classify_after_ms: u64,
}

/// CPF校验参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CpfConfig {
    /// 模拟网络延迟
    pub verify_delay_ms: u64,
}

/// 叫号面板参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub call_interval_secs: u64,
    pub average_wait_minutes: f64,
}

/// 凭条输出
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReceiptConfig {
    /// `stdout` 或 `file`
    pub output: String,
    pub directory: PathBuf,
    pub width: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令
    pub level: String,
    /// `compact` 或 `full`
    pub format: String,
}

impl Default for KioskSection {
    fn default() -> Self {
        Self {
            name: "Camasso Kiosk".to_string(),
            preference_path: PathBuf::from("./data/preferences.json"),
            host_locale: None,
        }
    }
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            progress_step: 5,
            classify_after_ms: 1000,
        }
    }
}

impl ScanSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn classify_after(&self) -> Duration {
        Duration::from_millis(self.classify_after_ms)
    }
}

impl Default for CpfConfig {
    fn default() -> Self {
        Self {
            verify_delay_ms: 1500,
        }
    }
}

impl CpfConfig {
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            call_interval_secs: 30,
            average_wait_minutes: 12.0,
        }
    }
}

impl QueueConfig {
    pub fn call_interval(&self) -> Duration {
        Duration::from_secs(self.call_interval_secs)
    }
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            output: "stdout".to_string(),
            directory: PathBuf::from("./data/receipts"),
            width: 42,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: KioskConfig,
    /// 配置文件路径
    source: Option<PathBuf>,
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 加载并验证配置，文件不存在时仅使用默认值和环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let defaults = Config::try_from(&KioskConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration sources")?;

        let config: KioskConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        match path {
            Some(path) => info!("配置已加载: {}", path.display()),
            None => info!("配置已从默认值和环境变量加载"),
        }
        Ok(Self {
            config,
            source: path.map(Path::to_path_buf),
            validator,
        })
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 重新验证当前配置
    pub fn validate(&self) -> Result<()> {
        self.validator.validate(&self.config)
    }

    /// 写出默认配置 (TOML)
    pub fn write_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&KioskConfig::default())
            .context("Failed to serialize default configuration")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file {}", path.display()))?;

        info!("默认配置已写入: {}", path.display());
        Ok(())
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&KioskConfig) -> Result<()>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "scan.tick_interval_ms",
                validator: |config| {
                    anyhow::ensure!(config.scan.tick_interval_ms > 0, "Tick interval cannot be 0");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "scan.progress_step",
                validator: |config| {
                    anyhow::ensure!(
                        (1..=100).contains(&config.scan.progress_step),
                        "Progress step must be within 1..=100, got {}",
                        config.scan.progress_step
                    );
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "queue.call_interval_secs",
                validator: |config| {
                    anyhow::ensure!(config.queue.call_interval_secs > 0, "Call interval cannot be 0");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "queue.average_wait_minutes",
                validator: |config| {
                    anyhow::ensure!(
                        config.queue.average_wait_minutes.is_finite()
                            && config.queue.average_wait_minutes > 0.0,
                        "Average wait must be positive"
                    );
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "receipt.output",
                validator: |config| match config.receipt.output.as_str() {
                    "stdout" | "file" => Ok(()),
                    other => Err(anyhow::anyhow!("Unknown receipt output: {}", other)),
                },
            },
            ValidationRule {
                field_path: "receipt.width",
                validator: |config| {
                    anyhow::ensure!(config.receipt.width >= 20, "Receipt width below 20 columns");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "kiosk.host_locale",
                validator: |config| {
                    if let Some(locale) = config.kiosk.host_locale.as_deref() {
                        anyhow::ensure!(!locale.trim().is_empty(), "Host locale cannot be blank");
                    }
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "logging.format",
                validator: |config| match config.logging.format.as_str() {
                    "compact" | "full" => Ok(()),
                    other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置，返回第一个失败的规则
    pub fn validate(&self, config: &KioskConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("配置验证失败 {}: {}", rule.field_path, e);
                return Err(e.context(format!("Invalid {}", rule.field_path)));
            }
        }

        info!("配置验证通过");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl KioskSection {
    /// 宿主区域设置：配置优先，其次 `LANG`
    pub fn resolved_host_locale(&self) -> Option<String> {
        self.host_locale
            .clone()
            .or_else(|| std::env::var("LANG").ok())
            .filter(|locale| !locale.is_empty() && locale != "C" && locale != "POSIX")
    }

    /// 宿主区域设置对应的语言
    pub fn detected_language(&self) -> Option<Language> {
        self.resolved_host_locale()
            .map(|locale| Language::from_str(&locale).unwrap_or_else(|_| Language::detect(&locale)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let manager = ConfigManager::load(None).unwrap();
        let config = manager.config();

        assert_eq!(config.scan.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.scan.progress_step, 5);
        assert_eq!(config.cpf.verify_delay(), Duration::from_millis(1500));
        assert_eq!(config.queue.call_interval(), Duration::from_secs(30));
        assert_eq!(config.receipt.output, "stdout");
        assert!(manager.source().is_none());
    }

    #[test]
    fn test_missing_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(manager.config().queue.average_wait_minutes, 12.0);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(
            &path,
            "[scan]\nprogress_step = 10\n\n[receipt]\noutput = \"file\"\nwidth = 32\n",
        )
        .unwrap();

        let manager = ConfigManager::load(Some(&path)).unwrap();
        assert_eq!(manager.config().scan.progress_step, 10);
        assert_eq!(manager.config().scan.tick_interval_ms, 100);
        assert_eq!(manager.config().receipt.output, "file");
        assert_eq!(manager.config().receipt.width, 32);
        assert_eq!(manager.source(), Some(path.as_path()));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(
            &path,
            "[queue]\ncall_interval_secs = 45\naverage_wait_minutes = 20.0\n",
        )
        .unwrap();

        std::env::set_var("KIOSKTEST__QUEUE__CALL_INTERVAL_SECS", "5");
        let manager = ConfigManager::load_with_prefix(Some(&path), "KIOSKTEST").unwrap();
        std::env::remove_var("KIOSKTEST__QUEUE__CALL_INTERVAL_SECS");

        assert_eq!(manager.config().queue.call_interval(), Duration::from_secs(5));
        assert_eq!(manager.config().queue.average_wait_minutes, 20.0);
        assert_eq!(manager.source(), Some(path.as_path()));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");

        std::fs::write(&path, "[scan]\nprogress_step = 0\n").unwrap();
        assert!(ConfigManager::load(Some(&path)).is_err());

        std::fs::write(&path, "[receipt]\noutput = \"fax\"\n").unwrap();
        let err = ConfigManager::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("receipt.output"));
    }

    #[test]
    fn test_validator_rules() {
        let validator = ConfigValidator::new();
        let mut config = KioskConfig::default();
        assert!(validator.validate(&config).is_ok());

        config.queue.average_wait_minutes = 0.0;
        assert!(validator.validate(&config).is_err());

        config = KioskConfig::default();
        config.logging.format = "json".to_string();
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_write_default_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("kiosk.toml");
        ConfigManager::write_default(&path).unwrap();

        let manager = ConfigManager::load(Some(&path)).unwrap();
        assert_eq!(manager.config(), &KioskConfig::default());
    }

    #[test]
    fn test_configured_host_locale() {
        let section = KioskSection {
            host_locale: Some("es-MX".to_string()),
            ..KioskSection::default()
        };
        assert_eq!(section.detected_language(), Some(Language::Es));
    }
}
