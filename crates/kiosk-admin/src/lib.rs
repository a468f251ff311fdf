//! # 签到终端管理模块
//!
//! 提供终端运行所需的配置加载、验证以及日志初始化。

pub mod config;
pub mod logging;

pub use config::{
    ConfigManager, ConfigValidator, CpfConfig, KioskConfig, KioskSection, LoggingConfig,
    QueueConfig, ReceiptConfig, ScanSection,
};
pub use logging::{filter_directive, init_logging};
