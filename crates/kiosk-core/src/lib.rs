//! # Kiosk Core
//!
//! 自助签到终端的核心模块，提供基础数据结构、错误定义、本地化和通用工具。

pub mod error;
pub mod locale;
pub mod models;
pub mod utils;

pub use error::{KioskError, Result};
pub use locale::{
    FilePreferenceStore, Language, LanguageContext, MemoryPreferenceStore, PreferenceStore,
    TranslationKey,
};
pub use models::*;
