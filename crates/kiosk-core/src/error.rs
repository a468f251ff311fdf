//! 错误定义模块

use thiserror::Error;

/// 签到终端统一错误类型
#[derive(Error, Debug)]
pub enum KioskError {
    #[error("CPF格式无效: 需要11位数字, 实际 {digits} 位")]
    InvalidFormat { digits: usize },

    #[error("摄像头不可用: {0}")]
    CameraUnavailable(String),

    #[error("未找到患者记录: {0}")]
    NoRecordFound(String),

    #[error("打印界面不可用: {0}")]
    PrintSurfaceUnavailable(String),

    #[error("无效状态转换: 从 {from} 经 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("当前步骤需要已识别的患者")]
    PatientRequired,

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KioskError {
    /// 是否为可在本地恢复、仅需提示用户的错误
    pub fn is_notice(&self) -> bool {
        matches!(
            self,
            KioskError::InvalidFormat { .. }
                | KioskError::CameraUnavailable(_)
                | KioskError::NoRecordFound(_)
                | KioskError::PrintSurfaceUnavailable(_)
        )
    }
}

/// 签到终端统一结果类型
pub type Result<T> = std::result::Result<T, KioskError>;
