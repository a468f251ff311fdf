//! 身份识别模拟
//!
//! 两种可互换的识别策略，各自是独立的状态机，最终都只发出一个终止事件：
//! 识别完成（附带统一的 [`IdentificationResult`]）或已取消。

pub mod camera;
pub mod classifier;
pub mod cpf_entry;
pub mod face_scan;

use kiosk_core::IdentificationResult;
use uuid::Uuid;

pub use camera::{Camera, CameraLease, CameraRequest, FacingMode, Frame, SimulatedCamera};
pub use classifier::{FixedClassifier, GenderClassifier, RandomClassifier};
pub use cpf_entry::{CpfEntry, EntryPhase};
pub use face_scan::{CameraStatus, FaceScan, ScanConfig, ScanPhase};

/// 识别事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationEvent {
    /// 发出事件的识别实例
    pub source: Uuid,
    pub kind: IdentificationEventKind,
}

impl IdentificationEvent {
    pub fn new(source: Uuid, kind: IdentificationEventKind) -> Self {
        Self { source, kind }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            IdentificationEventKind::Completed(_) | IdentificationEventKind::Cancelled
        )
    }
}

/// 识别事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentificationEventKind {
    /// 扫描进度 (0-100)
    Progress(u8),
    Completed(IdentificationResult),
    Cancelled,
}
