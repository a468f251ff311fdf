//! # 签到工作流模块
//!
//! 提供自助签到终端的完整流程管理功能，包括：
//! - 签到状态机：欢迎 → 身份识别 → 确认 → 完成
//! - 身份识别模拟：定时人脸扫描与CPF录入两种策略
//! - 患者目录：固定示例患者数据及查找
//! - 候诊估算与叫号面板
//! - 签到凭条渲染与打印

pub mod catalog;
pub mod engine;
pub mod estimator;
pub mod flow;
pub mod identification;
pub mod queue;
pub mod receipt;
pub mod scheduler;
pub mod state_machine;

// 重新导出主要类型
pub use catalog::{LookupCriteria, PatientCatalog};
pub use engine::{EngineSettings, EngineUpdate, KioskEngine, Notice, NoticeLevel};
pub use estimator::{busy_level_at, classify_busy_level, destination_factor, estimate_wait, BusyLevel};
pub use flow::{CheckInFlow, KioskView, PrintOutcome};
pub use identification::{
    Camera, CameraLease, CameraRequest, CameraStatus, CpfEntry, EntryPhase, FaceScan,
    FixedClassifier, GenderClassifier, IdentificationEvent, IdentificationEventKind,
    RandomClassifier, ScanConfig, ScanPhase, SimulatedCamera,
};
pub use queue::{QueueBoard, QueuePanel, QueueStats, QueueUpdate};
pub use receipt::{
    FileSurface, PrintSurface, ReceiptDocument, ReceiptPrinter, ReceiptProcedure, StdoutSurface,
};
pub use scheduler::{DelayedTask, RepeatingTask, TickControl};
pub use state_machine::{KioskEvent, KioskStateMachine, KioskStep};
