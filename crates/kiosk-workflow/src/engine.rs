//! 签到终端协调器
//!
//! 将用户操作和识别事件汇总到签到流程上：
//! 为身份识别步骤挂载当前识别方式，在离开该步骤时拆除，
//! 并把可恢复错误转为本地化提示，不向外传播。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use kiosk_core::{
    IdentificationMethod, IdentificationResult, KioskError, Language, LanguageContext, Patient,
    Result, TranslationKey,
};
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::flow::{CheckInFlow, KioskView, PrintOutcome};
use crate::identification::{
    Camera, CameraStatus, CpfEntry, FaceScan, GenderClassifier, IdentificationEvent,
    IdentificationEventKind, ScanConfig,
};
use crate::state_machine::KioskStep;

/// 协调器参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scan: ScanConfig,
    pub cpf_verify_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            cpf_verify_delay: Duration::from_millis(1500),
        }
    }
}

/// 提示级别
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// 面向用户的提示
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// 识别成功提示
    pub fn identified(result: &IdentificationResult, lang: &LanguageContext) -> Self {
        let title = match result.method {
            IdentificationMethod::Face => TranslationKey::FaceScanComplete,
            IdentificationMethod::Cpf => TranslationKey::CpfVerified,
        };
        Self::info(format!(
            "{}. {}",
            lang.t(title),
            lang.t(TranslationKey::IdentityVerified)
        ))
    }

    /// 错误转为当前语言的提示
    pub fn from_error(error: &KioskError, lang: &LanguageContext) -> Self {
        let (level, key) = match error {
            KioskError::InvalidFormat { .. } => (NoticeLevel::Error, TranslationKey::InvalidCpf),
            KioskError::CameraUnavailable(_) => {
                (NoticeLevel::Warning, TranslationKey::CameraUnavailable)
            }
            KioskError::NoRecordFound(_) => (NoticeLevel::Error, TranslationKey::NoRecordFound),
            KioskError::PrintSurfaceUnavailable(_) => {
                (NoticeLevel::Warning, TranslationKey::PrintUnavailable)
            }
            other => {
                return Self {
                    level: NoticeLevel::Error,
                    message: other.to_string(),
                }
            }
        };

        Self {
            level,
            message: lang.t(key).to_string(),
        }
    }
}

/// 协调器输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineUpdate {
    StepChanged(KioskStep),
    ScanProgress(u8),
    Notice(Notice),
}

/// 当前挂载的识别方式
#[derive(Debug)]
enum ActiveIdentifier {
    Face(FaceScan),
    Cpf(CpfEntry),
}

impl ActiveIdentifier {
    fn id(&self) -> Uuid {
        match self {
            ActiveIdentifier::Face(scan) => scan.id(),
            ActiveIdentifier::Cpf(entry) => entry.id(),
        }
    }

    fn cancel(&mut self) -> bool {
        match self {
            ActiveIdentifier::Face(scan) => scan.cancel(),
            ActiveIdentifier::Cpf(entry) => entry.cancel(),
        }
    }
}

/// 签到终端协调器
#[derive(Debug)]
pub struct KioskEngine {
    flow: CheckInFlow,
    lang: LanguageContext,
    camera: Arc<dyn Camera>,
    classifier: Arc<dyn GenderClassifier>,
    settings: EngineSettings,
    active: Option<ActiveIdentifier>,
    events_tx: UnboundedSender<IdentificationEvent>,
    events_rx: UnboundedReceiver<IdentificationEvent>,
    /// 随识别事件产生、尚未交出的输出
    queued: VecDeque<EngineUpdate>,
}

impl KioskEngine {
    pub fn new(
        flow: CheckInFlow,
        lang: LanguageContext,
        camera: Arc<dyn Camera>,
        classifier: Arc<dyn GenderClassifier>,
        settings: EngineSettings,
    ) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            flow,
            lang,
            camera,
            classifier,
            settings,
            active: None,
            events_tx,
            events_rx,
            queued: VecDeque::new(),
        }
    }

    pub fn flow(&self) -> &CheckInFlow {
        &self.flow
    }

    pub fn step(&self) -> KioskStep {
        self.flow.step()
    }

    pub fn view(&self) -> KioskView<'_> {
        self.flow.view()
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.flow.patient()
    }

    pub fn lang(&self) -> &LanguageContext {
        &self.lang
    }

    pub fn language(&self) -> Language {
        self.lang.language()
    }

    /// 切换界面语言并保存偏好
    pub fn set_language(&mut self, language: Language) -> Result<()> {
        self.lang.set_language(language)
    }

    /// 当前扫描进度，未在人脸扫描时为 `None`
    pub fn scan_progress(&self) -> Option<u8> {
        match &self.active {
            Some(ActiveIdentifier::Face(scan)) => Some(scan.progress()),
            _ => None,
        }
    }

    /// CPF输入框当前显示值
    pub fn cpf_value(&self) -> Option<&str> {
        match &self.active {
            Some(ActiveIdentifier::Cpf(entry)) => Some(entry.value()),
            _ => None,
        }
    }

    fn mount(&mut self, method: IdentificationMethod) {
        self.teardown();
        let identifier = match method {
            IdentificationMethod::Face => ActiveIdentifier::Face(FaceScan::new(
                self.camera.clone(),
                self.classifier.clone(),
                self.settings.scan.clone(),
                self.events_tx.clone(),
            )),
            IdentificationMethod::Cpf => ActiveIdentifier::Cpf(CpfEntry::new(
                self.settings.cpf_verify_delay,
                self.events_tx.clone(),
            )),
        };
        debug!("Mounted {} identifier {}", method, identifier.id());
        self.active = Some(identifier);
    }

    /// 拆除识别实例，不发出事件
    fn teardown(&mut self) {
        self.queued.clear();
        if let Some(identifier) = self.active.take() {
            debug!("Tearing down identifier {}", identifier.id());
        }
    }

    fn rejected(&self, action: &str, error: KioskError) -> Vec<EngineUpdate> {
        if error.is_notice() {
            return vec![EngineUpdate::Notice(Notice::from_error(&error, &self.lang))];
        }
        debug!("Ignoring {} on {:?}: {}", action, self.flow.step(), error);
        Vec::new()
    }

    /// 欢迎页选择识别方式
    pub fn select_method(&mut self, method: IdentificationMethod) -> Vec<EngineUpdate> {
        match self.flow.select_method(method) {
            Ok(step) => {
                self.mount(method);
                vec![EngineUpdate::StepChanged(step)]
            }
            Err(e) => self.rejected("method selection", e),
        }
    }

    /// 身份识别中切换识别方式，原实例被拆除
    pub fn switch_method(&mut self, method: IdentificationMethod) -> Vec<EngineUpdate> {
        if self.flow.step() == KioskStep::Identification && self.flow.method() == method {
            return Vec::new();
        }
        match self.flow.switch_method(method) {
            Ok(()) => {
                self.mount(method);
                Vec::new()
            }
            Err(e) => self.rejected("method switch", e),
        }
    }

    /// 开始人脸扫描
    pub fn start_face_scan(&mut self) -> Vec<EngineUpdate> {
        let Some(ActiveIdentifier::Face(scan)) = self.active.as_mut() else {
            debug!("No face scan mounted");
            return Vec::new();
        };
        match scan.start() {
            Ok(CameraStatus::Live) => Vec::new(),
            Ok(CameraStatus::Placeholder(reason)) => {
                let error = KioskError::CameraUnavailable(reason);
                vec![EngineUpdate::Notice(Notice::from_error(&error, &self.lang))]
            }
            Err(e) => self.rejected("scan start", e),
        }
    }

    /// CPF输入，返回格式化后的显示值
    pub fn type_cpf(&mut self, raw: &str) -> Option<String> {
        match self.active.as_mut() {
            Some(ActiveIdentifier::Cpf(entry)) => Some(entry.input(raw).to_string()),
            _ => None,
        }
    }

    /// 提交CPF
    pub fn submit_cpf(&mut self, raw: &str) -> Vec<EngineUpdate> {
        let Some(ActiveIdentifier::Cpf(entry)) = self.active.as_mut() else {
            debug!("No CPF entry mounted");
            return Vec::new();
        };
        match entry.submit(raw) {
            Ok(()) => vec![EngineUpdate::Notice(Notice::info(
                self.lang.t(TranslationKey::Verifying),
            ))],
            Err(e) => self.rejected("CPF submission", e),
        }
    }

    /// 用户取消识别，取消事件到达后回到欢迎页
    pub fn cancel_identification(&mut self) -> Vec<EngineUpdate> {
        if self.active.as_mut().is_some_and(ActiveIdentifier::cancel) {
            return Vec::new();
        }
        self.back()
    }

    /// 返回上一步
    pub fn back(&mut self) -> Vec<EngineUpdate> {
        if !self.flow.can_go_back() {
            return Vec::new();
        }
        vec![EngineUpdate::StepChanged(self.back_step())]
    }

    fn back_step(&mut self) -> KioskStep {
        let leaving = self.flow.step();
        let step = self.flow.back();
        if leaving == KioskStep::Identification {
            self.teardown();
        } else if step == KioskStep::Identification {
            self.mount(self.flow.method());
        }
        step
    }

    /// “不是我”
    pub fn reject(&mut self) -> Vec<EngineUpdate> {
        match self.flow.reject() {
            Ok(step) => {
                self.mount(self.flow.method());
                vec![EngineUpdate::StepChanged(step)]
            }
            Err(e) => self.rejected("rejection", e),
        }
    }

    /// 确认身份并打印凭条
    pub fn confirm(&mut self) -> Vec<EngineUpdate> {
        let printing = EngineUpdate::Notice(Notice::info(self.lang.t(TranslationKey::Printing)));
        match self.flow.confirm(&self.lang) {
            Ok(PrintOutcome::Printed) => {
                vec![printing, EngineUpdate::StepChanged(self.flow.step())]
            }
            Ok(PrintOutcome::Failed(e)) => vec![
                printing,
                EngineUpdate::Notice(Notice::from_error(&e, &self.lang)),
                EngineUpdate::StepChanged(self.flow.step()),
            ],
            Err(e) => self.rejected("confirmation", e),
        }
    }

    /// 开始新的签到
    pub fn new_session(&mut self) -> Vec<EngineUpdate> {
        match self.flow.new_session() {
            Ok(step) => {
                self.teardown();
                info!("开始新的签到会话");
                vec![EngineUpdate::StepChanged(step)]
            }
            Err(e) => self.rejected("new session", e),
        }
    }

    /// 等待下一个识别事件
    ///
    /// 已拆除实例的事件被丢弃。可在 `select!` 中安全取消。
    pub async fn next_event(&mut self) -> Option<EngineUpdate> {
        if let Some(update) = self.queued.pop_front() {
            return Some(update);
        }
        loop {
            let event = self.events_rx.recv().await?;
            if self.active.as_ref().map(ActiveIdentifier::id) != Some(event.source) {
                debug!("Dropping stale event from {}", event.source);
                continue;
            }

            match event.kind {
                IdentificationEventKind::Progress(progress) => {
                    return Some(EngineUpdate::ScanProgress(progress));
                }
                IdentificationEventKind::Completed(result) => {
                    self.teardown();
                    match self.flow.complete_identification(&result) {
                        Ok(step) => {
                            self.queued.push_back(EngineUpdate::Notice(Notice::identified(
                                &result,
                                &self.lang,
                            )));
                            return Some(EngineUpdate::StepChanged(step));
                        }
                        Err(e) if e.is_notice() => {
                            self.mount(self.flow.method());
                            return Some(EngineUpdate::Notice(Notice::from_error(&e, &self.lang)));
                        }
                        Err(e) => {
                            warn!("识别结果已丢弃: {}", e);
                            continue;
                        }
                    }
                }
                IdentificationEventKind::Cancelled => {
                    self.teardown();
                    if self.flow.step() != KioskStep::Identification {
                        continue;
                    }
                    return Some(EngineUpdate::StepChanged(self.flow.back()));
                }
            }
        }
    }
}
