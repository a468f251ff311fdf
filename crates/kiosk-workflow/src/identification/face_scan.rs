//! 定时人脸扫描
//!
//! 进度按固定步长递增到100；扫描开始后延迟一段时间做一次性别分类，
//! 分类结果缓存到扫描结束。完成或取消时释放摄像头。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kiosk_core::{Gender, IdentificationResult, KioskError, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::camera::{Camera, CameraLease, CameraRequest};
use super::classifier::GenderClassifier;
use super::{IdentificationEvent, IdentificationEventKind};
use crate::scheduler::{DelayedTask, RepeatingTask, TickControl};

/// 扫描参数
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub tick_interval: Duration,
    pub progress_step: u8,
    /// 扫描开始到性别分类的延迟
    pub classify_after: Duration,
    pub camera: CameraRequest,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            progress_step: 5,
            classify_after: Duration::from_millis(1000),
            camera: CameraRequest::default(),
        }
    }
}

/// 扫描阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Completed,
    Cancelled,
}

/// 扫描启动时的摄像头状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    /// 实时视频
    Live,
    /// 摄像头不可用，显示占位画面，扫描继续
    Placeholder(String),
}

#[derive(Debug)]
struct ScanState {
    phase: ScanPhase,
    progress: u8,
    detected: Option<Gender>,
    lease: Option<CameraLease>,
}

impl ScanState {
    fn release_camera(&mut self) {
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
    }
}

fn lock(state: &Mutex<ScanState>) -> MutexGuard<'_, ScanState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 人脸扫描
#[derive(Debug)]
pub struct FaceScan {
    id: Uuid,
    camera: Arc<dyn Camera>,
    classifier: Arc<dyn GenderClassifier>,
    config: ScanConfig,
    events: UnboundedSender<IdentificationEvent>,
    state: Arc<Mutex<ScanState>>,
    ticker: Option<RepeatingTask>,
    classification: Option<DelayedTask>,
}

impl FaceScan {
    pub fn new(
        camera: Arc<dyn Camera>,
        classifier: Arc<dyn GenderClassifier>,
        config: ScanConfig,
        events: UnboundedSender<IdentificationEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera,
            classifier,
            config,
            events,
            state: Arc::new(Mutex::new(ScanState {
                phase: ScanPhase::Idle,
                progress: 0,
                detected: None,
                lease: None,
            })),
            ticker: None,
            classification: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> ScanPhase {
        lock(&self.state).phase
    }

    pub fn progress(&self) -> u8 {
        lock(&self.state).progress
    }

    /// 当前是否持有摄像头
    pub fn camera_active(&self) -> bool {
        lock(&self.state)
            .lease
            .as_ref()
            .is_some_and(|lease| !lease.is_released())
    }

    /// 开始扫描
    ///
    /// 摄像头获取失败不会阻止扫描，只返回占位状态。
    /// 进度步长为0时扫描无法结束，返回 [`KioskError::Validation`]。
    pub fn start(&mut self) -> Result<CameraStatus> {
        if self.config.progress_step == 0 {
            return Err(KioskError::Validation(
                "scan progress_step must be greater than 0".to_string(),
            ));
        }

        let mut state = lock(&self.state);
        if state.phase != ScanPhase::Idle {
            return Err(KioskError::InvalidStateTransition {
                from: format!("{:?}", state.phase),
                event: "start".to_string(),
            });
        }

        let status = match CameraLease::acquire(self.camera.clone(), &self.config.camera) {
            Ok(lease) => {
                state.lease = Some(lease);
                CameraStatus::Live
            }
            Err(e) => {
                warn!("扫描 {} 在无视频情况下继续: {}", self.id, e);
                CameraStatus::Placeholder(e.to_string())
            }
        };

        state.phase = ScanPhase::Scanning;
        state.progress = 0;
        state.detected = None;
        drop(state);

        self.classification = Some(self.spawn_classification());
        self.ticker = Some(self.spawn_ticker());

        info!("人脸扫描 {} 已开始", self.id);
        Ok(status)
    }

    /// 取消扫描
    ///
    /// 返回后不会再有回调修改扫描状态，也不会再发出完成事件。
    pub fn cancel(&mut self) -> bool {
        let cancelled = {
            let mut state = lock(&self.state);
            match state.phase {
                ScanPhase::Idle | ScanPhase::Scanning => {
                    state.phase = ScanPhase::Cancelled;
                    state.release_camera();
                    true
                }
                ScanPhase::Completed | ScanPhase::Cancelled => false,
            }
        };
        self.stop_timers();

        if cancelled {
            info!("人脸扫描 {} 已取消", self.id);
            let _ = self
                .events
                .send(IdentificationEvent::new(self.id, IdentificationEventKind::Cancelled));
        }
        cancelled
    }

    fn stop_timers(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
        if let Some(mut classification) = self.classification.take() {
            classification.cancel();
        }
    }

    fn spawn_classification(&self) -> DelayedTask {
        let state = self.state.clone();
        let classifier = self.classifier.clone();
        let id = self.id;

        DelayedTask::spawn(self.config.classify_after, move || {
            let mut state = lock(&state);
            if state.phase != ScanPhase::Scanning || state.detected.is_some() {
                return;
            }
            let frame = state.lease.as_ref().and_then(CameraLease::frame);
            let gender = classifier.classify(frame.as_ref());
            state.detected = Some(gender);
            debug!("Scan {} classified as {:?}", id, gender);
        })
    }

    fn spawn_ticker(&self) -> RepeatingTask {
        let state = self.state.clone();
        let events = self.events.clone();
        let id = self.id;
        let step = self.config.progress_step;

        RepeatingTask::spawn(self.config.tick_interval, move || {
            let mut state = lock(&state);
            if state.phase != ScanPhase::Scanning {
                return TickControl::Stop;
            }

            state.progress = state.progress.saturating_add(step).min(100);
            let progress = state.progress;
            let _ = events.send(IdentificationEvent::new(
                id,
                IdentificationEventKind::Progress(progress),
            ));
            if progress < 100 {
                return TickControl::Continue;
            }

            // TODO: confirm the fallback gender with product before a real classifier ships
            let gender = state.detected.unwrap_or_else(|| {
                warn!("扫描 {} 在性别分类前结束，默认为男性", id);
                Gender::Male
            });
            state.phase = ScanPhase::Completed;
            state.release_camera();

            info!("人脸扫描 {} 已完成", id);
            let _ = events.send(IdentificationEvent::new(
                id,
                IdentificationEventKind::Completed(IdentificationResult::from_face(gender)),
            ));
            TickControl::Stop
        })
    }
}

impl Drop for FaceScan {
    fn drop(&mut self) {
        self.stop_timers();
        let mut state = lock(&self.state);
        if state.phase == ScanPhase::Scanning {
            state.phase = ScanPhase::Cancelled;
        }
        state.release_camera();
    }
}
