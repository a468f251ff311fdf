//! 摄像头能力
//!
//! 扫描期间通过 [`CameraLease`] 独占摄像头，租约释放是幂等的，
//! 在扫描完成、取消或实例销毁时都会释放。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use kiosk_core::{KioskError, Result};
use serde::{Deserialize, Serialize};

/// 摄像头朝向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// 摄像头请求参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CameraRequest {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

/// 单帧灰度图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// 宿主提供的摄像头
pub trait Camera: Send + Sync + fmt::Debug {
    /// 打开视频流，返回流标识
    fn open(&self, request: &CameraRequest) -> Result<u64>;

    /// 采集当前帧
    fn capture(&self, stream: u64) -> Option<Frame>;

    /// 关闭视频流
    fn close(&self, stream: u64);
}

/// 摄像头租约
#[derive(Debug)]
pub struct CameraLease {
    camera: Arc<dyn Camera>,
    stream: u64,
    released: bool,
}

impl CameraLease {
    /// 申请摄像头
    pub fn acquire(camera: Arc<dyn Camera>, request: &CameraRequest) -> Result<Self> {
        let stream = camera.open(request)?;
        tracing::debug!("Camera stream {} acquired", stream);
        Ok(Self {
            camera,
            stream,
            released: false,
        })
    }

    pub fn frame(&self) -> Option<Frame> {
        if self.released {
            return None;
        }
        self.camera.capture(self.stream)
    }

    /// 释放摄像头，可重复调用
    pub fn release(&mut self) {
        if !self.released {
            self.camera.close(self.stream);
            self.released = true;
            tracing::debug!("Camera stream {} released", self.stream);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// 模拟摄像头
///
/// 同一时间只允许一个活动流；可模拟宿主拒绝权限。
#[derive(Debug)]
pub struct SimulatedCamera {
    permission_granted: bool,
    active: Mutex<Option<(u64, CameraRequest)>>,
    next_stream: AtomicU64,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            permission_granted: true,
            active: Mutex::new(None),
            next_stream: AtomicU64::new(1),
        }
    }

    /// 宿主拒绝摄像头权限
    pub fn denied() -> Self {
        Self {
            permission_granted: false,
            ..Self::new()
        }
    }

    /// 当前活动流数量
    pub fn active_streams(&self) -> usize {
        usize::from(self.active.lock().unwrap_or_else(PoisonError::into_inner).is_some())
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for SimulatedCamera {
    fn open(&self, request: &CameraRequest) -> Result<u64> {
        if !self.permission_granted {
            return Err(KioskError::CameraUnavailable("permission denied by host".to_string()));
        }

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(KioskError::CameraUnavailable(
                "camera is in use by another scan".to_string(),
            ));
        }

        let stream = self.next_stream.fetch_add(1, Ordering::Relaxed);
        *active = Some((stream, request.clone()));
        Ok(stream)
    }

    fn capture(&self, stream: u64) -> Option<Frame> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some((id, request)) if *id == stream => Some(Frame {
                width: request.ideal_width,
                height: request.ideal_height,
                pixels: vec![0; (request.ideal_width * request.ideal_height) as usize],
            }),
            _ => None,
        }
    }

    fn close(&self, stream: u64) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(active.as_ref(), Some((id, _)) if *id == stream) {
            *active = None;
        }
    }
}
