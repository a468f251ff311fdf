//! CPF录入识别
//!
//! 输入实时按 XXX.XXX.XXX-XX 掩码格式化；提交时必须恰好11位数字，
//! 校验通过后模拟网络延迟，再发出完成事件。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kiosk_core::utils::{format_cpf, validate_cpf};
use kiosk_core::{IdentificationResult, KioskError, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use super::{IdentificationEvent, IdentificationEventKind};
use crate::scheduler::DelayedTask;

/// 录入阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPhase {
    Editing,
    Verifying,
    Completed,
    Cancelled,
}

fn lock(phase: &Mutex<EntryPhase>) -> MutexGuard<'_, EntryPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

/// CPF录入
#[derive(Debug)]
pub struct CpfEntry {
    id: Uuid,
    value: String,
    verify_delay: Duration,
    events: UnboundedSender<IdentificationEvent>,
    phase: Arc<Mutex<EntryPhase>>,
    pending: Option<DelayedTask>,
}

impl CpfEntry {
    pub fn new(verify_delay: Duration, events: UnboundedSender<IdentificationEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            value: String::new(),
            verify_delay,
            events,
            phase: Arc::new(Mutex::new(EntryPhase::Editing)),
            pending: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> EntryPhase {
        *lock(&self.phase)
    }

    /// 当前显示值（已格式化）
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 更新输入，校验期间忽略
    pub fn input(&mut self, raw: &str) -> &str {
        if self.phase() == EntryPhase::Editing {
            self.value = format_cpf(raw);
        }
        &self.value
    }

    /// 提交CPF
    ///
    /// 位数不对时返回 [`KioskError::InvalidFormat`]，状态不变。
    pub fn submit(&mut self, raw: &str) -> Result<()> {
        let current = self.phase();
        if current != EntryPhase::Editing {
            return Err(KioskError::InvalidStateTransition {
                from: format!("{:?}", current),
                event: "submit".to_string(),
            });
        }

        let digits = validate_cpf(raw).map_err(|e| {
            warn!("CPF输入 {} 被拒绝: {}", self.id, e);
            e
        })?;
        self.value = format_cpf(&digits);
        *lock(&self.phase) = EntryPhase::Verifying;

        let phase = self.phase.clone();
        let events = self.events.clone();
        let id = self.id;
        self.pending = Some(DelayedTask::spawn(self.verify_delay, move || {
            let mut phase = lock(&phase);
            if *phase != EntryPhase::Verifying {
                return;
            }
            *phase = EntryPhase::Completed;
            info!("CPF输入 {} 验证通过", id);
            let _ = events.send(IdentificationEvent::new(
                id,
                IdentificationEventKind::Completed(IdentificationResult::from_cpf(digits)),
            ));
        }));

        info!("CPF输入 {} 已提交，正在验证", self.id);
        Ok(())
    }

    /// 取消录入，校验中的请求不再完成
    pub fn cancel(&mut self) -> bool {
        let cancelled = {
            let mut phase = lock(&self.phase);
            match *phase {
                EntryPhase::Editing | EntryPhase::Verifying => {
                    *phase = EntryPhase::Cancelled;
                    true
                }
                EntryPhase::Completed | EntryPhase::Cancelled => false,
            }
        };
        if let Some(mut pending) = self.pending.take() {
            pending.cancel();
        }

        if cancelled {
            info!("CPF输入 {} 已取消", self.id);
            let _ = self
                .events
                .send(IdentificationEvent::new(self.id, IdentificationEventKind::Cancelled));
        }
        cancelled
    }
}

impl Drop for CpfEntry {
    fn drop(&mut self) {
        if let Some(mut pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test(start_paused = true)]
    async fn test_valid_submit_completes_after_delay() {
        let (tx, mut rx) = unbounded_channel();
        let mut entry = CpfEntry::new(Duration::from_millis(1500), tx);

        assert_eq!(entry.input("1234567"), "123.456.7");
        entry.submit("123.456.789-10").unwrap();
        assert_eq!(entry.phase(), EntryPhase::Verifying);
        assert_eq!(entry.value(), "123.456.789-10");

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let event = rx.try_recv().unwrap();
        assert_eq!(event.source, entry.id());
        assert_eq!(
            event.kind,
            IdentificationEventKind::Completed(IdentificationResult::from_cpf("12345678910"))
        );
        assert_eq!(entry.phase(), EntryPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_digit_counts_are_rejected() {
        let (tx, mut rx) = unbounded_channel();
        let mut entry = CpfEntry::new(Duration::from_millis(1500), tx);

        for count in [0usize, 1, 10, 12, 15] {
            let raw = "4".repeat(count);
            assert!(matches!(
                entry.submit(&raw),
                Err(KioskError::InvalidFormat { digits }) if digits == count
            ));
            assert_eq!(entry.phase(), EntryPhase::Editing);
        }

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_verification() {
        let (tx, mut rx) = unbounded_channel();
        let mut entry = CpfEntry::new(Duration::from_millis(1500), tx);
        entry.submit("98765432100").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(entry.cancel());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(rx.try_recv().unwrap().kind, IdentificationEventKind::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_ignored_while_verifying() {
        let (tx, _rx) = unbounded_channel();
        let mut entry = CpfEntry::new(Duration::from_millis(1500), tx);
        entry.submit("98765432100").unwrap();
        assert_eq!(entry.input("111"), "987.654.321-00");
        assert!(entry.submit("98765432100").is_err());
    }
}
