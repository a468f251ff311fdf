//! 可取消的定时任务
//!
//! 扫描进度、CPF校验延迟和叫号模拟都通过这里的任务驱动。
//! 任务归所属组件实例持有，取消是显式且幂等的操作，实例销毁时自动取消。
//! 必须在 tokio 运行时内创建。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// 周期回调的返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// 周期任务
#[derive(Debug)]
pub struct RepeatingTask {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// 每隔 `period` 调用一次 `tick`，首次调用在一个周期之后
    pub fn spawn<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                if tick() == TickControl::Stop {
                    flag.store(true, Ordering::Release);
                    break;
                }
            }
        });

        Self {
            cancelled,
            handle: Some(handle),
        }
    }

    /// 取消任务，可重复调用
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 延迟执行一次的任务
#[derive(Debug)]
pub struct DelayedTask {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn spawn<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.swap(true, Ordering::AcqRel) {
                action();
            }
        });

        Self {
            cancelled,
            handle: Some(handle),
        }
    }

    /// 取消任务，可重复调用
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_stops_itself() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let task = RepeatingTask::spawn(Duration::from_millis(100), move || {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        });

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!task.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_further_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let mut task = RepeatingTask::spawn(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            TickControl::Continue
        });

        tokio::time::sleep(Duration::from_millis(250)).await;
        task.cancel();
        task.cancel();
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_delayed_task() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let task = DelayedTask::spawn(Duration::from_millis(500), move || {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(task);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_task_fires_once() {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        let mut task = DelayedTask::spawn(Duration::from_millis(500), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        task.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
