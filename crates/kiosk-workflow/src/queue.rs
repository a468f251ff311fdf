//! 叫号面板
//!
//! 模拟候诊队列：定时将最早等候的患者改为已叫号，
//! 每次叫号后按新的排队位置重新估算所有等候患者的候诊时间。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use kiosk_core::{LanguageContext, QueueItem, QueueStatus, TranslationKey};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::estimator::{busy_level_at, estimate_wait_with, BusyLevel};
use crate::scheduler::{RepeatingTask, TickControl};

/// 队列统计
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub waiting: usize,
    pub called: usize,
    pub attending: usize,
}

/// 队列变化通知
#[derive(Debug, Clone, PartialEq)]
pub enum QueueUpdate {
    Called {
        item: QueueItem,
        /// 叫号后的等候列表（按时间排序，含新估算）
        waiting: Vec<QueueItem>,
    },
}

/// 叫号队列
#[derive(Debug, Clone)]
pub struct QueueBoard {
    items: Vec<QueueItem>,
    last_called: Option<String>,
    average_wait_minutes: f64,
}

impl QueueBoard {
    pub fn new(items: Vec<QueueItem>, average_wait_minutes: f64) -> Self {
        let last_called = items
            .iter()
            .filter(|item| item.status == QueueStatus::Called)
            .max_by_key(|item| item.timestamp)
            .map(|item| item.number.clone());

        Self {
            items,
            last_called,
            average_wait_minutes,
        }
    }

    /// 演示队列
    pub fn demo(now: DateTime<Utc>, average_wait_minutes: f64) -> Self {
        let item = |number: &str, name: &str, destination: &str, status: QueueStatus, minutes_ago: i64| QueueItem {
            number: number.to_string(),
            name: name.to_string(),
            destination: destination.to_string(),
            status,
            timestamp: now - chrono::Duration::minutes(minutes_ago),
            estimated_wait_minutes: None,
        };

        Self::new(
            vec![
                item("A001", "Maria Silva", "Coleta", QueueStatus::Waiting, 15),
                item("A002", "João Oliveira", "Raio-X", QueueStatus::Waiting, 10),
                item("B001", "Ana Santos", "Consulta", QueueStatus::Called, 5),
                item("B002", "Carlos Mendes", "Exame", QueueStatus::Waiting, 2),
            ],
            average_wait_minutes,
        )
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// 等候中的条目，最早的在前
    pub fn waiting(&self) -> Vec<&QueueItem> {
        let mut waiting: Vec<&QueueItem> = self
            .items
            .iter()
            .filter(|item| item.status == QueueStatus::Waiting)
            .collect();
        waiting.sort_by_key(|item| item.timestamp);
        waiting
    }

    /// 排队位置：更早进入等候的人数加一
    pub fn position_of(&self, number: &str) -> Option<u32> {
        let item = self
            .items
            .iter()
            .find(|item| item.number == number && item.status == QueueStatus::Waiting)?;

        let earlier = self
            .items
            .iter()
            .filter(|other| other.status == QueueStatus::Waiting && other.timestamp < item.timestamp)
            .count();
        Some(earlier as u32 + 1)
    }

    /// 最近叫号的条目
    pub fn last_called(&self) -> Option<&QueueItem> {
        let number = self.last_called.as_deref()?;
        self.items.iter().find(|item| item.number == number)
    }

    pub fn stats(&self) -> QueueStats {
        self.items
            .iter()
            .fold(QueueStats::default(), |mut stats, item| {
                match item.status {
                    QueueStatus::Waiting => stats.waiting += 1,
                    QueueStatus::Called => stats.called += 1,
                    QueueStatus::Attending => stats.attending += 1,
                }
                stats
            })
    }

    /// 叫号：最早等候的条目改为已叫号，时间戳重置为 `now`
    pub fn call_next(&mut self, now: DateTime<Utc>) -> Option<QueueItem> {
        let number = self.waiting().first()?.number.clone();
        let item = self.items.iter_mut().find(|item| item.number == number)?;

        item.status = QueueStatus::Called;
        item.timestamp = now;
        item.estimated_wait_minutes = None;
        self.last_called = Some(number);

        info!("叫号 {} ({}) 前往 {}", item.number, item.name, item.destination);
        Some(item.clone())
    }

    /// 重新估算所有等候条目
    pub fn reestimate(&mut self, busy: BusyLevel) {
        self.reestimate_with(busy, &mut rand::thread_rng());
    }

    pub fn reestimate_with<R: Rng + ?Sized>(&mut self, busy: BusyLevel, rng: &mut R) {
        let positions: Vec<Option<u32>> = self
            .items
            .iter()
            .map(|item| self.position_of(&item.number))
            .collect();

        let average = self.average_wait_minutes;
        for (item, position) in self.items.iter_mut().zip(positions) {
            item.estimated_wait_minutes = position
                .map(|position| estimate_wait_with(position, &item.destination, busy, average, rng));
        }
        debug!("Re-estimated queue with busy level {:?}", busy);
    }

    /// 已等候时间文本
    pub fn waiting_label(item: &QueueItem, now: DateTime<Utc>, lang: &LanguageContext) -> String {
        let minutes = (now - item.timestamp).num_minutes();
        match minutes {
            m if m < 1 => lang.t(TranslationKey::LessThanAMinute).to_string(),
            1 => lang.t(TranslationKey::OneMinute).to_string(),
            m => lang.t_with(TranslationKey::MinutesAgo, &[("minutes", &m.to_string())]),
        }
    }
}

fn lock(board: &Mutex<QueueBoard>) -> MutexGuard<'_, QueueBoard> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 叫号面板，持有周期叫号任务
#[derive(Debug)]
pub struct QueuePanel {
    board: Arc<Mutex<QueueBoard>>,
    ticker: Option<RepeatingTask>,
}

impl QueuePanel {
    /// 启动面板，每隔 `call_interval` 叫一次号
    pub fn start(
        mut board: QueueBoard,
        call_interval: Duration,
        updates: UnboundedSender<QueueUpdate>,
    ) -> Self {
        board.reestimate(busy_level_at(&Local::now()));
        let board = Arc::new(Mutex::new(board));
        let shared = board.clone();

        let ticker = RepeatingTask::spawn(call_interval, move || {
            let mut board = lock(&shared);
            let Some(item) = board.call_next(Utc::now()) else {
                return TickControl::Stop;
            };
            board.reestimate(busy_level_at(&Local::now()));

            let waiting = board.waiting().into_iter().cloned().collect();
            let _ = updates.send(QueueUpdate::Called { item, waiting });

            if board.stats().waiting == 0 {
                info!("队列已清空，停止叫号模拟");
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        });

        Self {
            board,
            ticker: Some(ticker),
        }
    }

    /// 当前队列快照
    pub fn snapshot(&self) -> QueueBoard {
        lock(&self.board).clone()
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(RepeatingTask::is_active)
    }

    /// 停止叫号，可重复调用
    pub fn stop(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
            debug!("Queue panel stopped");
        }
    }
}

impl Drop for QueuePanel {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::MemoryPreferenceStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc::unbounded_channel;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_demo_board() {
        let board = QueueBoard::demo(now(), 12.0);
        assert_eq!(board.stats(), QueueStats { waiting: 3, called: 1, attending: 0 });
        assert_eq!(board.last_called().unwrap().number, "B001");

        let order: Vec<&str> = board.waiting().iter().map(|i| i.number.as_str()).collect();
        assert_eq!(order, vec!["A001", "A002", "B002"]);
        assert_eq!(board.position_of("A002"), Some(2));
        assert_eq!(board.position_of("B001"), None);
    }

    #[test]
    fn test_call_event_reestimates_positions() {
        let mut board = QueueBoard::demo(now(), 12.0);
        let mut rng = StdRng::seed_from_u64(9);
        board.reestimate_with(BusyLevel::Medium, &mut rng);
        let before = board.stats().waiting;

        let called = board.call_next(now()).unwrap();
        assert_eq!(called.number, "A001");
        assert_eq!(called.status, QueueStatus::Called);
        assert_eq!(board.last_called().unwrap().number, "A001");
        board.reestimate_with(BusyLevel::Medium, &mut rng);

        assert_eq!(board.stats().waiting, before - 1);
        let waiting = board.waiting();
        for item in &waiting {
            let earlier = waiting.iter().filter(|o| o.timestamp < item.timestamp).count() as u32;
            assert_eq!(board.position_of(&item.number), Some(earlier + 1));
        }

        // A002 现在排第一位：floor(1 × 12 × 0.8 × 1.0) ± 1
        let a002 = board.items().iter().find(|i| i.number == "A002").unwrap();
        assert!(matches!(a002.estimated_wait_minutes, Some(8) | Some(10)));
        assert!(board
            .items()
            .iter()
            .filter(|i| i.status != QueueStatus::Waiting)
            .all(|i| i.estimated_wait_minutes.is_none()));
    }

    #[test]
    fn test_waiting_labels() {
        let lang = LanguageContext::init(Arc::new(MemoryPreferenceStore::new(Some("en-US"))), None);
        let now = now();
        let mut item = QueueBoard::demo(now, 12.0).items()[0].clone();

        item.timestamp = now;
        assert_eq!(QueueBoard::waiting_label(&item, now, &lang), "Less than a minute");
        item.timestamp = now - chrono::Duration::seconds(90);
        assert_eq!(QueueBoard::waiting_label(&item, now, &lang), "1 minute ago");
        item.timestamp = now - chrono::Duration::minutes(15);
        assert_eq!(QueueBoard::waiting_label(&item, now, &lang), "15 minutes ago");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panel_calls_until_drained() {
        let (tx, mut rx) = unbounded_channel();
        let mut panel = QueuePanel::start(QueueBoard::demo(now(), 12.0), Duration::from_secs(30), tx);
        assert!(panel
            .snapshot()
            .waiting()
            .iter()
            .all(|i| i.estimated_wait_minutes.is_some()));

        tokio::time::sleep(Duration::from_secs(31)).await;
        match rx.try_recv().unwrap() {
            QueueUpdate::Called { item, waiting } => {
                assert_eq!(item.number, "A001");
                assert_eq!(waiting.len(), 2);
            }
        }

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(panel.snapshot().stats().waiting, 0);
        assert!(!panel.is_running());
        panel.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_panel_no_longer_calls() {
        let (tx, mut rx) = unbounded_channel();
        let mut panel = QueuePanel::start(QueueBoard::demo(now(), 12.0), Duration::from_secs(30), tx);
        panel.stop();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(panel.snapshot().stats().waiting, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_panel_no_longer_calls() {
        let (tx, mut rx) = unbounded_channel();
        let panel = QueuePanel::start(QueueBoard::demo(now(), 12.0), Duration::from_secs(30), tx.clone());
        assert!(panel.is_running());
        drop(panel);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
        assert!(!tx.is_closed());
    }
}
