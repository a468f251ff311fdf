//! 候诊时间估算
//!
//! 估算 = floor(位置 × 平均等待 × 科室系数 × 繁忙系数) ± 1，最少1分钟。
//! 繁忙程度由小时和是否周末决定。

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 繁忙程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BusyLevel {
    Low,
    Medium,
    High,
}

impl BusyLevel {
    pub fn factor(&self) -> f64 {
        match self {
            BusyLevel::Low => 0.7,
            BusyLevel::Medium => 1.0,
            BusyLevel::High => 1.8,
        }
    }
}

/// 按小时段判断繁忙程度
///
/// 工作日 07-09 点、16-19 点高峰；周末 09-14 点高峰；
/// 06 点前和 21 点后清闲；其余为一般。区间均为左闭右开。
pub fn classify_busy_level(hour: u32, weekend: bool) -> BusyLevel {
    let rush = if weekend {
        (9..14).contains(&hour)
    } else {
        (7..9).contains(&hour) || (16..19).contains(&hour)
    };

    if rush {
        BusyLevel::High
    } else if hour < 6 || hour >= 21 {
        BusyLevel::Low
    } else {
        BusyLevel::Medium
    }
}

/// 指定时刻的繁忙程度
pub fn busy_level_at<Tz: TimeZone>(at: &DateTime<Tz>) -> BusyLevel {
    let weekend = matches!(at.weekday(), Weekday::Sat | Weekday::Sun);
    classify_busy_level(at.hour(), weekend)
}

/// 科室系数，未知科室为 1.0
pub fn destination_factor(destination: &str) -> f64 {
    match destination.trim() {
        "Coleta" => 0.6,
        "Raio-X" => 0.8,
        "Exame" => 1.1,
        "Consulta" => 1.3,
        "Ultrassom" => 1.2,
        _ => 1.0,
    }
}

/// 估算候诊分钟数
pub fn estimate_wait(
    position: u32,
    destination: &str,
    busy: BusyLevel,
    average_wait_minutes: f64,
) -> u32 {
    estimate_wait_with(position, destination, busy, average_wait_minutes, &mut rand::thread_rng())
}

/// 使用指定随机源估算候诊分钟数
pub fn estimate_wait_with<R: Rng + ?Sized>(
    position: u32,
    destination: &str,
    busy: BusyLevel,
    average_wait_minutes: f64,
    rng: &mut R,
) -> u32 {
    let base = (f64::from(position)
        * average_wait_minutes
        * destination_factor(destination)
        * busy.factor())
    .floor() as i64;
    let jitter = if rng.gen_bool(0.5) { 1 } else { -1 };

    let estimate = (base + jitter).max(1) as u32;
    tracing::debug!(
        "Estimated {} min for position {} at {} ({:?})",
        estimate,
        position,
        destination,
        busy
    );
    estimate
}
