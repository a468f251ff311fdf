//! 性别分类能力
//!
//! 扫描过程中只调用一次，结果缓存到扫描结束。

use std::fmt;

use kiosk_core::Gender;
use rand::Rng;

use super::camera::Frame;

/// 性别分类器
pub trait GenderClassifier: Send + Sync + fmt::Debug {
    /// 对当前帧分类，没有视频时帧为 `None`
    fn classify(&self, frame: Option<&Frame>) -> Gender;
}

/// 均匀随机分类，不读取图像内容
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomClassifier;

impl GenderClassifier for RandomClassifier {
    fn classify(&self, _frame: Option<&Frame>) -> Gender {
        if rand::thread_rng().gen_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

/// 固定输出的分类器
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub Gender);

impl GenderClassifier for FixedClassifier {
    fn classify(&self, _frame: Option<&Frame>) -> Gender {
        self.0
    }
}
