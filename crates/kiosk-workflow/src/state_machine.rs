//! 签到步骤状态机
//!
//! 管理欢迎 → 身份识别 → 确认 → 完成的步骤转换

use kiosk_core::{KioskError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 签到步骤
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum KioskStep {
    #[default]
    Welcome,        // 欢迎页，选择识别方式
    Identification, // 身份识别中
    Confirmation,   // 确认身份
    Completion,     // 签到完成
}

impl KioskStep {
    /// 步骤指示器中的序号，欢迎页不显示
    pub fn indicator(&self) -> Option<u8> {
        match self {
            KioskStep::Welcome => None,
            KioskStep::Identification => Some(1),
            KioskStep::Confirmation => Some(2),
            KioskStep::Completion => Some(3),
        }
    }
}

/// 步骤转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum KioskEvent {
    MethodSelected,
    IdentificationSucceeded,
    Back,
    Confirmed,
    Rejected,
    NewSession,
}

/// 签到状态机
#[derive(Debug)]
pub struct KioskStateMachine {
    transitions: HashMap<(KioskStep, KioskEvent), KioskStep>,
}

impl KioskStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((KioskStep::Welcome, KioskEvent::MethodSelected), KioskStep::Identification);
        transitions.insert((KioskStep::Identification, KioskEvent::IdentificationSucceeded), KioskStep::Confirmation);
        transitions.insert((KioskStep::Identification, KioskEvent::Back), KioskStep::Welcome);
        transitions.insert((KioskStep::Confirmation, KioskEvent::Confirmed), KioskStep::Completion);
        transitions.insert((KioskStep::Confirmation, KioskEvent::Rejected), KioskStep::Identification);
        transitions.insert((KioskStep::Confirmation, KioskEvent::Back), KioskStep::Identification);
        transitions.insert((KioskStep::Completion, KioskEvent::NewSession), KioskStep::Welcome);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: KioskStep, event: KioskEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: KioskStep, event: KioskEvent) -> Result<KioskStep> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| KioskError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            })
    }
}

impl Default for KioskStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = KioskStateMachine::new();

        assert!(sm.can_transition(KioskStep::Welcome, KioskEvent::MethodSelected));
        assert!(sm.can_transition(KioskStep::Identification, KioskEvent::IdentificationSucceeded));
        assert!(sm.can_transition(KioskStep::Confirmation, KioskEvent::Rejected));
        assert!(sm.can_transition(KioskStep::Completion, KioskEvent::NewSession));
    }

    #[test]
    fn test_back_disabled_outside_middle_steps() {
        let sm = KioskStateMachine::new();

        assert!(!sm.can_transition(KioskStep::Welcome, KioskEvent::Back));
        assert!(!sm.can_transition(KioskStep::Completion, KioskEvent::Back));
        assert!(!sm.can_transition(KioskStep::Welcome, KioskEvent::Confirmed));
    }

    #[test]
    fn test_state_execution() {
        let sm = KioskStateMachine::new();

        assert_eq!(
            sm.transition(KioskStep::Confirmation, KioskEvent::Confirmed).unwrap(),
            KioskStep::Completion
        );
        assert!(matches!(
            sm.transition(KioskStep::Welcome, KioskEvent::Confirmed),
            Err(KioskError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_every_step_has_an_exit() {
        let sm = KioskStateMachine::new();
        let events = [
            KioskEvent::MethodSelected,
            KioskEvent::IdentificationSucceeded,
            KioskEvent::Back,
            KioskEvent::Confirmed,
            KioskEvent::Rejected,
            KioskEvent::NewSession,
        ];
        for step in [
            KioskStep::Welcome,
            KioskStep::Identification,
            KioskStep::Confirmation,
            KioskStep::Completion,
        ] {
            assert!(
                events.iter().any(|event| sm.can_transition(step, *event)),
                "{:?} is a dead end",
                step
            );
        }
    }
}
