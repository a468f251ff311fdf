//! 签到流程
//!
//! 按状态机推进步骤，并在步骤之间传递当前患者。
//! 确认和完成步骤必须持有患者，缺失时视图停留在身份识别。

use std::sync::Arc;

use kiosk_core::{
    IdentificationMethod, IdentificationResult, KioskError, LanguageContext, Patient, Result,
};
use tracing::{debug, info, warn};

use crate::catalog::{LookupCriteria, PatientCatalog};
use crate::receipt::ReceiptPrinter;
use crate::state_machine::{KioskEvent, KioskStateMachine, KioskStep};

/// 当前应显示的画面
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KioskView<'a> {
    Welcome,
    Identification { method: IdentificationMethod },
    Confirmation(&'a Patient),
    Completion(&'a Patient),
}

/// 凭条打印结果
#[derive(Debug)]
pub enum PrintOutcome {
    Printed,
    Failed(KioskError),
}

/// 签到流程
#[derive(Debug)]
pub struct CheckInFlow {
    state_machine: KioskStateMachine,
    step: KioskStep,
    method: IdentificationMethod,
    patient: Option<Patient>,
    catalog: Arc<PatientCatalog>,
    printer: ReceiptPrinter,
}

impl CheckInFlow {
    pub fn new(catalog: Arc<PatientCatalog>, printer: ReceiptPrinter) -> Self {
        Self {
            state_machine: KioskStateMachine::new(),
            step: KioskStep::Welcome,
            method: IdentificationMethod::Face,
            patient: None,
            catalog,
            printer,
        }
    }

    pub fn step(&self) -> KioskStep {
        self.step
    }

    pub fn method(&self) -> IdentificationMethod {
        self.method
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.patient.as_ref()
    }

    /// 返回按钮是否可用
    pub fn can_go_back(&self) -> bool {
        self.state_machine.can_transition(self.step, KioskEvent::Back)
    }

    /// 步骤指示 (当前, 总数)
    pub fn step_indicator(&self) -> Option<(u8, u8)> {
        self.step.indicator().map(|current| (current, 3))
    }

    /// 当前画面
    pub fn view(&self) -> KioskView<'_> {
        match (self.step, self.patient.as_ref()) {
            (KioskStep::Welcome, _) => KioskView::Welcome,
            (KioskStep::Confirmation, Some(patient)) => KioskView::Confirmation(patient),
            (KioskStep::Completion, Some(patient)) => KioskView::Completion(patient),
            _ => KioskView::Identification {
                method: self.method,
            },
        }
    }

    fn apply(&mut self, event: KioskEvent) -> Result<KioskStep> {
        let next = self.state_machine.transition(self.step, event)?;
        info!("签到步骤 {:?} -> {:?} (事件 {:?})", self.step, next, event);
        self.step = next;
        Ok(next)
    }

    /// 选择识别方式，进入身份识别
    pub fn select_method(&mut self, method: IdentificationMethod) -> Result<KioskStep> {
        let next = self.apply(KioskEvent::MethodSelected)?;
        self.method = method;
        Ok(next)
    }

    /// 身份识别中切换识别方式
    pub fn switch_method(&mut self, method: IdentificationMethod) -> Result<()> {
        if self.step != KioskStep::Identification {
            return Err(KioskError::InvalidStateTransition {
                from: format!("{:?}", self.step),
                event: format!("switch to {}", method),
            });
        }
        debug!("Identification method switched to {}", method);
        self.method = method;
        Ok(())
    }

    /// 识别成功，解析患者并进入确认
    ///
    /// 目录中找不到患者时返回 [`KioskError::NoRecordFound`]，停留在身份识别。
    pub fn complete_identification(&mut self, result: &IdentificationResult) -> Result<KioskStep> {
        if !self
            .state_machine
            .can_transition(self.step, KioskEvent::IdentificationSucceeded)
        {
            return Err(KioskError::InvalidStateTransition {
                from: format!("{:?}", self.step),
                event: format!("{:?}", KioskEvent::IdentificationSucceeded),
            });
        }

        let patient = self
            .catalog
            .resolve(&LookupCriteria::from(result))
            .map_err(|e| {
                warn!("通过 {} 识别未找到患者: {}", result.method, e);
                e
            })?;

        info!("已识别患者 {} (方式 {})", patient.id, result.method);
        self.patient = Some(patient);
        self.apply(KioskEvent::IdentificationSucceeded)
    }

    /// 确认身份，打印凭条并进入完成
    ///
    /// 打印失败不影响流程推进。
    pub fn confirm(&mut self, lang: &LanguageContext) -> Result<PrintOutcome> {
        if self.step != KioskStep::Confirmation {
            return Err(KioskError::InvalidStateTransition {
                from: format!("{:?}", self.step),
                event: format!("{:?}", KioskEvent::Confirmed),
            });
        }
        let patient = self.patient.as_ref().ok_or(KioskError::PatientRequired)?;

        let outcome = match self.printer.print_receipt(patient, lang) {
            Ok(()) => PrintOutcome::Printed,
            Err(e) => {
                warn!("凭条打印失败，继续签到: {}", e);
                PrintOutcome::Failed(e)
            }
        };

        self.apply(KioskEvent::Confirmed)?;
        Ok(outcome)
    }

    /// “不是我”：回到身份识别，患者保留到重新识别
    pub fn reject(&mut self) -> Result<KioskStep> {
        self.apply(KioskEvent::Rejected)
    }

    /// 返回上一步，欢迎页和完成页无效
    pub fn back(&mut self) -> KioskStep {
        if !self.can_go_back() {
            debug!("Back ignored on {:?}", self.step);
            return self.step;
        }

        let leaving = self.step;
        match self.apply(KioskEvent::Back) {
            Ok(next) => {
                if leaving == KioskStep::Identification {
                    self.patient = None;
                }
                next
            }
            Err(e) => {
                warn!("返回上一步失败: {}", e);
                self.step
            }
        }
    }

    /// 开始新的签到，清除患者
    pub fn new_session(&mut self) -> Result<KioskStep> {
        let next = self.apply(KioskEvent::NewSession)?;
        self.patient = None;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::{PrintSurface, ReceiptDocument};
    use kiosk_core::{Gender, MemoryPreferenceStore};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSurface {
        printed: Mutex<Vec<ReceiptDocument>>,
    }

    impl PrintSurface for RecordingSurface {
        fn print(&self, document: &ReceiptDocument) -> Result<()> {
            self.printed.lock().unwrap().push(document.clone());
            Ok(())
        }
    }

    #[derive(Debug)]
    struct BlockedSurface;

    impl PrintSurface for BlockedSurface {
        fn print(&self, _document: &ReceiptDocument) -> Result<()> {
            Err(KioskError::PrintSurfaceUnavailable("popup blocked".to_string()))
        }
    }

    fn lang() -> LanguageContext {
        LanguageContext::init(Arc::new(MemoryPreferenceStore::new(None)), None)
    }

    fn flow_with(surface: Arc<dyn PrintSurface>) -> CheckInFlow {
        CheckInFlow::new(
            Arc::new(PatientCatalog::with_sample_data().unwrap()),
            ReceiptPrinter::new(surface),
        )
    }

    #[test]
    fn test_round_trip() {
        let surface = Arc::new(RecordingSurface::default());
        let mut flow = flow_with(surface.clone());
        assert_eq!(flow.view(), KioskView::Welcome);
        assert!(!flow.can_go_back());

        assert_eq!(flow.select_method(IdentificationMethod::Face).unwrap(), KioskStep::Identification);
        assert_eq!(flow.back(), KioskStep::Welcome);
        assert!(flow.patient().is_none());

        flow.select_method(IdentificationMethod::Cpf).unwrap();
        let step = flow
            .complete_identification(&IdentificationResult::from_face(Gender::Male))
            .unwrap();
        assert_eq!(step, KioskStep::Confirmation);
        assert!(matches!(flow.view(), KioskView::Confirmation(_)));

        assert!(matches!(flow.confirm(&lang()).unwrap(), PrintOutcome::Printed));
        assert_eq!(flow.step(), KioskStep::Completion);
        assert!(flow.patient().is_some());
        assert_eq!(surface.printed.lock().unwrap().len(), 1);

        assert_eq!(flow.back(), KioskStep::Completion);
        assert_eq!(flow.new_session().unwrap(), KioskStep::Welcome);
        assert!(flow.patient().is_none());
    }

    #[test]
    fn test_reject_keeps_patient_until_reidentified() {
        let mut flow = flow_with(Arc::new(RecordingSurface::default()));
        flow.select_method(IdentificationMethod::Cpf).unwrap();
        flow.complete_identification(&IdentificationResult::from_cpf("98765432100"))
            .unwrap();
        assert_eq!(flow.patient().unwrap().name, "João Santos");

        assert_eq!(flow.reject().unwrap(), KioskStep::Identification);
        assert_eq!(flow.patient().unwrap().name, "João Santos");
        assert_eq!(
            flow.view(),
            KioskView::Identification {
                method: IdentificationMethod::Cpf
            }
        );

        flow.complete_identification(&IdentificationResult::from_cpf("45678912345"))
            .unwrap();
        assert_eq!(flow.patient().unwrap().name, "Ana Luiza Pereira");
    }

    #[test]
    fn test_empty_catalog_stays_on_identification() {
        let mut flow = CheckInFlow::new(
            Arc::new(PatientCatalog::empty()),
            ReceiptPrinter::new(Arc::new(RecordingSurface::default())),
        );
        flow.select_method(IdentificationMethod::Face).unwrap();

        let result = flow.complete_identification(&IdentificationResult::from_face(Gender::Female));
        assert!(matches!(result, Err(KioskError::NoRecordFound(_))));
        assert_eq!(flow.step(), KioskStep::Identification);
        assert!(flow.patient().is_none());
    }

    #[test]
    fn test_print_failure_does_not_block_completion() {
        let mut flow = flow_with(Arc::new(BlockedSurface));
        flow.select_method(IdentificationMethod::Face).unwrap();
        flow.complete_identification(&IdentificationResult::from_face(Gender::Female))
            .unwrap();

        let outcome = flow.confirm(&lang()).unwrap();
        assert!(matches!(
            outcome,
            PrintOutcome::Failed(KioskError::PrintSurfaceUnavailable(_))
        ));
        assert_eq!(flow.step(), KioskStep::Completion);
        assert!(matches!(flow.view(), KioskView::Completion(_)));
    }

    #[test]
    fn test_out_of_order_events_rejected() {
        let mut flow = flow_with(Arc::new(RecordingSurface::default()));

        assert!(flow.confirm(&lang()).is_err());
        assert!(flow
            .complete_identification(&IdentificationResult::from_face(Gender::Male))
            .is_err());
        assert!(flow.new_session().is_err());
        assert!(flow.switch_method(IdentificationMethod::Cpf).is_err());
        assert_eq!(flow.step(), KioskStep::Welcome);
        assert!(flow.patient().is_none());
    }

    #[test]
    fn test_step_indicator() {
        let mut flow = flow_with(Arc::new(RecordingSurface::default()));
        assert_eq!(flow.step_indicator(), None);
        flow.select_method(IdentificationMethod::Face).unwrap();
        assert_eq!(flow.step_indicator(), Some((1, 3)));
        flow.switch_method(IdentificationMethod::Cpf).unwrap();
        assert_eq!(flow.method(), IdentificationMethod::Cpf);
    }
}
