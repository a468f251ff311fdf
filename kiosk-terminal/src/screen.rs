//! 控制台画面渲染

use chrono::{DateTime, Local, Utc};
use kiosk_core::utils::{format_date_br, format_time_br};
use kiosk_core::{IdentificationMethod, LanguageContext, Patient, TranslationKey as K};
use kiosk_workflow::{KioskEngine, KioskView, Notice, NoticeLevel, QueueBoard};

const RULE: &str = "==========================================";

/// 已对接的医院系统
const INTEGRATIONS: [&str; 4] = ["TASY", "API", "Pixeon", "MV"];

/// 当前步骤画面
pub fn render(engine: &KioskEngine, kiosk_name: &str) -> String {
    let lang = engine.lang();
    let mut lines = vec![RULE.to_string()];

    if let Some((current, total)) = engine.flow().step_indicator() {
        lines.push(lang.t_with(
            K::StepOf,
            &[("current", &current.to_string()), ("total", &total.to_string())],
        ));
    }

    match engine.view() {
        KioskView::Welcome => {
            lines.push(lang.t(K::Welcome).to_string());
            lines.push(format!("{} - {}", kiosk_name, lang.t(K::KioskSystem)));
            lines.push(String::new());
            lines.push(lang.t(K::SelectIdentificationMethod).to_string());
            lines.push(format!("  [face] {}: {}", lang.t(K::FacialRecognition), lang.t(K::FacialDesc)));
            lines.push(format!("  [cpf]  {}: {}", lang.t(K::CpfNumber), lang.t(K::CpfDesc)));
            lines.push(String::new());
            lines.push(format!("{}: {}", lang.t(K::IntegrationPartners), INTEGRATIONS.join(" | ")));
            lines.push(lang.t(K::NeedHelp).to_string());
            lines.push(format!("{}: {}", lang.t(K::LanguageLabel), lang.language()));
        }
        KioskView::Identification { method } => {
            lines.push(lang.t(K::PatientIdentification).to_string());
            match method {
                IdentificationMethod::Face => {
                    lines.push(format!("[scan] {}", lang.t(K::StartFaceScan)));
                    if let Some(progress) = engine.scan_progress().filter(|p| *p > 0) {
                        lines.push(lang.t_with(K::Scanning, &[("progress", &progress.to_string())]));
                    }
                }
                IdentificationMethod::Cpf => {
                    lines.push(lang.t(K::CpfRequired).to_string());
                    lines.push(format!(
                        "{} {}",
                        lang.t(K::EnterCpf),
                        engine.cpf_value().unwrap_or_default()
                    ));
                }
            }
            lines.push(format!("[cancel] {}   [back] {}", lang.t(K::Cancel), lang.t(K::Back)));
        }
        KioskView::Confirmation(patient) => {
            lines.push(lang.t(K::ConfirmIdentity).to_string());
            lines.extend(patient_card(patient, lang));
            lines.push(String::new());
            lines.push(format!(
                "[yes] {}   [no] {}",
                lang.t(K::ConfirmIdentification),
                lang.t(K::NotMe)
            ));
        }
        KioskView::Completion(patient) => {
            lines.push(lang.t(K::ThankYou).to_string());
            lines.push(lang.t(K::CheckIn).to_string());
            lines.push(format!("{} - {}", patient.name, lang.t(K::ProcedureConfirmed)));
            lines.push(format!("[new] {}", lang.t(K::NewPatient)));
        }
    }

    lines.push(RULE.to_string());
    lines.join("\n")
}

fn patient_card(patient: &Patient, lang: &LanguageContext) -> Vec<String> {
    let today = Local::now().date_naive();
    let mut lines = vec![
        format!("({}) {}", patient.initials(), patient.name),
        format!(
            "{}: {} ({})",
            lang.t(K::DateOfBirth),
            format_date_br(patient.date_of_birth),
            lang.t_with(K::Years, &[("age", &patient.age_on(today).to_string())])
        ),
        format!("CPF: {}", patient.cpf),
        format!("{}: {}", lang.t(K::HealthInsurance), patient.health_insurance),
        format!("{}: {}", lang.t(K::InsuranceId), patient.insurance_number),
        String::new(),
        lang.t(K::ProceduresScheduled).to_string(),
    ];

    for procedure in &patient.procedures {
        lines.push(format!(
            "  - {} | {} {} | {} | {}",
            procedure.name,
            format_date_br(procedure.scheduled_time.date()),
            format_time_br(procedure.scheduled_time),
            procedure.doctor,
            procedure.location
        ));
        if let Some(instructions) = &procedure.preparation_instructions {
            lines.push(format!("    {}: {}", lang.t(K::PreparationRequired), instructions));
        }
    }
    lines
}

/// 叫号面板
pub fn render_queue(board: &QueueBoard, lang: &LanguageContext, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        RULE.to_string(),
        lang.t(K::QueuePanelTitle).to_string(),
        lang.t(K::QueuePanelSubtitle).to_string(),
    ];

    if let Some(called) = board.last_called() {
        lines.push(format!(
            "{}: {} {} -> {}",
            lang.t(K::NowCalling),
            called.number,
            called.name,
            called.destination
        ));
    }

    for item in board.waiting() {
        let mut line = format!(
            "  {} {} ({}) - {}",
            item.number,
            item.name,
            item.destination,
            QueueBoard::waiting_label(item, now, lang)
        );
        if let Some(minutes) = item.estimated_wait_minutes {
            line.push_str(" - ");
            line.push_str(&lang.t_with(K::EstimatedWait, &[("minutes", &minutes.to_string())]));
        }
        lines.push(line);
    }

    let stats = board.stats();
    lines.push(format!(
        "waiting {} | called {} | attending {}",
        stats.waiting, stats.called, stats.attending
    ));
    lines.push(RULE.to_string());
    lines.join("\n")
}

/// 提示行
pub fn render_notice(notice: &Notice) -> String {
    let marker = match notice.level {
        NoticeLevel::Info => "i",
        NoticeLevel::Warning => "!",
        NoticeLevel::Error => "x",
    };
    format!("[{}] {}", marker, notice.message)
}
