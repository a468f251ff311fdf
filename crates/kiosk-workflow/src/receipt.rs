//! 签到凭条
//!
//! 将患者及其预约项目渲染为热敏打印机宽度的文本凭条，并输出到打印界面。
//! 打印失败只返回错误，由调用方转为提示，不阻塞签到流程。

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use kiosk_core::utils::{format_date_br, format_time_br};
use kiosk_core::{KioskError, LanguageContext, Patient, Result, TranslationKey};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// 默认凭条宽度（字符）
pub const DEFAULT_RECEIPT_WIDTH: usize = 42;

/// 凭条中的预约项目
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReceiptProcedure {
    pub name: String,
    pub doctor: String,
    pub scheduled: String,
    pub location: String,
}

/// 凭条文档
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReceiptDocument {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub procedures_title: String,
    pub procedures: Vec<ReceiptProcedure>,
    /// 二维码预留位置
    pub code_placeholder: String,
    pub footer: Vec<String>,
}

impl ReceiptDocument {
    /// 按当前语言渲染凭条
    pub fn render(patient: &Patient, lang: &LanguageContext, printed_at: NaiveDateTime) -> Self {
        let at = lang.t(TranslationKey::ReceiptAt);

        let fields = vec![
            (lang.t(TranslationKey::ReceiptName).to_string(), patient.name.clone()),
            (lang.t(TranslationKey::ReceiptCpf).to_string(), patient.cpf.clone()),
            (
                lang.t(TranslationKey::DateOfBirth).to_string(),
                format_date_br(patient.date_of_birth),
            ),
            (
                lang.t(TranslationKey::ReceiptInsurance).to_string(),
                patient.health_insurance.clone(),
            ),
        ];

        let procedures = patient
            .procedures
            .iter()
            .map(|procedure| ReceiptProcedure {
                name: procedure.name.clone(),
                doctor: procedure.doctor.clone(),
                scheduled: format!(
                    "{} {} {}",
                    format_date_br(procedure.scheduled_time.date()),
                    at,
                    format_time_br(procedure.scheduled_time)
                ),
                location: procedure.location.clone(),
            })
            .collect();

        Self {
            title: lang.t(TranslationKey::ReceiptTitle).to_string(),
            fields,
            procedures_title: lang.t(TranslationKey::ProceduresScheduled).to_string(),
            procedures,
            code_placeholder: lang.t(TranslationKey::ReceiptQrCode).to_string(),
            footer: vec![
                format!(
                    "{}: {}",
                    lang.t(TranslationKey::ReceiptDate),
                    format_date_br(printed_at.date())
                ),
                format!(
                    "{}: {}",
                    lang.t(TranslationKey::ReceiptTime),
                    printed_at.format("%H:%M:%S")
                ),
                lang.t(TranslationKey::ReceiptThankYou).to_string(),
            ],
        }
    }

    /// 按指定宽度排版为纯文本
    pub fn to_text(&self, width: usize) -> String {
        let dashed = "-".repeat(width);
        let dotted = ".".repeat(width);
        let mut lines = Vec::new();

        lines.push(center(&self.title, width));
        lines.push(dashed.clone());
        for (label, value) in &self.fields {
            lines.push(format!("{}: {}", label, value));
        }
        lines.push(String::new());
        lines.push(center(&self.procedures_title, width));

        for (index, procedure) in self.procedures.iter().enumerate() {
            if index > 0 {
                lines.push(dotted.clone());
            }
            lines.push(procedure.name.clone());
            lines.push(procedure.doctor.clone());
            lines.push(procedure.scheduled.clone());
            lines.push(procedure.location.clone());
        }

        lines.push(String::new());
        lines.push(center(&self.code_placeholder, width));
        lines.push(dashed);
        lines.extend(self.footer.iter().map(|line| center(line, width)));

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

impl fmt::Display for ReceiptDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(DEFAULT_RECEIPT_WIDTH))
    }
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((width - len) / 2), text)
}

/// 打印界面
pub trait PrintSurface: Send + Sync + fmt::Debug {
    fn print(&self, document: &ReceiptDocument) -> Result<()>;
}

/// 标准输出打印
#[derive(Debug, Clone)]
pub struct StdoutSurface {
    width: usize,
}

impl StdoutSurface {
    pub fn new(width: usize) -> Self {
        Self { width }
    }
}

impl PrintSurface for StdoutSurface {
    fn print(&self, document: &ReceiptDocument) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(document.to_text(self.width).as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| KioskError::PrintSurfaceUnavailable(e.to_string()))
    }
}

/// 文本文件打印，每张凭条一个文件
#[derive(Debug, Clone)]
pub struct FileSurface {
    directory: PathBuf,
    width: usize,
}

impl FileSurface {
    pub fn new(directory: impl Into<PathBuf>, width: usize) -> Self {
        Self {
            directory: directory.into(),
            width,
        }
    }
}

impl PrintSurface for FileSurface {
    fn print(&self, document: &ReceiptDocument) -> Result<()> {
        std::fs::create_dir_all(&self.directory)
            .map_err(|e| KioskError::PrintSurfaceUnavailable(e.to_string()))?;

        let path = self.directory.join(format!(
            "receipt-{}-{}.txt",
            Local::now().format("%Y%m%d-%H%M%S-%3f"),
            Uuid::new_v4().simple()
        ));
        std::fs::write(&path, document.to_text(self.width))
            .map_err(|e| KioskError::PrintSurfaceUnavailable(e.to_string()))?;

        info!("凭条已写入: {}", path.display());
        Ok(())
    }
}

/// 凭条打印器
#[derive(Debug, Clone)]
pub struct ReceiptPrinter {
    surface: Arc<dyn PrintSurface>,
}

impl ReceiptPrinter {
    pub fn new(surface: Arc<dyn PrintSurface>) -> Self {
        Self { surface }
    }

    /// 渲染并打印患者凭条
    pub fn print_receipt(&self, patient: &Patient, lang: &LanguageContext) -> Result<()> {
        let document = ReceiptDocument::render(patient, lang, Local::now().naive_local());
        self.surface.print(&document)?;
        info!("已为患者 {} 打印签到凭条", patient.id);
        Ok(())
    }
}
