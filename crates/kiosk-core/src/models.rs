//! 核心数据模型定义

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result};
use crate::utils::strip_non_digits;

/// 性别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// 检查/就诊项目状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureStatus {
    Scheduled,  // 已预约
    InProgress, // 进行中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

/// 预约的诊疗项目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Procedure {
    pub id: String,
    pub name: String,
    pub scheduled_time: NaiveDateTime,
    pub doctor: String,
    pub location: String,                         // 科室及诊室
    pub preparation_required: bool,               // 是否需要检查前准备
    pub preparation_instructions: Option<String>, // 准备说明，需要准备时必填
    pub status: ProcedureStatus,
}

impl Procedure {
    /// 校验准备说明与准备标志一致
    pub fn validate(&self) -> Result<()> {
        let has_instructions = self
            .preparation_instructions
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());

        if self.preparation_required != has_instructions {
            return Err(KioskError::Validation(format!(
                "procedure {}: preparation instructions must be present iff preparation is required",
                self.id
            )));
        }
        Ok(())
    }
}

/// 患者信息及当日就诊
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub cpf: String,               // 巴西身份证号 (已格式化)
    pub health_insurance: String,  // 医保/保险公司
    pub insurance_number: String,  // 保险会员号
    pub profile_image: Option<String>,
    pub gender: Option<Gender>,
    pub procedures: Vec<Procedure>,
}

impl Patient {
    /// 校验患者记录的完整性
    pub fn validate(&self) -> Result<()> {
        if self.procedures.is_empty() {
            return Err(KioskError::Validation(format!(
                "patient {} has no scheduled procedures",
                self.id
            )));
        }

        let digits = strip_non_digits(&self.cpf);
        if digits.len() != 11 {
            return Err(KioskError::Validation(format!(
                "patient {} has a malformed CPF",
                self.id
            )));
        }

        self.procedures.iter().try_for_each(Procedure::validate)
    }

    /// 去掉格式符号的CPF
    pub fn cpf_digits(&self) -> String {
        strip_non_digits(&self.cpf)
    }

    /// 姓名首字母，用于头像占位
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .collect()
    }

    /// 指定日期时的周岁
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut age = today.year() - self.date_of_birth.year();
        if (today.month(), today.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }
}

/// 身份识别方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum IdentificationMethod {
    Face,
    Cpf,
}

impl std::fmt::Display for IdentificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentificationMethod::Face => write!(f, "face"),
            IdentificationMethod::Cpf => write!(f, "cpf"),
        }
    }
}

/// 识别结果
///
/// 两种识别方式共用同一结果类型。人脸扫描带有检测到的性别，
/// CPF录入没有性别信息但带有录入的号码。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentificationResult {
    pub method: IdentificationMethod,
    pub detected_gender: Option<Gender>,
    pub cpf: Option<String>,
}

impl IdentificationResult {
    pub fn from_face(gender: Gender) -> Self {
        Self {
            method: IdentificationMethod::Face,
            detected_gender: Some(gender),
            cpf: None,
        }
    }

    pub fn from_cpf(digits: impl Into<String>) -> Self {
        Self {
            method: IdentificationMethod::Cpf,
            detected_gender: None,
            cpf: Some(digits.into()),
        }
    }
}

/// 叫号队列状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting,   // 等候中
    Called,    // 已叫号
    Attending, // 就诊中
}

/// 叫号队列条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub number: String,      // 显示号码，如 A001
    pub name: String,
    pub destination: String, // 目标科室
    pub status: QueueStatus,
    pub timestamp: DateTime<Utc>, // 进入当前状态的时间
    pub estimated_wait_minutes: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procedure(required: bool, instructions: Option<&str>) -> Procedure {
        Procedure {
            id: "p1".to_string(),
            name: "Blood Test".to_string(),
            scheduled_time: NaiveDate::from_ymd_opt(2025, 5, 13)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            doctor: "Dr. Carlos Mendes".to_string(),
            location: "Laboratory - Floor 2, Room 204".to_string(),
            preparation_required: required,
            preparation_instructions: instructions.map(str::to_string),
            status: ProcedureStatus::Scheduled,
        }
    }

    fn patient(procedures: Vec<Procedure>) -> Patient {
        Patient {
            id: "3".to_string(),
            name: "Maria Silva".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 6, 15).unwrap(),
            cpf: "123.456.789-10".to_string(),
            health_insurance: "SulAmérica Saúde".to_string(),
            insurance_number: "8765432-1".to_string(),
            profile_image: None,
            gender: Some(Gender::Female),
            procedures,
        }
    }

    #[test]
    fn test_preparation_invariant() {
        assert!(procedure(true, Some("Fast for 8 hours")).validate().is_ok());
        assert!(procedure(false, None).validate().is_ok());
        assert!(procedure(true, None).validate().is_err());
        assert!(procedure(false, Some("Drink water")).validate().is_err());
    }

    #[test]
    fn test_patient_requires_procedures() {
        assert!(patient(vec![procedure(false, None)]).validate().is_ok());
        assert!(matches!(
            patient(vec![]).validate(),
            Err(KioskError::Validation(_))
        ));
    }

    #[test]
    fn test_initials_and_age() {
        let p = patient(vec![procedure(false, None)]);
        assert_eq!(p.initials(), "MS");
        assert_eq!(p.cpf_digits(), "12345678910");
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()), 39);
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()), 40);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ProcedureStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let gender: Gender = serde_json::from_str("\"female\"").unwrap();
        assert_eq!(gender, Gender::Female);
    }
}
