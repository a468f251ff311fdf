//! 患者目录
//!
//! 保存固定的示例患者及其预约项目，按识别结果查找患者

use kiosk_core::utils::strip_non_digits;
use kiosk_core::{Gender, IdentificationResult, KioskError, Patient, Result};
use rand::seq::SliceRandom;
use rand::Rng;

const SAMPLE_PATIENTS: &str = include_str!("../data/sample_patients.json");

/// 查找条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupCriteria {
    /// 无条件，从全部患者中抽取
    Any,
    /// 按检测到的性别抽取
    Gender(Gender),
    /// 按录入的CPF精确匹配
    Cpf(String),
}

impl From<&IdentificationResult> for LookupCriteria {
    fn from(result: &IdentificationResult) -> Self {
        match (&result.cpf, result.detected_gender) {
            (Some(cpf), _) => LookupCriteria::Cpf(strip_non_digits(cpf)),
            (None, Some(gender)) => LookupCriteria::Gender(gender),
            (None, None) => LookupCriteria::Any,
        }
    }
}

/// 患者目录
#[derive(Debug, Clone, Default)]
pub struct PatientCatalog {
    patients: Vec<Patient>,
}

impl PatientCatalog {
    /// 由患者列表创建目录，每条记录都必须通过校验
    pub fn new(patients: Vec<Patient>) -> Result<Self> {
        for patient in &patients {
            patient.validate()?;
        }
        Ok(Self { patients })
    }

    /// 空目录
    pub fn empty() -> Self {
        Self::default()
    }

    /// 加载内置示例患者
    pub fn with_sample_data() -> Result<Self> {
        let patients: Vec<Patient> = serde_json::from_str(SAMPLE_PATIENTS)?;
        let catalog = Self::new(patients)?;
        tracing::debug!("Loaded {} sample patients", catalog.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// 按CPF查找，忽略格式符号
    pub fn find_by_cpf(&self, cpf: &str) -> Option<&Patient> {
        let digits = strip_non_digits(cpf);
        self.patients.iter().find(|p| p.cpf_digits() == digits)
    }

    /// 解析患者
    pub fn resolve(&self, criteria: &LookupCriteria) -> Result<Patient> {
        self.resolve_with(criteria, &mut rand::thread_rng())
    }

    /// 使用指定随机源解析患者
    ///
    /// 性别子集为空或CPF无匹配时退回到全部患者中均匀抽取。
    pub fn resolve_with<R: Rng + ?Sized>(
        &self,
        criteria: &LookupCriteria,
        rng: &mut R,
    ) -> Result<Patient> {
        if self.patients.is_empty() {
            return Err(KioskError::NoRecordFound("patient catalog is empty".to_string()));
        }

        let candidates: Vec<&Patient> = match criteria {
            LookupCriteria::Cpf(cpf) => match self.find_by_cpf(cpf) {
                Some(patient) => vec![patient],
                None => {
                    tracing::debug!("No exact CPF match, drawing from full catalog");
                    self.patients.iter().collect()
                }
            },
            LookupCriteria::Gender(gender) => {
                let subset: Vec<&Patient> = self
                    .patients
                    .iter()
                    .filter(|p| p.gender == Some(*gender))
                    .collect();
                if subset.is_empty() {
                    self.patients.iter().collect()
                } else {
                    subset
                }
            }
            LookupCriteria::Any => self.patients.iter().collect(),
        };

        candidates
            .choose(rng)
            .map(|patient| (*patient).clone())
            .ok_or_else(|| KioskError::NoRecordFound(format!("no patient for {:?}", criteria)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_data_is_consistent() {
        let catalog = PatientCatalog::with_sample_data().unwrap();
        assert_eq!(catalog.len(), 4);
        for patient in catalog.patients() {
            assert!(patient.validate().is_ok());
            assert!(!patient.procedures.is_empty());
        }
    }

    #[test]
    fn test_resolve_by_gender_stays_in_subset() {
        let catalog = PatientCatalog::with_sample_data().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let patient = catalog
                .resolve_with(&LookupCriteria::Gender(Gender::Female), &mut rng)
                .unwrap();
            assert_eq!(patient.gender, Some(Gender::Female));
        }
    }

    #[test]
    fn test_resolve_gender_without_subset_uses_full_set() {
        let mut catalog = PatientCatalog::with_sample_data().unwrap();
        catalog.patients.retain(|p| p.gender == Some(Gender::Male));
        let mut rng = StdRng::seed_from_u64(1);

        let patient = catalog
            .resolve_with(&LookupCriteria::Gender(Gender::Female), &mut rng)
            .unwrap();
        assert_eq!(patient.gender, Some(Gender::Male));
    }

    #[test]
    fn test_resolve_by_cpf_prefers_exact_match() {
        let catalog = PatientCatalog::with_sample_data().unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let patient = catalog
            .resolve_with(&LookupCriteria::Cpf("45678912345".to_string()), &mut rng)
            .unwrap();
        assert_eq!(patient.name, "Ana Luiza Pereira");

        let fallback = catalog
            .resolve_with(&LookupCriteria::Cpf("00000000000".to_string()), &mut rng)
            .unwrap();
        assert!(catalog.patients().contains(&fallback));
    }

    #[test]
    fn test_empty_catalog_reports_no_record() {
        let catalog = PatientCatalog::empty();
        assert!(matches!(
            catalog.resolve(&LookupCriteria::Any),
            Err(KioskError::NoRecordFound(_))
        ));
    }

    #[test]
    fn test_criteria_from_identification_result() {
        assert_eq!(
            LookupCriteria::from(&IdentificationResult::from_face(Gender::Male)),
            LookupCriteria::Gender(Gender::Male)
        );
        assert_eq!(
            LookupCriteria::from(&IdentificationResult::from_cpf("123.456.789-10")),
            LookupCriteria::Cpf("12345678910".to_string())
        );
    }
}
