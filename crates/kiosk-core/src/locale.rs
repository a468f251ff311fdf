//! 本地化
//!
//! 语言偏好上下文：进程启动时创建一次，按引用传给需要本地化的组件。
//! 语言选择持久化到偏好存储中，每次切换语言时写入。

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{KioskError, Result};

/// 偏好存储中的语言键
pub const LANGUAGE_PREFERENCE_KEY: &str = "camasso-language";

/// 支持的界面语言
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "es")]
    Es,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::PtBr, Language::EnUs, Language::Es];

    /// 语言标签
    pub fn tag(&self) -> &'static str {
        match self {
            Language::PtBr => "pt-BR",
            Language::EnUs => "en-US",
            Language::Es => "es",
        }
    }

    /// 根据宿主系统报告的区域设置推断语言
    pub fn detect(host_locale: &str) -> Language {
        let lower = host_locale.trim().to_ascii_lowercase();
        if lower.starts_with("pt") {
            Language::PtBr
        } else if lower.starts_with("es") {
            Language::Es
        } else {
            Language::EnUs
        }
    }

    fn index(&self) -> usize {
        match self {
            Language::PtBr => 0,
            Language::EnUs => 1,
            Language::Es => 2,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self> {
        Language::ALL
            .into_iter()
            .find(|language| language.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KioskError::Validation(format!("unsupported language tag: {}", s)))
    }
}

macro_rules! translation_keys {
    ($( $variant:ident => $name:literal { pt: $pt:literal, en: $en:literal, es: $es:literal } ),* $(,)?) => {
        /// 界面文本键
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TranslationKey {
            $($variant),*
        }

        impl TranslationKey {
            pub const ALL: &'static [TranslationKey] = &[$(TranslationKey::$variant),*];

            /// 字符串形式的键名
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(TranslationKey::$variant => $name),*
                }
            }

            fn templates(&self) -> [&'static str; 3] {
                match self {
                    $(TranslationKey::$variant => [$pt, $en, $es]),*
                }
            }
        }
    };
}

translation_keys! {
    Welcome => "welcome" {
        pt: "Bem-vindo ao Camasso", en: "Welcome to Camasso", es: "Bienvenido a Camasso" },
    KioskSystem => "kioskSystem" {
        pt: "Sistema de Autoatendimento", en: "Self-Service System", es: "Sistema de Autoservicio" },
    LanguageLabel => "language" {
        pt: "Idioma", en: "Language", es: "Idioma" },
    SelectIdentificationMethod => "selectIdentificationMethod" {
        pt: "Por favor, selecione como você deseja se identificar",
        en: "Please select how you'd like to identify yourself",
        es: "Por favor, seleccione cómo desea identificarse" },
    FacialRecognition => "facialRecognition" {
        pt: "Reconhecimento Facial", en: "Facial Recognition", es: "Reconocimiento Facial" },
    FacialDesc => "facialDesc" {
        pt: "Identificação rápida e sem contato usando seu rosto",
        en: "Quick and contactless identification using your face",
        es: "Identificación rápida y sin contacto usando su rostro" },
    CpfNumber => "cpfNumber" {
        pt: "Número do CPF", en: "CPF Number", es: "Número de CPF" },
    CpfDesc => "cpfDesc" {
        pt: "Digite seu número de CPF para se identificar",
        en: "Enter your CPF number to identify yourself",
        es: "Ingrese su número de CPF para identificarse" },
    NeedHelp => "needHelp" {
        pt: "Precisa de ajuda? Por favor, peça assistência à nossa equipe",
        en: "Need assistance? Please ask our staff for help",
        es: "¿Necesita ayuda? Por favor, solicite asistencia a nuestro personal" },
    PatientIdentification => "patientIdentification" {
        pt: "Identificação do Paciente", en: "Patient Identification", es: "Identificación del Paciente" },
    ConfirmIdentity => "confirmIdentity" {
        pt: "Confirme Sua Identidade", en: "Confirm Your Identity", es: "Confirme Su Identidad" },
    NotMe => "notMe" {
        pt: "Não Sou Eu / Cancelar", en: "Not Me / Cancel", es: "No Soy Yo / Cancelar" },
    ConfirmIdentification => "confirmIdentification" {
        pt: "Confirmar Identificação", en: "Confirm Identification", es: "Confirmar Identificación" },
    ProceduresScheduled => "proceduresScheduled" {
        pt: "Procedimentos Agendados", en: "Scheduled Procedures", es: "Procedimientos Programados" },
    PreparationRequired => "preparationRequired" {
        pt: "Preparação Necessária", en: "Preparation Required", es: "Preparación Requerida" },
    Printing => "printing" {
        pt: "Imprimindo seu ticket...", en: "Printing your ticket...", es: "Imprimiendo su ticket..." },
    ThankYou => "thankYou" {
        pt: "Obrigado!", en: "Thank you!", es: "¡Gracias!" },
    ProcedureConfirmed => "procedureConfirmed" {
        pt: "Seu procedimento foi confirmado", en: "Your procedure has been confirmed",
        es: "Su procedimiento ha sido confirmado" },
    NewPatient => "newPatient" {
        pt: "Novo Paciente", en: "New Patient", es: "Nuevo Paciente" },
    CheckIn => "checkIn" {
        pt: "Check-in realizado com sucesso", en: "Check-in completed successfully",
        es: "Check-in completado con éxito" },
    IntegrationPartners => "integrationPartners" {
        pt: "Integrações", en: "Integrations", es: "Integraciones" },
    Back => "back" {
        pt: "Voltar", en: "Back", es: "Volver" },
    StepOf => "stepOf" {
        pt: "Etapa {current} de {total}", en: "Step {current} of {total}", es: "Paso {current} de {total}" },
    StartFaceScan => "startFaceScan" {
        pt: "Iniciar Reconhecimento Facial", en: "Start Face Recognition", es: "Iniciar Reconocimiento Facial" },
    Scanning => "scanning" {
        pt: "Escaneando... {progress}%", en: "Scanning... {progress}%", es: "Escaneando... {progress}%" },
    Cancel => "cancel" {
        pt: "Cancelar", en: "Cancel", es: "Cancelar" },
    FaceScanComplete => "faceScanComplete" {
        pt: "Reconhecimento facial concluído", en: "Face scan complete", es: "Reconocimiento facial completado" },
    IdentityVerified => "identityVerified" {
        pt: "Sua identidade foi verificada", en: "Your identity has been verified",
        es: "Su identidad ha sido verificada" },
    EnterCpf => "enterCpf" {
        pt: "Digite seu CPF:", en: "Enter your CPF:", es: "Ingrese su CPF:" },
    CpfRequired => "cpfRequired" {
        pt: "Seu CPF é necessário para identificar seus registros médicos",
        en: "Your CPF is required to identify your medical records",
        es: "Su CPF es necesario para identificar sus registros médicos" },
    Verifying => "verifying" {
        pt: "Verificando...", en: "Verifying...", es: "Verificando..." },
    CpfVerified => "cpfVerified" {
        pt: "CPF verificado", en: "CPF Verified", es: "CPF verificado" },
    InvalidCpf => "invalidCpf" {
        pt: "CPF inválido. Por favor, digite um número de CPF válido",
        en: "Invalid CPF. Please enter a valid CPF number",
        es: "CPF inválido. Por favor, ingrese un número de CPF válido" },
    CameraUnavailable => "cameraUnavailable" {
        pt: "Câmera indisponível. O reconhecimento continuará sem vídeo",
        en: "Camera unavailable. Recognition will continue without video",
        es: "Cámara no disponible. El reconocimiento continuará sin video" },
    NoRecordFound => "noRecordFound" {
        pt: "Nenhum registro encontrado. Por favor, procure nossa equipe",
        en: "No record found. Please ask our staff for help",
        es: "No se encontró ningún registro. Por favor, consulte a nuestro personal" },
    PrintUnavailable => "printUnavailable" {
        pt: "Não foi possível imprimir o comprovante. Por favor, procure nossa equipe",
        en: "Unable to print the receipt. Please ask our staff for help",
        es: "No se pudo imprimir el recibo. Por favor, consulte a nuestro personal" },
    HealthInsurance => "healthInsurance" {
        pt: "Convênio", en: "Health Insurance", es: "Seguro Médico" },
    InsuranceId => "insuranceId" {
        pt: "Carteirinha", en: "Insurance ID", es: "Número de Seguro" },
    DateOfBirth => "dateOfBirth" {
        pt: "Data de Nascimento", en: "Date of Birth", es: "Fecha de Nacimiento" },
    Years => "years" {
        pt: "{age} anos", en: "{age} years", es: "{age} años" },
    QueuePanelTitle => "queuePanelTitle" {
        pt: "Fila de Atendimento", en: "Appointment Queue", es: "Cola de Atención" },
    QueuePanelSubtitle => "queuePanelSubtitle" {
        pt: "Aguarde seu número ser chamado", en: "Please wait for your number to be called",
        es: "Espere a que su número sea llamado" },
    NowCalling => "nowCalling" {
        pt: "CHAMANDO AGORA", en: "NOW CALLING", es: "LLAMANDO AHORA" },
    LessThanAMinute => "lessThanAMinute" {
        pt: "Menos de um minuto", en: "Less than a minute", es: "Menos de un minuto" },
    OneMinute => "oneMinute" {
        pt: "1 minuto atrás", en: "1 minute ago", es: "1 minuto atrás" },
    MinutesAgo => "minutesAgo" {
        pt: "{minutes} minutos atrás", en: "{minutes} minutes ago", es: "Hace {minutes} minutos" },
    EstimatedWait => "estimatedWait" {
        pt: "Espera estimada: {minutes} min", en: "Estimated wait: {minutes} min",
        es: "Espera estimada: {minutes} min" },
    ReceiptTitle => "receiptTitle" {
        pt: "Comprovante de Check-in do Paciente", en: "Patient Check-in Receipt",
        es: "Recibo de Registro del Paciente" },
    ReceiptName => "receiptName" {
        pt: "Nome", en: "Name", es: "Nombre" },
    ReceiptCpf => "receiptCpf" {
        pt: "CPF", en: "CPF", es: "CPF" },
    ReceiptInsurance => "receiptInsurance" {
        pt: "Convênio", en: "Insurance", es: "Seguro" },
    ReceiptAt => "receiptAt" {
        pt: "às", en: "at", es: "a las" },
    ReceiptQrCode => "receiptQrCode" {
        pt: "[Código QR para check-in]", en: "[QR Code for check-in]", es: "[Código QR para registro]" },
    ReceiptDate => "receiptDate" {
        pt: "Data", en: "Date", es: "Fecha" },
    ReceiptTime => "receiptTime" {
        pt: "Hora", en: "Time", es: "Hora" },
    ReceiptThankYou => "receiptThankYou" {
        pt: "Obrigado por escolher os Serviços de Saúde Camasso",
        en: "Thank you for choosing Camasso Health Services",
        es: "Gracias por elegir los Servicios de Salud Camasso" },
}

impl FromStr for TranslationKey {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self> {
        TranslationKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| KioskError::Validation(format!("unknown translation key: {}", s)))
    }
}

/// 语言偏好持久化存储
pub trait PreferenceStore: Send + Sync + fmt::Debug {
    /// 读取已保存的语言标签
    fn load(&self) -> Result<Option<String>>;

    /// 保存语言标签
    fn save(&self, tag: &str) -> Result<()>;
}

/// 基于JSON文件的偏好存储
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(LANGUAGE_PREFERENCE_KEY))
    }

    fn save(&self, tag: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(LANGUAGE_PREFERENCE_KEY.to_string(), tag.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        debug!("Saved language preference {} to {}", tag, self.path.display());
        Ok(())
    }
}

/// 内存偏好存储
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    value: Mutex<Option<String>>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: Option<&str>) -> Self {
        Self {
            value: Mutex::new(initial.map(str::to_string)),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, tag: &str) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(tag.to_string());
        Ok(())
    }
}

/// 语言上下文
#[derive(Debug, Clone)]
pub struct LanguageContext {
    language: Language,
    store: Arc<dyn PreferenceStore>,
}

impl LanguageContext {
    /// 初始化：优先读取已保存的偏好，其次根据宿主区域设置推断，否则使用葡萄牙语
    pub fn init(store: Arc<dyn PreferenceStore>, host_locale: Option<&str>) -> Self {
        let stored = match store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("读取语言偏好失败: {}", e);
                None
            }
        };

        let language = match stored.as_deref().map(Language::from_str) {
            Some(Ok(language)) => language,
            Some(Err(e)) => {
                warn!("忽略已保存的语言偏好: {}", e);
                host_locale.map(Language::detect).unwrap_or_default()
            }
            None => host_locale.map(Language::detect).unwrap_or_default(),
        };

        info!("界面语言初始化为 {}", language);
        Self { language, store }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// 切换语言并持久化
    pub fn set_language(&mut self, language: Language) -> Result<()> {
        self.language = language;
        self.store.save(language.tag())?;
        info!("界面语言切换为 {}", language);
        Ok(())
    }

    /// 查找文本
    pub fn t(&self, key: TranslationKey) -> &'static str {
        key.templates()[self.language.index()]
    }

    /// 查找文本并替换 `{name}` 占位符
    pub fn t_with(&self, key: TranslationKey, params: &[(&str, &str)]) -> String {
        params
            .iter()
            .fold(self.t(key).to_string(), |text, (name, value)| {
                text.replace(&format!("{{{}}}", name), value)
            })
    }

    /// 按字符串键查找，未知键回退为键本身
    pub fn t_str(&self, key: &str) -> String {
        match TranslationKey::from_str(key) {
            Ok(key) => self.t(key).to_string(),
            Err(_) => {
                if cfg!(debug_assertions) {
                    warn!("缺少翻译 {:?} ({})", key, self.language);
                }
                key.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_context(stored: Option<&str>, host: Option<&str>) -> LanguageContext {
        LanguageContext::init(Arc::new(MemoryPreferenceStore::new(stored)), host)
    }

    #[test]
    fn test_init_prefers_stored_language() {
        assert_eq!(memory_context(Some("es"), Some("en-GB")).language(), Language::Es);
    }

    #[test]
    fn test_init_detects_host_locale() {
        assert_eq!(memory_context(None, Some("pt-PT")).language(), Language::PtBr);
        assert_eq!(memory_context(None, Some("es-AR")).language(), Language::Es);
        assert_eq!(memory_context(None, Some("fr-FR")).language(), Language::EnUs);
        assert_eq!(memory_context(Some("xx"), Some("es")).language(), Language::Es);
    }

    #[test]
    fn test_init_defaults_to_portuguese() {
        assert_eq!(memory_context(None, None).language(), Language::PtBr);
    }

    #[test]
    fn test_set_language_persists() {
        let store = Arc::new(MemoryPreferenceStore::new(None));
        let mut ctx = LanguageContext::init(store.clone(), None);
        ctx.set_language(Language::EnUs).unwrap();

        assert_eq!(store.load().unwrap().as_deref(), Some("en-US"));
        assert_eq!(ctx.t(TranslationKey::NewPatient), "New Patient");
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs/kiosk.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save("es").unwrap();
        let reloaded = LanguageContext::init(Arc::new(store.clone()), Some("en-US"));
        assert_eq!(reloaded.language(), Language::Es);
    }

    #[test]
    fn test_lookup_and_placeholders() {
        let ctx = memory_context(Some("pt-BR"), None);
        assert_eq!(ctx.t(TranslationKey::NowCalling), "CHAMANDO AGORA");
        assert_eq!(
            ctx.t_with(TranslationKey::MinutesAgo, &[("minutes", "7")]),
            "7 minutos atrás"
        );
        assert_eq!(ctx.t_str("thankYou"), "Obrigado!");
        assert_eq!(ctx.t_str("doesNotExist"), "doesNotExist");
    }

    #[test]
    fn test_every_key_translated_in_every_language() {
        for key in TranslationKey::ALL {
            assert_eq!(TranslationKey::from_str(key.as_str()).unwrap(), *key);
            for text in key.templates() {
                assert!(!text.is_empty(), "empty template for {}", key.as_str());
            }
        }
    }
}
