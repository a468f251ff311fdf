//! 通用工具函数

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{KioskError, Result};

/// CPF的数字位数
pub const CPF_DIGITS: usize = 11;

/// 去除所有非数字字符
pub fn strip_non_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// 按 XXX.XXX.XXX-XX 掩码格式化CPF，超出11位的数字被截断
pub fn format_cpf(value: &str) -> String {
    let digits: Vec<char> = strip_non_digits(value).chars().take(CPF_DIGITS).collect();

    let mut formatted = String::with_capacity(14);
    for (index, digit) in digits.iter().enumerate() {
        match index {
            3 | 6 => formatted.push('.'),
            9 => formatted.push('-'),
            _ => {}
        }
        formatted.push(*digit);
    }
    formatted
}

/// 校验CPF位数，返回纯数字形式
pub fn validate_cpf(value: &str) -> Result<String> {
    let digits = strip_non_digits(value);
    if digits.len() != CPF_DIGITS {
        return Err(KioskError::InvalidFormat {
            digits: digits.len(),
        });
    }
    Ok(digits)
}

/// 巴西格式日期 dd/mm/yyyy
pub fn format_date_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// 巴西格式时间 HH:MM
pub fn format_time_br(date_time: NaiveDateTime) -> String {
    date_time.format("%H:%M").to_string()
}
