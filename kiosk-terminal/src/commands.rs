//! 控制台命令解析

use std::str::FromStr;

use anyhow::{anyhow, bail, Error};
use kiosk_core::{IdentificationMethod, Language};

/// 终端命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 选择或切换识别方式
    Method(IdentificationMethod),
    Scan,
    Type(String),
    /// 提交CPF，不带参数时提交已输入的值
    Submit(Option<String>),
    Cancel,
    Back,
    Confirm,
    NotMe,
    NewSession,
    Language(Language),
    Queue,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            bail!("empty command");
        };
        let rest: Vec<&str> = parts.collect();
        let argument = (!rest.is_empty()).then(|| rest.join(" "));

        let command = match name.to_ascii_lowercase().as_str() {
            "face" => Command::Method(IdentificationMethod::Face),
            "cpf" => Command::Method(IdentificationMethod::Cpf),
            "scan" | "start" => Command::Scan,
            "type" => Command::Type(argument.unwrap_or_default()),
            "submit" => Command::Submit(argument),
            "cancel" => Command::Cancel,
            "back" => Command::Back,
            "yes" | "confirm" => Command::Confirm,
            "no" | "not-me" => Command::NotMe,
            "new" => Command::NewSession,
            "lang" | "language" => {
                let tag = argument.ok_or_else(|| anyhow!("usage: lang <pt-BR|en-US|es>"))?;
                Command::Language(tag.parse()?)
            }
            "queue" => Command::Queue,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command: {}", other),
        };
        Ok(command)
    }
}

/// 帮助文本
pub const HELP: &str = "\
commands:
  face | cpf            choose (or switch) identification method
  scan                  start the face scan
  type <digits>         type into the CPF field
  submit [cpf]          submit the CPF
  cancel | back         cancel identification / go back
  yes | no              confirm identity / not me
  new                   start a new check-in
  lang <tag>            switch language (pt-BR, en-US, es)
  queue                 show the queue panel
  quit                  leave";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "face".parse::<Command>().unwrap(),
            Command::Method(IdentificationMethod::Face)
        );
        assert_eq!(
            "  CPF ".parse::<Command>().unwrap(),
            Command::Method(IdentificationMethod::Cpf)
        );
        assert_eq!("yes".parse::<Command>().unwrap(), Command::Confirm);
        assert_eq!("not-me".parse::<Command>().unwrap(), Command::NotMe);
        assert_eq!(
            "lang es".parse::<Command>().unwrap(),
            Command::Language(Language::Es)
        );
    }

    #[test]
    fn test_cpf_arguments_keep_punctuation() {
        assert_eq!(
            "submit 123.456.789-10".parse::<Command>().unwrap(),
            Command::Submit(Some("123.456.789-10".to_string()))
        );
        assert_eq!("submit".parse::<Command>().unwrap(), Command::Submit(None));
        assert_eq!(
            "type 123 456".parse::<Command>().unwrap(),
            Command::Type("123 456".to_string())
        );
    }

    #[test]
    fn test_rejects_unknown_input() {
        assert!("".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("lang".parse::<Command>().is_err());
        assert!("lang klingon".parse::<Command>().is_err());
    }
}
