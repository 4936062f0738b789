//! デバッガコマンド

use crate::{DebuggerError, Result};

/// 1コマンドの最大語数（"register write <name> <value>" で4語）
const MAX_TOKENS: usize = 4;

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ブレークポイントを設定
    Break(String),
    /// ブレークポイントを削除
    Delete(String),
    /// ブレークポイント一覧表示
    Breakpoints,
    /// 実行継続
    Continue,
    /// ステップ実行（1命令）
    Step,
    /// レジスタ読み取り
    RegisterRead(String),
    /// レジスタ書き込み
    RegisterWrite(String, String),
    /// 全レジスタ表示
    RegisterDump,
    /// メモリ読み取り
    MemoryRead(String),
    /// メモリ書き込み
    MemoryWrite(String, String),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 空白区切りでトークン化します。語数が上限を超えた入力は
    /// 切り詰めずにエラーとして拒否します。
    pub fn parse(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        if parts.is_empty() {
            return Err(DebuggerError::UnknownCommand(String::new()).into());
        }
        if parts.len() > MAX_TOKENS {
            return Err(DebuggerError::TooManyArguments {
                max: MAX_TOKENS,
                got: parts.len(),
            }
            .into());
        }

        match parts[0] {
            "break" | "b" => match parts.get(1) {
                Some(addr) => Ok(Command::Break(addr.to_string())),
                None => Err(DebuggerError::MissingArgument("break <address>").into()),
            },
            "delete" | "d" => match parts.get(1) {
                Some(addr) => Ok(Command::Delete(addr.to_string())),
                None => Err(DebuggerError::MissingArgument("delete <address>").into()),
            },
            "breakpoints" => Ok(Command::Breakpoints),
            "continue" | "c" => Ok(Command::Continue),
            "step" | "s" | "stepi" => Ok(Command::Step),
            "register" | "reg" => match (parts.get(1), parts.get(2), parts.get(3)) {
                (Some(&"read"), Some(name), None) => {
                    Ok(Command::RegisterRead(name.to_string()))
                }
                (Some(&"write"), Some(name), Some(value)) => {
                    Ok(Command::RegisterWrite(name.to_string(), value.to_string()))
                }
                (Some(&"dump"), None, None) => Ok(Command::RegisterDump),
                _ => Err(DebuggerError::MissingArgument(
                    "register read <name> | register write <name> <value> | register dump",
                )
                .into()),
            },
            "memory" | "mem" => match (parts.get(1), parts.get(2), parts.get(3)) {
                (Some(&"read"), Some(addr), None) => {
                    Ok(Command::MemoryRead(addr.to_string()))
                }
                (Some(&"write"), Some(addr), Some(value)) => {
                    Ok(Command::MemoryWrite(addr.to_string(), value.to_string()))
                }
                _ => Err(DebuggerError::MissingArgument(
                    "memory read <address> | memory write <address> <value>",
                )
                .into()),
            },
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(DebuggerError::UnknownCommand(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Command {
        Command::parse(input).expect(input)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("continue"), Command::Continue);
        assert_eq!(parse("c"), Command::Continue);
        assert_eq!(parse("step"), Command::Step);
        assert_eq!(parse("stepi"), Command::Step);
        assert_eq!(parse("break 0x400000"), Command::Break("0x400000".to_string()));
        assert_eq!(parse("b 0x400000"), Command::Break("0x400000".to_string()));
        assert_eq!(parse("delete 0x400000"), Command::Delete("0x400000".to_string()));
        assert_eq!(parse("breakpoints"), Command::Breakpoints);
        assert_eq!(parse("quit"), Command::Quit);
        assert_eq!(parse("  help  "), Command::Help);
    }

    #[test]
    fn test_parse_register_commands() {
        assert_eq!(
            parse("register read rip"),
            Command::RegisterRead("rip".to_string())
        );
        assert_eq!(
            parse("register write rax 0x42"),
            Command::RegisterWrite("rax".to_string(), "0x42".to_string())
        );
        assert_eq!(parse("register dump"), Command::RegisterDump);
        assert!(Command::parse("register").is_err());
        assert!(Command::parse("register read").is_err());
        assert!(Command::parse("register frobnicate rax").is_err());
    }

    #[test]
    fn test_parse_memory_commands() {
        assert_eq!(
            parse("memory read 0x400000"),
            Command::MemoryRead("0x400000".to_string())
        );
        assert_eq!(
            parse("memory write 0x400000 0xdeadbeef"),
            Command::MemoryWrite("0x400000".to_string(), "0xdeadbeef".to_string())
        );
        assert!(Command::parse("memory").is_err());
        assert!(Command::parse("memory write 0x400000").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(Command::parse("frobnicate").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        // 語数が上限を超えた入力は切り詰めずに拒否する
        let err = Command::parse("register write rax 0x42 extra").unwrap_err();
        assert!(err.to_string().contains("too many arguments"));
    }
}
