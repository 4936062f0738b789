//! デバッガのエラー型

use thiserror::Error;

/// デバッガセッションのエラー
///
/// spawn失敗と使用法エラー以外はすべて非致命的で、
/// 操作者に報告された後もセッションは継続します。
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// プロセスに接続されていない
    #[error("not attached to a process")]
    NotAttached,

    /// 未知のコマンド
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// コマンドの語数が上限を超えた
    #[error("too many arguments: commands take at most {max} words, got {got}")]
    TooManyArguments { max: usize, got: usize },

    /// コマンドに必要な引数がない
    #[error("missing argument (usage: {0})")]
    MissingArgument(&'static str),

    /// 同じアドレスにすでにブレークポイントがある
    #[error("breakpoint already set at 0x{0:x}")]
    BreakpointExists(u64),

    /// 指定アドレスにブレークポイントがない
    #[error("no breakpoint set at 0x{0:x}")]
    BreakpointNotFound(u64),
}
