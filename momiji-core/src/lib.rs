//! Momiji デバッガのコア機能
//!
//! このクレートは、デバッガの中核となるロジックを提供します。
//! セッションコンテキスト、ブレークポイント管理、ステップオーバーを含む
//! 実行制御、コマンドモデルを統合します。

pub mod debugger;
pub mod breakpoint;
pub mod command;
pub mod errors;
pub mod parse;

pub use debugger::Debugger;
pub use breakpoint::BreakpointManager;
pub use command::Command;
pub use errors::DebuggerError;

// 他のクレートから使用するために再エクスポート
pub use momiji_target::StopReason;

/// デバッガの結果型
pub type Result<T> = anyhow::Result<T>;
