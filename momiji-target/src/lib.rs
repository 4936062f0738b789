//! Momiji ターゲットプロセス制御
//!
//! このクレートは、デバッグ対象のプロセスを制御するための低レベル機能を提供します。
//! ptrace、レジスタアクセス、メモリアクセス、ブレークポイントの書き換えなどを行います。

pub mod process;
pub mod memory;
pub mod registers;
pub mod breakpoint;

pub use process::{Process, StopReason};
pub use memory::Memory;
pub use registers::{RegisterDescriptor, Registers};
pub use breakpoint::SoftwareBreakpoint;

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;
