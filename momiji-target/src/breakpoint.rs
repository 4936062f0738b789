//! ブレークポイント機能

use crate::Result;
use thiserror::Error;

/// INT3命令のオペコード
const INT3_OPCODE: u8 = 0xCC;

/// ブレークポイント状態のエラー
///
/// 状態を変更せずに報告されます。二重に有効化すると保存済みの
/// 元バイトがトラップ命令で上書きされてしまうため、ここで防ぎます。
#[derive(Debug, Error)]
pub enum BreakpointError {
    #[error("breakpoint at 0x{0:x} is already enabled")]
    AlreadyEnabled(u64),
    #[error("breakpoint at 0x{0:x} is not enabled")]
    NotEnabled(u64),
}

/// ソフトウェアブレークポイント（INT3命令）
///
/// original_byteは、トラップ命令が書き込まれている間だけSomeになります。
/// 保存されたバイトは、同じアドレスへの次の書き換えの前に必ず復元されます。
pub struct SoftwareBreakpoint {
    address: u64,
    original_byte: Option<u8>,
}

impl SoftwareBreakpoint {
    /// ブレークポイントを作成する
    pub fn new(address: u64) -> Self {
        Self {
            address,
            original_byte: None,
        }
    }

    /// ブレークポイントのアドレスを取得する
    pub fn address(&self) -> u64 {
        self.address
    }

    /// ブレークポイントが有効かどうか
    pub fn is_enabled(&self) -> bool {
        self.original_byte.is_some()
    }

    /// 保存されている元のバイトを取得する
    pub fn original_byte(&self) -> Option<u8> {
        self.original_byte
    }

    /// ブレークポイントを有効化する
    ///
    /// アドレスの先頭バイトを保存してから0xCC（INT3）で置き換えます。
    /// すでに有効な場合はエラーを返し、状態は変更しません。
    pub fn enable(&mut self, memory: &crate::Memory) -> Result<()> {
        if self.original_byte.is_some() {
            return Err(BreakpointError::AlreadyEnabled(self.address).into());
        }

        // 元のバイトを保存
        let original = memory.read_u8(self.address as usize)?;

        // INT3命令で置き換え
        memory.write_u8(self.address as usize, INT3_OPCODE)?;

        self.original_byte = Some(original);
        Ok(())
    }

    /// ブレークポイントを無効化する
    ///
    /// INT3命令を保存していた元のバイトで置き換えます。
    pub fn disable(&mut self, memory: &crate::Memory) -> Result<()> {
        let original = self
            .original_byte
            .ok_or(BreakpointError::NotEnabled(self.address))?;

        // 元のバイトで置き換え
        memory.write_u8(self.address as usize, original)?;

        self.original_byte = None;
        Ok(())
    }
}
