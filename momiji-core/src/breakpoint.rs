//! ブレークポイント管理

use crate::{DebuggerError, Result};
use momiji_target::{Memory, SoftwareBreakpoint};
use std::collections::HashMap;

/// ブレークポイントマネージャ
///
/// アドレスをキーとしてソフトウェアブレークポイント（INT3）を管理します。
/// ゼロ個以上のブレークポイントを同時に保持できます。
pub struct BreakpointManager {
    breakpoints: HashMap<u64, SoftwareBreakpoint>,
}

impl BreakpointManager {
    /// 新しいブレークポイントマネージャを作成する
    pub fn new() -> Self {
        Self {
            breakpoints: HashMap::new(),
        }
    }

    /// ブレークポイントを追加し、有効化する
    ///
    /// 同じアドレスにすでにブレークポイントがある場合はエラーを返し、
    /// 状態は変更しません。
    pub fn add_and_enable(&mut self, address: u64, memory: &Memory) -> Result<()> {
        if self.breakpoints.contains_key(&address) {
            return Err(DebuggerError::BreakpointExists(address).into());
        }

        let mut bp = SoftwareBreakpoint::new(address);
        bp.enable(memory)?;

        self.breakpoints.insert(address, bp);
        Ok(())
    }

    /// ブレークポイントを削除し、元のバイトを復元する
    pub fn remove_and_disable(&mut self, address: u64, memory: &Memory) -> Result<()> {
        let mut bp = self
            .breakpoints
            .remove(&address)
            .ok_or(DebuggerError::BreakpointNotFound(address))?;

        if bp.is_enabled() {
            bp.disable(memory)?;
        }
        Ok(())
    }

    /// 指定アドレスに有効なブレークポイントがあるか
    pub fn enabled_at(&self, address: u64) -> bool {
        self.breakpoints
            .get(&address)
            .map(|bp| bp.is_enabled())
            .unwrap_or(false)
    }

    /// 指定アドレスのブレークポイントを一時的に無効化する
    ///
    /// ステップオーバー中に使用します。管理対象からは削除しません。
    pub fn disable_at(&mut self, address: u64, memory: &Memory) -> Result<()> {
        let bp = self
            .breakpoints
            .get_mut(&address)
            .ok_or(DebuggerError::BreakpointNotFound(address))?;
        bp.disable(memory)
    }

    /// 指定アドレスのブレークポイントを再度有効化する
    pub fn enable_at(&mut self, address: u64, memory: &Memory) -> Result<()> {
        let bp = self
            .breakpoints
            .get_mut(&address)
            .ok_or(DebuggerError::BreakpointNotFound(address))?;
        bp.enable(memory)
    }

    /// 全てのブレークポイントを取得する
    pub fn all(&self) -> impl Iterator<Item = &SoftwareBreakpoint> {
        self.breakpoints.values()
    }

    /// ブレークポイントの数を取得する
    pub fn count(&self) -> usize {
        self.breakpoints.len()
    }

    /// 全てのブレークポイントを破棄する
    ///
    /// ターゲットが終了した後に呼ばれます。メモリの復元は行いません。
    pub fn clear(&mut self) {
        self.breakpoints.clear();
    }
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}
