//! デバッガのメインロジック

use crate::{breakpoint::BreakpointManager, DebuggerError, Result};
use momiji_target::{Memory, Process, Registers, StopReason};
use std::path::Path;
use tracing::debug;

/// デバッガセッション
///
/// ターゲットプロセスのハンドルとブレークポイント管理を1つの
/// コンテキストとして所有します。各コンポーネントはグローバル状態に
/// 依存せず、このセッション経由でのみターゲットに触れます。
pub struct Debugger {
    /// デバッグ対象プロセス
    process: Option<Process>,
    /// メモリアクセス
    memory: Option<Memory>,
    /// レジスタアクセス
    registers: Option<Registers>,
    /// ブレークポイント管理
    breakpoint_manager: BreakpointManager,
}

impl Debugger {
    /// 新しいデバッガを作成する
    pub fn new() -> Self {
        Self {
            process: None,
            memory: None,
            registers: None,
            breakpoint_manager: BreakpointManager::new(),
        }
    }

    /// プロセスにアタッチされているか確認し、Registersへの参照を取得
    fn require_registers(&self) -> Result<&Registers> {
        self.registers.as_ref().ok_or_else(|| DebuggerError::NotAttached.into())
    }

    /// プロセスにアタッチされているか確認し、Memoryへの参照を取得
    fn require_memory(&self) -> Result<&Memory> {
        self.memory.as_ref().ok_or_else(|| DebuggerError::NotAttached.into())
    }

    /// 実行可能ファイルを起動してデバッグを開始する
    ///
    /// プロセスはexecve直後に停止状態で開始されます。
    /// ユーザーは continue コマンドで実行を開始できます。
    pub fn spawn<P: AsRef<Path>>(&mut self, program: P, args: &[String]) -> Result<()> {
        let process = Process::spawn(program, args)?;
        let pid = process.pid();
        debug!("spawned target process, pid={}", pid);
        self.memory = Some(Memory::new(pid));
        self.registers = Some(Registers::new(pid));
        self.process = Some(process);
        Ok(())
    }

    /// 既存のプロセスにアタッチする
    pub fn attach(&mut self, pid: i32) -> Result<()> {
        let process = Process::attach(pid)?;
        self.memory = Some(Memory::new(pid));
        self.registers = Some(Registers::new(pid));
        self.process = Some(process);
        Ok(())
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> Option<i32> {
        self.process.as_ref().map(|p| p.pid())
    }

    /// ターゲットにアタッチ中かどうか
    pub fn is_attached(&self) -> bool {
        self.process.is_some()
    }

    /// ブレークポイントを設定し、有効化する
    pub fn set_breakpoint(&mut self, address: u64) -> Result<()> {
        let memory = self.memory.as_ref().ok_or(DebuggerError::NotAttached)?;
        self.breakpoint_manager.add_and_enable(address, memory)?;
        debug!("breakpoint installed at 0x{:x}", address);
        Ok(())
    }

    /// ブレークポイントを削除する
    pub fn remove_breakpoint(&mut self, address: u64) -> Result<()> {
        let memory = self.memory.as_ref().ok_or(DebuggerError::NotAttached)?;
        self.breakpoint_manager.remove_and_disable(address, memory)?;
        debug!("breakpoint removed from 0x{:x}", address);
        Ok(())
    }

    /// 設定済みブレークポイントのアドレス一覧を取得する
    pub fn breakpoints(&self) -> Vec<u64> {
        let mut addresses: Vec<u64> = self
            .breakpoint_manager
            .all()
            .map(|bp| bp.address())
            .collect();
        addresses.sort_unstable();
        addresses
    }

    /// プロセスを実行継続して次の停止イベントを待機する
    ///
    /// ブレークポイントで停止していた場合は、先にステップオーバーを
    /// 実行してから継続します。
    pub fn continue_and_wait(&mut self) -> Result<StopReason> {
        if let Some(StopReason::Exited(code)) = self.step_over_breakpoint()? {
            // ステップオーバー中にプロセスが終了した
            self.release_target();
            return Ok(StopReason::Exited(code));
        }

        let process = self.process.as_ref().ok_or(DebuggerError::NotAttached)?;
        let reason = process.continue_and_wait()?;

        if let StopReason::Exited(_) = reason {
            self.release_target();
        }
        Ok(reason)
    }

    /// 1命令だけ実行する
    ///
    /// ブレークポイントで停止していた場合は、その命令をステップオーバー
    /// します（元の命令を1つ実行したことになります）。
    pub fn step(&mut self) -> Result<StopReason> {
        let reason = match self.step_over_breakpoint()? {
            Some(reason) => reason,
            None => {
                let process = self.process.as_ref().ok_or(DebuggerError::NotAttached)?;
                process.step()?
            }
        };

        if let StopReason::Exited(_) = reason {
            self.release_target();
        }
        Ok(reason)
    }

    /// ブレークポイントをステップオーバーする
    ///
    /// トラップ命令は1バイトなので、ヒット直後のPCはブレークポイント
    /// アドレスの1つ先を指しています。該当する有効なブレークポイントが
    /// ある場合のみ、次の順序で通過します:
    /// PCをトラップアドレスへ巻き戻す → 無効化（元バイト復元）→
    /// 1命令ステップ → 停止待機 → 再有効化。
    /// 無効化せずにステップするとトラップが再発火し、再有効化せずに
    /// 継続するとブレークポイントが失われるため、この順序は必須です。
    ///
    /// ステップオーバーを実行した場合はその停止イベントを返します。
    fn step_over_breakpoint(&mut self) -> Result<Option<StopReason>> {
        let registers = self.registers.as_ref().ok_or(DebuggerError::NotAttached)?;
        let memory = self.memory.as_ref().ok_or(DebuggerError::NotAttached)?;
        let process = self.process.as_ref().ok_or(DebuggerError::NotAttached)?;

        let pc = registers.get_pc()?;
        let trap_addr = pc.wrapping_sub(1);

        if !self.breakpoint_manager.enabled_at(trap_addr) {
            return Ok(None);
        }

        debug!("stepping over breakpoint at 0x{:x}", trap_addr);

        registers.set_pc(trap_addr)?;
        self.breakpoint_manager.disable_at(trap_addr, memory)?;

        let reason = process.step()?;
        if let StopReason::Exited(_) = reason {
            // プロセスが消えたため再有効化はできない
            return Ok(Some(reason));
        }

        self.breakpoint_manager.enable_at(trap_addr, memory)?;
        Ok(Some(reason))
    }

    /// プログラムカウンタを取得する
    pub fn get_pc(&self) -> Result<u64> {
        self.require_registers()?.get_pc()
    }

    /// プログラムカウンタを設定する
    pub fn set_pc(&self, pc: u64) -> Result<()> {
        self.require_registers()?.set_pc(pc)
    }

    /// 名前で指定したレジスタの値を読み取る
    pub fn read_register(&self, name: &str) -> Result<u64> {
        self.require_registers()?.read_by_name(name)
    }

    /// 名前で指定したレジスタに値を書き込む
    pub fn write_register(&self, name: &str, value: u64) -> Result<()> {
        self.require_registers()?.write_by_name(name, value)
    }

    /// 全レジスタの名前と値を取得する
    pub fn read_all_registers(&self) -> Result<Vec<(&'static str, u64)>> {
        let registers = self.require_registers()?;
        let regs = registers.read()?;
        Ok(momiji_target::registers::REGISTERS
            .iter()
            .map(|desc| (desc.name, desc.value(&regs)))
            .collect())
    }

    /// 指定アドレスのマシンワードを読み取る
    pub fn read_memory(&self, address: u64) -> Result<u64> {
        let memory = self.require_memory()?;
        match memory.read_u64(address as usize) {
            Ok(value) => Ok(value),
            Err(e) => Err(self.describe_access_error(memory, address, e)),
        }
    }

    /// 指定アドレスにマシンワードを書き込む
    pub fn write_memory(&self, address: u64, value: u64) -> Result<()> {
        let memory = self.require_memory()?;
        match memory.write_u64(address as usize, value) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.describe_access_error(memory, address, e)),
        }
    }

    /// メモリアクセス失敗の理由を補足する
    ///
    /// 未マッピング領域へのアクセスはその旨を明示して報告します。
    fn describe_access_error(
        &self,
        memory: &Memory,
        address: u64,
        error: anyhow::Error,
    ) -> anyhow::Error {
        match memory.is_mapped(address as usize) {
            Ok(false) => {
                anyhow::anyhow!("address 0x{:x} is not mapped in the target", address)
            }
            _ => error,
        }
    }

    /// 実行可能ファイルのベースアドレスを取得する
    pub fn base_address(&self) -> Result<u64> {
        let base = self.require_memory()?.base_address()?;
        Ok(base as u64)
    }

    /// ターゲットのハンドルを解放する
    ///
    /// プロセス終了後に呼ばれます。以降の制御コマンドは
    /// 「not attached」エラーになります。
    fn release_target(&mut self) {
        debug!("target exited, releasing process handles");
        self.process = None;
        self.memory = None;
        self.registers = None;
        self.breakpoint_manager.clear();
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}
