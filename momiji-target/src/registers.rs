//! レジスタアクセス機能

use crate::Result;
use nix::libc::user_regs_struct;
use nix::unistd::Pid;
use thiserror::Error;

/// レジスタ関連のエラー
#[derive(Debug, Error)]
pub enum RegisterError {
    /// 名前がレジスタ表に存在しない
    #[error("unknown register: {0}")]
    Unknown(String),
}

/// レジスタスナップショット内のスロットを返すアクセサ
pub type SlotFn = for<'a> fn(&'a mut user_regs_struct) -> &'a mut u64;

/// レジスタ記述子
///
/// シンボル名、DWARFレジスタ番号、スナップショット内のスロットを対応付けます。
pub struct RegisterDescriptor {
    /// DWARFレジスタ番号
    pub dwarf_id: i32,
    /// シンボル名
    pub name: &'static str,
    slot: SlotFn,
}

impl RegisterDescriptor {
    /// スナップショット内の対応するスロットへの可変参照を取得する
    pub fn slot<'a>(&self, regs: &'a mut user_regs_struct) -> &'a mut u64 {
        (self.slot)(regs)
    }

    /// スナップショットから値を読み取る
    pub fn value(&self, regs: &user_regs_struct) -> u64 {
        let mut copy = *regs;
        *(self.slot)(&mut copy)
    }
}

/// x86_64のレジスタ表（27エントリ）
///
/// user_regs_structの全スロットをDWARF番号順に列挙した固定テーブルです。
/// 記述子からスロットへの対応はアクセサ関数の表引きで解決します。
pub static REGISTERS: [RegisterDescriptor; 27] = [
    RegisterDescriptor { dwarf_id: 0, name: "r15", slot: |r| &mut r.r15 },
    RegisterDescriptor { dwarf_id: 1, name: "r14", slot: |r| &mut r.r14 },
    RegisterDescriptor { dwarf_id: 2, name: "r13", slot: |r| &mut r.r13 },
    RegisterDescriptor { dwarf_id: 3, name: "r12", slot: |r| &mut r.r12 },
    RegisterDescriptor { dwarf_id: 4, name: "rbp", slot: |r| &mut r.rbp },
    RegisterDescriptor { dwarf_id: 5, name: "rbx", slot: |r| &mut r.rbx },
    RegisterDescriptor { dwarf_id: 6, name: "r11", slot: |r| &mut r.r11 },
    RegisterDescriptor { dwarf_id: 7, name: "r10", slot: |r| &mut r.r10 },
    RegisterDescriptor { dwarf_id: 8, name: "r9", slot: |r| &mut r.r9 },
    RegisterDescriptor { dwarf_id: 9, name: "r8", slot: |r| &mut r.r8 },
    RegisterDescriptor { dwarf_id: 10, name: "rax", slot: |r| &mut r.rax },
    RegisterDescriptor { dwarf_id: 11, name: "rcx", slot: |r| &mut r.rcx },
    RegisterDescriptor { dwarf_id: 12, name: "rdx", slot: |r| &mut r.rdx },
    RegisterDescriptor { dwarf_id: 13, name: "rsi", slot: |r| &mut r.rsi },
    RegisterDescriptor { dwarf_id: 14, name: "rdi", slot: |r| &mut r.rdi },
    RegisterDescriptor { dwarf_id: 15, name: "orig_rax", slot: |r| &mut r.orig_rax },
    RegisterDescriptor { dwarf_id: 16, name: "rip", slot: |r| &mut r.rip },
    RegisterDescriptor { dwarf_id: 17, name: "cs", slot: |r| &mut r.cs },
    RegisterDescriptor { dwarf_id: 18, name: "eflags", slot: |r| &mut r.eflags },
    RegisterDescriptor { dwarf_id: 19, name: "rsp", slot: |r| &mut r.rsp },
    RegisterDescriptor { dwarf_id: 20, name: "ss", slot: |r| &mut r.ss },
    RegisterDescriptor { dwarf_id: 21, name: "fs_base", slot: |r| &mut r.fs_base },
    RegisterDescriptor { dwarf_id: 22, name: "gs_base", slot: |r| &mut r.gs_base },
    RegisterDescriptor { dwarf_id: 23, name: "ds", slot: |r| &mut r.ds },
    RegisterDescriptor { dwarf_id: 24, name: "es", slot: |r| &mut r.es },
    RegisterDescriptor { dwarf_id: 25, name: "fs", slot: |r| &mut r.fs },
    RegisterDescriptor { dwarf_id: 26, name: "gs", slot: |r| &mut r.gs },
];

/// シンボル名からレジスタ記述子を検索する
///
/// 未知の名前にはNoneを返します。呼び出し側はエラーとして報告してください。
pub fn lookup_by_name(name: &str) -> Option<&'static RegisterDescriptor> {
    REGISTERS.iter().find(|desc| desc.name == name)
}

/// DWARFレジスタ番号からレジスタ記述子を検索する
pub fn lookup_by_dwarf(dwarf_id: i32) -> Option<&'static RegisterDescriptor> {
    REGISTERS.iter().find(|desc| desc.dwarf_id == dwarf_id)
}

/// レジスタアクセス
///
/// スナップショットはプロセスが停止中のみ意味を持ちます。
/// 実行中の読み書きは呼び出し側が防いでください。
pub struct Registers {
    pid: Pid,
}

impl Registers {
    /// レジスタアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// レジスタスナップショットを読み取る
    pub fn read(&self) -> Result<user_regs_struct> {
        let regs = nix::sys::ptrace::getregs(self.pid)?;
        Ok(regs)
    }

    /// レジスタスナップショットを書き込む
    pub fn write(&self, regs: user_regs_struct) -> Result<()> {
        nix::sys::ptrace::setregs(self.pid, regs)?;
        Ok(())
    }

    /// プログラムカウンタ（RIP）を取得する
    pub fn get_pc(&self) -> Result<u64> {
        let regs = self.read()?;
        Ok(regs.rip)
    }

    /// プログラムカウンタ（RIP）を設定する
    pub fn set_pc(&self, pc: u64) -> Result<()> {
        let mut regs = self.read()?;
        regs.rip = pc;
        self.write(regs)
    }

    /// 名前で指定したレジスタの値を読み取る
    ///
    /// 呼び出しごとにスナップショット全体を取得します。
    pub fn read_by_name(&self, name: &str) -> Result<u64> {
        let desc = lookup_by_name(name)
            .ok_or_else(|| RegisterError::Unknown(name.to_string()))?;
        let regs = self.read()?;
        Ok(desc.value(&regs))
    }

    /// 名前で指定したレジスタに値を書き込む
    ///
    /// スナップショットを取得し、該当スロットのみ変更して書き戻します。
    pub fn write_by_name(&self, name: &str, value: u64) -> Result<()> {
        let desc = lookup_by_name(name)
            .ok_or_else(|| RegisterError::Unknown(name.to_string()))?;
        let mut regs = self.read()?;
        *desc.slot(&mut regs) = value;
        self.write(regs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot() -> user_regs_struct {
        // テスト用のゼロ初期化スナップショット
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_table_covers_all_slots() {
        assert_eq!(REGISTERS.len(), 27);

        // 名前とDWARF番号はどちらも一意
        for (i, desc) in REGISTERS.iter().enumerate() {
            assert_eq!(desc.dwarf_id, i as i32);
            assert!(
                REGISTERS.iter().filter(|d| d.name == desc.name).count() == 1,
                "duplicate register name: {}",
                desc.name
            );
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let rip = lookup_by_name("rip").expect("rip should exist");
        assert_eq!(rip.dwarf_id, 16);

        let r15 = lookup_by_name("r15").expect("r15 should exist");
        assert_eq!(r15.dwarf_id, 0);

        assert!(lookup_by_name("bogusname").is_none());
        assert!(lookup_by_name("").is_none());
    }

    #[test]
    fn test_lookup_by_dwarf() {
        assert_eq!(lookup_by_dwarf(16).map(|d| d.name), Some("rip"));
        assert_eq!(lookup_by_dwarf(10).map(|d| d.name), Some("rax"));
        assert!(lookup_by_dwarf(27).is_none());
        assert!(lookup_by_dwarf(-1).is_none());
    }

    #[test]
    fn test_slot_round_trip() {
        let mut regs = empty_snapshot();

        for (i, desc) in REGISTERS.iter().enumerate() {
            let value = 0x1000 + i as u64;
            *desc.slot(&mut regs) = value;
            assert_eq!(desc.value(&regs), value, "register {}", desc.name);
        }

        // スロットの対応が正しいことを代表フィールドで確認
        assert_eq!(regs.rip, 0x1000 + 16);
        assert_eq!(regs.rsp, 0x1000 + 19);
        assert_eq!(regs.rax, 0x1000 + 10);
    }
}
