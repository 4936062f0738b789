//! メモリアクセス機能

use crate::Result;
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::os::unix::fs::FileExt;

/// メモリから読み書き可能な型
pub trait MemoryReadable: Sized {
    /// リトルエンディアンバイト列から値を構築
    fn from_le_bytes(bytes: &[u8]) -> Result<Self>;

    /// リトルエンディアンバイト列に変換
    fn to_le_bytes(&self) -> Vec<u8>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

impl MemoryReadable for u64 {
    fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 8] = bytes.try_into()
            .map_err(|_| anyhow::anyhow!("Failed to convert {} bytes to u64 (expected 8 bytes)", bytes.len()))?;
        Ok(u64::from_le_bytes(array))
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        (*self).to_le_bytes().to_vec()
    }

    fn size() -> usize { 8 }
}

impl MemoryReadable for u8 {
    fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        bytes.first().copied()
            .ok_or_else(|| anyhow::anyhow!("Cannot read u8 from empty bytes"))
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        vec![*self]
    }

    fn size() -> usize { 1 }
}

/// メモリマッピング情報
#[derive(Debug, Clone)]
pub struct MemoryMapping {
    pub start: usize,
    pub end: usize,
    pub offset: usize,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

/// /proc/pid/maps の1行をパースする
///
/// フォーマット: "address perms offset dev inode pathname"
/// 例: "7f1234567000-7f1234568000 r-xp 00000000 08:01 123456 /lib/libc.so"
fn parse_map_line(line: &str) -> Option<MemoryMapping> {
    let mut parts = line.split_whitespace();
    let range = parts.next()?;
    let perms = parts.next()?;
    let offset = parts.next()?;

    let (start, end) = range.split_once('-')?;
    let start = usize::from_str_radix(start, 16).ok()?;
    let end = usize::from_str_radix(end, 16).ok()?;
    let offset = usize::from_str_radix(offset, 16).ok()?;

    let mut perm_chars = perms.chars();
    let readable = perm_chars.next() == Some('r');
    let writable = perm_chars.next() == Some('w');
    let executable = perm_chars.next() == Some('x');

    Some(MemoryMapping {
        start,
        end,
        offset,
        readable,
        writable,
        executable,
    })
}

/// メモリアクセス
///
/// ターゲットプロセスが停止中のみ使用できます。
/// 読み取りの失敗は常にErrで報告され、番兵値と正常なデータが混同されることはありません。
pub struct Memory {
    pid: Pid,
}

impl Memory {
    /// メモリアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// /proc/pid/mem のパスを取得する
    fn mem_path(&self) -> String {
        format!("/proc/{}/mem", self.pid)
    }

    /// メモリからデータを読み取る
    ///
    /// /proc/pid/memを使用してターゲットプロセスのメモリを読み取ります。
    /// /proc/pid/memが使用できない場合（EIOエラー）、PTRACE_PEEKDATAにフォールバックします。
    pub fn read(&self, addr: usize, size: usize) -> Result<Vec<u8>> {
        match self.read_via_proc_mem(addr, size) {
            Ok(data) => Ok(data),
            // EIO (errno 5): ptraceにフォールバック
            Err(e) if e.raw_os_error() == Some(5) => self.read_via_ptrace(addr, size),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read {} bytes at 0x{:x}: {}",
                size, addr, e
            )),
        }
    }

    /// /proc/pid/mem経由でメモリを読み取る（内部実装）
    fn read_via_proc_mem(&self, addr: usize, size: usize) -> std::io::Result<Vec<u8>> {
        let file = File::open(self.mem_path())?;
        let mut buffer = vec![0u8; size];
        file.read_exact_at(&mut buffer, addr as u64)?;
        Ok(buffer)
    }

    /// PTRACE_PEEKDATAを使用してメモリからデータを読み取る
    ///
    /// /proc/pid/memが使用できない場合のフォールバック。word単位で読み取ります。
    fn read_via_ptrace(&self, addr: usize, size: usize) -> Result<Vec<u8>> {
        use nix::sys::ptrace;

        let word_size = std::mem::size_of::<usize>();
        let mut data = Vec::with_capacity(size);

        for offset in (0..size).step_by(word_size) {
            let word_addr = (addr + offset) as *mut std::ffi::c_void;
            let word = ptrace::read(self.pid, word_addr)
                .map_err(|e| anyhow::anyhow!("Failed to read via ptrace at 0x{:x}: {}", addr + offset, e))?;

            let bytes = word.to_ne_bytes();
            let copy_size = (size - offset).min(word_size);
            data.extend_from_slice(&bytes[..copy_size]);
        }

        Ok(data)
    }

    /// メモリにデータを書き込む
    ///
    /// 書き込みは即座に反映され、取り消せません。
    pub fn write(&self, addr: usize, data: &[u8]) -> Result<()> {
        let mem_path = self.mem_path();
        let file = OpenOptions::new()
            .write(true)
            .open(&mem_path)
            .map_err(|e| anyhow::anyhow!("Failed to open {} for writing: {}", mem_path, e))?;

        file.write_all_at(data, addr as u64)
            .map_err(|e| anyhow::anyhow!("Failed to write {} bytes to 0x{:x}: {}", data.len(), addr, e))?;

        Ok(())
    }

    /// 型付き値を読み取る（ジェネリック版）
    pub fn read_typed<T: MemoryReadable>(&self, addr: usize) -> Result<T> {
        let bytes = self.read(addr, T::size())?;
        T::from_le_bytes(&bytes)
    }

    /// 型付き値を書き込む（ジェネリック版）
    pub fn write_typed<T: MemoryReadable>(&self, addr: usize, value: &T) -> Result<()> {
        self.write(addr, &value.to_le_bytes())
    }

    /// マシンワードを読み取る（リトルエンディアン）
    pub fn read_u64(&self, addr: usize) -> Result<u64> {
        self.read_typed(addr)
    }

    /// マシンワードを書き込む（リトルエンディアン）
    pub fn write_u64(&self, addr: usize, value: u64) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// 1バイト読み取る
    pub fn read_u8(&self, addr: usize) -> Result<u8> {
        self.read_typed(addr)
    }

    /// 1バイト書き込む
    pub fn write_u8(&self, addr: usize, value: u8) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// /proc/pid/maps を解析してメモリマッピング情報を取得する
    pub fn mappings(&self) -> Result<Vec<MemoryMapping>> {
        let maps_path = format!("/proc/{}/maps", self.pid);
        let file = File::open(&maps_path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", maps_path, e))?;
        let reader = BufReader::new(file);

        let mut mappings = Vec::new();
        for line in reader.lines() {
            if let Some(mapping) = parse_map_line(&line?) {
                mappings.push(mapping);
            }
        }

        Ok(mappings)
    }

    /// 指定されたアドレスが有効なメモリマッピング内にあるかチェックする
    pub fn is_mapped(&self, addr: usize) -> Result<bool> {
        let mappings = self.mappings()?;
        Ok(mappings.iter().any(|m| addr >= m.start && addr < m.end))
    }

    /// 実行可能ファイルのベースアドレスを取得する
    ///
    /// 最初の実行可能セグメントからファイルオフセットを引いた値を返します。
    /// 操作者がブレークポイントアドレスを計算する際の基準になります。
    pub fn base_address(&self) -> Result<usize> {
        let mappings = self.mappings()?;

        mappings
            .iter()
            .find(|m| m.executable)
            .map(|m| m.start - m.offset)
            .ok_or_else(|| anyhow::anyhow!("Could not find executable segment in memory mappings"))
    }
}
