//! プロセス制御機能

use crate::Result;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::ffi::CString;
use std::path::Path;

/// 停止イベントの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// ブレークポイントヒット（SIGTRAP）
    Breakpoint,
    /// ステップ実行完了（SIGTRAP）
    Step,
    /// シグナル受信
    Signal(Signal),
    /// プロセス終了
    Exited(i32),
    /// その他の停止
    Other,
}

/// デバッグ対象のプロセス
pub struct Process {
    pid: Pid,
}

impl Process {
    /// 実行可能ファイルを起動してデバッグ対象プロセスを開始する
    ///
    /// 新しいプロセスをforkし、子プロセス側でASLRを無効化してから
    /// PTRACE_TRACEMEを設定し、指定された実行可能ファイルをexecveで実行します。
    /// ASLRを無効化するのは、操作者が指定したブレークポイントアドレスが
    /// 実行のたびに変わらないようにするためです。
    /// 親プロセスは子プロセスの最初の停止（execve直後）まで待機します。
    pub fn spawn<P: AsRef<Path>>(program: P, args: &[String]) -> Result<Self> {
        use nix::sys::personality::{self, Persona};
        use nix::sys::ptrace;
        use nix::sys::wait::{waitpid, WaitStatus};
        use nix::unistd::{execve, fork, ForkResult};

        // プログラムパスをCStringに変換
        let program_path = program.as_ref().to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid program path"))?;
        let program_cstring = CString::new(program_path)?;

        // 引数をCStringに変換
        let mut cstring_args = vec![program_cstring.clone()];
        for arg in args {
            cstring_args.push(CString::new(arg.as_str())?);
        }

        // 環境変数は親プロセスから継承
        let env: Vec<CString> = std::env::vars()
            .map(|(key, val)| CString::new(format!("{}={}", key, val)).map_err(anyhow::Error::from))
            .collect::<Result<Vec<_>>>()?;

        match unsafe { fork()? } {
            ForkResult::Parent { child } => {
                // 親プロセス: execve直後の停止まで待機
                match waitpid(child, None)? {
                    WaitStatus::Stopped(_, _) => Ok(Self { pid: child }),
                    status => {
                        Err(anyhow::anyhow!("Unexpected wait status after execve: {:?}", status))
                    }
                }
            }
            ForkResult::Child => {
                // 子プロセス: ASLRを無効化し、PTRACE_TRACEMEを設定してexecve
                personality::set(Persona::ADDR_NO_RANDOMIZE)?;
                ptrace::traceme()?;

                // execveを実行（成功すると戻ってこない）
                execve(&program_cstring, &cstring_args, &env)?;

                unreachable!("execve failed");
            }
        }
    }

    /// 既存のプロセスにアタッチする
    pub fn attach(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        nix::sys::ptrace::attach(pid)?;
        // アタッチで送られるSIGSTOPによる停止まで待機
        nix::sys::wait::waitpid(pid, None)?;
        Ok(Self { pid })
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// プロセスを実行継続して停止イベントを待機する
    ///
    /// 次の停止イベント（ブレークポイント、シグナル、終了など）まで
    /// ブロックします。
    pub fn continue_and_wait(&self) -> Result<StopReason> {
        nix::sys::ptrace::cont(self.pid, None)?;
        self.wait_for_stop(StopReason::Breakpoint)
    }

    /// 1命令だけ実行して停止する（ステップ実行）
    pub fn step(&self) -> Result<StopReason> {
        nix::sys::ptrace::step(self.pid, None)?;
        self.wait_for_stop(StopReason::Step)
    }

    /// 停止イベントを待機してStopReasonに分類する
    ///
    /// SIGTRAPの意味は直前に発行した要求によって決まるため、
    /// 呼び出し側がtrap_reasonとして渡します。
    fn wait_for_stop(&self, trap_reason: StopReason) -> Result<StopReason> {
        use nix::sys::wait::{waitpid, WaitStatus};

        match waitpid(self.pid, None)? {
            WaitStatus::Stopped(_, signal) => {
                if signal == Signal::SIGTRAP {
                    Ok(trap_reason)
                } else {
                    Ok(StopReason::Signal(signal))
                }
            }
            WaitStatus::Exited(_, code) => Ok(StopReason::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Ok(StopReason::Signal(signal)),
            _ => Ok(StopReason::Other),
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        let _ = nix::sys::ptrace::detach(self.pid, None);
    }
}
