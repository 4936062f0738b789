//! 実プロセスを対象とした統合テスト
//!
//! /bin/true をトレース下で起動し、レジスタ・メモリ・ブレークポイントの
//! 動作を実際のプロセス状態で検証します。

use momiji_core::{Debugger, StopReason};

const TARGET: &str = "/bin/true";

/// トレース下でターゲットを起動し、最初の停止状態のセッションを返す
fn spawn_target() -> Debugger {
    assert!(
        std::path::Path::new(TARGET).exists(),
        "test target {} not found",
        TARGET
    );

    let mut debugger = Debugger::new();
    debugger
        .spawn(TARGET, &[])
        .expect("failed to spawn target under trace");
    debugger
}

#[test]
fn test_spawn_and_run_to_exit() {
    let mut debugger = spawn_target();
    assert!(debugger.is_attached());
    assert!(debugger.pid().is_some());

    match debugger.continue_and_wait().expect("continue failed") {
        StopReason::Exited(code) => assert_eq!(code, 0),
        other => panic!("expected clean exit, got {:?}", other),
    }

    // 終了後はハンドルが解放され、制御コマンドはエラーになる
    assert!(!debugger.is_attached());
    assert!(debugger.get_pc().is_err());
    assert!(debugger.continue_and_wait().is_err());
}

#[test]
fn test_register_round_trip() {
    let debugger = spawn_target();

    for (name, value) in [
        ("rax", 0x1122334455667788u64),
        ("r15", 0xdeadbeef),
        ("rdi", 0),
    ] {
        debugger.write_register(name, value).expect(name);
        assert_eq!(debugger.read_register(name).expect(name), value, "register {}", name);
    }
}

#[test]
fn test_register_dump_contains_all_names() {
    let debugger = spawn_target();
    let all = debugger.read_all_registers().expect("dump failed");
    assert_eq!(all.len(), 27);
    assert!(all.iter().any(|(name, _)| *name == "rip"));
    assert!(all.iter().any(|(name, _)| *name == "orig_rax"));
}

#[test]
fn test_pc_round_trip() {
    let debugger = spawn_target();

    let pc = debugger.get_pc().expect("get_pc failed");
    debugger.set_pc(pc).expect("set_pc failed");
    assert_eq!(debugger.get_pc().expect("get_pc failed"), pc);
}

#[test]
fn test_memory_round_trip() {
    let debugger = spawn_target();

    // スタック上のワードは書き込み可能
    let rsp = debugger.read_register("rsp").expect("rsp read failed");
    let value = 0x0123456789abcdefu64;
    debugger.write_memory(rsp, value).expect("memory write failed");
    assert_eq!(debugger.read_memory(rsp).expect("memory read failed"), value);
}

#[test]
fn test_breakpoint_patches_and_restores_trap_byte() {
    let mut debugger = spawn_target();

    let pc = debugger.get_pc().expect("get_pc failed");
    let original = debugger.read_memory(pc).expect("read failed");

    debugger.set_breakpoint(pc).expect("set failed");
    let patched = debugger.read_memory(pc).expect("read failed");
    assert_eq!(patched & 0xff, 0xcc, "trap byte should be installed");
    assert_eq!(patched & !0xff, original & !0xff, "upper bytes must be untouched");

    // 同じアドレスへの二重設定は拒否され、状態は変わらない
    assert!(debugger.set_breakpoint(pc).is_err());
    assert_eq!(debugger.read_memory(pc).expect("read failed"), patched);

    debugger.remove_breakpoint(pc).expect("remove failed");
    assert_eq!(
        debugger.read_memory(pc).expect("read failed"),
        original,
        "original byte must be restored exactly"
    );
}

#[test]
fn test_breakpoint_restores_trap_encoding_itself() {
    // 元のバイトがトラップ命令そのもの（0xCC）でも正しく復元される
    let mut debugger = spawn_target();

    let rsp = debugger.read_register("rsp").expect("rsp read failed");
    debugger.write_memory(rsp, 0xcc).expect("write failed");

    debugger.set_breakpoint(rsp).expect("set failed");
    debugger.remove_breakpoint(rsp).expect("remove failed");
    assert_eq!(debugger.read_memory(rsp).expect("read failed"), 0xcc);
}

#[test]
fn test_breakpoint_listing() {
    let mut debugger = spawn_target();

    assert!(debugger.breakpoints().is_empty());

    let pc = debugger.get_pc().expect("get_pc failed");
    debugger.set_breakpoint(pc).expect("set failed");
    debugger.set_breakpoint(pc + 8).expect("set failed");
    assert_eq!(debugger.breakpoints(), vec![pc, pc + 8]);

    debugger.remove_breakpoint(pc + 8).expect("remove failed");
    assert_eq!(debugger.breakpoints(), vec![pc]);

    // 存在しないブレークポイントの削除はエラー
    assert!(debugger.remove_breakpoint(0x1234).is_err());
}

#[test]
fn test_breakpoint_hit_reports_trap_address() {
    let mut debugger = spawn_target();

    let entry = debugger.get_pc().expect("get_pc failed");
    debugger.set_breakpoint(entry).expect("set failed");

    // トラップ命令は1バイトなので、ヒット直後のPCはentry + 1を指す
    let reason = debugger.continue_and_wait().expect("continue failed");
    assert_eq!(reason, StopReason::Breakpoint);
    assert_eq!(debugger.get_pc().expect("get_pc failed"), entry + 1);
}

#[test]
fn test_step_over_passes_breakpoint_and_keeps_it_active() {
    let mut debugger = spawn_target();

    let entry = debugger.get_pc().expect("get_pc failed");
    debugger.set_breakpoint(entry).expect("set failed");
    debugger.continue_and_wait().expect("continue failed");

    // ステップオーバー: 元の命令を1つ実行し、トラップを通過する
    let reason = debugger.step().expect("step failed");
    assert!(
        matches!(reason, StopReason::Step | StopReason::Breakpoint),
        "unexpected stop: {:?}",
        reason
    );

    let pc = debugger.get_pc().expect("get_pc failed");
    assert_ne!(pc, entry, "must have progressed past the trap address");
    assert_ne!(pc, entry + 1, "must not be stuck after the trap byte");

    // ブレークポイントは再有効化されたまま残っている
    let word = debugger.read_memory(entry).expect("read failed");
    assert_eq!(word & 0xff, 0xcc);
}

#[test]
fn test_continue_after_hit_runs_to_exit() {
    let mut debugger = spawn_target();

    let entry = debugger.get_pc().expect("get_pc failed");
    debugger.set_breakpoint(entry).expect("set failed");

    let reason = debugger.continue_and_wait().expect("continue failed");
    assert_eq!(reason, StopReason::Breakpoint);

    // 2回目のcontinueはステップオーバーしてから再開する
    let reason = debugger.continue_and_wait().expect("continue failed");
    assert_eq!(reason, StopReason::Exited(0));
}

#[test]
fn test_invalid_register_is_an_error() {
    let debugger = spawn_target();

    assert!(debugger.read_register("bogusname").is_err());
    assert!(debugger.write_register("bogusname", 1).is_err());
    let err = debugger.read_register("bogusname").unwrap_err();
    assert!(err.to_string().contains("unknown register"));
}

#[test]
fn test_unmapped_memory_read_is_an_error() {
    let debugger = spawn_target();

    // ページ0は決してマッピングされない
    let err = debugger.read_memory(0x8).unwrap_err();
    assert!(err.to_string().contains("not mapped"));
    assert!(debugger.write_memory(0x8, 0x42).is_err());
}

#[test]
fn test_commands_require_attached_target() {
    let mut debugger = Debugger::new();

    assert!(!debugger.is_attached());
    assert!(debugger.continue_and_wait().is_err());
    assert!(debugger.step().is_err());
    assert!(debugger.get_pc().is_err());
    assert!(debugger.read_register("rip").is_err());
    assert!(debugger.read_memory(0x400000).is_err());
    assert!(debugger.set_breakpoint(0x400000).is_err());
}
