//! Momiji CLI - コマンドラインインターフェース
//!
//! ネイティブプロセスデバッガ momiji のREPLインターフェース

use anyhow::Result;
use clap::{Parser, Subcommand};
use momiji_core::parse::parse_address;
use momiji_core::{Command, Debugger, StopReason};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Momiji - Native Process Debugger
#[derive(Parser)]
#[command(name = "momiji")]
#[command(version = "0.1.0")]
#[command(about = "Minimal breakpoint debugger for native Linux processes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: DebugCommand,
}

#[derive(Subcommand)]
enum DebugCommand {
    /// Launch and debug an executable
    Run {
        /// Path to the executable binary
        binary: String,

        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Attach to an existing process
    Attach {
        /// Process ID to attach to
        #[arg(short, long)]
        pid: i32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Momiji - Native Process Debugger");
    println!();

    let cli = Cli::parse();
    let mut debugger = init_debugger(cli.command)?;
    run_repl(&mut debugger)?;

    Ok(())
}

/// デバッガを初期化してプロセスを起動またはアタッチする
fn init_debugger(command: DebugCommand) -> Result<Debugger> {
    let mut debugger = Debugger::new();

    match command {
        DebugCommand::Run { binary, args } => {
            println!("Launching target: {}", binary);

            // プロセスを起動（ASLR無効、execve直後に停止）
            debugger.spawn(&binary, &args)?;
            println!("Process spawned and stopped at first instruction");
            if let Some(pid) = debugger.pid() {
                println!("Target pid: {}", pid);
            }
            if let Ok(base) = debugger.base_address() {
                println!("Target base address: 0x{:x}", base);
            }
            println!("Set breakpoints and use 'continue' to start execution");
            println!();
        }
        DebugCommand::Attach { pid } => {
            println!("Attaching to process: {}", pid);

            debugger.attach(pid)?;
            println!("Attached to process {}", pid);
            println!();
        }
    }

    Ok(debugger)
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(momiji) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                if let Err(e) = handle_command(debugger, line) {
                    eprintln!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

fn handle_command(debugger: &mut Debugger, line: &str) -> Result<()> {
    match Command::parse(line)? {
        Command::Help => print_help(),
        Command::Quit => handle_quit(),
        Command::Break(loc) => handle_break(debugger, &loc)?,
        Command::Delete(loc) => handle_delete(debugger, &loc)?,
        Command::Breakpoints => handle_breakpoints(debugger),
        Command::Continue => handle_continue(debugger)?,
        Command::Step => handle_step(debugger)?,
        Command::RegisterRead(name) => handle_register_read(debugger, &name)?,
        Command::RegisterWrite(name, value) => handle_register_write(debugger, &name, &value)?,
        Command::RegisterDump => handle_register_dump(debugger)?,
        Command::MemoryRead(addr) => handle_memory_read(debugger, &addr)?,
        Command::MemoryWrite(addr, value) => handle_memory_write(debugger, &addr, &value)?,
    }

    Ok(())
}

/// Quitコマンドを処理する
fn handle_quit() {
    println!("Goodbye!");
    std::process::exit(0);
}

/// Breakコマンドを処理する
fn handle_break(debugger: &mut Debugger, loc: &str) -> Result<()> {
    let addr = parse_address(loc)?;
    debugger.set_breakpoint(addr)?;
    println!("Breakpoint set at 0x{:x}", addr);
    Ok(())
}

/// Deleteコマンドを処理する
fn handle_delete(debugger: &mut Debugger, loc: &str) -> Result<()> {
    let addr = parse_address(loc)?;
    debugger.remove_breakpoint(addr)?;
    println!("Breakpoint removed from 0x{:x}", addr);
    Ok(())
}

/// Breakpointsコマンドを処理する
fn handle_breakpoints(debugger: &Debugger) {
    let breakpoints = debugger.breakpoints();
    if breakpoints.is_empty() {
        println!("No breakpoints set");
        return;
    }

    println!("Breakpoints:");
    for (i, addr) in breakpoints.iter().enumerate() {
        println!("  {}. 0x{:x}", i + 1, addr);
    }
}

/// Continueコマンドを処理する
fn handle_continue(debugger: &mut Debugger) -> Result<()> {
    println!("Continuing execution...");

    let stop_reason = debugger.continue_and_wait()?;
    report_stop(debugger, &stop_reason)?;
    Ok(())
}

/// Stepコマンドを処理する
fn handle_step(debugger: &mut Debugger) -> Result<()> {
    let stop_reason = debugger.step()?;

    match stop_reason {
        StopReason::Step | StopReason::Breakpoint => {
            let pc = debugger.get_pc()?;
            println!("Stepped, now at 0x{:x}", pc);
        }
        other => report_stop(debugger, &other)?,
    }
    Ok(())
}

/// 停止イベントを操作者に報告する
fn report_stop(debugger: &Debugger, stop_reason: &StopReason) -> Result<()> {
    match stop_reason {
        StopReason::Breakpoint => {
            println!();
            println!("Breakpoint hit!");

            let pc = debugger.get_pc()?;
            println!("Stopped at 0x{:x}", pc);
        }
        StopReason::Step => {
            let pc = debugger.get_pc()?;
            println!("Step completed, stopped at 0x{:x}", pc);
        }
        StopReason::Signal(signal) => {
            println!();
            println!("Received signal: {:?}", signal);
        }
        StopReason::Exited(code) => {
            println!();
            println!("Process exited with code {}", code);
        }
        StopReason::Other => {
            println!();
            println!("Process stopped (unknown reason)");
        }
    }
    Ok(())
}

/// Register readコマンドを処理する
fn handle_register_read(debugger: &Debugger, name: &str) -> Result<()> {
    let value = debugger.read_register(name)?;
    println!("Value of register {}: 0x{:x}", name, value);
    Ok(())
}

/// Register writeコマンドを処理する
fn handle_register_write(debugger: &Debugger, name: &str, value: &str) -> Result<()> {
    let value = parse_address(value)?;
    debugger.write_register(name, value)?;
    println!("Register {} set to 0x{:x}", name, value);
    Ok(())
}

/// Register dumpコマンドを処理する
fn handle_register_dump(debugger: &Debugger) -> Result<()> {
    for (name, value) in debugger.read_all_registers()? {
        println!("  {:<8} 0x{:016x}", name, value);
    }
    Ok(())
}

/// Memory readコマンドを処理する
fn handle_memory_read(debugger: &Debugger, addr: &str) -> Result<()> {
    let addr = parse_address(addr)?;
    let value = debugger.read_memory(addr)?;
    println!("Value in memory at 0x{:x}: 0x{:x}", addr, value);
    Ok(())
}

/// Memory writeコマンドを処理する
fn handle_memory_write(debugger: &Debugger, addr: &str, value: &str) -> Result<()> {
    let addr = parse_address(addr)?;
    let value = parse_address(value)?;
    debugger.write_memory(addr, value)?;
    println!("Memory at 0x{:x} set to 0x{:x}", addr, value);
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help                            - Show this help message");
    println!("  quit/exit/q                     - Exit the debugger");
    println!();
    println!("Execution control:");
    println!("  continue (c)                    - Continue execution until next stop");
    println!("  step (s)                        - Execute exactly one instruction");
    println!();
    println!("Breakpoints:");
    println!("  break <addr> (b)                - Set breakpoint at address");
    println!("  delete <addr> (d)               - Remove breakpoint at address");
    println!("  breakpoints                     - List breakpoints");
    println!();
    println!("Registers and memory:");
    println!("  register read <name>            - Print value of named register");
    println!("  register write <name> <value>   - Set named register");
    println!("  register dump                   - Print all registers");
    println!("  memory read <addr>              - Print word at address");
    println!("  memory write <addr> <value>     - Write word to address");
    println!();
    println!("Examples:");
    println!("  break 0x400000");
    println!("  register read rip");
    println!("  memory write 0x7fffffffe000 0x42");
}
