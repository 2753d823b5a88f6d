use std::io::{BufRead, IsTerminal, Write};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::debug;
use v3ctl_client::{ClientError, CoreSession, TickEvent};

use crate::cmd::ConsoleArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{clock, describe_stop, print_stats, OutputFormat};

/// One line typed at the console prompt.
#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    /// Start the core process.
    Start,
    /// Stop the core process (SHUTDOWN, then kill).
    Stop,
    /// Ask the core to bring its tunnel up.
    Connect,
    /// Ask the core to take its tunnel down.
    Disconnect,
    /// Check that the core answers.
    Ping,
    /// Show the core's statistics.
    Stats,
    /// Show the core's tunnel state.
    State,
    /// Show the core's version string.
    Version,
    /// Clear the console log.
    #[command(alias = "clear-log")]
    Clear,
    /// List commands.
    Help,
    /// Leave the console.
    #[command(alias = "exit")]
    Quit,
}

/// Events delivered to the control thread.
#[derive(Debug)]
enum Input {
    Line(String),
    Eof,
    Interrupt,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub fn run(args: ConsoleArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.to_config()?;
    let interval = config.poll_interval;
    let mut session = CoreSession::new(config);

    let (tx, rx) = mpsc::channel();
    install_ctrlc_handler(tx.clone())?;
    spawn_stdin_reader(tx);

    log("v3ctl console ready; type 'help' for commands");
    let mut next_tick = Instant::now() + interval;

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Input::Line(line)) => {
                if execute_line(&mut session, &line, format) == Flow::Quit {
                    break;
                }
            }
            Ok(Input::Eof) => {
                debug!("stdin closed");
                break;
            }
            Ok(Input::Interrupt) => {
                log("interrupted");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if Instant::now() >= next_tick {
            report_tick(session.tick());
            next_tick = Instant::now() + interval;
        }
    }

    if session.is_core_running() {
        if args.leave_running {
            if let Some(pid) = session.core_pid() {
                log(&format!("leaving core running (pid {pid})"));
            }
        } else {
            log("stopping core...");
            log(&describe_stop(session.stop_core()));
        }
    }
    Ok(SUCCESS)
}

fn execute_line(session: &mut CoreSession, line: &str, format: OutputFormat) -> Flow {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Flow::Continue;
    }
    match ConsoleLine::try_parse_from(words) {
        Ok(parsed) => execute(session, parsed.command, format),
        Err(_) => {
            log(&format!("unknown command: {}", line.trim()));
            Flow::Continue
        }
    }
}

fn execute(session: &mut CoreSession, command: ConsoleCommand, format: OutputFormat) -> Flow {
    match command {
        ConsoleCommand::Start => {
            log("starting core...");
            match session.start_core() {
                Ok(pid) => log(&format!("core started (pid {pid})")),
                Err(err) => report_failure("start", &err),
            }
        }
        ConsoleCommand::Stop => {
            if session.is_core_running() {
                log("stopping core...");
            }
            log(&describe_stop(session.stop_core()));
        }
        ConsoleCommand::Connect => {
            log("requesting connect...");
            match session.connect() {
                Ok(()) => log("connect command accepted"),
                Err(err) => report_failure("connect", &err),
            }
        }
        ConsoleCommand::Disconnect => {
            log("requesting disconnect...");
            match session.disconnect() {
                Ok(()) => log("disconnect command accepted"),
                Err(err) => report_failure("disconnect", &err),
            }
        }
        ConsoleCommand::Ping => {
            log("sending PING...");
            match session.ping() {
                Ok(rtt) => log(&format!(
                    "PONG received in {:.2}ms; core is responding",
                    rtt.as_secs_f64() * 1000.0
                )),
                Err(err) => report_failure("ping", &err),
            }
        }
        ConsoleCommand::Stats => match session.get_stats() {
            Ok(stats) => print_stats(session.core_pid().unwrap_or(0), &stats, format),
            Err(err) => report_failure("stats", &err),
        },
        ConsoleCommand::State => match session.poll_state() {
            Ok(report) => log(&format!("state: {report}")),
            Err(err) => report_failure("state", &err),
        },
        ConsoleCommand::Version => match session.get_version() {
            Ok(version) => log(&format!("core version: {version}")),
            Err(err) => report_failure("version", &err),
        },
        ConsoleCommand::Clear => clear_screen(),
        ConsoleCommand::Help => print_help(),
        ConsoleCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

fn report_tick(event: TickEvent) {
    match event {
        TickEvent::CoreExited(status) => log(&format!("core exited ({status})")),
        TickEvent::State {
            report,
            changed: true,
        } => log(&format!("state: {report}")),
        TickEvent::State { .. } | TickEvent::Idle => {}
    }
}

fn report_failure(action: &str, err: &ClientError) {
    if err.is_benign() {
        log(&err.to_string());
    } else {
        log(&format!("{action} failed: {err}"));
    }
}

fn print_help() {
    let mut out = String::from("commands:\n");
    for (name, about) in [
        ("start", "start the core process"),
        ("stop", "stop the core process (SHUTDOWN, then kill)"),
        ("connect", "ask the core to bring its tunnel up"),
        ("disconnect", "ask the core to take its tunnel down"),
        ("ping", "check that the core answers"),
        ("stats", "show statistics"),
        ("state", "show tunnel state"),
        ("version", "show the core version"),
        ("clear", "clear the console log"),
        ("quit", "leave the console"),
    ] {
        out.push_str(&format!("  {name:<11} {about}\n"));
    }
    print!("{out}");
    let _ = std::io::stdout().flush();
}

fn clear_screen() {
    let mut stdout = std::io::stdout();
    if stdout.is_terminal() {
        let _ = stdout.write_all(b"\x1b[2J\x1b[H");
        let _ = stdout.flush();
    }
}

fn log(message: &str) {
    println!("[{}] {message}", clock());
}

fn spawn_stdin_reader(tx: Sender<Input>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
        let _ = tx.send(Input::Eof);
    });
}

fn install_ctrlc_handler(tx: Sender<Input>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(Input::Interrupt);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
