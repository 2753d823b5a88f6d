use std::io::IsTerminal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use v3ctl_client::StopOutcome;
use v3ctl_frame::{StateReport, StatsSnapshot};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PingOutput {
    pid: u32,
    response: &'static str,
    rtt_ms: f64,
}

#[derive(Serialize)]
struct StateOutput {
    pid: u32,
    state: StateReport,
    raw: u32,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    pid: u32,
    #[serde(flatten)]
    stats: &'a StatsSnapshot,
}

#[derive(Serialize)]
struct VersionOutput<'a> {
    pid: u32,
    version: &'a str,
}

#[derive(Serialize)]
struct AckOutput<'a> {
    pid: u32,
    command: &'a str,
    accepted: bool,
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_ping(pid: u32, rtt: Duration, format: OutputFormat) {
    let rtt_ms = millis(rtt);
    match format {
        OutputFormat::Json => print_json(&PingOutput {
            pid,
            response: "PONG",
            rtt_ms,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("PONG from core {pid} in {rtt_ms:.2}ms");
        }
        OutputFormat::Raw => println!("{rtt_ms:.2}"),
    }
}

pub fn print_state(pid: u32, report: StateReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StateOutput {
            pid,
            state: report,
            raw: raw_state(report),
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("core {pid}: {report}"),
        OutputFormat::Raw => println!("{}", report.label()),
    }
}

pub fn print_version(pid: u32, version: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&VersionOutput { pid, version }),
        OutputFormat::Table | OutputFormat::Pretty => println!("core {pid}: {version}"),
        OutputFormat::Raw => println!("{version}"),
    }
}

pub fn print_ack(pid: u32, command: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&AckOutput {
            pid,
            command,
            accepted: true,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("core {pid}: {command} accepted")
        }
        OutputFormat::Raw => println!("OK"),
    }
}

pub fn print_stats(pid: u32, stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StatsOutput { pid, stats }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in stats_rows(stats) {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Core {pid} statistics:");
            for (name, value) in stats_rows(stats) {
                println!("  {name:<18} {value}");
            }
        }
        OutputFormat::Raw => {
            for (name, value) in stats_rows(stats) {
                println!("{name}={value}");
            }
        }
    }
}

/// One-line description of a stop.
pub fn describe_stop(outcome: StopOutcome) -> String {
    match outcome {
        StopOutcome::NotRunning => "core is not running".to_string(),
        StopOutcome::Graceful(status) => format!("core stopped (graceful, {status})"),
        StopOutcome::Forced(Some(status)) => format!("core stopped (forced, {status})"),
        StopOutcome::Forced(None) => "core stopped (forced, not reaped)".to_string(),
    }
}

fn stats_rows(stats: &StatsSnapshot) -> Vec<(&'static str, String)> {
    vec![
        ("packets_sent", stats.packets_sent.to_string()),
        ("packets_recv", stats.packets_recv.to_string()),
        ("bytes_sent", stats.bytes_sent.to_string()),
        ("bytes_recv", stats.bytes_recv.to_string()),
        ("packets_dropped", stats.packets_dropped.to_string()),
        ("decrypt_failures", stats.decrypt_failures.to_string()),
        ("magic_failures", stats.magic_failures.to_string()),
        ("fec_groups_sent", stats.fec_groups_sent.to_string()),
        ("fec_groups_recv", stats.fec_groups_recv.to_string()),
        ("fec_recoveries", stats.fec_recoveries.to_string()),
        ("fec_failures", stats.fec_failures.to_string()),
        ("rtt_us", stats.rtt_us.to_string()),
        ("rtt_min_us", stats.rtt_min_us.to_string()),
        ("rtt_max_us", stats.rtt_max_us.to_string()),
        ("jitter_us", stats.jitter_us.to_string()),
        ("connect_time_sec", stats.connect_time_sec.to_string()),
        ("reconnect_count", stats.reconnect_count.to_string()),
        ("last_send_time", stats.last_send_time.to_string()),
        ("last_recv_time", stats.last_recv_time.to_string()),
    ]
}

fn raw_state(report: StateReport) -> u32 {
    match report {
        StateReport::Known(state) => state as u32,
        StateReport::Unrecognized(raw) => raw,
    }
}

fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// `HH:MM:SS` (UTC) prefix for console log lines.
pub fn clock() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}
