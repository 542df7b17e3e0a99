use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use kvlink_frame::opcode::{opcode_name, status_name};
use kvlink_frame::Frame;
use serde::Serialize;

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

/// Who answered and how long it took.
pub struct ResponseContext<'a> {
    pub connection: &'a str,
    pub server: &'a str,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    opcode: u8,
    opcode_name: &'a str,
    status: u16,
    status_name: &'a str,
    opaque: u32,
    cas: u64,
    extras: String,
    key: String,
    data_size: usize,
    data: String,
    connection: &'a str,
    server: &'a str,
    elapsed_us: u128,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, ctx: &ResponseContext<'_>, format: OutputFormat) {
    let header = frame.header();
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                opcode: header.opcode,
                opcode_name: opcode_name(header.opcode),
                status: header.status,
                status_name: status_name(header.status),
                opaque: header.opaque,
                cas: header.cas,
                extras: hex(frame.extras()),
                key: preview(frame.key()),
                data_size: frame.data().len(),
                data: preview(frame.data()),
                connection: ctx.connection,
                server: ctx.server,
                elapsed_us: ctx.elapsed.as_micros(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPCODE", "STATUS", "CAS", "EXTRAS", "SIZE", "DATA", "TIME"])
                .add_row(vec![
                    opcode_name(header.opcode).to_string(),
                    status_name(header.status).to_string(),
                    header.cas.to_string(),
                    hex(frame.extras()),
                    frame.data().len().to_string(),
                    preview(frame.data()),
                    format!("{:.2?}", ctx.elapsed),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} status={} ({:#06x}) opaque={} cas={} extras=[{}] size={} conn={} server={} time={:.2?} data={}",
                opcode_name(header.opcode),
                status_name(header.status),
                header.status,
                header.opaque,
                header.cas,
                hex(frame.extras()),
                frame.data().len(),
                ctx.connection,
                ctx.server,
                ctx.elapsed,
                preview(frame.data())
            );
        }
        OutputFormat::Raw => print_raw(frame.data()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn preview(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", bytes.len()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
