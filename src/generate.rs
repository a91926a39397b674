//! Synthetic log-style test data
//!
//! Produces files shaped like an application log export: a header plus one
//! row per event with a timestamp, a few categorical columns, and a message
//! whose length varies over three orders of magnitude.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::DateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const HEADER: [&str; 8] = [
    "ID", "Time", "Flags", "Host", "Process", "Thread", "Levels", "Message",
];

const BASE_TIME_MS: i64 = 1_756_842_237_000;
const HOSTS: [&str; 4] = [
    "localhost",
    "70.28.126.222",
    "84.140.123.208",
    "214.61.226.212",
];
const PROCESSES: [&str; 3] = ["Database", "Server", "Telemetry"];
const LEVELS: [&str; 6] = ["Call", "Debug", "Info", "Warning", "Error", "Fatal"];

fn message(rng: &mut StdRng) -> String {
    let len = 1usize << rng.random_range(0..10);
    (0..len)
        .map(|_| (b'0' + rng.random_range(0..0x4E)) as char)
        .collect()
}

/// Write a header and `rows` data rows to `out`
pub fn write_log_rows<W: Write>(out: W, rows: u64, seed: u64) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(out);
    writer.write_record(HEADER)?;

    let mut rng = StdRng::seed_from_u64(seed);
    for id in 0..rows {
        let millis = BASE_TIME_MS + rng.random_range(0..1i64 << 31);
        let time = DateTime::from_timestamp_millis(millis)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_default();

        let mut flags = String::new();
        if rng.random_bool(0.5) {
            flags.push_str("Pool ");
        }
        if rng.random_bool(0.5) {
            flags.push_str("Async ");
        }

        let host = HOSTS[rng.random_range(0..HOSTS.len())];
        let process = PROCESSES[rng.random_range(0..PROCESSES.len())];
        let thread = format!("0x{:x}", rng.random::<u32>() >> 1);
        let level = LEVELS[rng.random_range(0..LEVELS.len())];

        writer.write_record([
            id.to_string().as_str(),
            &time,
            &flags,
            host,
            process,
            &thread,
            level,
            &message(&mut rng),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a test file to `path`
pub fn generate(path: &Path, rows: u64, seed: u64) -> io::Result<()> {
    let out = BufWriter::new(File::create(path)?);
    write_log_rows(out, rows, seed)?;
    tracing::info!("Wrote {} rows to {}", rows, path.display());
    Ok(())
}
