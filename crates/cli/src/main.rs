//! # CLI — Interactive Record Store Shell
//!
//! A REPL-style shell for the record store, backed by a flat file image.
//! Reads commands from stdin, executes them against a mounted store, and
//! prints results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! APPEND file payload   Append the rest of the line as one record
//! READ file             Print every record of the file from a fresh cursor
//! TRUNCATE file         Logically empty the file (epoch bump)
//! SYNC                  Flush buffered records and persist the header
//! TOUCH seconds         Stamp the header timestamp (persisted at SYNC)
//! FILES                 List the file table with versions and settings
//! STATS                 Print active copy, generation, write position
//! EXIT / QUIT           Shut down (unsynced appends are discarded)
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! STORE_IMAGE       image file path                  (default: "store.img")
//! STORE_BLOCKS      image size in 512-byte blocks    (default: 4096)
//! STORE_FIRST_BLOCK first usable data block          (default: 8)
//! STORE_WIPE        start from a fresh header        (default: "false")
//! STORE_FILES       slots as name:priority:sync,...  (default: "log:200:0,data:100:0")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! store ready (image=store.img, blocks=4096, generation=0)
//! > APPEND 0 first entry
//! OK
//! > READ 0
//! first entry
//! (1 records)
//! > SYNC
//! OK generation=1
//! > EXIT
//! bye
//! ```

use anyhow::{bail, Context, Result};
use blockdev::FileBlockDevice;
use logstore::{FileSpec, Geometry, RecordCursor, Store};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, EnvFilter};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses `name:priority:sync` triples separated by commas.
fn parse_specs(raw: &str) -> Result<Vec<FileSpec>> {
    let mut specs = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let fields: Vec<&str> = part.trim().split(':').collect();
        if fields.len() != 3 {
            bail!("bad file spec {:?}; expected name:priority:sync", part);
        }
        let priority: u8 = fields[1]
            .parse()
            .with_context(|| format!("bad priority in {:?}", part))?;
        let sync = matches!(fields[2], "1" | "true");
        specs.push(FileSpec::new(fields[0], priority, sync));
    }
    Ok(specs)
}

/// Parses the file-index operand shared by several commands.
fn parse_file(arg: Option<&str>) -> Option<u8> {
    arg.and_then(|a| a.parse().ok())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let image = env_or("STORE_IMAGE", "store.img");
    let blocks: u32 = env_or("STORE_BLOCKS", "4096").parse().unwrap_or(4096);
    let first_block: u32 = env_or("STORE_FIRST_BLOCK", "8").parse().unwrap_or(8);
    let wipe: bool = env_or("STORE_WIPE", "false").parse().unwrap_or(false);
    let specs = parse_specs(&env_or("STORE_FILES", "log:200:0,data:100:0"))?;

    let dev = FileBlockDevice::create(&image, blocks)
        .with_context(|| format!("failed to open image {}", image))?;
    let mut store = Store::mount(dev, Geometry::new(first_block), &specs, wipe)?;

    println!(
        "store ready (image={}, blocks={}, generation={})",
        image,
        blocks,
        store.generation()
    );
    println!("Commands: APPEND file payload | READ file | TRUNCATE file");
    println!("          SYNC | TOUCH seconds | FILES | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "APPEND" => match parse_file(parts.next()) {
                    Some(file) => {
                        let payload: String = parts.collect::<Vec<&str>>().join(" ");
                        if payload.is_empty() {
                            println!("ERR usage: APPEND file payload");
                        } else {
                            match store.append(file, payload.as_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR append failed: {}", e),
                            }
                        }
                    }
                    None => println!("ERR usage: APPEND file payload"),
                },
                "READ" => match parse_file(parts.next()) {
                    Some(file) => {
                        let mut cursor = RecordCursor::start();
                        let mut count = 0usize;
                        loop {
                            match store.next_record(file, &mut cursor) {
                                Ok(Some(payload)) => {
                                    println!("{}", String::from_utf8_lossy(&payload));
                                    count += 1;
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    println!("ERR read failed: {}", e);
                                    break;
                                }
                            }
                        }
                        println!("({} records)", count);
                    }
                    None => println!("ERR usage: READ file"),
                },
                "TRUNCATE" => match parse_file(parts.next()) {
                    Some(file) => match store.truncate(file) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR truncate failed: {}", e),
                    },
                    None => println!("ERR usage: TRUNCATE file"),
                },
                "SYNC" => match store.sync() {
                    Ok(()) => println!("OK generation={}", store.generation()),
                    Err(e) => println!("ERR sync failed: {}", e),
                },
                "TOUCH" => match parts.next().and_then(|a| a.parse::<u32>().ok()) {
                    Some(seconds) => {
                        store.touch(seconds);
                        println!("OK");
                    }
                    None => println!("ERR usage: TOUCH seconds"),
                },
                "FILES" => {
                    for file in 0..store.file_count() as u8 {
                        match store.file_info(file) {
                            Ok(info) => println!(
                                "#{} {:12} version={} size={} start={} priority={} sync={}",
                                file,
                                if info.name.is_empty() {
                                    "-".to_string()
                                } else {
                                    info.name
                                },
                                info.version,
                                info.size,
                                info.start_block,
                                info.priority,
                                info.sync
                            ),
                            Err(e) => println!("ERR file info failed: {}", e),
                        }
                    }
                }
                "STATS" => {
                    let stats = store.stats();
                    println!(
                        "copy={} generation={} block={} offset={} timestamp={}",
                        stats.active_copy,
                        stats.generation,
                        stats.write_block,
                        stats.write_offset,
                        stats.timestamp
                    );
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => println!("ERR unknown command: {}", other),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
