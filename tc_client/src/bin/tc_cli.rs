// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use clap::{Parser, Subcommand};

use tc_client::{Client, ClientConfig, TcFile};

#[derive(Debug, Parser)]
struct Cli {
    #[arg(long, default_value = "localhost")]
    hostname: String,

    #[arg(long, default_value_t = 2049)]
    port: u16,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a range of bytes from one file.
    Read {
        path: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 4096)]
        length: usize,
    },
    /// Write bytes to one file, creating it first.
    Write {
        path: String,
        text: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// GETATTR one file.
    Getattr { path: String },
    /// List the names in one directory.
    Listdir { path: String },
    /// Create one directory.
    Mkdir {
        path: String,
        #[arg(long, default_value_t = 0o755)]
        mode: u32,
    },
    /// Remove one file or directory.
    Remove { path: String },
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let args = Cli::parse();
    eprintln!("{args:?}");

    let config = ClientConfig::new((args.hostname.as_str(), args.port))?;
    let client = Client::connect(config).map_err(std::io::Error::other)?;

    match args.command {
        Command::Read { path, offset, length } => {
            let results = client
                .readv(&[(TcFile { path }, offset, length)])
                .map_err(std::io::Error::other)?;
            let (status, data, eof) = &results[0];
            if status.okay {
                eprintln!("read {} bytes (eof={eof}): {:?}", data.len(), String::from_utf8_lossy(data));
            } else {
                eprintln!("read failed: errno {}", status.err_no);
            }
        }
        Command::Write { path, text, offset } => {
            let results = client
                .writev(&[(TcFile { path }, offset, text.into_bytes(), true)])
                .map_err(std::io::Error::other)?;
            eprintln!("write: okay={} errno={}", results[0].okay, results[0].err_no);
        }
        Command::Getattr { path } => {
            let results = client.getattrsv(&[TcFile { path }]).map_err(std::io::Error::other)?;
            let (status, attrs) = &results[0];
            if status.okay {
                eprintln!("{attrs:?}");
            } else {
                eprintln!("getattr failed: errno {}", status.err_no);
            }
        }
        Command::Listdir { path } => {
            let (status, names) = client.listdir(&TcFile { path }).map_err(std::io::Error::other)?;
            if status.okay {
                for name in names {
                    println!("{name}");
                }
            } else {
                eprintln!("listdir failed: errno {}", status.err_no);
            }
        }
        Command::Mkdir { path, mode } => {
            let results = client.mkdirv(&[(TcFile { path }, mode)]).map_err(std::io::Error::other)?;
            eprintln!("mkdir: okay={} errno={}", results[0].okay, results[0].err_no);
        }
        Command::Remove { path } => {
            let results = client.removev(&[TcFile { path }]).map_err(std::io::Error::other)?;
            eprintln!("remove: okay={} errno={}", results[0].okay, results[0].err_no);
        }
    }

    Ok(())
}
