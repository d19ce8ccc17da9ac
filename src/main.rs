mod cli;
mod selection;

use std::io::{Read, Write};

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let timeouts = cli.timeouts.to_timeouts();

    match cli.command {
        Command::Read { selection: name } => match selection::read(&name, &timeouts) {
            Ok(text) => print_raw(text.as_bytes()),
            Err(e) => fail("read", &e),
        },
        Command::Write { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                        fail("write", &e);
                    }
                    buf
                }
            };
            if let Err(e) = selection::write(&text, &timeouts) {
                fail("write", &e);
            }
        }
        Command::Clear { selections } => {
            if let Err(e) = selection::clear(&selections) {
                fail("clear", &e);
            }
        }
        Command::Targets { selection: name } => match selection::targets(&name, &timeouts) {
            Ok(names) => {
                let mut out = names.join("\n");
                if !out.is_empty() {
                    out.push('\n');
                }
                print_raw(out.as_bytes());
            }
            Err(e) => fail("targets", &e),
        },
    }
}

/// Write bytes to stdout exactly as given.
fn print_raw(bytes: &[u8]) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(bytes).and_then(|()| stdout.flush()) {
        fail("output", &e);
    }
}

fn fail(command: &str, error: &dyn std::fmt::Display) -> ! {
    tracing::error!(command, error = %error, "command failed");
    eprintln!("xclipctl {command}: {error}");
    std::process::exit(1);
}
