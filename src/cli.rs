use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::selection::{DEFAULT_SELECTION, Timeouts};

#[derive(Parser)]
#[command(name = "xclipctl", about = "Read, write, and clear X11 selections")]
pub struct Cli {
    #[command(flatten)]
    pub timeouts: TimeoutArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct TimeoutArgs {
    /// How long to wait for a selection owner to answer a conversion
    #[arg(
        long,
        global = true,
        env = "XCLIPCTL_CONVERSION_TIMEOUT_MS",
        default_value_t = 5000
    )]
    pub conversion_timeout_ms: u64,

    /// How long to wait for the clipboard manager to accept a handoff
    #[arg(
        long,
        global = true,
        env = "XCLIPCTL_HANDOFF_TIMEOUT_MS",
        default_value_t = 10000
    )]
    pub handoff_timeout_ms: u64,
}

impl TimeoutArgs {
    pub fn to_timeouts(&self) -> Timeouts {
        Timeouts {
            conversion: Duration::from_millis(self.conversion_timeout_ms),
            handoff: Duration::from_millis(self.handoff_timeout_ms),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the text content of a selection
    Read {
        /// Selection to read (primary, secondary, clipboard)
        #[arg(long, short, default_value = DEFAULT_SELECTION)]
        selection: String,
    },

    /// Put text on the clipboard and hand it to the clipboard manager
    Write {
        /// Text to write; read from stdin when omitted
        text: Option<String>,
    },

    /// Release ownership of selections
    Clear {
        /// Selections to clear (default: clipboard)
        selections: Vec<String>,
    },

    /// List the formats the current owner of a selection offers
    Targets {
        /// Selection to query
        #[arg(long, short, default_value = DEFAULT_SELECTION)]
        selection: String,
    },
}
