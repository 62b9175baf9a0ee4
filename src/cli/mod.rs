// SecureDB: CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, add, list, get, update, delete, clear, serve, feed.

mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::KeyBackend;

pub use commands::execute;

/// SecureDB: a local encrypted record store.
#[derive(Parser, Debug)]
#[command(name = "securedb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the database and key file.
    #[arg(long, global = true, env = "SECUREDB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Where the record key is kept.
    #[arg(long, global = true, value_enum, env = "SECUREDB_KEY_BACKEND", default_value_t = KeyBackend::File)]
    pub key_backend: KeyBackend,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, the encryption key and the database.
    Init,

    /// Encrypt and store a new record.
    Add {
        /// Record id. Integers are numeric ids; anything else is a string id.
        /// Defaults to a random UUID.
        #[arg(long)]
        id: Option<String>,

        /// The record payload as JSON (e.g. '{"v": 42}').
        #[arg(long)]
        payload: String,
    },

    /// Decrypt and print every record.
    List {
        /// Print the readable records and list the unreadable ones instead
        /// of failing.
        #[arg(long)]
        partial: bool,
    },

    /// Decrypt and print one record.
    Get { id: String },

    /// Replace a record's payload, creating the record if it is missing.
    Update {
        id: String,

        #[arg(long)]
        payload: String,
    },

    /// Delete a record. Deleting a missing record is not an error.
    Delete { id: String },

    /// Delete every record.
    Clear,

    /// Start the JSON-RPC gateway on a Unix domain socket.
    Serve {
        /// Socket path (default: $XDG_RUNTIME_DIR/securedb/securedb.sock).
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Run the live feed bridge.
    Feed {
        /// JSON document to re-randomize and broadcast (default: public/pieChart.json).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Seconds between updates (default: 5).
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Address to listen on (default: 127.0.0.1:8080).
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}
