use std::io::Stderr;
use std::sync::{LazyLock, Mutex};

pub mod display;
pub mod init;
pub mod message;

/// Shared handle to stderr, so that log lines and messages don't interleave.
pub static TERMINAL_STDERR: LazyLock<Mutex<Stderr>> =
    LazyLock::new(|| Mutex::new(std::io::stderr()));
