//! Centralized configuration (environment variables + defaults).
//!
//! Binaries call these after `dotenv::dotenv().ok()`. Library components never
//! read the environment themselves; they take the resolved values as arguments.

use anyhow::Context;
use std::time::Duration;

/// Relays used when `NOSTR_RELAYS` is unset.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://relay.snort.social",
    "wss://nostr.build",
    "wss://nostr.wine",
    "wss://nostr.mom",
    "wss://nostr.guru",
    "wss://nostr.zebedee.cloud",
    "wss://nostr.mutiny.nz",
    "wss://nostr.openchain.fr",
    "wss://nostr.nostr.build",
    "wss://nostr.nostr.land",
    "wss://nostr.nostr.re",
];

pub const DEFAULT_CHARACTER: &str = "Dog";

/// Which ledger persistence backend the API server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

/// Timeouts applied to every network step.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub signer: Duration,
    pub relay_connect: Duration,
    pub profile: Duration,
    pub ledger: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            signer: Duration::from_millis(10_000),
            relay_connect: Duration::from_millis(5_000),
            profile: Duration::from_millis(5_000),
            ledger: Duration::from_millis(5_000),
        }
    }
}

/// Database URL. Required when the postgres backend is selected.
pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL must be set")
}

pub fn ledger_backend() -> anyhow::Result<LedgerBackend> {
    let raw = std::env::var("LEDGER_BACKEND").unwrap_or_else(|_| "postgres".to_string());
    parse_ledger_backend(&raw)
}

fn parse_ledger_backend(raw: &str) -> anyhow::Result<LedgerBackend> {
    match raw.trim().to_lowercase().as_str() {
        "postgres" | "pg" => Ok(LedgerBackend::Postgres),
        "memory" | "mem" => Ok(LedgerBackend::Memory),
        other => Err(anyhow::anyhow!(
            "LEDGER_BACKEND must be 'postgres' or 'memory' (got '{}')",
            other
        )),
    }
}

pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

pub fn api_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
}

/// Relay endpoints, comma separated in `NOSTR_RELAYS`.
pub fn relay_urls() -> Vec<String> {
    match std::env::var("NOSTR_RELAYS") {
        Ok(v) => parse_relay_list(&v),
        Err(_) => DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
    }
}

fn parse_relay_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Public key (hex or npub) the `login` binary's static signer hands out.
pub fn nostr_pubkey() -> Option<String> {
    std::env::var("NOSTR_PUBKEY").ok().filter(|s| !s.trim().is_empty())
}

pub fn default_character() -> String {
    std::env::var("DEFAULT_CHARACTER").unwrap_or_else(|_| DEFAULT_CHARACTER.to_string())
}

pub fn timeouts() -> Timeouts {
    let defaults = Timeouts::default();
    Timeouts {
        signer: millis_var("SIGNER_TIMEOUT_MS").unwrap_or(defaults.signer),
        relay_connect: millis_var("RELAY_TIMEOUT_MS").unwrap_or(defaults.relay_connect),
        profile: millis_var("PROFILE_TIMEOUT_MS").unwrap_or(defaults.profile),
        ledger: millis_var("LEDGER_TIMEOUT_MS").unwrap_or(defaults.ledger),
    }
}

fn millis_var(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(|ms| Duration::from_millis(ms.max(1)))
}
