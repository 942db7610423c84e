//! Headless login: resolves the configured key's profile, registers it with
//! the ledger API, then prints the user's notes as they arrive.

use std::sync::Arc;
use wildsats_ledger::app::{HttpOwnershipGateway, SessionEvent};
use wildsats_ledger::identity::{PublicKeySigner, StaticKeySigner};
use wildsats_ledger::infra::{config, logging};
use wildsats_ledger::{RelayPool, SessionCoordinator, SignerGateway};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin login -- [--pubkey <hex|npub>] [--buy <animal>]\n\
         \n\
         Env vars:\n\
           NOSTR_PUBKEY     key to log in with (unless --pubkey is given)\n\
           API_BASE_URL     ledger API (default http://127.0.0.1:3000)\n\
           NOSTR_RELAYS     comma-separated relay URLs\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let arg_value = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let timeouts = config::timeouts();
    let signer: Option<Arc<dyn PublicKeySigner>> = match arg_value("--pubkey").or_else(config::nostr_pubkey) {
        Some(key) => Some(Arc::new(StaticKeySigner::parse(&key)?)),
        None => None,
    };
    let relays = config::relay_urls();
    let ownership = HttpOwnershipGateway::new(&config::api_base_url(), timeouts.ledger)?;
    let pool = RelayPool::new(timeouts.relay_connect);

    let session = SessionCoordinator::new(
        SignerGateway::new(signer, timeouts.signer),
        Arc::new(ownership),
        pool.clone(),
        relays,
        timeouts,
    );
    let mut events = session.events();

    let identity = session.login().await?;
    println!("> Logged in as {}", identity.ledger_name());
    println!("  npub:   {}", identity.npub);
    if let Some(avatar) = &identity.profile.avatar_uri {
        println!("  avatar: {}", avatar);
    }

    if let Some(animal) = arg_value("--buy") {
        let outcome = session.purchase(&animal).await?;
        if outcome.added {
            println!("> Bought {}", animal);
        } else {
            println!("> {} already owned", animal);
        }
    }
    println!("> Owned animals: {}", session.owned_items().await?.join(", "));
    println!("> Waiting for notes (Ctrl+C to log out)...");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::LatestEvent(note)) => println!("[{}] {}", note.created_at, note.content),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "note stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.logout().await;
    pool.shutdown();
    println!("> Logged out.");
    Ok(())
}
