//! # Sovereign Client
//!
//! Command-line access to a Sovereign server, and the funnel as an
//! interactive terminal session.
//!
//! ```bash
//! sovereign-client --url http://localhost:8080 stats
//! sovereign-client contact --alias Ada --contact ada@example.com
//! sovereign-client funnel
//! ```
//!
//! The funnel remembers the visitor's status and name in a small JSON file
//! (`--session-file`), so a returning visitor is greeted as such.

use clap::{Parser, Subcommand};
use serde_json::json;
use sovereign_client::{DriverError, FunnelDriver, SovereignClient};
use sovereign_core::primitives::{ATTEST_HOLD, MAX_REFERRALS};
use sovereign_core::{
    ContactForm, EntryView, FileSessionStore, Funnel, FunnelError, Peer, SessionStore, Stage,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type BoxError = Box<dyn std::error::Error>;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Sovereign client - talk to the intake server, or walk the funnel
#[derive(Parser, Debug)]
#[command(name = "sovereign-client")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server URL, including any route prefix
    #[arg(short = 'u', long, global = true, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer key sent with every request
    #[arg(short = 'k', long, global = true)]
    api_key: Option<String>,

    /// Where the funnel remembers status and name
    #[arg(short = 's', long, global = true, default_value = "sovereign-session.json")]
    session_file: PathBuf,

    /// Request timeout in seconds
    #[arg(short = 't', long, global = true, default_value = "10")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the server is up
    Health,

    /// Show the member count
    Stats,

    /// Add one member to the count
    Increment,

    /// Submit a contact record directly
    Contact {
        /// Name or alias
        #[arg(long)]
        alias: String,

        /// Email or other contact channel
        #[arg(long)]
        contact: String,

        /// Why the applicant is here
        #[arg(long)]
        intent: Option<String>,

        /// Who sent them
        #[arg(long)]
        referrer: Option<String>,
    },

    /// Show the remembered funnel status
    Status,

    /// Forget the remembered funnel status and name
    Reset,

    /// Walk the funnel interactively
    Funnel,
}

// =============================================================================
// ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Logs go to stderr; stdout is the conversation.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sovereign_client=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = SovereignClient::new(
        cli.url.as_str(),
        cli.api_key.clone(),
        Duration::from_secs(cli.timeout_secs.max(1)),
    )?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Stats => println!("{}", client.stats_or_fallback().await),
        Commands::Increment => println!("{}", client.increment_or_fallback().await),
        Commands::Contact {
            alias,
            contact,
            intent,
            referrer,
        } => {
            let mut payload = json!({ "alias": alias, "contact": contact });
            if let Some(intent) = intent {
                payload["intent"] = json!(intent);
            }
            if let Some(referrer) = referrer {
                payload["referrer"] = json!(referrer);
            }
            let id = client.submit_contact(&payload).await?;
            println!("{id}");
        }
        Commands::Status => {
            let funnel = Funnel::new(FileSessionStore::new(&cli.session_file))?;
            match funnel.entry_view() {
                EntryView::FirstVisit => println!("No status recorded."),
                EntryView::Returning { status, name } => println!("{name}: {status}"),
            }
        }
        Commands::Reset => {
            let mut funnel = Funnel::new(FileSessionStore::new(&cli.session_file))?;
            funnel.reset()?;
            println!("Session cleared.");
        }
        Commands::Funnel => {
            let funnel = Funnel::new(FileSessionStore::new(&cli.session_file))?;
            run_funnel(FunnelDriver::new(client, funnel)).await?;
        }
    }

    Ok(())
}

// =============================================================================
// INTERACTIVE FUNNEL
// =============================================================================

/// Line-oriented input. `None` means stdin closed.
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, label: &str) -> Result<Option<String>, BoxError> {
        print!("{label}");
        std::io::stdout().flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }
}

async fn run_funnel<S: SessionStore>(
    mut driver: FunnelDriver<SovereignClient, S>,
) -> Result<(), BoxError> {
    let mut prompt = Prompt::new();

    loop {
        let stage = driver.funnel().stage();
        if let Some(step) = stage.step().filter(|s| *s > 0) {
            println!();
            println!("== {} ({}/4) ==", stage.name(), step);
        }

        let keep_going = match stage {
            Stage::Entry => entry(&mut driver, &mut prompt).await?,
            Stage::Protocol => protocol(&mut driver, &mut prompt).await?,
            Stage::Contact => contact(&mut driver, &mut prompt).await?,
            Stage::Bond => bond(&mut driver, &mut prompt).await?,
            Stage::Referral => referral(&mut driver, &mut prompt).await?,
            Stage::Login => {
                println!("Member access is not open yet.");
                prompt.ask("[enter] back ").await?;
                driver.funnel_mut().back()?;
                true
            }
            Stage::Colophon => {
                println!("Third/Sovereign. Built by its members, for its members.");
                prompt.ask("[enter] back ").await?;
                driver.funnel_mut().back()?;
                true
            }
        };

        if !keep_going {
            return Ok(());
        }
    }
}

async fn entry<S: SessionStore>(
    driver: &mut FunnelDriver<SovereignClient, S>,
    prompt: &mut Prompt,
) -> Result<bool, BoxError> {
    let count = driver.entry_count().await;
    println!();
    match driver.funnel().entry_view() {
        EntryView::FirstVisit => println!("{count} sovereigns have taken the oath."),
        EntryView::Returning { status, name } => {
            println!("Welcome back, {name}. Status: {status}. {count} sovereigns.")
        }
    }

    let Some(choice) = prompt
        .ask("[enter] begin  [l] login  [c] colophon  [r] reset  [q] quit > ")
        .await?
    else {
        return Ok(false);
    };
    let funnel = driver.funnel_mut();
    match choice.as_str() {
        "" => funnel.begin().map(|_| ())?,
        "l" => funnel.open_login().map(|_| ())?,
        "c" => funnel.open_colophon().map(|_| ())?,
        "r" => {
            funnel.reset()?;
            println!("Session cleared.");
        }
        "q" => return Ok(false),
        other => println!("Unknown choice '{other}'."),
    }
    Ok(true)
}

async fn protocol<S: SessionStore>(
    driver: &mut FunnelDriver<SovereignClient, S>,
    prompt: &mut Prompt,
) -> Result<bool, BoxError> {
    println!("Read the protocol. To attest, hold the seal for {}s.", ATTEST_HOLD.as_secs());
    if prompt.ask("[enter] press the seal ").await?.is_none() {
        return Ok(false);
    }
    let pressed = Instant::now();
    if prompt.ask("holding... [enter] release ").await?.is_none() {
        return Ok(false);
    }

    match driver.funnel_mut().attest(pressed.elapsed()) {
        Ok(_) => println!("Attested."),
        Err(e @ FunnelError::AttestationIncomplete { .. }) => println!("{e}. Try again."),
        Err(e) => return Err(e.into()),
    }
    Ok(true)
}

async fn contact<S: SessionStore>(
    driver: &mut FunnelDriver<SovereignClient, S>,
    prompt: &mut Prompt,
) -> Result<bool, BoxError> {
    let Some(form) = read_dossier(prompt).await? else {
        return Ok(false);
    };

    match driver.submit_contact(&form).await {
        Ok(_) => println!("Dossier received."),
        Err(DriverError::Funnel(FunnelError::InvalidForm(errors))) => {
            for field in errors.fields() {
                println!("  {field}: {}", errors.get(field).unwrap_or_default());
            }
        }
        Err(DriverError::Api(e)) => {
            println!("Transmission failed: {e}");
            if prompt.ask("[enter] try again  [q] quit > ").await?.as_deref() != Some("") {
                return Ok(false);
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(true)
}

async fn read_dossier(prompt: &mut Prompt) -> Result<Option<ContactForm>, BoxError> {
    let mut form = ContactForm::default();
    let fields: [(&str, &mut String); 11] = [
        ("Designation", &mut form.designation),
        ("Email", &mut form.email),
        ("City", &mut form.city),
        ("Domain", &mut form.domain),
        ("Blood type", &mut form.blood_type),
        ("Mandate", &mut form.mandate),
        ("Digital shadow (optional)", &mut form.digital_shadow),
        ("Influence name", &mut form.influence_name),
        ("Influence type", &mut form.influence_type),
        ("Burden", &mut form.burden),
        ("Labor (optional)", &mut form.labor),
    ];
    for (label, slot) in fields {
        match prompt.ask(&format!("{label}: ")).await? {
            Some(value) => *slot = value,
            None => return Ok(None),
        }
    }
    match prompt.ask("I take the pledge [y/N]: ").await? {
        Some(answer) => form.pledge = answer.eq_ignore_ascii_case("y"),
        None => return Ok(None),
    }
    Ok(Some(form))
}

async fn bond<S: SessionStore>(
    driver: &mut FunnelDriver<SovereignClient, S>,
    prompt: &mut Prompt,
) -> Result<bool, BoxError> {
    println!("Post the bond to seal your membership.");
    let Some(name) = prompt.ask("Name on the bond (blank for Initiate): ").await? else {
        return Ok(false);
    };
    let outcome = driver.post_bond(&name).await?;
    println!("Bond posted. You are one of {}.", outcome.count);
    Ok(true)
}

async fn referral<S: SessionStore>(
    driver: &mut FunnelDriver<SovereignClient, S>,
    prompt: &mut Prompt,
) -> Result<bool, BoxError> {
    println!("Name up to {MAX_REFERRALS} peers. Leave the name blank to finish.");
    let mut peers = Vec::new();
    while peers.len() < MAX_REFERRALS {
        let Some(name) = prompt.ask("Peer name: ").await? else {
            return Ok(false);
        };
        if name.is_empty() {
            break;
        }
        let Some(email) = prompt.ask("Peer email: ").await? else {
            return Ok(false);
        };
        peers.push(Peer { name, email });
    }

    let accepted = driver.submit_referral(&peers)?;
    println!("Dossier complete. {} referrals recorded.", accepted.len());
    Ok(true)
}
