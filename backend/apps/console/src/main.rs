//! Operator Console Entry Point
//!
//! Drives a `SessionManager` from stdin. Uses `anyhow` for startup errors;
//! session errors are printed and the loop keeps going.
//!
//! Adapters are picked from the environment:
//! - `IDENTITY_TOOLKIT_API_KEY` set: REST identity provider, otherwise an in-memory demo directory
//! - `DATABASE_URL` set: PostgreSQL profile store, otherwise in-memory demo profiles

mod command;

use std::env;
use std::sync::Arc;

use platform::credential_store::CredentialStore;
use platform::identity_toolkit::{IdentityToolkitClient, ToolkitConfig};
use session::application::config::ENV_IDLE_TIMEOUT;
use session::infra::{
    InMemoryIdentityProvider, InMemoryProfileStore, ManualActivitySource, PgProfileStore,
    ToolkitIdentityProvider,
};
use session::{
    IdentityHandle, IdentityProvider, Profile, ProfileStatus, ProfileStore, SessionConfig,
    SessionEvent, SessionManager, SessionSnapshot, UserRole,
};
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::{Command, HELP};

const DEFAULT_CREDENTIALS_FILE: &str = ".session/credentials.json";

/// Accounts seeded in demo mode: (email, password, role, status)
const DEMO_ACCOUNTS: [(&str, &str, UserRole, ProfileStatus); 4] = [
    ("admin@example.com", "admin-pass", UserRole::SuperAdmin, ProfileStatus::Active),
    ("editor@example.com", "editor-pass", UserRole::Editor, ProfileStatus::Active),
    ("suspended@example.com", "suspended-pass", UserRole::Admin, ProfileStatus::Suspended),
    ("orphan@example.com", "orphan-pass", UserRole::Viewer, ProfileStatus::Active),
];

type Seed = Vec<(IdentityHandle, Profile)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console=info,session=info,platform=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if cfg!(debug_assertions) && env::var(ENV_IDLE_TIMEOUT).is_err() {
        SessionConfig::development()
    } else {
        SessionConfig::from_env()?
    };
    tracing::info!(
        idle_timeout_secs = config.idle_timeout.as_secs(),
        warning_window_secs = config.warning_window.as_secs(),
        check_interval_secs = config.check_interval.as_secs(),
        "Session configuration loaded"
    );

    match env::var("IDENTITY_TOOLKIT_API_KEY") {
        Ok(api_key) => {
            let mut toolkit = ToolkitConfig::new(api_key);
            if let Ok(host) = env::var("IDENTITY_TOOLKIT_ENDPOINT") {
                toolkit = toolkit.with_emulator(&host);
            }
            let credentials_file = env::var("SESSION_CREDENTIALS_FILE")
                .unwrap_or_else(|_| DEFAULT_CREDENTIALS_FILE.to_string());
            let provider = ToolkitIdentityProvider::new(IdentityToolkitClient::new(toolkit)?)
                .with_credential_store(CredentialStore::new(credentials_file));

            tracing::info!("Using Identity Toolkit provider");
            with_store(Arc::new(provider), Vec::new(), config).await
        }
        Err(_) => {
            let provider = InMemoryIdentityProvider::new();
            let seed = seed_demo_accounts(&provider);

            tracing::info!(accounts = DEMO_ACCOUNTS.len(), "Using in-memory demo directory");
            with_store(Arc::new(provider), seed, config).await
        }
    }
}

fn seed_demo_accounts(provider: &InMemoryIdentityProvider) -> Seed {
    DEMO_ACCOUNTS
        .iter()
        // the orphan account exists at the provider but has no admin profile
        .filter_map(|(email, secret, role, status)| {
            let handle = provider.add_account(email, secret);
            (*email != "orphan@example.com").then(|| {
                (
                    handle,
                    Profile::new(*role).with_status(*status).with_email(*email),
                )
            })
        })
        .collect()
}

async fn with_store<P>(provider: Arc<P>, seed: Seed, config: SessionConfig) -> anyhow::Result<()>
where
    P: IdentityProvider + Sync + 'static,
{
    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;

            tracing::info!("Connected to database");

            sqlx::migrate!("../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            let store = PgProfileStore::new(pool);
            for (handle, profile) in &seed {
                if let Err(e) = store.upsert_profile(handle, profile).await {
                    tracing::warn!(identity = %handle, error = %e, "Demo profile seeding failed");
                }
            }
            run(provider, Arc::new(store), config).await
        }
        Err(_) => {
            if seed.is_empty() {
                tracing::warn!("No DATABASE_URL and no demo profiles, every sign-in will be refused");
            }
            let store = InMemoryProfileStore::new();
            for (handle, profile) in seed {
                store.insert(handle, profile);
            }
            run(provider, Arc::new(store), config).await
        }
    }
}

async fn run<P, S>(provider: Arc<P>, store: Arc<S>, config: SessionConfig) -> anyhow::Result<()>
where
    P: IdentityProvider + Sync + 'static,
    S: ProfileStore + Sync + 'static,
{
    let activity = ManualActivitySource::new();
    let manager = SessionManager::new(provider, store, activity.clone(), config);
    manager.subscribe(print_transition);

    manager.initialize().await;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(&manager, &activity, command).await,
            Err(message) => println!("{message}"),
        }
    }

    manager.shutdown();
    tracing::info!("Console closed");
    Ok(())
}

async fn execute<P, S>(
    manager: &SessionManager<P, S, ManualActivitySource>,
    activity: &ManualActivitySource,
    command: Command,
) where
    P: IdentityProvider + Sync + 'static,
    S: ProfileStore + Sync + 'static,
{
    match command {
        Command::SignIn {
            email,
            password,
            remember,
        } => {
            if let Err(e) = manager.sign_in(&email, &password, remember).await {
                println!("sign-in failed: {e}");
                manager.clear_error();
            }
        }
        Command::Logout => manager.logout().await,
        Command::Extend => {
            if !manager.is_authenticated() {
                println!("not signed in");
            }
            manager.extend_session();
        }
        Command::Activity(kind) => {
            if !activity.fire(kind) {
                println!("not signed in");
            }
        }
        Command::Status => print_status(&manager.snapshot()),
        Command::Reset(email) => match manager.reset_password(&email).await {
            Ok(()) => println!("reset link sent to {email}"),
            Err(e) => println!("reset failed: {e}"),
        },
        Command::Passwd(secret) => match manager.change_password(&secret).await {
            Ok(()) => println!("password changed"),
            Err(e) => println!("password change failed: {e}"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_transition(event: &SessionEvent, snapshot: &SessionSnapshot) {
    match event {
        SessionEvent::WarningStarted => {
            println!("! session expires soon due to inactivity, type `extend` to stay signed in")
        }
        SessionEvent::Expired => {
            let reason = snapshot
                .error
                .as_ref()
                .map_or_else(String::new, |e| format!(": {e}"));
            println!("! signed out{reason}");
        }
        SessionEvent::SignedIn | SessionEvent::Restored => {
            let who = snapshot
                .identity
                .as_ref()
                .and_then(|identity| identity.email.as_deref())
                .unwrap_or("unknown");
            let role = snapshot
                .profile
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.role.to_string());
            println!("> {event:?}: {who} ({role})");
        }
        SessionEvent::SignInFailed | SessionEvent::ErrorCleared => {}
        _ => println!("> {event:?}: {}", snapshot.state),
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    println!("state: {}", snapshot.state);
    if let Some(identity) = &snapshot.identity {
        println!("identity: {}", identity.handle);
    }
    if let Some(idle) = snapshot.idle_for(Instant::now()) {
        println!("idle: {}s", idle.as_secs());
    }
    if let Some(profile) = &snapshot.profile {
        match serde_json::to_string_pretty(profile) {
            Ok(json) => println!("profile: {json}"),
            Err(e) => tracing::warn!(error = %e, "Failed to render profile"),
        }
    }
    if let Some(error) = &snapshot.error {
        println!("error: {error}");
    }
}
