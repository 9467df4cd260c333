use bulwark::{Bulwark, BulwarkBuilder, LockDuration, RepositoryProvider};
use clap::Parser;
use tracing_subscriber::prelude::*;

/// Command line interface for administering account lockouts
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store to operate on: "memory", a SQLite URL ("sqlite://path/to/db") or a
    /// Redis URL ("redis://host:6379")
    #[arg(long, default_value = "memory")]
    store: String,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Show the lockout state of an account
    Status { identifier: String },
    /// Lock an account
    Lock {
        identifier: String,
        /// Note stored with the lock
        #[arg(long)]
        reason: Option<String>,
        /// Lock for this many seconds instead of until unlocked
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Remove the lock on an account, keeping its failed attempts
    Unlock { identifier: String },
    /// Clear the failed attempts of an account, keeping any lock
    Clear { identifier: String },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulwark=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("Bulwark v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let builder = BulwarkBuilder::new().with_config_from_env()?;

    match cli.store.as_str() {
        #[cfg(feature = "memory")]
        "memory" => run(builder.with_memory().build().await?, cli.command).await?,
        #[cfg(feature = "sqlite")]
        url if url.starts_with("sqlite:") => {
            run(builder.with_sqlite(url).await?.build().await?, cli.command).await?
        }
        #[cfg(feature = "redis")]
        url if url.starts_with("redis://") || url.starts_with("rediss://") => {
            run(builder.with_redis(url).await?.build().await?, cli.command).await?
        }
        other => return Err(format!("unsupported store: {other}").into()),
    }

    Ok(())
}

async fn run<R: RepositoryProvider>(
    bulwark: Bulwark<R>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Migrate => {
            println!("Running migrations...");
            bulwark.migrate().await?;
        }
        Commands::Status { identifier } => {
            let status = bulwark.get_lockout_status(&identifier).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Lock {
            identifier,
            reason,
            duration_secs,
        } => {
            let duration = duration_secs
                .map(LockDuration::from_secs)
                .transpose()?
                .unwrap_or(LockDuration::Indefinite);
            bulwark
                .lock_account_for(&identifier, duration, reason.as_deref())
                .await?;
            println!("Locked {identifier}");
        }
        Commands::Unlock { identifier } => {
            bulwark.unlock_account(&identifier).await?;
            println!("Unlocked {identifier}");
        }
        Commands::Clear { identifier } => {
            bulwark.clear_login_failures(&identifier).await?;
            println!("Cleared failed attempts for {identifier}");
        }
        // Handled before connecting to the store
        Commands::Version => {}
    }

    Ok(())
}
