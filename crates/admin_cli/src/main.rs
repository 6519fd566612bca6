use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{Engine, MoneyCents, Wallet};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "settlement_admin")]
#[command(about = "Operator utilities for the settlement engine (wallets, notifications)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./settlement.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Wallet(WalletArgs),
    Notifications(NotificationsArgs),
}

#[derive(Args, Debug)]
struct WalletArgs {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    /// Credit a user wallet, creating it if needed.
    Fund(FundArgs),
    /// Print a user wallet.
    Show(ShowArgs),
    /// Print the platform wallet.
    System,
}

#[derive(Args, Debug)]
struct FundArgs {
    #[arg(long)]
    owner: String,
    /// Decimal amount, e.g. `100` or `12.50`.
    #[arg(long)]
    amount: MoneyCents,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(long)]
    owner: String,
}

#[derive(Args, Debug)]
struct NotificationsArgs {
    #[command(subcommand)]
    command: NotificationsCommand,
}

#[derive(Subcommand, Debug)]
enum NotificationsCommand {
    /// Print the latest notifications, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_wallet(wallet: &Wallet) {
    println!(
        "{} ({}): {} (updated {})",
        wallet.owner_id,
        wallet.kind.as_str(),
        MoneyCents::new(wallet.balance_minor),
        wallet.updated_at.to_rfc3339()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Wallet(WalletArgs {
            command: WalletCommand::Fund(args),
        }) => {
            if !args.amount.is_positive() {
                eprintln!("amount must be positive: {}", args.amount);
                std::process::exit(2);
            }
            let wallet = engine
                .fund_wallet(&args.owner, args.amount.cents(), Utc::now())
                .await?;
            print_wallet(&wallet);
        }
        Command::Wallet(WalletArgs {
            command: WalletCommand::Show(args),
        }) => {
            let wallet = engine.wallet(&args.owner).await?;
            print_wallet(&wallet);
        }
        Command::Wallet(WalletArgs {
            command: WalletCommand::System,
        }) => {
            let wallet = engine.system_wallet().await?;
            print_wallet(&wallet);
        }
        Command::Notifications(NotificationsArgs {
            command: NotificationsCommand::List { limit },
        }) => {
            for n in engine.list_notifications(limit).await? {
                println!(
                    "{} [{}] {} ({})",
                    n.created_at.to_rfc3339(),
                    n.event_type.as_str(),
                    n.message,
                    n.reference_id
                );
            }
        }
    }

    engine.close().await?;
    Ok(())
}
