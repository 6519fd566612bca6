use sea_orm::Database;
use sea_orm_migration::prelude::*;

const DEFAULT_DATABASE_URL: &str = "sqlite:./settlement.db?mode=rwc";

enum Action {
    Up,
    Down,
    Fresh,
    Status,
}

impl Action {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.unwrap_or("up") {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "fresh" => Some(Self::Fresh),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// `migration [up|down|fresh|status]` against `DATABASE_URL`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let arg = std::env::args().nth(1);
    let Some(action) = Action::parse(arg.as_deref()) else {
        eprintln!("usage: migration [up|down|fresh|status]");
        std::process::exit(2);
    };

    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::connect(&url).await?;

    let outcome = match action {
        Action::Up => migration::Migrator::up(&db, None).await,
        // Only the latest migration is rolled back.
        Action::Down => migration::Migrator::down(&db, Some(1)).await,
        Action::Fresh => migration::Migrator::fresh(&db).await,
        Action::Status => migration::Migrator::status(&db).await,
    };

    db.close().await?;
    outcome?;
    Ok(())
}
