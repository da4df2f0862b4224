use std::env;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transactional_outbox::SqlxOutboxStore;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
        eprintln!("DATABASE_URL not set");
        std::process::exit(1);
    });
    let pool = PgPool::connect(&db_url).await?;
    let store = SqlxOutboxStore::new(pool);

    match args[1].as_str() {
        "pending-stats" => {
            let (pending, age_seconds) = store.pending_stats().await?;
            println!("pending={pending} oldest_age_seconds={age_seconds}");
        }
        "replay-range" if args.len() == 4 => {
            let from = Uuid::parse_str(&args[2])?;
            let to = Uuid::parse_str(&args[3])?;
            let count = store.replay_range(from, to).await?;
            println!("requeued {count} events between {from} and {to}");
        }
        "requeue-cancelled" => {
            let count = store.requeue_cancelled().await?;
            println!("requeued {count} cancelled events");
        }
        "purge-sent" if args.len() == 3 => {
            let before: DateTime<Utc> = DateTime::parse_from_rfc3339(&args[2])?.with_timezone(&Utc);
            let count = store.purge_sent(before).await?;
            println!("purged {count} terminal events older than {before}");
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("outbox-admin <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  pending-stats                         count and age of non-terminal rows");
    eprintln!("  replay-range <from_uuid> <to_uuid>     requeue cancelled/failed rows in an id range");
    eprintln!("  requeue-cancelled                      requeue every cancelled row");
    eprintln!("  purge-sent <rfc3339_ts>                delete terminal rows older than ts");
    eprintln!();
    eprintln!("reads DATABASE_URL from the environment (.env is loaded if present)");
}
