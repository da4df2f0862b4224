use std::env;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use webhook_ingestor::DeadLetterStore;

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
    let store = DeadLetterStore::new(pool);

    match args[1].as_str() {
        "list-since" if args.len() == 3 => {
            let since: DateTime<Utc> = DateTime::parse_from_rfc3339(&args[2])?.with_timezone(&Utc);
            for record in store.list_since(since).await? {
                println!(
                    "{} source={} key={} attempts={} created_at={} reason={}",
                    record.id, record.source, record.idempotency_key, record.attempts, record.created_at, record.failure_reason
                );
            }
        }
        "delete" if args.len() == 3 => {
            let id = Uuid::parse_str(&args[2])?;
            store.delete(id).await?;
            println!("deleted {id}");
        }
        "purge-before" if args.len() == 3 => {
            let before: DateTime<Utc> = DateTime::parse_from_rfc3339(&args[2])?.with_timezone(&Utc);
            let count = store.purge_before(before).await?;
            println!("purged {count} dead letters older than {before}");
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("webhook-admin <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  list-since <rfc3339_ts>    list dead letters recorded since ts");
    eprintln!("  delete <uuid>              delete a dead letter once it's been manually resolved");
    eprintln!("  purge-before <rfc3339_ts>  delete dead letters older than ts");
    eprintln!();
    eprintln!("reads DATABASE_URL from the environment (.env is loaded if present)");
}
