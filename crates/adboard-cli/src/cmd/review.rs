use std::path::Path;

use clap::Subcommand;

use adboard_core::config::Config;
use adboard_core::review::ReviewQueue;
use adboard_core::store::Database;

#[derive(Subcommand)]
pub enum ReviewSubcommand {
    /// List one page of queued ads, oldest first
    List {
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Remove a reviewed entry from the queue
    Resolve { id: i64 },
}

pub fn run(config_path: &Path, subcommand: ReviewSubcommand, json: bool) -> anyhow::Result<()> {
    // The review table lives in the same database the server writes; a
    // missing config just means default paths.
    let config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let db = Database::open(&config.database_path).await?;
        let queue = ReviewQueue::new(db.clone(), config.settings.debug);

        let result = match subcommand {
            ReviewSubcommand::List { page } => list(&queue, page, json).await,
            ReviewSubcommand::Resolve { id } => resolve(&queue, id).await,
        };

        db.close().await;
        result
    })
}

async fn list(queue: &ReviewQueue, page: u32, json: bool) -> anyhow::Result<()> {
    let entries = queue.list(page).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("review queue is empty (page {page})");
    } else {
        for entry in entries {
            println!(
                "#{} [{}] {} — {}",
                entry.id, entry.submitted_at, entry.submitter, entry.message
            );
        }
    }
    Ok(())
}

async fn resolve(queue: &ReviewQueue, id: i64) -> anyhow::Result<()> {
    queue.resolve(id).await?;
    println!("resolved #{id}");
    Ok(())
}
