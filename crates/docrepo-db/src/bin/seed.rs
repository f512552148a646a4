//! # Seed Data Generator
//!
//! Populates a `users` collection and walks one document through its
//! whole lifecycle.
//!
//! ## Usage
//! ```bash
//! # Seed 100 users into the configured store (default)
//! cargo run -p docrepo-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p docrepo-db --bin seed -- --count 1000
//!
//! # Specify database path (forces the SQLite backend)
//! cargo run -p docrepo-db --bin seed -- --db ./data/docrepo.db
//!
//! # Use an explicit config file
//! cargo run -p docrepo-db --bin seed -- --config ./docrepo.toml
//! ```
//!
//! `RUST_LOG` overrides the configured log filter.

use std::env;
use std::path::PathBuf;

use docrepo_core::{Document, DocumentId, Filter, Update};
use docrepo_db::{Backend, Collection, Database, MemoryStore, Repository, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Grace", "Alan", "Barbara", "Edsger", "Margaret", "Donald", "Frances", "Niklaus",
    "Radia",
];

const ROLES: &[&str] = &["admin", "editor", "viewer"];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_id")]
    id: DocumentId,
    name: String,
    role: String,
    #[serde(default)]
    logins: i64,
}

#[derive(Debug, Clone, Serialize)]
struct NewUser {
    name: String,
    role: String,
    logins: i64,
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    type Draft = NewUser;

    fn id(&self) -> &DocumentId {
        &self.id
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 100;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("docrepo Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of users to generate (default: 100)");
                println!("  -d, --db <PATH>      SQLite database file (forces sqlite backend)");
                println!("      --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = StoreConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.backend = Backend::Sqlite;
        config.database.path = path;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("🌱 docrepo Seed Data Generator");
    println!("==============================");
    println!("Backend:  {}", config.backend);
    if config.backend == Backend::Sqlite {
        println!("Database: {}", config.database.path.display());
    }
    println!("Users:    {}", count);
    println!();

    match config.backend {
        Backend::Sqlite => {
            if let Some(parent) = config.database.path.parent() {
                if !parent.as_os_str().is_empty() && !config.database.is_in_memory() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let db = Database::new(config.database.to_db_config()).await?;
            println!("✓ Connected to database");
            println!("✓ Migrations applied");

            seed(db.repository::<User>(), count).await?;
            db.close().await;
        }
        Backend::Memory => {
            let store = MemoryStore::new();
            seed(store.repository::<User>().await, count).await?;
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Seeds `count` users, then runs create → find → update → delete → miss.
async fn seed<C: Collection>(
    users: Repository<User, C>,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let existing = users.find(Filter::all()).await?;
    if !existing.is_empty() {
        println!("⚠ Collection already has {} users", existing.len());
        println!("  Skipping bulk seed to avoid duplicates.");
    } else {
        println!();
        println!("Generating users...");

        let start = std::time::Instant::now();
        let mut generated = 0;

        for n in 0..count {
            let draft = NewUser {
                name: format!("{} {}", FIRST_NAMES[n % FIRST_NAMES.len()], n),
                role: ROLES[n % ROLES.len()].to_string(),
                logins: (n % 7) as i64,
            };

            if let Err(e) = users.create(draft).await {
                eprintln!("Failed to insert user {}: {}", n, e);
                continue;
            }

            generated += 1;
            if generated % 50 == 0 {
                println!("  Generated {} users...", generated);
            }
        }

        let elapsed = start.elapsed();
        println!();
        println!("✓ Generated {} users in {:?}", generated, elapsed);
        println!(
            "  Rate: {:.0} users/second",
            generated as f64 / elapsed.as_secs_f64()
        );
    }

    let admins = users.find(Filter::new(json!({"role": "admin"}))).await?;
    println!("  Query role=admin: {} results", admins.len());

    println!();
    println!("Walking one document through its lifecycle...");

    let created = users
        .create(NewUser {
            name: "a".to_string(),
            role: "viewer".to_string(),
            logins: 0,
        })
        .await?;
    println!(
        "  create               → {} ({}, {})",
        created.id, created.name, created.role
    );

    let found = users.find_one(Filter::by_id(&created.id)).await?;
    println!("  find_one             → {} ({})", found.id, found.name);

    let updated = users
        .find_one_and_update(
            Filter::by_id(&created.id),
            Update::new(json!({"$set": {"name": "b"}, "$inc": {"logins": 1}})),
        )
        .await?;
    println!(
        "  find_one_and_update  → {} ({}, logins={})",
        updated.id, updated.name, updated.logins
    );

    let deleted = users.find_one_and_delete(Filter::by_id(&created.id)).await?;
    println!("  find_one_and_delete  → {} ({})", deleted.id, deleted.name);

    match users.find_one(Filter::by_id(&created.id)).await {
        Err(e) if e.is_not_found() => println!("  find_one             → {}", e),
        Err(e) => return Err(e.into()),
        Ok(user) => println!("  ⚠ {} still present after delete", user.id),
    }

    Ok(())
}
