use crate::entities::{files, folders, suggestions};
use crate::utils::backoff::{exponential_delay, with_jitter};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::time::Duration;
use tracing::{info, warn};

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const CONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", redact_url(db_url));

    let db = connect_with_retry(db_url).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Connect with exponential backoff and jitter; gives up after
/// `CONNECT_ATTEMPTS` tries.
pub async fn connect_with_retry(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut attempt = 0;
    loop {
        match Database::connect(connect_options(db_url)).await {
            Ok(db) => return Ok(db),
            Err(e) if attempt + 1 < CONNECT_ATTEMPTS => {
                let delay = with_jitter(exponential_delay(
                    attempt,
                    CONNECT_BASE_DELAY,
                    CONNECT_MAX_DELAY,
                ));
                warn!(
                    "⏳ Database unreachable (attempt {}/{}): {}. Retrying in {:?}",
                    attempt + 1,
                    CONNECT_ATTEMPTS,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn connect_options(db_url: &str) -> ConnectOptions {
    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(50)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);
    opt
}

/// Create the canonical tables when they are missing. Existing tables are
/// left alone; column differences are handled by schema discovery.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Ensuring tables exist...");

    let stmts = vec![
        (
            "files",
            schema
                .create_table_from_entity(files::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "folders",
            schema
                .create_table_from_entity(folders::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "suggestions",
            schema
                .create_table_from_entity(suggestions::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
        info!("   - Table '{}' checked/created", name);
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_files_content_hash ON files(content_hash)",
        "CREATE INDEX IF NOT EXISTS idx_files_folder_path ON files(folder_path)",
        "CREATE INDEX IF NOT EXISTS idx_suggestions_file_id ON suggestions(file_id)",
    ];
    for query in indexes {
        if let Err(e) = db
            .execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
        {
            warn!("   - Index creation skipped: {} -> {}", query, e);
        }
    }

    Ok(())
}

/// Hide the password part of a connection URL for logging.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.split_once(':') {
                Some((user, _)) => format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
