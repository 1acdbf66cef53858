use log::LevelFilter;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    ConnectOptions, Pool, Sqlite,
};
use std::path::Path;
use std::str::FromStr;

// this macro collects migrations from the ./migrations folder at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug)]
pub struct Db {
    pub pool: Pool<Sqlite>,
}

impl Db {
    pub async fn init(path: &str) -> anyhow::Result<Self> {
        let connection_str = if path.starts_with("sqlite://") {
            path.to_string()
        } else {
            format!("sqlite://{}", path)
        };

        if let Some(parent) = Path::new(path.trim_start_matches("sqlite://")).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&connection_str)?
            .create_if_missing(true)
            .log_statements(LevelFilter::Debug)
            .clone();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        log::debug!(
            "found {} migrations in ./migrations",
            MIGRATOR.migrations.len()
        );
        for migration in MIGRATOR.migrations.iter() {
            log::debug!(" - v{}: {}", migration.version, migration.description);
        }

        MIGRATOR.run(&pool).await?;
        log::info!("database ready at {}", path);

        Ok(Db { pool })
    }
}
