use colored::Colorize;
use lumina::config::Config;
use lumina::db::Db;
use lumina::history::HistoryStore;
use lumina::logging;
use lumina::repl;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::load()?;
    let _logger = logging::init_logging(&config.log_level)?;

    let db = Db::init(&config.db_path).await?;
    let store = HistoryStore::new(&db);

    println!("{}", "Lumina".cyan().bold());
    repl::run(config, store).await
}
