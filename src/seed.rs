use dotenvy::dotenv;
use envconfig::Envconfig;

use meditrack::{
    config::Config,
    db::{apply_schema, init_db},
    storage::{seed::seed_defaults, PgStorage},
};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenv().ok();

    let config = Config::init_from_env()?;
    let url = config
        .database_url
        .as_deref()
        .ok_or("DATABASE_URL must be set to seed a database")?;

    let pool = init_db(url).await?;
    apply_schema(&pool).await?;

    let storage = PgStorage::new(pool);
    if seed_defaults(&storage, &config.admin_password).await? {
        log::info!("Database seeded");
    } else {
        log::info!("Database already seeded; nothing to do");
    }
    Ok(())
}
