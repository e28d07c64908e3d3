use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::env;
use tracing::info;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn create_db_connection_pool() -> Pool<ConnectionManager<PgConnection>> {
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .test_on_check_out(true)
        .build(manager)
        .expect("failed to create db connection pool")
}

pub fn run_migrations(pool: &Pool<ConnectionManager<PgConnection>>) {
    let mut conn = pool.get().unwrap();
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");
    info!("applied {} pending migrations", applied.len());
}
