use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Schema,
    Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{
    event, event_option, event_option_response, group, invite, user, user_and_group, vote,
    vote_option, vote_option_response,
};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let db = connect(config).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Open a connection pool for the configured backend
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    let mut opt = ConnectOptions::new(&database_url);
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    if config.is_sqlite() {
        info!("Connecting to sqlite database: {}", config.path);
        // An in-memory database lives exactly as long as its single connection
        opt.max_connections(1).min_connections(1);
    } else {
        info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);
        opt.max_connections(config.max_connections)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(60))
            .set_schema_search_path("public");
    }

    Database::connect(opt).await
}

/// Auto-migrate database tables
pub async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // Create tables in dependency order
    // 1. Independent tables first
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(group::Entity)).await?;

    // 2. Tables with foreign key dependencies
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user_and_group::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(event::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(event_option::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(event_option_response::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(vote::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(vote_option::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(vote_option_response::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(invite::Entity)).await?;

    // 3. Composite uniqueness and lookup indexes
    create_index_if_not_exists(
        db,
        backend,
        Index::create()
            .name("uq_user_and_groups_user_group")
            .table(user_and_group::Entity)
            .col(user_and_group::Column::UserId)
            .col(user_and_group::Column::GroupId)
            .unique()
            .to_owned(),
    )
    .await?;
    create_index_if_not_exists(
        db,
        backend,
        Index::create()
            .name("uq_event_option_responses_option_member")
            .table(event_option_response::Entity)
            .col(event_option_response::Column::EventOptionId)
            .col(event_option_response::Column::UserAndGroupId)
            .unique()
            .to_owned(),
    )
    .await?;
    create_index_if_not_exists(
        db,
        backend,
        Index::create()
            .name("uq_vote_option_responses_option_member")
            .table(vote_option_response::Entity)
            .col(vote_option_response::Column::VoteOptionId)
            .col(vote_option_response::Column::UserAndGroupId)
            .unique()
            .to_owned(),
    )
    .await?;
    create_index_if_not_exists(
        db,
        backend,
        Index::create()
            .name("idx_events_state")
            .table(event::Entity)
            .col(event::Column::State)
            .to_owned(),
    )
    .await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    // Add IF NOT EXISTS to avoid errors when table already exists
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

/// Create an index if it doesn't exist
async fn create_index_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: IndexCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}
