use menu_orders::MIGRATOR;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// 连接 DATABASE_URL 指定的测试库并执行迁移
pub async fn pool() -> PgPool {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres");
    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

/// 测试之间共享数据库，用随机后缀避免唯一约束冲突
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}
