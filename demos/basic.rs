use sqlx::MySqlPool;
use sqlx_deadlock_retry::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sql=warn")),
        )
        .init();

    // Connect to database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let pool = MySqlPool::connect(&database_url).await?;

    println!("=== Deadlock Retry Example ===\n");

    // Example 1: Literal and prepared statements in one batch
    println!("1. Creating a user with profile...");
    let mut tx = Transaction::new();
    tx.append("INSERT INTO users (id, name, email) VALUES (100, 'Alice', 'alice@example.com')");
    tx.append_prepared_statement(
        PreparedStatement::new("INSERT INTO profiles (user_id, bio) VALUES (?, ?)")
            .bind(100_i64)
            .bind("Software Developer"),
    );

    let mut conn = pool.acquire().await?;
    if execute_with_retry(&mut *conn, Arc::new(tx)).await {
        println!("   ✓ User and profile committed\n");
    } else {
        println!("   ✗ Batch failed, nothing was applied\n");
    }
    drop(conn);

    // Example 2: A failing statement discards the whole batch
    println!("2. Testing all-or-nothing on error...");
    let mut tx = Transaction::new();
    tx.append("INSERT INTO users (id, name, email) VALUES (101, 'Charlie', 'charlie@example.com')");
    tx.append("INSERT INTO non_existent_table VALUES (1)");
    let tx = Arc::new(tx);

    let mut conn = pool.acquire().await?;
    let committed = execute_with_retry(&mut *conn, Arc::clone(&tx)).await;
    println!(
        "   committed: {}, operations left: {}\n",
        committed,
        tx.len()
    );
    drop(conn);

    // Example 3: Concurrent transfers touching rows in opposite order
    println!("3. Running crossing transfers in the background...");
    let executor = TransactionExecutor::default();
    let mut queue = CallbackQueue::new();

    for i in 0..8_i64 {
        let (from, to) = if i % 2 == 0 { (1_i64, 2_i64) } else { (2, 1) };
        let mut tx = Transaction::new();
        tx.append_prepared_statement(
            PreparedStatement::new("UPDATE accounts SET balance = balance - ? WHERE id = ?")
                .bind(5_i64)
                .bind(from),
        );
        tx.append_prepared_statement(
            PreparedStatement::new("UPDATE accounts SET balance = balance + ? WHERE id = ?")
                .bind(5_i64)
                .bind(to),
        );

        let future = executor.execute_async(pool.acquire().await?, Arc::new(tx));
        queue.add(TransactionCallback::new(future, move |committed| {
            println!("   transfer {} committed: {}", i, committed);
        }));
    }

    while !queue.is_empty() {
        queue.process_ready_callbacks();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    println!("\n=== All examples completed ===");

    pool.close().await;
    Ok(())
}
