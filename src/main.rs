// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use harbor_server::accounts::jobs::executor_table;
use harbor_server::accounts::{AccountsService, LoggingObserver};
use harbor_server::accounts::store::FsAccountStore;
use harbor_server::api::router;
use harbor_server::chain::HttpLedgerClient;
use harbor_server::config::{Config, LogFormat};
use harbor_server::jobs::{JobStore, PoolOptions, WorkerPool};
use harbor_server::keys::cipher::Aes256GcmCipher;
use harbor_server::keys::manager::LocalKeyManager;
use harbor_server::state::AppState;
use harbor_server::transactions::TransactionsService;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = Arc::new(Config::from_env().expect("Failed to load configuration"));
    init_tracing(config.log_format);

    std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");

    // Wiring: ledger client, stores, key manager, job queue, engine
    let ledger = Arc::new(HttpLedgerClient::new(config.ledger_rpc_url.clone()));
    let store = Arc::new(
        FsAccountStore::open(config.data_dir.join("accounts"))
            .expect("Failed to open account store"),
    );
    let cipher = Arc::new(
        Aes256GcmCipher::from_hex(&config.key_encryption_key_hex)
            .expect("Invalid KEY_ENCRYPTION_KEY"),
    );
    let km = Arc::new(
        LocalKeyManager::new(
            cipher,
            store.clone(),
            ledger.clone(),
            config.admin_address,
            &config.admin_private_key_hex,
            config.admin_proposal_key_count,
        )
        .expect("Invalid ADMIN_PRIVATE_KEY"),
    );

    let job_store = Arc::new(
        JobStore::open(&config.data_dir.join("jobs.redb")).expect("Failed to open job store"),
    );
    let pool = Arc::new(WorkerPool::new(
        job_store.clone(),
        PoolOptions {
            capacity: config.worker_queue_capacity,
            worker_count: config.worker_count,
            max_attempts: config.job_max_attempts,
            notification_webhook: config.notification_webhook_url.clone(),
        },
    ));
    let txs = Arc::new(TransactionsService::new(
        km.clone(),
        ledger.clone(),
        config.transaction_timeout,
    ));

    let accounts = Arc::new(AccountsService::new(
        config.clone(),
        store,
        km,
        ledger.clone(),
        pool.clone(),
        txs,
        vec![Arc::new(LoggingObserver)],
    ));

    accounts
        .init_admin_account()
        .await
        .expect("Failed to initialize admin account");

    pool.start(executor_table(accounts.clone()));

    let state = AppState::new(config.clone(), accounts, job_store, ledger);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    tracing::info!(
        address = %addr,
        chain = %config.chain_id,
        "Harbor server listening (docs at /docs)"
    );

    let shutdown_pool = pool.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for shutdown signal");
            tracing::info!("shutting down");
            shutdown_pool.stop();
        })
        .await
        .expect("Server failed");
}
