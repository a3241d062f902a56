//! Bailiff - authorization gateway for the law-firm practice API

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bailiff::{
    auth::{
        hash_password, Authorizer, QuotaTable, ResourceClass, ResourceRegistry, Role, TokenCodec,
    },
    config::Args,
    db::{MongoClient, MongoResourceStore, MongoStore, UserDoc},
    logging::AuditLogger,
    server::{self, AppState},
    store::{
        AccountStore, MemoryResourceStore, MemoryStore, PlanStore, PrincipalRecord,
        PrincipalStore, SubscriptionStore,
    },
};

/// Account and resource storage chosen at startup
struct Storage {
    principals: Arc<dyn PrincipalStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    accounts: Arc<dyn AccountStore>,
    plans: Arc<dyn PlanStore>,
    resources: ResourceRegistry,
    kind: &'static str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bailiff={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Bailiff - authorization gateway");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db: {})", args.mongodb_uri, args.mongodb_db);
    info!("Access token TTL: {}s", args.jwt_expiry_seconds);
    info!("Refresh token TTL: {}s", args.refresh_expiry_seconds);
    info!("======================================");

    let codec = match args.jwt_secret.as_deref() {
        Some(secret) => TokenCodec::new(
            secret,
            args.jwt_expiry_seconds,
            args.refresh_expiry_seconds,
        )?,
        None => {
            warn!("No JWT_SECRET set, using the development signing secret");
            TokenCodec::new_dev()
        }
    };

    let quotas = match &args.quota_table_path {
        Some(path) => {
            let table = QuotaTable::from_file(path)?;
            info!("Quota table loaded from {}", path.display());
            table
        }
        None => QuotaTable::default(),
    };

    let audit = AuditLogger::new();
    if let Some(path) = &args.audit_log_path {
        audit.init_file(path.clone()).await?;
        info!("Audit log: {}", path.display());
    }

    let storage = match open_mongo(&args).await {
        Ok(storage) => {
            info!("MongoDB connected successfully");
            storage
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                open_memory(&args).await?
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let authorizer = Authorizer::new(
        codec,
        Arc::clone(&storage.principals),
        Arc::clone(&storage.subscriptions),
        storage.resources,
        quotas,
        audit.clone(),
    );

    let state = AppState::new(
        authorizer,
        storage.principals,
        storage.subscriptions,
        storage.accounts,
        storage.plans,
        audit,
        storage.kind,
    )
    .with_dev_mode(args.dev_mode);

    server::run(Arc::new(state), args.listen).await?;
    Ok(())
}

async fn open_mongo(args: &Args) -> anyhow::Result<Storage> {
    let client = MongoClient::connect(&args.mongodb_uri, &args.mongodb_db).await?;
    let store = MongoStore::open(&client).await?;

    if let (Some(email), Some(password)) = (&args.dev_admin_email, &args.dev_admin_password) {
        if store.principal_by_email(email).await?.is_none() {
            let hash = hash_password(password)?;
            store
                .insert_user(UserDoc::new(email, "Dev Admin", hash, Role::Admin))
                .await?;
            info!("Seeded dev admin {}", email);
        }
    }

    let store = Arc::new(store);
    Ok(Storage {
        principals: store.clone(),
        subscriptions: store.clone(),
        accounts: store.clone(),
        plans: store,
        resources: MongoResourceStore::registry(&client).await?,
        kind: "mongodb",
    })
}

async fn open_memory(args: &Args) -> anyhow::Result<Storage> {
    let store = MemoryStore::new();

    if let (Some(email), Some(password)) = (&args.dev_admin_email, &args.dev_admin_password) {
        store
            .insert_principal(PrincipalRecord {
                id: uuid::Uuid::new_v4().to_string(),
                email: email.to_lowercase(),
                name: "Dev Admin".to_string(),
                password_hash: hash_password(password)?,
                role: Role::Admin,
                active: true,
            })
            .await;
        info!("Seeded dev admin {}", email);
    }

    let mut resources = ResourceRegistry::new();
    for class in ResourceClass::ALL {
        resources = resources.register(class, Arc::new(MemoryResourceStore::new()));
    }

    let store = Arc::new(store);
    Ok(Storage {
        principals: store.clone(),
        subscriptions: store.clone(),
        accounts: store.clone(),
        plans: store,
        resources,
        kind: "memory",
    })
}
