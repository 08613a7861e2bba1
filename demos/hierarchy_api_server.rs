use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use subseq_hierarchy::api::{HasDirectory, HierarchyApp};
use subseq_hierarchy::prelude::{
    EmployeeDirectory, EmployeeRecord, HierarchyConfig, InMemoryDirectory, PgEmployeeDirectory,
    Result, RoleRef, SupervisorReplacement,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum DemoDirectory {
    Postgres(PgEmployeeDirectory),
    Memory(InMemoryDirectory),
}

impl EmployeeDirectory for DemoDirectory {
    async fn load_employees(&self) -> Result<Vec<EmployeeRecord>> {
        match self {
            DemoDirectory::Postgres(directory) => directory.load_employees().await,
            DemoDirectory::Memory(directory) => directory.load_employees().await,
        }
    }

    async fn replace_supervisors(&self, replacement: &SupervisorReplacement) -> Result<()> {
        match self {
            DemoDirectory::Postgres(directory) => directory.replace_supervisors(replacement).await,
            DemoDirectory::Memory(directory) => directory.replace_supervisors(replacement).await,
        }
    }
}

#[derive(Clone)]
struct DemoApp {
    directory: Arc<DemoDirectory>,
    config: HierarchyConfig,
}

impl HasDirectory for DemoApp {
    type Directory = DemoDirectory;

    fn directory(&self) -> Arc<DemoDirectory> {
        Arc::clone(&self.directory)
    }
}

impl HierarchyApp for DemoApp {
    fn hierarchy_config(&self) -> HierarchyConfig {
        self.config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "subseq_hierarchy=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind = env::var("HIERARCHY_BIND").unwrap_or_else(|_| "127.0.0.1:4020".to_string());
    let bind_addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid HIERARCHY_BIND '{}'", bind))?;
    let config = HierarchyConfig::from_env()?;

    let directory = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await
                .context("failed to connect to postgres")?;
            subseq_hierarchy::db::create_hierarchy_tables(&pool)
                .await
                .context("failed to run hierarchy migrations")?;
            DemoDirectory::Postgres(PgEmployeeDirectory::from_pool(&pool))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; serving a seeded in-memory directory");
            DemoDirectory::Memory(InMemoryDirectory::new(seed_employees()))
        }
    };

    let app_state = DemoApp {
        directory: Arc::new(directory),
        config,
    };

    let api_v1 = Router::new()
        .route("/healthz", get(health_handler))
        .merge(subseq_hierarchy::api::routes::<DemoApp>());

    let app = Router::new().nest("/api/v1", api_v1).with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;

    tracing::info!(%bind_addr, "hierarchy demo server listening; api base path /api/v1");

    axum::serve(listener, app)
        .await
        .context("demo server failed")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

fn seed_employees() -> Vec<EmployeeRecord> {
    let employee = |id: &str, name: &str, role: RoleRef, is_admin: bool, reports_to: &[&str]| {
        EmployeeRecord {
            id: id.into(),
            name: name.to_string(),
            role,
            is_admin,
            reports_to: reports_to.iter().map(|id| (*id).into()).collect(),
            updated_at: None,
        }
    };
    let custom = |id: &str, name: &str| RoleRef::Custom {
        id: id.to_string(),
        name: name.to_string(),
    };

    vec![
        employee("e-001", "Anita Rao", RoleRef::Named("admin".into()), true, &[]),
        employee("e-002", "Vikram Shah", custom("r-zonal", "Zonal Manager"), false, &["e-001"]),
        employee("e-003", "Farah Khan", custom("r-area", "Area Manager"), false, &["e-002"]),
        employee(
            "e-004",
            "Joseph Mathew",
            RoleRef::Named("sales_executive".into()),
            false,
            &["e-002", "e-003"],
        ),
        employee("e-005", "Lin Wei", RoleRef::Named("sales_executive".into()), false, &[]),
    ]
}
