//! Demonstration "cats" service, served on both transports.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use service_kit::middleware;
use service_kit::service::{Endpoint, ServiceDescriptor};
use service_kit::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cat {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CatId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct NewCat {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CatList {
    pub cats: Vec<Cat>,
}

/// In-memory cat storage shared by every handler.
#[derive(Debug)]
pub struct CatStore {
    cats: RwLock<BTreeMap<String, Cat>>,
    next_id: AtomicU64,
}

impl CatStore {
    pub fn seeded() -> Self {
        let mut cats = BTreeMap::new();
        cats.insert(
            "42".to_string(),
            Cat {
                id: "42".into(),
                name: "Whiskers".into(),
            },
        );
        Self {
            cats: RwLock::new(cats),
            next_id: AtomicU64::new(100),
        }
    }

    async fn get(&self, id: &str) -> Result<Cat, Error> {
        self.cats
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no cat with id {id}")))
    }

    async fn list(&self) -> Vec<Cat> {
        self.cats.read().await.values().cloned().collect()
    }

    async fn create(&self, name: String) -> Result<Cat, Error> {
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("name must not be empty"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let cat = Cat { id: id.clone(), name };
        self.cats.write().await.insert(id, cat.clone());
        Ok(cat)
    }
}

/// Describe the cats service over `store`.
pub fn service(store: Arc<CatStore>) -> ServiceDescriptor {
    let get = {
        let store = Arc::clone(&store);
        Endpoint::new(move |_ctx, req: CatId| {
            let store = Arc::clone(&store);
            async move { store.get(&req.id).await }
        })
    };
    let list = {
        let store = Arc::clone(&store);
        Endpoint::new(move |_ctx, _req: ()| {
            let store = Arc::clone(&store);
            async move { Ok::<_, Error>(CatList { cats: store.list().await }) }
        })
    };
    let create = Endpoint::new(move |_ctx, req: NewCat| {
        let store = Arc::clone(&store);
        async move { store.create(req.name).await }
    });

    let access_log = middleware::from_fn("access_log", |ctx, req, next| async move {
        let start = Instant::now();
        let transport = ctx.transport();
        let operation = ctx.operation().to_string();
        let request_id = ctx.request_id().to_string();
        let result = next.run(ctx, req).await;
        tracing::info!(
            request_id = %request_id,
            transport = %transport,
            operation = %operation,
            ok = result.is_ok(),
            duration_ms = start.elapsed().as_millis() as u64,
            "cats call"
        );
        result
    });

    ServiceDescriptor::builder("cats")
        .http_middleware(access_log.clone())
        .http_endpoint("/cats", Method::GET, list.clone())
        .http_endpoint("/cats", Method::POST, create.clone())
        .http_endpoint("/cats/{id}", Method::GET, get.clone())
        .rpc_service("pets.Cats")
        .rpc_middleware(access_log)
        .rpc_method("GetCat", get)
        .rpc_method("ListCats", list)
        .rpc_method("CreateCat", create)
        .build()
}
