use crate::db::connection::{init_db, Database};
use crate::db::providers::{approve_application, submit_application, NewProviderApplication};
use crate::domain::{NewServiceRequest, OrderItem};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// Returns a fresh file-backed test database using the production schema.
pub fn init_test_db(name: &str) -> Database {
    let path = std::env::temp_dir().join(format!(
        "servicemart_{name}_{}_{}_{}.sqlite",
        std::process::id(),
        NEXT_DB.fetch_add(1, Ordering::Relaxed),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path.to_string_lossy().into_owned());
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    db
}

/// Apply and approve a provider in one go, returning its id.
pub fn approved_provider(db: &Database, email: &str, pincode: &str, service: &str) -> String {
    let now = Utc::now();
    db.with_conn(|conn| {
        let app = submit_application(
            conn,
            &NewProviderApplication {
                email: email.into(),
                name: email.into(),
                pincodes: vec![pincode.into()],
                service_types: vec![service.into()],
            },
            now,
        )?;
        approve_application(conn, &app, now)
    })
    .expect("Failed to approve provider")
}

pub fn cart(email: &str, pincode: &str, service: &str) -> NewServiceRequest {
    NewServiceRequest {
        customer_email: email.into(),
        customer_name: "Test Customer".into(),
        address: "1 Test Lane".into(),
        pincode: pincode.into(),
        items: vec![OrderItem {
            service_type: service.into(),
            name: format!("{service} visit"),
            unit_price_cents: 3000,
            quantity: 1,
        }],
    }
}
