//! Command-line surface: argument types and dispatch.

use crate::config::Config;
use crate::db::analytics::admin_summary;
use crate::db::providers::{
    approve_application, reject_application, set_provider_active, submit_application,
    NewProviderApplication,
};
use crate::db::requests::{
    cancel_request, create_request, list_requests, list_requests_for_customer,
    list_requests_for_provider, load_request, record_provider_response, set_request_status,
};
use crate::db::{init_db, Database};
use crate::domain::{
    derive_status, status_display, DerivedStatus, NewServiceRequest, OrderItem, OrderStatus,
    ResponseStatus, ServiceRequest, StatusDisplay,
};
use crate::errors::AppError;
use crate::feed::{RequestFeed, StatusTracker};
use crate::mailer::notifier_from_config;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::str::FromStr;

/// Local-services marketplace: provider onboarding, service requests and
/// customer-facing status tracking.
#[derive(Parser, Debug)]
#[command(name = "servicemart", version, about)]
pub struct Cli {
    /// SQLite file (overrides SERVICEMART_DB).
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create tables if missing.
    Init,
    /// Provider applications and approvals.
    #[command(subcommand)]
    Provider(ProviderCommand),
    /// Customer and provider actions on service requests.
    #[command(subcommand)]
    Request(RequestCommand),
    /// Admin dashboard numbers.
    Summary,
    /// Follow request changes and notify customers when their status changes.
    Watch(WatchArgs),
}

#[derive(Subcommand, Debug)]
pub enum ProviderCommand {
    Apply {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Pincode served (repeatable).
        #[arg(long = "pincode", required = true)]
        pincodes: Vec<String>,
        /// Service type offered (repeatable).
        #[arg(long = "service", required = true)]
        services: Vec<String>,
    },
    Approve {
        application_id: String,
    },
    Reject {
        application_id: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Stop matching this provider to new requests.
    Deactivate {
        provider_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RequestCommand {
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        pincode: String,
        /// `service_type:name:unit_price_cents[:quantity]` (repeatable).
        #[arg(long = "item", required = true)]
        items: Vec<ItemArg>,
    },
    Respond {
        request_id: String,
        #[arg(long)]
        provider: String,
        decision: Decision,
    },
    Cancel {
        request_id: String,
        #[arg(long)]
        email: String,
    },
    SetStatus {
        request_id: String,
        status: OrderStatus,
    },
    Show {
        request_id: String,
    },
    List {
        #[arg(long, conflicts_with = "provider")]
        customer: Option<String>,
        #[arg(long)]
        provider: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Do not list requests that already exist at startup.
    #[arg(long)]
    pub from_now: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for ResponseStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Accept => ResponseStatus::Accepted,
            Decision::Reject => ResponseStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemArg(pub OrderItem);

impl FromStr for ItemArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (service_type, name, price, quantity) = match parts.as_slice() {
            [t, n, p] => (*t, *n, *p, "1"),
            [t, n, p, q] => (*t, *n, *p, *q),
            _ => return Err(format!("expected type:name:price_cents[:quantity], got '{s}'")),
        };
        let unit_price_cents = price
            .trim()
            .parse()
            .map_err(|e| format!("bad price '{price}': {e}"))?;
        let quantity = quantity
            .trim()
            .parse()
            .map_err(|e| format!("bad quantity '{quantity}': {e}"))?;
        Ok(ItemArg(OrderItem {
            service_type: service_type.to_string(),
            name: name.to_string(),
            unit_price_cents,
            quantity,
        }))
    }
}

/// A request as the customer sees it.
#[derive(Serialize)]
pub struct RequestView<'a> {
    pub derived_status: DerivedStatus,
    pub display: StatusDisplay,
    #[serde(flatten)]
    pub request: &'a ServiceRequest,
}

impl<'a> RequestView<'a> {
    pub fn of(request: &'a ServiceRequest) -> Self {
        let derived_status = derive_status(request);
        Self {
            derived_status,
            display: status_display(derived_status),
            request,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_requests(requests: &[ServiceRequest]) -> anyhow::Result<()> {
    let views: Vec<RequestView<'_>> = requests.iter().map(RequestView::of).collect();
    print_json(&views)
}

pub fn run(cli: Cli, mut cfg: Config) -> anyhow::Result<()> {
    if let Some(path) = cli.db {
        cfg.db_path = path;
    }
    let db = Database::new(cfg.db_path.clone());
    init_db(&db)?;

    match cli.command {
        Commands::Init => {}
        Commands::Provider(cmd) => run_provider(&db, cmd)?,
        Commands::Request(cmd) => run_request(&db, cmd)?,
        Commands::Summary => {
            let summary = db.with_conn(|conn| admin_summary(conn))?;
            print_json(&summary)?;
        }
        Commands::Watch(args) => watch(&db, &cfg, args)?,
    }
    Ok(())
}

fn run_provider(db: &Database, cmd: ProviderCommand) -> anyhow::Result<()> {
    let now = Utc::now();
    match cmd {
        ProviderCommand::Apply {
            email,
            name,
            pincodes,
            services,
        } => {
            let app = NewProviderApplication {
                email,
                name,
                pincodes,
                service_types: services,
            };
            let id = db.with_conn(|conn| submit_application(conn, &app, now))?;
            println!("{id}");
        }
        ProviderCommand::Approve { application_id } => {
            let provider_id = db.with_conn(|conn| approve_application(conn, &application_id, now))?;
            println!("{provider_id}");
        }
        ProviderCommand::Reject {
            application_id,
            reason,
        } => {
            db.with_conn(|conn| reject_application(conn, &application_id, &reason, now))?;
        }
        ProviderCommand::Deactivate { provider_id } => {
            db.with_conn(|conn| set_provider_active(conn, &provider_id, false))?;
            tracing::info!(%provider_id, "provider deactivated");
        }
    }
    Ok(())
}

fn run_request(db: &Database, cmd: RequestCommand) -> anyhow::Result<()> {
    let now = Utc::now();
    let request = match cmd {
        RequestCommand::Create {
            email,
            name,
            address,
            pincode,
            items,
        } => {
            let new = NewServiceRequest {
                customer_email: email,
                customer_name: name,
                address,
                pincode,
                items: items.into_iter().map(|ItemArg(item)| item).collect(),
            };
            db.with_conn(|conn| create_request(conn, &new, now))?
        }
        RequestCommand::Respond {
            request_id,
            provider,
            decision,
        } => db.with_conn(|conn| {
            record_provider_response(conn, &request_id, &provider, decision.into(), now)
        })?,
        RequestCommand::Cancel { request_id, email } => {
            db.with_conn(|conn| cancel_request(conn, &request_id, &email, now))?
        }
        RequestCommand::SetStatus { request_id, status } => {
            db.with_conn(|conn| set_request_status(conn, &request_id, status, now))?
        }
        RequestCommand::Show { request_id } => db
            .with_conn(|conn| load_request(conn, &request_id))?
            .ok_or(AppError::NotFound)?,
        RequestCommand::List { customer, provider } => {
            let requests = db.with_conn(|conn| match (&customer, &provider) {
                (Some(email), _) => list_requests_for_customer(conn, email),
                (None, Some(provider_id)) => list_requests_for_provider(conn, provider_id),
                (None, None) => list_requests(conn),
            })?;
            return print_requests(&requests);
        }
    };
    print_json(&RequestView::of(&request))
}

fn watch(db: &Database, cfg: &Config, args: WatchArgs) -> anyhow::Result<()> {
    let mut feed = RequestFeed::new(db.clone(), cfg.poll_interval);
    let mut tracker = StatusTracker::new();

    // Requests already in the store are the baseline, never notified.
    for snapshot in feed.poll_once()? {
        let current = tracker.seed(&snapshot);
        if !args.from_now {
            tracing::info!(request_id = %snapshot.id, %current, "existing request");
        }
    }

    let notifier = notifier_from_config(cfg);
    tracing::info!(db = db.path(), cursor = feed.cursor(), "watching service requests");
    let (snapshots, _poller) = feed.subscribe();

    for snapshot in snapshots {
        let Some(change) = tracker.observe(&snapshot) else {
            continue;
        };
        tracing::info!(
            request_id = %change.request_id,
            previous = ?change.previous,
            current = %change.current,
            label = change.display.label,
            "derived status changed"
        );
        // A brand-new pending request has nothing to tell the customer yet.
        if change.previous.is_some() {
            if let Err(e) = notifier.status_changed(&snapshot, &change) {
                tracing::warn!(request_id = %change.request_id, error = %e, "notification failed");
            }
        }
    }
    Ok(())
}
