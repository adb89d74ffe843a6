//! Storage inspection walkthrough.
//!
//! Demonstrates:
//! - Activating a session on the foreground tab
//! - Refreshing, adding, editing and deleting rows
//! - Export to JSON and the download file name
//! - Import from pasted text
//!
//! By default it waits for the companion extension to connect. With
//! `--offline` it runs against in-memory storage instead.
//!
//! Usage:
//!   cargo run --example inspect -- --offline
//!   cargo run --example inspect -- --port 9222
//!   cargo run --example inspect -- --offline --debug

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use storage_inspector::memory::{MemoryCookies, MemoryPage, StaticTab};
use storage_inspector::{
    ActiveTabProvider, CookieStore, Dispatcher, ExtensionBridge, Field, ImportSource,
    InspectorOptions, PendingServer, Reconciler, ScriptChannel, TabId, TargetKind, ViewState,
};

// ============================================================================
// Constants
// ============================================================================

const DEMO_URL: &str = "https://shop.example.com/cart";
const DEFAULT_PORT: u16 = 0;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    offline: bool,
    port: u16,
    kind: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            offline: args.iter().any(|a| a == "--offline"),
            port: value_of("--port")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            kind: value_of("--kind"),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Storage Inspector ===\n");

    let mut options = InspectorOptions::default();
    if let Some(code) = &args.kind {
        options = options.with_remembered_kind(code);
    }

    let (script, cookies, tabs): (
        Arc<dyn ScriptChannel>,
        Arc<dyn CookieStore>,
        Arc<dyn ActiveTabProvider>,
    ) = if args.offline {
        println!("[Setup] Using in-memory storage for {DEMO_URL}");
        let page = MemoryPage::new()
            .with_local([("theme", "dark"), ("cart", r#"{"items":[1,2]}"#)])
            .with_session([("step", "2")]);
        let jar = MemoryCookies::new().with_cookies(DEMO_URL, [("sid", "abc123")]);
        let tab = TabId::new(1).context("tab id")?;
        (
            Arc::new(page) as Arc<dyn ScriptChannel>,
            Arc::new(jar) as Arc<dyn CookieStore>,
            Arc::new(StaticTab::new(tab, DEMO_URL)) as Arc<dyn ActiveTabProvider>,
        )
    } else {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), args.port).await?;
        println!("[Setup] Waiting for extension on {}...", server.ws_url());
        let bridge = Arc::new(ExtensionBridge::accept(server, &options).await?);
        println!("        ✓ Connected (tab={})", bridge.ready().tab_id);
        (
            bridge.clone() as Arc<dyn ScriptChannel>,
            bridge.clone() as Arc<dyn CookieStore>,
            bridge as Arc<dyn ActiveTabProvider>,
        )
    };

    let dispatcher = Dispatcher::new(script, cookies, &options);
    let mut view = Reconciler::activate(dispatcher, tabs.as_ref(), options.initial_kind).await?;
    println!("        ✓ Session on {}\n", view.context().tab_url);

    for kind in TargetKind::ALL {
        view.select_kind(kind).await;
        print_view(&view);
    }

    if matches!(view.state(), ViewState::Restricted) {
        println!("Target page is restricted; nothing else to do.");
        return Ok(());
    }

    // ========================================================================
    // Edit
    // ========================================================================

    view.select_kind(TargetKind::Local).await;

    println!("[Add] demo_key = hello");
    view.begin_add()?;
    view.commit_add("demo_key", "hello").await?;
    print_view(&view);

    if let Some(index) = view.rows().iter().position(|row| row.key == "demo_key") {
        println!("[Edit] demo_key -> demo_key_renamed");
        view.edit_cell(index, Field::Key, "demo_key_renamed").await?;

        println!("[Delete] demo_key_renamed");
        view.delete_row(index, &true).await?;
        print_view(&view);
    }

    // ========================================================================
    // Export / Import
    // ========================================================================

    let json = view.export().await?;
    println!("[Export] {}", view.export_file_name(Utc::now()));
    println!("{json}\n");

    println!("[Import] {{\"imported\":\"yes\"}}");
    view.import(&ImportSource::text(r#"{"imported":"yes"}"#)).await?;
    print_view(&view);

    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "storage_inspector=debug"
    } else {
        "storage_inspector=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

fn print_view(view: &Reconciler) {
    let kind = view.context().kind;
    match view.state() {
        ViewState::Empty => println!("[{kind}] No data found"),
        ViewState::Restricted => println!("[{kind}] Cannot access data on this page"),
        ViewState::Error(failure) => println!("[{kind}] Failed: {}", failure.code()),
        ViewState::Populated | ViewState::Editing(_) => {
            println!("[{kind}] {} item(s)", view.rows().len());
            for row in view.rows() {
                println!("        {} = {}", row.key, row.value);
            }
        }
    }
    println!();
}
