use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    build_page_numbers, clamp_page, AdminClient, CancellationToken, ErrorContext, ListResource,
    LoadOutcome, PageFetcher, PageState, PagedListController, PagedListError, SessionContext,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Operator, RegularUser, Role, TradeRecord},
    fixtures::{sample_regular_users, sample_roles},
    protocol::{LoginRequest, TradeFilters},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "console", about = "Admin console for the manager and trade services")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    manager_url: Option<String>,
    #[arg(long)]
    trade_url: Option<String>,
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    token: Option<String>,
    /// Tracing filter, e.g. `debug` or `client_core=debug`. Defaults to
    /// `RUST_LOG`, then `info`.
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Users {
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    Operators {
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    Roles {
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    /// Search trades page by page.
    Trades {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        notes_keyword: Option<String>,
        #[arg(long)]
        trade_id: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
    },
    TradeSummary,
    Login {
        user_id: String,
        #[arg(long)]
        password: String,
    },
    /// Print the page-number window for a pager position.
    Pages {
        current: i64,
        total_pages: u32,
        #[arg(long)]
        max_visible: Option<u32>,
    },
}

trait ListRow {
    fn row(&self) -> String;
}

impl ListRow for RegularUser {
    fn row(&self) -> String {
        let joined = self
            .joined_at
            .map(|date| date.to_string())
            .unwrap_or_else(|| "-".into());
        format!(
            "{:<8} {:<12} {:<28} {:<9} {joined}",
            self.id.to_string(),
            self.name,
            self.email,
            format!("{:?}", self.status).to_lowercase()
        )
    }
}

impl ListRow for Operator {
    fn row(&self) -> String {
        format!(
            "{:<8} {:<10} {:<12} {:<14} {:<14} {}",
            self.id.to_string(),
            self.operator_no,
            self.name,
            self.login_name,
            self.phone,
            if self.is_open == 1 { "open" } else { "closed" }
        )
    }
}

impl ListRow for Role {
    fn row(&self) -> String {
        format!(
            "{:<8} {:<12} {:<10} {:<7} {}",
            self.id.to_string(),
            self.name,
            self.code,
            if self.is_open == 1 { "open" } else { "closed" },
            self.description
        )
    }
}

impl ListRow for TradeRecord {
    fn row(&self) -> String {
        format!(
            "{:<14} {:<10} {}",
            self.display_id()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".into()),
            self.user_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".into()),
            self.timestamp().unwrap_or("-")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let settings = apply_cli_overrides(load_settings(&cli.config)?, &cli)?;
    info!(
        manager = %settings.manager_base_url,
        trade = %settings.trade_base_url,
        page_size = settings.page_size,
        "console: settings loaded"
    );

    if let Command::Pages {
        current,
        total_pages,
        max_visible,
    } = &cli.command
    {
        let window = build_page_numbers(
            *current,
            *total_pages,
            max_visible.unwrap_or(settings.max_visible_pages),
        );
        println!("{}", render_window(&window, clamp_page(*current, *total_pages)));
        return Ok(());
    }

    let session = match &settings.auth_token {
        Some(token) => SessionContext::with_token(token.clone()),
        None => SessionContext::new(),
    };
    let client = Arc::new(AdminClient::new(
        &settings.manager_base_url,
        &settings.trade_base_url,
        session,
    )?);

    match cli.command {
        Command::Users { page } => {
            let fetcher = client.list_fetcher(ListResource::Users);
            show_list(fetcher, &settings, "users", sample_regular_users(), page).await?
        }
        Command::Operators { page } => {
            let fetcher = client.list_fetcher(ListResource::Operators);
            show_list::<Operator>(fetcher, &settings, "operators", Vec::new(), page).await?
        }
        Command::Roles { page } => {
            let fetcher = client.list_fetcher(ListResource::Roles);
            show_list(fetcher, &settings, "roles", sample_roles(), page).await?
        }
        Command::Trades {
            page,
            notes_keyword,
            trade_id,
            user_id,
        } => {
            let fetcher = client.trade_fetcher(TradeFilters {
                notes_keyword,
                trade_id,
                user_id,
            });
            show_list::<TradeRecord>(fetcher, &settings, "trades", Vec::new(), page).await?
        }
        Command::TradeSummary => {
            let summary = client
                .fetch_recent_hour_trade_summary(&CancellationToken::new())
                .await
                .context("failed to fetch trade summary")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Login { user_id, password } => {
            let response = client
                .login(&LoginRequest { user_id, password }, &CancellationToken::new())
                .await
                .context("login failed")?;
            match response.pointer("/data/token").and_then(|token| token.as_str()) {
                Some(token) => {
                    client
                        .session()
                        .set_auth(token, response.pointer("/data/user").cloned())
                        .await;
                    println!("token: {token}");
                }
                None => println!("{}", serde_json::to_string_pretty(&response)?),
            }
        }
        Command::Pages { .. } => {}
    }

    Ok(())
}

fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn apply_cli_overrides(mut settings: Settings, cli: &Cli) -> Result<Settings> {
    if let Some(v) = &cli.manager_url {
        settings.manager_base_url = v.clone();
    }
    if let Some(v) = &cli.trade_url {
        settings.trade_base_url = v.clone();
    }
    if let Some(v) = cli.page_size {
        settings.page_size = v;
    }
    if let Some(v) = cli.timeout_ms {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = &cli.token {
        settings.auth_token = Some(v.clone());
    }
    settings.validated()
}

async fn show_list<T>(
    fetcher: impl PageFetcher + 'static,
    settings: &Settings,
    label: &'static str,
    fallback: Vec<T>,
    page: i64,
) -> Result<()>
where
    T: ListRow + Clone + DeserializeOwned + Send + Sync + 'static,
{
    let state = load_list(fetcher, settings, label, fallback, page).await?;
    print_page(&state, settings.max_visible_pages);
    Ok(())
}

/// Loads page 1, then `page` clamped to the known page count. Fails when a
/// load fails and there is nothing to show.
async fn load_list<T>(
    fetcher: impl PageFetcher + 'static,
    settings: &Settings,
    label: &'static str,
    fallback: Vec<T>,
    page: i64,
) -> Result<PageState<T>>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    let first_error = Arc::new(Mutex::new(None::<String>));
    let mut list = PagedListController::<T>::builder(settings.page_size, fetcher)
        .fallback(fallback)
        .timeout(settings.request_timeout())
        .error_sink({
            let first_error = Arc::clone(&first_error);
            move |err: &PagedListError, context: ErrorContext| {
                error!(list = label, page = context.page, error = %err, "console: list load failed");
                first_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert_with(|| err.to_string());
            }
        })
        .start();
    list.initial_load_settled().await;

    let failure = first_error
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(message) = failure {
        if list.items().is_empty() {
            bail!("failed to load {label}: {message}");
        }
        warn!(list = label, "console: showing local data");
    }

    let target = clamp_page(page, list.total_pages());
    if target != list.current_page() {
        match list.load(target).await {
            Ok(LoadOutcome::Loaded(_)) => {}
            Ok(LoadOutcome::Cancelled(reason)) => {
                warn!(page = target, ?reason, "console: page load did not complete")
            }
            Err(err) => return Err(err).with_context(|| format!("failed to load {label}")),
        }
    }

    Ok(list.state())
}

fn print_page<T: ListRow>(state: &PageState<T>, max_visible_pages: u32) {
    if state.items.is_empty() {
        println!("(no records)");
    }
    for item in &state.items {
        println!("{}", item.row());
    }
    println!();
    println!("{}", state.summary());
    println!(
        "{}",
        render_window(
            &build_page_numbers(
                i64::from(state.current_page),
                state.total_pages(),
                max_visible_pages
            ),
            state.current_page
        )
    );
}

/// Renders a page window as `1 … 4 [5] 6 … 42`, marking gaps with an ellipsis.
fn render_window(pages: &[u32], current: u32) -> String {
    let mut parts = Vec::with_capacity(pages.len() * 2);
    let mut previous: Option<u32> = None;
    for &page in pages {
        if previous.is_some_and(|prev| page > prev + 1) {
            parts.push("…".to_string());
        }
        if page == current {
            parts.push(format!("[{page}]"));
        } else {
            parts.push(page.to_string());
        }
        previous = Some(page);
    }
    parts.join(" ")
}
