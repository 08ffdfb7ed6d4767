use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use client::nav::{HistoryNavigator, Navigator};
use client::widget::{self, ButtonSize};
use client::{ApiClient, ApiError, ClientRoutes, HttpBackend, InitOutcome, SessionError, SessionManager, SessionTokens, WidgetConfig, WidgetError};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Widget(#[from] WidgetError),
    #[error("failed to read assertion: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("widget closed before reporting a login")]
    NoAssertion,
    #[error("health check failed with status {0}")]
    Unhealthy(u16),
}

#[derive(Parser, Debug)]
#[command(name = "copytrade-cli", about = "Session and route-guard CLI for the copy-trading dashboard")]
struct Cli {
    #[arg(long, env = "APP_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Directory holding the persisted token stores.
    #[arg(long, env = "APP_STATE_DIR", default_value = ".copytrade")]
    state_dir: PathBuf,

    /// Page the session is considered to be on when the command runs.
    #[arg(long, default_value = "/")]
    page: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Log in with a Telegram widget payload.
    Login(LoginArgs),
    /// Re-check the stored session, as an application start would.
    Whoami,
    Logout,
    /// Request a page with the guard-visible cookie and report the guard's answer.
    Visit { path: String },
    /// Call an API endpoint with the stored token attached.
    Api(ApiArgs),
    /// Print the widget embed snippet.
    Widget(WidgetArgs),
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long, default_value = "-", help = "Assertion JSON file path, or - for stdin")]
    assertion: String,
}

#[derive(Args, Debug)]
struct ApiArgs {
    method: String,
    path: String,
    #[arg(long)]
    data: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SizeArg {
    Large,
    Medium,
    Small,
}

impl From<SizeArg> for ButtonSize {
    fn from(size: SizeArg) -> Self {
        match size {
            SizeArg::Large => Self::Large,
            SizeArg::Medium => Self::Medium,
            SizeArg::Small => Self::Small,
        }
    }
}

#[derive(Args, Debug)]
struct WidgetArgs {
    #[arg(long, env = "TELEGRAM_BOT_NAME")]
    bot_name: String,
    #[arg(long, value_enum, default_value = "large")]
    size: SizeArg,
    #[arg(long, default_value_t = 4)]
    radius: u8,
    #[arg(long, default_value_t = false)]
    read_only: bool,
    #[arg(long, default_value_t = false)]
    no_photo: bool,
}

struct CliContext {
    backend: Arc<HttpBackend>,
    tokens: Arc<SessionTokens>,
    nav: Arc<HistoryNavigator>,
    manager: SessionManager<HttpBackend>,
}

impl CliContext {
    fn new(cli: &Cli) -> Result<Self, CliError> {
        let backend = Arc::new(HttpBackend::new(cli.base_url.clone())?);
        let tokens = Arc::new(SessionTokens::open(&cli.state_dir));
        let nav = Arc::new(HistoryNavigator::new(&cli.page));
        let manager = SessionManager::new(backend.clone(), tokens.clone(), nav.clone(), ClientRoutes::default());
        Ok(Self { backend, tokens, nav, manager })
    }

    fn report_navigation(&self) {
        if self.nav.navigation_count() > 0 {
            eprintln!("-> {}", self.nav.current_path());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::new(&cli)?;

    let result = match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Login(args) => run_login(&ctx, args).await,
        Command::Whoami => run_whoami(&ctx).await,
        Command::Logout => ctx.manager.logout().await.map_err(CliError::from),
        Command::Visit { path } => run_visit(&ctx, &path).await,
        Command::Api(args) => run_api(&ctx, args).await,
        Command::Widget(args) => {
            run_widget(args);
            Ok(())
        }
    };
    ctx.report_navigation();
    result
}

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    let outcome = ctx.backend.visit("/healthz", None).await?;
    if outcome.status != 200 {
        return Err(CliError::Unhealthy(outcome.status));
    }
    println!("ok");
    Ok(())
}

async fn read_assertion(source: &str) -> Result<String, CliError> {
    if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin().read_to_string(&mut raw).await?;
        Ok(raw)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

async fn run_login(ctx: &CliContext, args: LoginArgs) -> Result<(), CliError> {
    let raw = read_assertion(&args.assertion).await?;

    // Feed the payload through the widget adapter, exactly as the browser
    // callback would.
    let (widget, mut events) = widget::register();
    widget.on_callback(&raw)?;
    drop(widget);
    let event = events.recv().await.ok_or(CliError::NoAssertion)?;

    let user = ctx.manager.login(event.assertion).await.inspect_err(|e| {
        eprintln!("{}", e.user_message());
    })?;
    print_json(&serde_json::to_value(&user)?)
}

async fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    match ctx.manager.initialize().await? {
        InitOutcome::Authenticated(user) => print_json(&serde_json::to_value(&user)?),
        InitOutcome::Anonymous => {
            println!("not logged in");
            Ok(())
        }
        InitOutcome::Expired => {
            println!("session expired");
            Ok(())
        }
        InitOutcome::Abandoned => Ok(()),
    }
}

async fn run_visit(ctx: &CliContext, path: &str) -> Result<(), CliError> {
    let api = ApiClient::new(ctx.backend.clone(), ctx.tokens.clone());
    let outcome = api.visit(path).await?;
    match outcome.location {
        Some(location) if outcome.is_redirect() => println!("{} -> {location}", outcome.status),
        _ => println!("{}", outcome.status),
    }
    Ok(())
}

fn parse_method(raw: &str) -> Result<reqwest::Method, CliError> {
    reqwest::Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|_| CliError::InvalidMethod(raw.to_owned()))
}

async fn run_api(ctx: &CliContext, args: ApiArgs) -> Result<(), CliError> {
    let method = parse_method(&args.method)?;
    let body = args.data.as_deref().map(serde_json::from_str::<Value>).transpose()?;

    let api = ApiClient::new(ctx.backend.clone(), ctx.tokens.clone());
    match api.request(method, &args.path, body.as_ref()).await {
        Ok(value) => print_json(&value),
        Err(e) => {
            if ctx.manager.handle_api_error(&e) {
                tracing::info!("stored session cleared");
            }
            Err(e.into())
        }
    }
}

fn run_widget(args: WidgetArgs) {
    let config = WidgetConfig {
        size: args.size.into(),
        corner_radius: args.radius,
        request_access: !args.read_only,
        show_user_photo: !args.no_photo,
        ..WidgetConfig::new(args.bot_name)
    };
    println!("{}", config.embed_html());
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
