use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_feed::cli_style::{
    get_styles, print_error, print_success, print_warning, Painter,
};
use notification_feed::client::{HttpNotificationApi, NotificationApi};
use notification_feed::config::{AppConfig, CliConfig, FileConfig};
use notification_feed::notifications::{
    FeedEngine, NotificationId, ReloadPolicy, ServerStatus, MAX_FEED_SIZE,
};
use notification_feed::presenter::TerminalPresenter;
use notification_feed::session::FeedSession;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(
    styles = get_styles(),
    version = env!("APP_VERSION"),
    long_version = concat!(env!("APP_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Follow the notification feed of a video site from the terminal"
)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Base URL of the site, e.g. http://localhost:8000.
    #[clap(long, global = true)]
    pub base_url: Option<String>,

    /// Id of the logged-in user, used to derive the push channel URL.
    #[clap(long, global = true)]
    pub user_id: Option<String>,

    /// Explicit push channel URL (ws:// or wss://).
    #[clap(long, global = true)]
    pub push_url: Option<String>,

    /// Path of the notifications endpoints under the base URL.
    #[clap(long, global = true, default_value = "/notifications/")]
    pub notifications_path: String,

    /// Session cookie as name=value.
    #[clap(long, global = true)]
    pub session_cookie: Option<String>,

    /// Name of the cookie holding the CSRF token.
    #[clap(long, global = true, default_value = "csrftoken")]
    pub csrf_cookie_name: String,

    /// Fixed CSRF token, used instead of the cookie.
    #[clap(long, global = true)]
    pub csrf_token: Option<String>,

    /// Timeout in seconds for REST requests. No timeout when omitted.
    #[clap(long, global = true)]
    pub request_timeout_sec: Option<u64>,

    /// Maximum number of notifications kept in the feed.
    #[clap(long, global = true, default_value_t = MAX_FEED_SIZE)]
    pub capacity: usize,

    /// What a reload does with live notifications missing from its answer.
    #[clap(long, global = true, value_enum, default_value = "last-writer-wins")]
    pub reload_policy: ReloadPolicy,

    /// Disable colored output.
    #[clap(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the feed, then print live notifications until interrupted.
    Watch {
        /// Open the feed on start, marking everything as read.
        #[clap(long)]
        open: bool,
    },

    /// Print the current feed and exit.
    List,

    /// Mark one notification as read.
    MarkRead { id: String },

    /// Mark all notifications as read.
    MarkAllRead,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            base_url: self.base_url.clone(),
            user_id: self.user_id.clone(),
            push_url: self.push_url.clone(),
            notifications_path: self.notifications_path.clone(),
            session_cookie: self.session_cookie.clone(),
            csrf_cookie_name: self.csrf_cookie_name.clone(),
            csrf_token: self.csrf_token.clone(),
            request_timeout_sec: self.request_timeout_sec,
            capacity: self.capacity,
            reload_policy: self.reload_policy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    let color = !cli_args.no_color && std::io::stdout().is_terminal();
    let painter = Painter::new(color);

    let api = HttpNotificationApi::new(config.api_settings())
        .context("Failed to create notifications client")?;

    match cli_args.command {
        Command::Watch { open } => watch(&config, api, color, open).await,
        Command::List => list(&config, &api, color).await,
        Command::MarkRead { id } => mark_read(&api, &id, painter).await,
        Command::MarkAllRead => mark_all_read(&api, painter).await,
    }
}

async fn watch(config: &AppConfig, api: HttpNotificationApi, color: bool, open: bool) -> Result<()> {
    let push = config.push_channel();
    match &push {
        Some(channel) => info!("Live updates from {}", channel.url()),
        None => print_warning(
            Painter::new(color),
            "No user id or push URL configured, live updates disabled",
        ),
    }

    let (session, handle) = FeedSession::new(FeedEngine::new(config.feed), Arc::new(api), push);
    let presenter = TerminalPresenter::new(color);
    let presenter_task = tokio::spawn(presenter.run(handle.subscribe()));
    let session_task = tokio::spawn(session.run());

    if open {
        handle.settled().await?;
        handle.open_feed().await?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for interrupt")?;
    info!("Interrupted, closing the feed");
    handle.shutdown();
    session_task.await.context("Feed session panicked")?;
    // The presenter drains remaining events once the last sender is gone.
    drop(handle);
    let _ = presenter_task.await;
    Ok(())
}

async fn list(config: &AppConfig, api: &HttpNotificationApi, color: bool) -> Result<()> {
    let notifications = api
        .fetch_notifications()
        .await
        .context("Failed to fetch notifications")?;

    let mut engine = FeedEngine::new(config.feed);
    engine.load_historical(notifications);

    let presenter = TerminalPresenter::new(color);
    println!(
        "{}",
        presenter.render_feed(&engine.snapshot(), engine.unread_count(), Utc::now())
    );
    Ok(())
}

async fn mark_read(api: &HttpNotificationApi, id: &str, painter: Painter) -> Result<()> {
    let id = NotificationId::parse(id);
    let Some(server_id) = id.server_id() else {
        bail!("{} only exists inside a running feed", id);
    };
    match api.mark_as_read(server_id).await {
        Ok(ServerStatus::Success) => {
            print_success(painter, &format!("Notification {} marked as read", id))
        }
        Ok(ServerStatus::Noop) => {
            print_warning(painter, &format!("Notification {} was already read", id))
        }
        Err(e) => {
            print_error(painter, &format!("Could not mark notification {} as read", id));
            return Err(e.into());
        }
    }
    Ok(())
}

async fn mark_all_read(api: &HttpNotificationApi, painter: Painter) -> Result<()> {
    match api.mark_all_as_read().await {
        Ok(ServerStatus::Success) => print_success(painter, "All notifications marked as read"),
        Ok(ServerStatus::Noop) => print_warning(painter, "No unread notifications"),
        Err(e) => {
            print_error(painter, "Could not mark notifications as read");
            return Err(e.into());
        }
    }
    Ok(())
}
