use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use peer_eval_forms::models::load_settings;
use peer_eval_forms::utils::logging;
use peer_eval_forms::models::FormNotification;
use peer_eval_forms::{Config, GenerationSettings, GoogleApp, SubmissionEvent};

#[derive(Debug, Parser)]
#[command(name = "peer-eval")]
#[command(about = "Generate peer-evaluation forms for classroom groups and route their submissions.")]
struct Cli {
    /// TOML config file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check settings against the sheet, Drive and Classroom without changing anything.
    Preview(SettingsArgs),
    /// Create the peer table, one form per group and the Classroom assignments.
    Generate {
        #[command(flatten)]
        settings: SettingsArgs,
        /// Remove every previously registered submit handler first.
        #[arg(long)]
        replace_handlers: bool,
    },
    /// Route one form submission event (JSON) into the peer table.
    Route {
        event: PathBuf,
    },
    /// Fetch one form response by id and route it.
    RouteResponse {
        form_id: String,
        response_id: String,
    },
    /// Route the responses behind a Pub/Sub push notification (JSON body) from a form watch.
    RouteNotification {
        notification: PathBuf,
    },
    /// Manage registered submit handlers.
    #[command(subcommand)]
    Handlers(HandlersCommand),
    /// Save or show the default settings.
    #[command(subcommand)]
    Defaults(DefaultsCommand),
}

#[derive(Debug, Parser)]
struct SettingsArgs {
    /// Settings TOML file. Falls back to the saved defaults.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum HandlersCommand {
    List {
        /// Only the handler ids registered for this form.
        #[arg(long)]
        form: Option<String>,
    },
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    DeleteAll,
}

#[derive(Debug, Subcommand)]
enum DefaultsCommand {
    Save { settings: PathBuf },
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    let app = GoogleApp::initialize(config)?;

    match cli.command {
        Command::Preview(args) => {
            let settings = resolve_settings(&app, args.settings.as_deref()).await?;
            print_json(&app.preview(&settings).await)?;
        }
        Command::Generate {
            settings,
            replace_handlers,
        } => {
            let settings = resolve_settings(&app, settings.settings.as_deref()).await?;
            print_json(&app.generate(&settings, replace_handlers).await)?;
        }
        Command::Route { event } => {
            let content = tokio::fs::read_to_string(&event)
                .await
                .with_context(|| format!("cannot read event {}", event.display()))?;
            let event: SubmissionEvent = serde_json::from_str(&content)
                .with_context(|| format!("cannot parse event {}", event.display()))?;
            app.route_submission(&event).await;
        }
        Command::RouteResponse {
            form_id,
            response_id,
        } => app.route_response(&form_id, &response_id).await,
        Command::RouteNotification { notification } => {
            let content = tokio::fs::read_to_string(&notification)
                .await
                .with_context(|| format!("cannot read notification {}", notification.display()))?;
            let parsed: FormNotification = serde_json::from_str(&content)
                .with_context(|| format!("cannot parse notification {}", notification.display()))?;
            let routed = app.route_notification(&parsed).await;
            println!("routed {routed} response(s)");
        }
        Command::Handlers(HandlersCommand::List { form: None }) => {
            print_json(&app.list_handlers().await?)?
        }
        Command::Handlers(HandlersCommand::List { form: Some(form_id) }) => {
            print_json(&app.handlers_for_form(&form_id).await?)?
        }
        Command::Handlers(HandlersCommand::Delete { ids }) => {
            print_json(&app.delete_handlers(&ids).await)?
        }
        Command::Handlers(HandlersCommand::DeleteAll) => {
            print_json(&app.delete_all_handlers().await)?
        }
        Command::Defaults(DefaultsCommand::Save { settings }) => {
            let settings = load_settings(&settings).await?;
            print_json(&app.save_defaults(&settings).await)?;
        }
        Command::Defaults(DefaultsCommand::Show) => print_json(&app.load_defaults().await)?,
    }

    Ok(())
}

async fn resolve_settings(app: &GoogleApp, path: Option<&Path>) -> Result<GenerationSettings> {
    match path {
        Some(path) => Ok(load_settings(path).await?),
        None => Ok(app.load_defaults().await),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
