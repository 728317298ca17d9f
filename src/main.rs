use std::process;

use postkeep::{
    application::{error::AppError, posts::PostService},
    config::{self, Command},
    infra::{bootstrap, telemetry},
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %report.chain(), source = report.source, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report.chain(), source = report.source, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Bootstrap => run_bootstrap(&settings).await,
        command => {
            let service = bootstrap::build_service(&settings).await?;
            run_post_command(&service, command).await
        }
    }
}

async fn run_bootstrap(settings: &config::Settings) -> Result<(), AppError> {
    info!(
        target = "postkeep::bootstrap",
        backend = settings.storage.backend.as_str(),
        "Bootstrapping storage"
    );
    bootstrap::bootstrap_storage(settings).await?;
    print_json(&serde_json::json!({ "bootstrapped": settings.storage.backend.as_str() }))
}

#[derive(Serialize)]
struct UpdatedView<'a> {
    user_id: &'a str,
    post_id: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

#[derive(Serialize)]
struct DeletedView<'a> {
    user_id: &'a str,
    post_id: &'a str,
    deleted: bool,
}

async fn run_post_command(service: &PostService, command: Command) -> Result<(), AppError> {
    match command {
        Command::Create(args) => {
            let record = service.create(&args.user_id, &args.data).await?;
            print_json(&record)
        }
        Command::Read(args) => {
            let record = service.read(&args.user_id, &args.post_id).await?;
            print_json(&record)
        }
        Command::List(args) => {
            let records = service.read_all(&args.user_id).await?;
            print_json(&records)
        }
        Command::Update(args) => {
            let updated_at = service
                .update(&args.post.user_id, &args.post.post_id, &args.data)
                .await?;
            print_json(&UpdatedView {
                user_id: &args.post.user_id,
                post_id: &args.post.post_id,
                updated_at,
            })
        }
        Command::Delete(args) => {
            service.delete(&args.user_id, &args.post_id).await?;
            print_json(&DeletedView {
                user_id: &args.user_id,
                post_id: &args.post_id,
                deleted: true,
            })
        }
        Command::Bootstrap => Err(AppError::unexpected(
            "bootstrap is not a post command",
        )),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
