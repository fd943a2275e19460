use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use leadflow::error::AppError;
use leadflow::funnel::{
    Advance, AnswerValue, DispatchSettings, FunnelDefinition, FunnelSession, HttpWebhookTransport,
    InMemoryMarketingBus, StepKind, SubmissionDispatcher,
};
use leadflow::server::{
    InMemoryConversionStore, InMemoryLeadStore, LoggingMailer, ServeOverrides,
};

#[derive(Parser, Debug)]
#[command(
    name = "leadflow",
    about = "Run the step-form funnel engine or simulate a funnel session from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Funnel utilities for demos and debugging
    Funnel {
        #[command(subcommand)]
        command: FunnelCommand,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum FunnelCommand {
    /// Walk a funnel definition end to end and print the dispatch report
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Path to a funnel definition JSON file
    #[arg(long)]
    definition: PathBuf,
    /// Option text to pick at each question step, in encounter order
    #[arg(long = "choose")]
    choices: Vec<String>,
    /// Form answer as a field=value pair (repeatable)
    #[arg(long = "answer")]
    answers: Vec<String>,
    /// Landing page URL used for UTM attribution
    #[arg(long)]
    page_url: Option<String>,
    /// Deliver the submission to this webhook as well
    #[arg(long)]
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => {
            leadflow::server::run(ServeOverrides {
                host: args.host,
                port: args.port,
            })
            .await
        }
        Command::Funnel {
            command: FunnelCommand::Simulate(args),
        } => run_simulate(args).await,
    }
}

async fn run_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.definition)?;
    let definition: FunnelDefinition = serde_json::from_str(&raw)
        .map_err(|err| AppError::Simulation(format!("invalid funnel definition: {err}")))?;
    let definition = Arc::new(definition);

    let mut session = FunnelSession::start(definition.clone())
        .map_err(|err| AppError::Simulation(err.to_string()))?;

    for pair in &args.answers {
        let (field, value) = pair
            .split_once('=')
            .ok_or_else(|| AppError::Simulation(format!("answer '{pair}' is not field=value")))?;
        session.record_answer(field.to_string(), AnswerValue::text(value));
    }

    let leads = Arc::new(InMemoryLeadStore::default());
    let conversions = Arc::new(InMemoryConversionStore::default());
    let marketing = Arc::new(InMemoryMarketingBus::default());
    let dispatcher = SubmissionDispatcher::new(
        leads.clone(),
        conversions.clone(),
        Arc::new(HttpWebhookTransport::default()),
        Arc::new(LoggingMailer),
        marketing.clone(),
        DispatchSettings {
            webhook_url: args.webhook_url.clone(),
            redirect_url: None,
            settle: Duration::ZERO,
        },
    );

    let mut choices = args.choices.iter();
    // One pass per step plus slack; a malformed graph must not loop forever.
    let mut budget = definition.steps.len() + 1;

    loop {
        if budget == 0 {
            return Err(AppError::Simulation(
                "funnel did not reach a form step within the step budget".to_string(),
            ));
        }
        budget -= 1;

        let step = session
            .current_step()
            .ok_or_else(|| {
                AppError::Simulation(format!(
                    "current step {} is missing from the definition",
                    session.current_step_id()
                ))
            })?
            .clone();

        println!("step {} [{}]", step.id, step.title());

        match &step.kind {
            StepKind::Question { .. } => {
                let choice = choices.next().ok_or_else(|| {
                    AppError::Simulation(format!("no --choose left for question step {}", step.id))
                })?;
                session.record_answer(step.id.clone(), AnswerValue::text(choice.clone()));
                match session.advance(Some(choice.as_str())) {
                    Advance::Moved(next) => println!("  chose '{choice}' -> {next}"),
                    Advance::External(url) => {
                        println!("  chose '{choice}' -> external {url}");
                        return Ok(());
                    }
                    Advance::DeadEnd => {
                        println!("  no next step from '{choice}'; staying on {}", step.id);
                        return Ok(());
                    }
                }
            }
            StepKind::Form { .. } => {
                let receipt = dispatcher
                    .dispatch(
                        &definition,
                        &step.id,
                        session.answers(),
                        leadflow::funnel::PageContext {
                            page_url: args.page_url.clone(),
                            referrer: None,
                            user_agent: Some("leadflow-simulate".to_string()),
                        },
                        None,
                    )
                    .await
                    .map_err(|err| AppError::Simulation(err.to_string()))?;

                println!(
                    "submission {}",
                    serde_json::to_string_pretty(&receipt)
                        .map_err(|err| AppError::Simulation(err.to_string()))?
                );
                println!("leads stored: {}", leads.leads().len());
                println!("conversion events: {}", conversions.events().len());
                println!("marketing events: {}", marketing.events().len());
                return Ok(());
            }
            _ => match session.advance(None) {
                Advance::Moved(next) => println!("  -> {next}"),
                Advance::External(url) => {
                    println!("  -> external {url}");
                    return Ok(());
                }
                Advance::DeadEnd => {
                    println!("  dead end; staying on {}", step.id);
                    return Ok(());
                }
            },
        }
    }
}
