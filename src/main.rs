use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{CommandFactory, Parser, Subcommand};
use futures::future::BoxFuture;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gateflow_core::config::{AppConfig, ReviewConfig};
use gateflow_core::error::{GateflowError, Result};
use gateflow_core::event::PendingRequest;
use gateflow_core::traits::{AnswerSource, Feedback, LlmClient};

use gateflow_agent::workflows::{self, content_pipeline, review_workflow};
use gateflow_agent::{ChatAgent, RunSummary, WorkflowDriver, WorkflowGraph};

const DEFAULT_REVIEW_PROMPT: &str =
    "Create a short launch blurb for the LumenX desk lamp. Emphasize adjustability and warm lighting.";
const DEFAULT_PIPELINE_PROMPT: &str =
    "Write a short article on how small teams can run effective remote retrospectives.";

#[derive(Parser)]
#[command(name = "gateflow", version, about = "Conditional agent workflows with human review gates")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "gateflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draft with a writer, review it yourself, then hand it to a final editor
    Review {
        /// Print streaming agent output
        #[arg(long)]
        show_updates: bool,
        /// The writing task (defaults to a product launch blurb)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Write, review, and publish content with score-based routing
    Pipeline {
        /// Print streaming agent output
        #[arg(long)]
        show_updates: bool,
        /// The writing task
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gateflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "gateflow", &mut std::io::stdout());
        return Ok(());
    }

    dotenvy::dotenv().ok();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        Commands::Review {
            show_updates,
            prompt,
        } => {
            let llm: Arc<dyn LlmClient> = Arc::from(gateflow_llm::create_client(&config.model));
            let writer = ChatAgent::new(
                workflows::WRITER,
                workflows::REVIEW_WRITER_INSTRUCTIONS,
                llm.clone(),
                config.model.clone(),
            );
            let final_editor = ChatAgent::new(
                workflows::FINAL_EDITOR,
                workflows::REVIEW_FINAL_EDITOR_INSTRUCTIONS,
                llm,
                config.model.clone(),
            );
            let graph = review_workflow(Arc::new(writer), Arc::new(final_editor), &config.review)?;

            println!("Interactive mode. When prompted, give the editor a short feedback note.");
            let printer = Arc::new(UpdatePrinter::default());
            let answers = Arc::new(StdinAnswerSource::new(config.review.clone(), printer.clone()));
            let input = prompt_or(prompt, DEFAULT_REVIEW_PROMPT);
            let show = show_updates || config.workflow.show_updates;
            match run_workflow(graph, &config, answers, &input, show.then_some(printer)).await {
                Ok(summary) => print_output(&summary),
                Err(GateflowError::Aborted) => println!("Exiting..."),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Pipeline {
            show_updates,
            prompt,
        } => {
            let llm: Arc<dyn LlmClient> = Arc::from(gateflow_llm::create_client(&config.model));
            let agent = |name: &str, instructions: &str| {
                Arc::new(ChatAgent::new(name, instructions, llm.clone(), config.model.clone()))
            };
            let graph = content_pipeline(
                agent(workflows::WRITER, workflows::PIPELINE_WRITER_INSTRUCTIONS),
                Arc::new(
                    ChatAgent::new(
                        workflows::REVIEWER,
                        workflows::PIPELINE_REVIEWER_INSTRUCTIONS,
                        llm.clone(),
                        config.model.clone(),
                    )
                    .json(),
                ),
                agent(workflows::EDITOR, workflows::PIPELINE_EDITOR_INSTRUCTIONS),
                agent(workflows::PUBLISHER, workflows::PIPELINE_PUBLISHER_INSTRUCTIONS),
                agent(workflows::SUMMARIZER, workflows::PIPELINE_SUMMARIZER_INSTRUCTIONS),
                &config.quality,
            )?;

            let input = prompt_or(prompt, DEFAULT_PIPELINE_PROMPT);
            let show = show_updates || config.workflow.show_updates;
            let printer = show.then(|| Arc::new(UpdatePrinter::default()));
            let summary = run_workflow(graph, &config, Arc::new(NoAnswers), &input, printer).await?;
            print_output(&summary);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<AppConfig> {
    let mut config = if path.exists() {
        info!(path = %path.display(), "Loading config");
        AppConfig::load(path)?
    } else {
        info!("No config file found, configuring from environment");
        AppConfig::from_env()?
    };
    gateflow_llm::apply_preset_defaults(&mut config.model);
    Ok(config)
}

fn prompt_or(words: Vec<String>, default: &str) -> String {
    if words.is_empty() {
        default.to_string()
    } else {
        words.join(" ")
    }
}

async fn run_workflow(
    graph: WorkflowGraph,
    config: &AppConfig,
    answers: Arc<dyn AnswerSource>,
    input: &str,
    printer: Option<Arc<UpdatePrinter>>,
) -> Result<RunSummary> {
    let driver = WorkflowDriver::new(Arc::new(graph), config.workflow.clone(), answers);
    driver
        .run(input, move |producer, text| {
            let Some(printer) = &printer else {
                return;
            };
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "{}", printer.render(producer, text));
            let _ = out.flush();
        })
        .await
}

/// Prefixes streamed updates with their producer whenever the producer changes.
#[derive(Default)]
struct UpdatePrinter {
    last_producer: Mutex<Option<String>>,
}

impl UpdatePrinter {
    fn render(&self, producer: &str, text: &str) -> String {
        let mut last = self
            .last_producer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out = String::new();
        if last.as_deref() != Some(producer) {
            if last.is_some() {
                out.push('\n');
            }
            out.push_str(producer);
            out.push_str(": ");
            *last = Some(producer.to_string());
        }
        out.push_str(text);
        out
    }

    /// Forget the current producer so the next pass starts with a fresh prefix.
    fn end_pass(&self) {
        *self
            .last_producer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

fn print_output(summary: &RunSummary) {
    println!("\n===== Final output =====");
    println!("{}", summary.output.text.trim());
    println!("\nWorkflow completed.");
}

/// Asks the human on the terminal for feedback on each pending draft.
struct StdinAnswerSource {
    review: ReviewConfig,
    printer: Arc<UpdatePrinter>,
}

impl StdinAnswerSource {
    fn new(review: ReviewConfig, printer: Arc<UpdatePrinter>) -> Self {
        Self { review, printer }
    }
}

impl AnswerSource for StdinAnswerSource {
    fn answer<'a>(&'a self, requests: &'a [PendingRequest]) -> BoxFuture<'a, Result<Feedback>> {
        self.printer.end_pass();
        let requests = requests.to_vec();
        let review = self.review.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || ask_reviewer(&requests, &review))
                .await
                .map_err(|e| GateflowError::InvalidState(format!("feedback prompt panicked: {}", e)))?
        })
    }
}

fn ask_reviewer(requests: &[PendingRequest], review: &ReviewConfig) -> Result<Feedback> {
    let mut answers = HashMap::new();
    for request in requests {
        println!("\n----- Writer draft -----");
        println!("{}", request.payload.draft_text.trim());
        println!("\n{}", request.payload.prompt);
        println!(
            "Type '{}' to accept the draft, or '{}' to exit.",
            review.approval_keyword, review.abandon_keyword
        );
        let answer: String = dialoguer::Input::new()
            .with_prompt("Human feedback")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| GateflowError::Io(std::io::Error::other(e)))?;
        if review.is_abandon(&answer) {
            return Ok(Feedback::Abandon);
        }
        answers.insert(request.request_id.clone(), answer.trim().to_string());
    }
    Ok(Feedback::Answers(answers))
}

/// Answer source for workflows without a human gate.
struct NoAnswers;

impl AnswerSource for NoAnswers {
    fn answer<'a>(&'a self, requests: &'a [PendingRequest]) -> BoxFuture<'a, Result<Feedback>> {
        let count = requests.len();
        Box::pin(async move {
            Err(GateflowError::InvalidState(format!(
                "workflow requested input for {} request(s) but has no reviewer",
                count
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_only_on_producer_change() {
        let printer = UpdatePrinter::default();
        assert_eq!(printer.render("writer", "Meet "), "writer: Meet ");
        assert_eq!(printer.render("writer", "LumenX"), "LumenX");
        assert_eq!(printer.render("final_editor", "Final"), "\nfinal_editor: Final");
    }

    #[test]
    fn test_prefix_restored_after_pause() {
        let printer = UpdatePrinter::default();
        printer.render("writer", "D1");
        printer.end_pass();
        assert_eq!(printer.render("writer", "D2"), "writer: D2");
    }
}
