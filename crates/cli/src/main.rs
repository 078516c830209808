use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use consult_core::{
    AzureOpenAiBackend, ConsultationService, NonEmptyText, ProtocolFrame, UpstreamConfig,
    VisitRequest,
};

#[derive(Parser)]
#[command(name = "consult")]
#[command(about = "Consultation summary CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the upstream provider configuration
    CheckConfig,
    /// Print the prompt a visit would be summarised with
    Prompt(VisitArgs),
    /// Stream a visit summary to the terminal
    Summarise(VisitArgs),
}

#[derive(Args)]
struct VisitArgs {
    /// Patient name
    #[arg(long)]
    patient_name: String,
    /// Date of visit
    #[arg(long)]
    date_of_visit: String,
    /// Visit notes
    #[arg(long, conflicts_with = "notes_file", required_unless_present = "notes_file")]
    notes: Option<String>,
    /// Read visit notes from a file
    #[arg(long)]
    notes_file: Option<PathBuf>,
}

impl VisitArgs {
    fn into_visit(self) -> Result<VisitRequest, Box<dyn Error>> {
        let notes = match (self.notes, self.notes_file) {
            (Some(notes), _) => notes,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?,
            (None, None) => return Err("one of --notes or --notes-file is required".into()),
        };

        Ok(VisitRequest::new(
            NonEmptyText::new(self.patient_name).map_err(|e| format!("patient name: {e}"))?,
            NonEmptyText::new(self.date_of_visit).map_err(|e| format!("date of visit: {e}"))?,
            NonEmptyText::new(notes).map_err(|e| format!("notes: {e}"))?,
        ))
    }
}

/// Terminal text for a frame. Spacers restore the line break between segments.
fn frame_text(frame: &ProtocolFrame) -> Option<&str> {
    match frame {
        ProtocolFrame::Data(text) => Some(text.as_str()),
        ProtocolFrame::Spacer => Some("\n"),
        _ => None,
    }
}

fn service() -> Result<ConsultationService, Box<dyn Error>> {
    let backend = AzureOpenAiBackend::new()?;
    Ok(ConsultationService::new(
        Arc::new(UpstreamConfig::from_env()),
        Arc::new(backend),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => match UpstreamConfig::from_env().validate() {
            Ok(target) => {
                println!("Upstream configuration OK");
                println!("Deployment: {}", target.deployment());
                println!("Endpoint: {}", target.endpoint());
                println!("API version: {}", target.api_version());
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Prompt(args)) => {
            let visit = args.into_visit()?;
            let prompt = service()?.preview_prompt(&visit);
            println!("--- system ---");
            println!("{}", prompt.system_instructions);
            println!("--- user ---");
            println!("{}", prompt.user_content);
        }
        Some(Commands::Summarise(args)) => {
            let visit = args.into_visit()?;
            let mut frames = service()?.summarise(visit)?;

            let mut stdout = std::io::stdout();
            while let Some(frame) = frames.next().await {
                if let ProtocolFrame::Error(message) = &frame {
                    println!();
                    eprintln!("Error: {}", message);
                    std::process::exit(1);
                }
                if let Some(text) = frame_text(&frame) {
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
            }
            println!();
        }
        None => {
            println!("Use 'consult --help' for commands");
        }
    }

    Ok(())
}
