use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use consulta_core::{
    Consultation, ConsultationGateway, ConsultationStatus, FieldPath, ListQuery, SectionRefreshBus,
    SolucaoEtapa,
};
use consulta_sync::{AutoCancelSweep, DetailSync, SyncConfig};
use consulta_workflow::{
    AdvanceOutcome, AiEditSession, FieldEditCoordinator, GenerationDispatch, LoggingNotifier,
    StageAdvancer, WorkflowConfig,
};
use gateway_client::GatewayClient;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "consultas")]
#[command(about = "Browse and drive consultations through the clinical workflow")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List consultations
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Free-text search
        #[arg(long)]
        search: Option<String>,

        /// Filter by status, e.g. VALID_ANAMNESE
        #[arg(long)]
        status: Option<ConsultationStatus>,
    },

    /// Show one consultation and the screen it resolves to
    Show { id: String },

    /// Follow a consultation until interrupted or polling stops
    Watch { id: String },

    /// Advance to the diagnosis or solution stage
    Advance { id: String, stage: Stage },

    /// Open a solution track (MENTALIDADE, SUPLEMENTACAO, ALIMENTACAO, ATIVIDADE_FISICA)
    SelectTrack { id: String, track: SolucaoEtapa },

    /// Move to the next solution track
    NextTrack { id: String },

    /// Move to the previous solution track
    PreviousTrack { id: String },

    /// Leave the open track and return to track selection
    BackToSelection { id: String },

    /// Mark a consultation completed
    Complete { id: String },

    /// Save a single clinical field; the value is parsed as JSON, or taken as text
    EditField { id: String, path: String, value: String },

    /// Ask the AI to rewrite a clinical field
    AiEdit {
        id: String,
        path: String,
        instruction: String,
    },

    /// Cancel scheduled teleconsultations whose day has passed
    Sweep {
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },

    /// Delete a consultation
    Delete { id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Stage {
    Diagnosis,
    Solution,
}

#[tokio::main]
async fn main() -> CliResult {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let gateway = Arc::new(GatewayClient::from_env()?);

    match cli.command {
        Command::List {
            page,
            limit,
            search,
            status,
        } => {
            let query = ListQuery {
                page,
                limit,
                search,
                status,
                ..ListQuery::default()
            };
            list(gateway, &query).await
        }
        Command::Show { id } => {
            let consultation = gateway.get_consultation(&id).await?;
            print_consultation(&consultation);
            Ok(())
        }
        Command::Watch { id } => watch(gateway, &id).await,
        Command::Advance { id, stage } => {
            let advancer = advancer(gateway.clone());
            let consultation = gateway.get_consultation(&id).await?;
            let outcome = match stage {
                Stage::Diagnosis => advancer.advance_to_diagnosis(&consultation).await?,
                Stage::Solution => advancer.advance_to_solution(&consultation).await?,
            };
            print_outcome(&outcome);
            Ok(())
        }
        Command::SelectTrack { id, track } => {
            let consultation = gateway.get_consultation(&id).await?;
            let outcome = advancer(gateway).select_track(&consultation, track).await?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::NextTrack { id } => {
            let consultation = gateway.get_consultation(&id).await?;
            let outcome = advancer(gateway).next_track(&consultation).await?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::PreviousTrack { id } => {
            let consultation = gateway.get_consultation(&id).await?;
            let outcome = advancer(gateway).previous_track(&consultation).await?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::BackToSelection { id } => {
            let consultation = gateway.get_consultation(&id).await?;
            let outcome = advancer(gateway).return_to_selection(&consultation).await?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::Complete { id } => {
            let consultation = gateway.get_consultation(&id).await?;
            let outcome = advancer(gateway).complete(&consultation).await?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::EditField { id, path, value } => edit_field(gateway, &id, &path, value).await,
        Command::AiEdit {
            id,
            path,
            instruction,
        } => ai_edit(gateway, &id, &path, &instruction).await,
        Command::Sweep { limit } => sweep(gateway, limit).await,
        Command::Delete { id } => {
            gateway.delete_consultation(&id).await?;
            info!(consultation_id = %id, "Consultation deleted");
            Ok(())
        }
    }
}

fn advancer(gateway: Arc<GatewayClient>) -> StageAdvancer<GatewayClient> {
    StageAdvancer::new(gateway).with_notifier(Arc::new(LoggingNotifier))
}

async fn list(gateway: Arc<GatewayClient>, query: &ListQuery) -> CliResult {
    let page = gateway.list_consultations(query).await?;
    for consultation in &page.consultations {
        println!(
            "{:<38} {:<18} {:<12} {:<24} {}",
            consultation.id,
            consultation.status.as_str(),
            consultation.etapa.map(|etapa| etapa.as_str()).unwrap_or("-"),
            consultation.screen().as_str(),
            consultation.duration_label()
        );
    }
    match page.total {
        Some(total) => println!("page {} ({} of {} total)", page.page, page.consultations.len(), total),
        None => println!("page {} ({} rows)", page.page, page.consultations.len()),
    }
    Ok(())
}

async fn watch(gateway: Arc<GatewayClient>, id: &str) -> CliResult {
    let mut detail = DetailSync::new(gateway, SyncConfig::from_env()?);
    let first = detail.open(id).await?;
    print_consultation(&first);

    let mut rx = detail.subscribe();
    let mut check = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = rx.borrow_and_update().as_ref().cloned();
                if let Some(consultation) = current {
                    print_consultation(&consultation);
                }
            }
            _ = check.tick() => {
                if !detail.is_polling() {
                    warn!(consultation_id = %id, "Polling stopped");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    detail.close();
    Ok(())
}

async fn edit_field(gateway: Arc<GatewayClient>, id: &str, path: &str, raw: String) -> CliResult {
    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    let coordinator =
        FieldEditCoordinator::new(gateway, id).with_notifier(Arc::new(LoggingNotifier));

    let section = coordinator.save_field(path, value).await?;
    if let Some(doc) = coordinator.section(section).await {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }
    Ok(())
}

async fn ai_edit(gateway: Arc<GatewayClient>, id: &str, path: &str, instruction: &str) -> CliResult {
    let config = WorkflowConfig::from_env()?;
    let bus = SectionRefreshBus::new();
    let coordinator = Arc::new(FieldEditCoordinator::new(gateway.clone(), id));
    let listener = coordinator.refresh_listener(&bus);

    let mut session = AiEditSession::new(gateway, bus.clone(), config.clone(), id);
    let section = session.select_field(path)?.section();
    let reply = session.send(instruction).await?;
    println!("{}", reply);

    // Wait for the delayed refresh to land before printing the section.
    tokio::time::sleep(config.ai_refresh_delay + Duration::from_millis(500)).await;
    listener.abort();

    if let Some(doc) = coordinator.section(section).await {
        let field = FieldPath::parse(path)?;
        println!("{}: {}", field, serde_json::to_string_pretty(&doc)?);
    }
    Ok(())
}

async fn sweep(gateway: Arc<GatewayClient>, limit: u32) -> CliResult {
    let query = ListQuery {
        limit,
        ..ListQuery::default()
    };
    let page = gateway.list_consultations(&query).await?;
    let report = AutoCancelSweep::new(gateway).run(&page.consultations).await;

    for consultation in &report.cancelled {
        println!("cancelled {}", consultation.id);
    }
    for (id, e) in &report.failed {
        println!("failed    {}: {}", id, e);
    }
    if report.is_empty() {
        println!("nothing to cancel");
    }
    Ok(())
}

fn print_consultation(consultation: &Consultation) {
    println!("id:        {}", consultation.id);
    println!("status:    {}", consultation.status);
    if let Some(etapa) = consultation.etapa {
        println!("etapa:     {}", etapa);
    }
    if let Some(track) = consultation.solucao_etapa {
        println!("track:     {}", track);
    }
    println!("screen:    {}", consultation.screen());
    if let Some(message) = consultation.phase().processing_message() {
        println!("           {}", message);
    }
    println!("duration:  {}", consultation.duration_label());
}

fn print_outcome(outcome: &AdvanceOutcome) {
    match outcome {
        AdvanceOutcome::Advanced(change) => {
            print_consultation(&change.consultation);
            match &change.generation {
                GenerationDispatch::NotRequired => {}
                GenerationDispatch::Dispatched => println!("generation requested"),
                GenerationDispatch::Failed(reason) => println!("generation not started: {}", reason),
            }
        }
        AdvanceOutcome::Blocked { reason } => println!("blocked: {}", reason),
        AdvanceOutcome::Unchanged => println!("nothing to do"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "consultas", "list", "--page", "2", "--status", "valid_solucao", "--search", "ana",
        ])
        .unwrap();

        match cli.command {
            Command::List {
                page,
                limit,
                search,
                status,
            } => {
                assert_eq!(page, 2);
                assert_eq!(limit, 20);
                assert_eq!(search.as_deref(), Some("ana"));
                assert_eq!(status, Some(ConsultationStatus::ValidSolucao));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_workflow_commands() {
        let cli = Cli::try_parse_from(["consultas", "advance", "c-1", "solution"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Advance {
                stage: Stage::Solution,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["consultas", "select-track", "c-1", "ATIVIDADE_FISICA"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::SelectTrack {
                track: SolucaoEtapa::AtividadeFisica,
                ..
            }
        ));

        assert!(Cli::try_parse_from(["consultas", "select-track", "c-1", "YOGA"]).is_err());
        assert!(Cli::try_parse_from(["consultas", "advance", "c-1", "anamnesis"]).is_err());
    }
}
