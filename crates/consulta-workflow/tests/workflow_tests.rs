//! Integration tests for consulta-workflow against the in-memory gateway.

use std::sync::Arc;

use consulta_core::{
    Consultation, ConsultationGateway, ConsultationStatus, Etapa, Screen, Section, SolucaoEtapa,
    DIAGNOSIS_TABLES,
};
use consulta_workflow::{
    AdvanceOutcome, FieldEditCoordinator, GenerationDispatch, NoticeLevel, RecordingNotifier,
    StageAdvancer,
};
use mock_gateway::MockGateway;
use serde_json::json;

fn in_diagnosis() -> Consultation {
    Consultation::new("c-1", ConsultationStatus::ValidDiagnostico)
        .with_etapa(Etapa::Diagnostico)
        .with_parties("p-1", "d-1")
}

mod advance_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_advance_never_regenerates() {
        let seed = Consultation::new("c-1", ConsultationStatus::ValidAnamnese)
            .with_etapa(Etapa::Anamnese)
            .with_parties("p-1", "d-1");
        let gateway = Arc::new(MockGateway::new().with_consultation(seed.clone()));
        gateway.set_section("c-1", Section::Diagnostico, json!({"d_estado_geral": {"resumo": "ok"}}));
        let advancer = StageAdvancer::new(gateway.clone());

        let first = advancer.advance_to_diagnosis(&seed).await.unwrap();
        let after_first = first.change().unwrap().consultation.clone();
        let second = advancer.advance_to_diagnosis(&after_first).await.unwrap();

        assert!(gateway.generation_requests().is_empty());
        assert_eq!(
            first.change().unwrap().consultation.etapa,
            second.change().unwrap().consultation.etapa
        );
        assert_eq!(second.screen(), Some(Screen::Diagnostico));
    }

    #[tokio::test]
    async fn test_intake_gate() {
        let gateway = Arc::new(MockGateway::new().with_consultation(in_diagnosis()));
        let notifier = Arc::new(RecordingNotifier::new());
        let advancer = StageAdvancer::new(gateway.clone()).with_notifier(notifier.clone());

        let blocked = advancer.advance_to_solution(&in_diagnosis()).await.unwrap();
        assert!(matches!(blocked, AdvanceOutcome::Blocked { .. }));
        assert_eq!(notifier.at_level(NoticeLevel::Warning).len(), 1);
        assert_eq!(gateway.consultation("c-1").unwrap().etapa, Some(Etapa::Diagnostico));

        gateway.set_intake("p-1", "preenchida");
        let advanced = advancer.advance_to_solution(&in_diagnosis()).await.unwrap();
        let change = advanced.change().unwrap();
        assert_eq!(change.consultation.etapa, Some(Etapa::Solucao));
        assert_eq!(change.generation, GenerationDispatch::Dispatched);
        assert_eq!(change.screen, Screen::ProcessingScreen);
    }

    #[tokio::test]
    async fn test_diagnosis_to_track_walkthrough() {
        let gateway = Arc::new(MockGateway::new().with_consultation(in_diagnosis()));
        gateway.set_section("c-1", Section::Diagnostico, json!({"d_estado_geral": {"resumo": "ok"}}));
        gateway.set_section(
            "c-1",
            Section::Solucao(SolucaoEtapa::Mentalidade),
            json!({"mentalidade": {"foco": "sono"}}),
        );
        gateway.set_section(
            "c-1",
            Section::Solucao(SolucaoEtapa::Alimentacao),
            json!({"alimentacao": {"refeicoes": [{"descricao": "aveia"}]}}),
        );
        let advancer = StageAdvancer::new(gateway.clone());

        let seed = gateway.get_consultation("c-1").await.unwrap();
        assert_eq!(seed.screen(), Screen::Diagnostico);

        let outcome = advancer.advance_to_solution(&seed).await.unwrap();
        assert_eq!(outcome.screen(), Some(Screen::SelectSolucao));
        let selecting = outcome.change().unwrap().consultation.clone();
        assert_eq!(selecting.etapa, Some(Etapa::Solucao));
        assert_eq!(selecting.solucao_etapa, None);

        let outcome = advancer
            .select_track(&selecting, SolucaoEtapa::Alimentacao)
            .await
            .unwrap();
        assert_eq!(outcome.screen(), Some(Screen::SolucaoAlimentacao));

        let stored = gateway.consultation("c-1").unwrap();
        assert_eq!(stored.status, ConsultationStatus::ValidSolucao);
        assert_eq!(stored.solucao_etapa, Some(SolucaoEtapa::Alimentacao));
        assert!(gateway.generation_requests().is_empty());
    }
}

mod edit_tests {
    use super::*;

    #[tokio::test]
    async fn test_diagnosis_tables_route_to_diagnosis_endpoint() {
        let gateway = Arc::new(MockGateway::new());
        let coordinator = FieldEditCoordinator::new(gateway.clone(), "c-1");

        for table in DIAGNOSIS_TABLES {
            let section = coordinator
                .save_field(&format!("{}.resumo", table), json!("texto"))
                .await
                .unwrap();
            assert_eq!(section, Section::Diagnostico);
        }

        let updates = gateway.field_updates();
        assert_eq!(updates.len(), DIAGNOSIS_TABLES.len());
        assert!(updates
            .iter()
            .all(|(id, update)| id == "c-1" && update.section == Section::Diagnostico));
        assert!(updates.iter().all(|(_, update)| update.solucao_etapa.is_none()));
    }
}
