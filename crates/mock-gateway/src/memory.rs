//! In-memory gateway with call recording and failure injection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use consulta_core::{
    async_trait, section_has_data, AiEditRequest, Consultation, ConsultationGateway,
    ConsultationPage, ConsultationPatch, ConsultationStatus, FieldPath, FieldUpdate,
    FieldUpdateResult, GatewayError, GenerationRequest, ListQuery, PathSegment, PatientIntake,
    Section,
};
use indexmap::IndexMap;
use serde_json::{json, Value};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    List(ListQuery),
    Get(String),
    Update(String, ConsultationPatch),
    Delete(String),
    GetSection(String, Section),
    UpdateField(String, FieldUpdate),
    PatientIntake(String),
    AiEdit(AiEditRequest),
    Generation(GenerationRequest),
}

struct State {
    consultations: IndexMap<String, Consultation>,
    sections: IndexMap<(String, Section), Value>,
    intakes: HashMap<String, PatientIntake>,
    ai_replies: VecDeque<Result<Value, GatewayError>>,
    calls: Vec<GatewayCall>,
    revision: u64,
    echo_field_updates: bool,
    list_failure: Option<GatewayError>,
    get_failures: HashMap<String, GatewayError>,
    update_failure: Option<GatewayError>,
    cancel_failures: HashMap<String, GatewayError>,
    field_failure: Option<GatewayError>,
    section_failure: Option<GatewayError>,
    generation_failure: Option<GatewayError>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            consultations: IndexMap::new(),
            sections: IndexMap::new(),
            intakes: HashMap::new(),
            ai_replies: VecDeque::new(),
            calls: Vec::new(),
            revision: 0,
            echo_field_updates: true,
            list_failure: None,
            get_failures: HashMap::new(),
            update_failure: None,
            cancel_failures: HashMap::new(),
            field_failure: None,
            section_failure: None,
            generation_failure: None,
        }
    }
}

impl State {
    /// Server-side `updated_at` bump after a write.
    fn touch(&mut self, id: &str) {
        self.revision += 1;
        let stamp = format!("2024-01-01T00:00:00.{:06}Z", self.revision);
        if let Some(consultation) = self.consultations.get_mut(id) {
            consultation.updated_at = Some(stamp);
        }
    }
}

/// A [`ConsultationGateway`] backed by in-memory maps.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and keep another to seed data, inject failures and inspect calls.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<State>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder method to seed a consultation.
    pub fn with_consultation(self, consultation: Consultation) -> Self {
        self.insert_consultation(consultation);
        self
    }

    pub fn insert_consultation(&self, consultation: Consultation) {
        self.state()
            .consultations
            .insert(consultation.id.clone(), consultation);
    }

    /// Change a stored record the way another client would.
    pub fn modify_consultation(&self, id: &str, f: impl FnOnce(&mut Consultation)) {
        let mut state = self.state();
        if let Some(consultation) = state.consultations.get_mut(id) {
            f(consultation);
        }
    }

    pub fn consultation(&self, id: &str) -> Option<Consultation> {
        self.state().consultations.get(id).cloned()
    }

    pub fn set_section(&self, id: &str, section: Section, data: Value) {
        self.state().sections.insert((id.to_string(), section), data);
    }

    pub fn remove_section(&self, id: &str, section: Section) {
        self.state().sections.shift_remove(&(id.to_string(), section));
    }

    pub fn section(&self, id: &str, section: Section) -> Option<Value> {
        self.state().sections.get(&(id.to_string(), section)).cloned()
    }

    /// Set the intake questionnaire status of a patient.
    pub fn set_intake(&self, patient_id: &str, status: &str) {
        self.state().intakes.insert(
            patient_id.to_string(),
            PatientIntake {
                status: Some(status.to_string()),
            },
        );
    }

    /// Queue the reply to the next AI edit dispatch.
    ///
    /// Without a queued reply the mock answers `{"output": "Campo atualizado."}`.
    pub fn push_ai_reply(&self, reply: Result<Value, GatewayError>) {
        self.state().ai_replies.push_back(reply);
    }

    /// Whether field writes return the updated table document.
    pub fn echo_field_updates(&self, echo: bool) {
        self.state().echo_field_updates = echo;
    }

    pub fn fail_list(&self, error: Option<GatewayError>) {
        self.state().list_failure = error;
    }

    /// Every read of `id` fails with `error` until cleared.
    pub fn fail_get(&self, id: &str, error: GatewayError) {
        self.state().get_failures.insert(id.to_string(), error);
    }

    pub fn clear_get_failure(&self, id: &str) {
        self.state().get_failures.remove(id);
    }

    pub fn fail_updates(&self, error: Option<GatewayError>) {
        self.state().update_failure = error;
    }

    /// Cancel patches for `id` fail with `error`.
    pub fn fail_cancel(&self, id: &str, error: GatewayError) {
        self.state().cancel_failures.insert(id.to_string(), error);
    }

    pub fn clear_cancel_failure(&self, id: &str) {
        self.state().cancel_failures.remove(id);
    }

    pub fn fail_field_updates(&self, error: Option<GatewayError>) {
        self.state().field_failure = error;
    }

    /// Section reads fail with `error` until cleared with `None`.
    pub fn fail_sections(&self, error: Option<GatewayError>) {
        self.state().section_failure = error;
    }

    pub fn fail_generation(&self, error: Option<GatewayError>) {
        self.state().generation_failure = error;
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of reads of one consultation.
    pub fn get_count(&self, id: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::Get(got) if got == id))
            .count()
    }

    pub fn list_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::List(_)))
            .count()
    }

    /// Patches sent for one consultation, including failed ones.
    pub fn patches(&self, id: &str) -> Vec<ConsultationPatch> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Update(got, patch) if got == id => Some(patch.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn field_updates(&self) -> Vec<(String, FieldUpdate)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::UpdateField(id, update) => Some((id.clone(), update.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn ai_requests(&self) -> Vec<AiEditRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::AiEdit(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn generation_requests(&self) -> Vec<GenerationRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Generation(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn section_reads(&self, id: &str, section: Section) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::GetSection(got, s) if got == id && *s == section))
            .count()
    }
}

/// Write `value` at `path` inside a section document, creating containers.
fn write_path(doc: &mut Value, path: &FieldPath, value: Value) {
    let mut cursor = child(doc, &PathSegment::Key(path.table().to_string()));
    for segment in path.segments() {
        cursor = child(cursor, segment);
    }
    *cursor = value;
}

fn child<'a>(node: &'a mut Value, segment: &PathSegment) -> &'a mut Value {
    match segment {
        PathSegment::Key(key) => {
            if !node.is_object() {
                *node = json!({});
            }
            &mut node[key.as_str()]
        }
        PathSegment::Index(idx) => {
            if let Value::Array(items) = node {
                if items.len() <= *idx {
                    items.resize(*idx + 1, Value::Null);
                }
            } else {
                *node = Value::Array(vec![Value::Null; *idx + 1]);
            }
            &mut node[*idx]
        }
    }
}

fn matches_query(consultation: &Consultation, query: &ListQuery) -> bool {
    if query.status.is_some_and(|status| consultation.status != status) {
        return false;
    }
    if query
        .consultation_type
        .is_some_and(|kind| consultation.consultation_type != Some(kind))
    {
        return false;
    }
    match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let term = term.to_lowercase();
            consultation.id.to_lowercase().contains(&term)
                || consultation
                    .patient_id
                    .as_deref()
                    .is_some_and(|p| p.to_lowercase().contains(&term))
        }
        None => true,
    }
}

#[async_trait]
impl ConsultationGateway for MockGateway {
    async fn list_consultations(&self, query: &ListQuery) -> Result<ConsultationPage, GatewayError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::List(query.clone()));
        if let Some(error) = state.list_failure.clone() {
            return Err(error);
        }

        let matching: Vec<Consultation> = state
            .consultations
            .values()
            .filter(|c| matches_query(c, query))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let limit = query.limit.max(1) as usize;
        let skip = (query.page.max(1) as usize - 1) * limit;

        Ok(ConsultationPage {
            consultations: matching.into_iter().skip(skip).take(limit).collect(),
            total: Some(total),
            page: query.page,
            limit: query.limit,
        })
    }

    async fn get_consultation(&self, id: &str) -> Result<Consultation, GatewayError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Get(id.to_string()));
        if let Some(error) = state.get_failures.get(id) {
            return Err(error.clone());
        }
        state
            .consultations
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("/consultations/{}", id)))
    }

    async fn update_consultation(
        &self,
        id: &str,
        patch: &ConsultationPatch,
    ) -> Result<Consultation, GatewayError> {
        let mut state = self.state();
        state
            .calls
            .push(GatewayCall::Update(id.to_string(), patch.clone()));
        if let Some(error) = state.update_failure.clone() {
            return Err(error);
        }
        if patch.status == Some(ConsultationStatus::Cancelled) {
            if let Some(error) = state.cancel_failures.get(id) {
                return Err(error.clone());
            }
        }

        let consultation = state
            .consultations
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("/consultations/{}", id)))?;
        consultation.apply_patch(patch);
        state.touch(id);

        state
            .consultations
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("/consultations/{}", id)))
    }

    async fn delete_consultation(&self, id: &str) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Delete(id.to_string()));
        state
            .consultations
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(format!("/consultations/{}", id)))
    }

    async fn get_section(&self, id: &str, section: Section) -> Result<Option<Value>, GatewayError> {
        let mut state = self.state();
        state
            .calls
            .push(GatewayCall::GetSection(id.to_string(), section));
        if let Some(error) = &state.section_failure {
            return Err(error.clone());
        }
        Ok(state
            .sections
            .get(&(id.to_string(), section))
            .filter(|data| section_has_data(data))
            .cloned())
    }

    async fn update_field(
        &self,
        id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldUpdateResult, GatewayError> {
        let mut state = self.state();
        state
            .calls
            .push(GatewayCall::UpdateField(id.to_string(), update.clone()));
        if let Some(error) = state.field_failure.clone() {
            return Err(error);
        }

        let path = FieldPath::parse(&update.field_path)
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;
        if path.section() != update.section {
            return Err(GatewayError::Rejected(format!(
                "{} does not belong to {}",
                update.field_path, update.section
            )));
        }

        let echo = state.echo_field_updates;
        let doc = state
            .sections
            .entry((id.to_string(), update.section))
            .or_insert_with(|| json!({}));
        write_path(doc, &path, update.value.clone());

        let data = echo
            .then(|| doc.get(path.table()).cloned())
            .flatten()
            .filter(section_has_data);
        Ok(FieldUpdateResult { data })
    }

    async fn get_patient_intake(&self, patient_id: &str) -> Result<PatientIntake, GatewayError> {
        let mut state = self.state();
        state
            .calls
            .push(GatewayCall::PatientIntake(patient_id.to_string()));
        Ok(state.intakes.get(patient_id).cloned().unwrap_or_default())
    }

    async fn dispatch_ai_edit(&self, request: &AiEditRequest) -> Result<Value, GatewayError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::AiEdit(request.clone()));
        state
            .ai_replies
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"output": "Campo atualizado."})))
    }

    async fn trigger_generation(&self, request: &GenerationRequest) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Generation(request.clone()));
        match state.generation_failure.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_core::{ConsultationType, Etapa, SolucaoEtapa};

    #[tokio::test]
    async fn test_get_and_record() {
        let gateway =
            MockGateway::new().with_consultation(Consultation::new("c-1", ConsultationStatus::Created));

        let consultation = gateway.get_consultation("c-1").await.unwrap();
        assert_eq!(consultation.status, ConsultationStatus::Created);
        assert_eq!(gateway.get_count("c-1"), 1);

        let err = gateway.get_consultation("missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_get_failure() {
        let gateway =
            MockGateway::new().with_consultation(Consultation::new("c-1", ConsultationStatus::Created));
        gateway.fail_get("c-1", GatewayError::Unauthorized);

        assert!(matches!(
            gateway.get_consultation("c-1").await,
            Err(GatewayError::Unauthorized)
        ));

        gateway.clear_get_failure("c-1");
        assert!(gateway.get_consultation("c-1").await.is_ok());
        assert_eq!(gateway.get_count("c-1"), 2);
    }

    #[tokio::test]
    async fn test_update_applies_patch_and_bumps_updated_at() {
        let gateway =
            MockGateway::new().with_consultation(Consultation::new("c-1", ConsultationStatus::ValidAnamnese));

        let patch = ConsultationPatch::new()
            .etapa(Etapa::Diagnostico)
            .status(ConsultationStatus::Processing);
        let updated = gateway.update_consultation("c-1", &patch).await.unwrap();

        assert_eq!(updated.status, ConsultationStatus::Processing);
        assert_eq!(updated.etapa, Some(Etapa::Diagnostico));
        assert!(updated.updated_at.is_some());
        assert_eq!(gateway.patches("c-1"), vec![patch]);
    }

    #[tokio::test]
    async fn test_cancel_failure_only_hits_cancels() {
        let gateway =
            MockGateway::new().with_consultation(Consultation::new("c-1", ConsultationStatus::Agendamento));
        gateway.fail_cancel("c-1", GatewayError::Network("reset".into()));

        let cancel = ConsultationPatch::new().status(ConsultationStatus::Cancelled);
        assert!(gateway.update_consultation("c-1", &cancel).await.is_err());

        let other = ConsultationPatch::new().etapa(Etapa::Anamnese);
        assert!(gateway.update_consultation("c-1", &other).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let gateway = MockGateway::new();
        for i in 0..5 {
            gateway.insert_consultation(
                Consultation::new(format!("c-{}", i), ConsultationStatus::Created)
                    .with_type(ConsultationType::Presencial),
            );
        }
        gateway.insert_consultation(
            Consultation::new("t-1", ConsultationStatus::Agendamento)
                .with_type(ConsultationType::Telemedicina),
        );

        let query = ListQuery {
            page: 2,
            limit: 2,
            status: Some(ConsultationStatus::Created),
            ..Default::default()
        };
        let page = gateway.list_consultations(&query).await.unwrap();
        assert_eq!(page.total, Some(5));
        let ids: Vec<_> = page.consultations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-2", "c-3"]);

        let query = ListQuery {
            consultation_type: Some(ConsultationType::Telemedicina),
            ..Default::default()
        };
        assert_eq!(gateway.list_consultations(&query).await.unwrap().total, Some(1));
    }

    #[tokio::test]
    async fn test_update_field_writes_nested_path() {
        let gateway = MockGateway::new();
        let path = FieldPath::parse("alimentacao.refeicoes.1.descricao").unwrap();

        let result = gateway
            .update_field("c-1", &FieldUpdate::new(&path, json!("aveia")))
            .await
            .unwrap();

        assert_eq!(
            result.data,
            Some(json!({"refeicoes": [null, {"descricao": "aveia"}]}))
        );
        assert_eq!(
            gateway.section("c-1", Section::Solucao(SolucaoEtapa::Alimentacao)),
            Some(json!({"alimentacao": {"refeicoes": [null, {"descricao": "aveia"}]}}))
        );
    }

    #[tokio::test]
    async fn test_update_field_without_echo() {
        let gateway = MockGateway::new();
        gateway.echo_field_updates(false);
        let path = FieldPath::parse("d_estado_geral.resumo").unwrap();

        let result = gateway
            .update_field("c-1", &FieldUpdate::new(&path, json!("estável")))
            .await
            .unwrap();
        assert_eq!(result.data, None);
        assert!(gateway.section("c-1", Section::Diagnostico).is_some());
    }

    #[tokio::test]
    async fn test_empty_section_reads_as_none() {
        let gateway = MockGateway::new();
        gateway.set_section("c-1", Section::Diagnostico, json!({"d_estado_geral": {}}));

        assert_eq!(gateway.get_section("c-1", Section::Diagnostico).await.unwrap(), None);
        assert_eq!(gateway.section_reads("c-1", Section::Diagnostico), 1);
    }

    #[tokio::test]
    async fn test_scripted_ai_replies() {
        let gateway = MockGateway::new();
        gateway.push_ai_reply(Ok(json!("primeira")));
        gateway.push_ai_reply(Err(GatewayError::Network("timeout".into())));

        let path = FieldPath::parse("a_queixa.principal").unwrap();
        let request = AiEditRequest::new("c-1", &path, "resuma");

        assert_eq!(gateway.dispatch_ai_edit(&request).await.unwrap(), json!("primeira"));
        assert!(gateway.dispatch_ai_edit(&request).await.is_err());
        assert_eq!(
            gateway.dispatch_ai_edit(&request).await.unwrap(),
            json!({"output": "Campo atualizado."})
        );
        assert_eq!(gateway.ai_requests().len(), 3);
    }
}
