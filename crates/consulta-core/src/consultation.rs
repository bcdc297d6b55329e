//! The consultation record and the request/response shapes around it.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::resolver::{resolve_screen, Phase, Screen};
use crate::status::{ConsultationStatus, ConsultationType, Etapa, SolucaoEtapa};

/// Intake status value meaning the patient filled the anamnesis form.
pub const INTAKE_FILLED: &str = "preenchida";

/// A consultation as cached by a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub consultation_type: Option<ConsultationType>,
    pub status: ConsultationStatus,
    #[serde(default, deserialize_with = "lenient")]
    pub etapa: Option<Etapa>,
    #[serde(default, deserialize_with = "lenient")]
    pub solucao_etapa: Option<SolucaoEtapa>,
    #[serde(default)]
    pub consulta_inicio: Option<String>,
    #[serde(default)]
    pub consulta_fim: Option<String>,
    /// Explicit duration in seconds.
    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<f64>,
    /// Duration in minutes, written by older clients.
    #[serde(default, deserialize_with = "lenient")]
    pub duracao: Option<f64>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Deserialize an optional field, treating unparseable values as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl Consultation {
    /// Create a record with only an id and a status.
    pub fn new(id: impl Into<String>, status: ConsultationStatus) -> Self {
        Self {
            id: id.into(),
            consultation_type: None,
            status,
            etapa: None,
            solucao_etapa: None,
            consulta_inicio: None,
            consulta_fim: None,
            duration: None,
            duracao: None,
            patient_id: None,
            doctor_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_etapa(mut self, etapa: Etapa) -> Self {
        self.etapa = Some(etapa);
        self
    }

    pub fn with_track(mut self, track: SolucaoEtapa) -> Self {
        self.solucao_etapa = Some(track);
        self
    }

    pub fn with_type(mut self, consultation_type: ConsultationType) -> Self {
        self.consultation_type = Some(consultation_type);
        self
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.consulta_inicio = Some(start.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.consulta_fim = Some(end.into());
        self
    }

    pub fn with_parties(mut self, patient_id: impl Into<String>, doctor_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self.doctor_id = Some(doctor_id.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = Some(updated_at.into());
        self
    }

    /// Canonical phase of this record.
    pub fn phase(&self) -> Phase {
        Phase::normalize(self.status, self.etapa, self.solucao_etapa)
    }

    /// Screen the detail view should render for this record.
    pub fn screen(&self) -> Screen {
        resolve_screen(self.status, self.etapa, self.solucao_etapa)
    }

    /// Whether a fresh copy differs from this one in the fields the detail
    /// sync loop watches.
    pub fn differs_for_sync(&self, fresh: &Consultation) -> bool {
        self.status != fresh.status
            || self.etapa != fresh.etapa
            || self.solucao_etapa != fresh.solucao_etapa
            || self.updated_at != fresh.updated_at
    }

    /// Whether a fresh list row differs from this one.
    pub fn differs_as_row(&self, fresh: &Consultation) -> bool {
        self.id != fresh.id
            || self.status != fresh.status
            || self.etapa != fresh.etapa
            || self.updated_at != fresh.updated_at
    }

    /// Calendar day the consultation starts on, in local time.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.consulta_inicio
            .as_deref()
            .and_then(parse_timestamp)
            .map(|ts| ts.date())
    }

    /// A scheduled teleconsultation whose start day has already passed.
    pub fn is_overdue_teleconsultation(&self, today: NaiveDate) -> bool {
        self.consultation_type == Some(ConsultationType::Telemedicina)
            && self.status == ConsultationStatus::Agendamento
            && self.start_date().is_some_and(|day| day < today)
    }

    /// Apply a patch locally, the way the gateway does.
    pub fn apply_patch(&mut self, patch: &ConsultationPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(etapa) = patch.etapa {
            self.etapa = Some(etapa);
        }
        if let Some(track) = patch.solucao_etapa {
            self.solucao_etapa = track;
        }
    }
}

/// Parse a gateway timestamp into local wall-clock time.
///
/// Accepts RFC 3339 (converted to local time), naive ISO date-times with `T`
/// or a space separator, and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
}

/// Partial update of the lifecycle fields.
///
/// Only set fields are serialized; `solucao_etapa: Some(None)` serializes an
/// explicit `null` to clear the track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsultationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConsultationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etapa: Option<Etapa>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solucao_etapa: Option<Option<SolucaoEtapa>>,
}

impl ConsultationPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ConsultationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn etapa(mut self, etapa: Etapa) -> Self {
        self.etapa = Some(etapa);
        self
    }

    pub fn track(mut self, track: SolucaoEtapa) -> Self {
        self.solucao_etapa = Some(Some(track));
        self
    }

    pub fn clear_track(mut self) -> Self {
        self.solucao_etapa = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.etapa.is_none() && self.solucao_etapa.is_none()
    }
}

/// Filters and pagination for the consultation list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub status: Option<ConsultationStatus>,
    pub consultation_type: Option<ConsultationType>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
            status: None,
            consultation_type: None,
        }
    }
}

impl ListQuery {
    /// Query-string pairs, skipping unset filters.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(search) = self.search.as_ref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(kind) = self.consultation_type {
            let value = match kind {
                ConsultationType::Presencial => "PRESENCIAL",
                ConsultationType::Telemedicina => "TELEMEDICINA",
            };
            pairs.push(("consultation_type", value.to_string()));
        }
        pairs
    }
}

/// One page of the consultation list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsultationPage {
    pub consultations: Vec<Consultation>,
    pub total: Option<u64>,
    pub page: u32,
    pub limit: u32,
}

/// Intake questionnaire state of a patient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientIntake {
    pub status: Option<String>,
}

impl PatientIntake {
    pub fn is_filled(&self) -> bool {
        self.status.as_deref() == Some(INTAKE_FILLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gateway_record() {
        let json = r#"{
            "id": "c-1",
            "consultation_type": "TELEMEDICINA",
            "status": "VALID_SOLUCAO",
            "etapa": "SOLUCAO",
            "solucao_etapa": null,
            "consulta_inicio": "2024-03-10T14:00:00",
            "patient_id": "p-9",
            "doctor_id": "d-2",
            "updated_at": "2024-03-10T15:00:00Z",
            "notes": "ignored"
        }"#;

        let consultation: Consultation = serde_json::from_str(json).unwrap();
        assert_eq!(consultation.id, "c-1");
        assert_eq!(consultation.consultation_type, Some(ConsultationType::Telemedicina));
        assert_eq!(consultation.status, ConsultationStatus::ValidSolucao);
        assert_eq!(consultation.etapa, Some(Etapa::Solucao));
        assert_eq!(consultation.solucao_etapa, None);
        assert_eq!(consultation.patient_id.as_deref(), Some("p-9"));
    }

    #[test]
    fn test_empty_etapa_is_treated_as_unset() {
        let json = r#"{"id": "c-2", "status": "CREATED", "etapa": "", "duration": "abc"}"#;
        let consultation: Consultation = serde_json::from_str(json).unwrap();
        assert_eq!(consultation.etapa, None);
        assert_eq!(consultation.duration, None);
    }

    #[test]
    fn test_sync_change_detection() {
        let cached = Consultation::new("c-1", ConsultationStatus::Processing)
            .with_etapa(Etapa::Diagnostico)
            .with_updated_at("t1");

        let same = cached.clone();
        assert!(!cached.differs_for_sync(&same));

        let mut other_field_only = cached.clone();
        other_field_only.duration = Some(60.0);
        assert!(!cached.differs_for_sync(&other_field_only));

        let touched = cached.clone().with_updated_at("t2");
        assert!(cached.differs_for_sync(&touched));

        let moved = Consultation::new("c-1", ConsultationStatus::ValidDiagnostico)
            .with_etapa(Etapa::Diagnostico)
            .with_updated_at("t1");
        assert!(cached.differs_for_sync(&moved));
    }

    #[test]
    fn test_row_change_detection_ignores_track() {
        let cached = Consultation::new("c-1", ConsultationStatus::ValidSolucao)
            .with_etapa(Etapa::Solucao)
            .with_updated_at("t1");
        let fresh = cached.clone().with_track(SolucaoEtapa::Mentalidade);
        assert!(!cached.differs_as_row(&fresh));
        assert!(cached.differs_as_row(&fresh.with_updated_at("t2")));
    }

    #[test]
    fn test_overdue_teleconsultation() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let base = Consultation::new("c-1", ConsultationStatus::Agendamento)
            .with_type(ConsultationType::Telemedicina);

        assert!(base.clone().with_start("2024-05-09T23:59:00").is_overdue_teleconsultation(today));
        assert!(!base.clone().with_start("2024-05-10T00:00:00").is_overdue_teleconsultation(today));
        assert!(!base.clone().with_start("2024-05-11").is_overdue_teleconsultation(today));
        assert!(!base.clone().is_overdue_teleconsultation(today));

        let presencial = Consultation::new("c-2", ConsultationStatus::Agendamento)
            .with_type(ConsultationType::Presencial)
            .with_start("2024-05-01");
        assert!(!presencial.is_overdue_teleconsultation(today));

        let created = Consultation::new("c-3", ConsultationStatus::Created)
            .with_type(ConsultationType::Telemedicina)
            .with_start("2024-05-01");
        assert!(!created.is_overdue_teleconsultation(today));
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = ConsultationPatch::new()
            .etapa(Etapa::Solucao)
            .clear_track();
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"etapa": "SOLUCAO", "solucao_etapa": null}));

        let patch = ConsultationPatch::new().status(ConsultationStatus::Processing);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"status": "PROCESSING"}));
    }

    #[test]
    fn test_apply_patch() {
        let mut consultation = Consultation::new("c-1", ConsultationStatus::ValidSolucao)
            .with_etapa(Etapa::Solucao)
            .with_track(SolucaoEtapa::Alimentacao);

        consultation.apply_patch(&ConsultationPatch::new().clear_track());
        assert_eq!(consultation.solucao_etapa, None);
        assert_eq!(consultation.etapa, Some(Etapa::Solucao));

        consultation.apply_patch(&ConsultationPatch::new().status(ConsultationStatus::Cancelled));
        assert_eq!(consultation.status, ConsultationStatus::Cancelled);
    }

    #[test]
    fn test_list_query_pairs() {
        let query = ListQuery {
            search: Some("  maria ".to_string()),
            status: Some(ConsultationStatus::Processing),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "1".to_string()),
                ("limit", "20".to_string()),
                ("search", "maria".to_string()),
                ("status", "PROCESSING".to_string()),
            ]
        );
    }

    #[test]
    fn test_intake_filled() {
        assert!(PatientIntake { status: Some("preenchida".into()) }.is_filled());
        assert!(!PatientIntake { status: Some("pendente".into()) }.is_filled());
        assert!(!PatientIntake::default().is_filled());
    }
}
