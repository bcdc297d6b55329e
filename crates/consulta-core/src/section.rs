//! Clinical sections of a consultation.

use std::fmt;

use serde_json::Value;

use crate::status::SolucaoEtapa;

/// A clinical document owned by a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Anamnese,
    Diagnostico,
    Solucao(SolucaoEtapa),
}

impl Section {
    /// The four solution track sections, in navigation order.
    pub fn solution_tracks() -> impl Iterator<Item = Section> {
        SolucaoEtapa::ORDER.into_iter().map(Section::Solucao)
    }

    /// Gateway path segment of the section resource.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Anamnese => "anamnese",
            Self::Diagnostico => "diagnostico",
            Self::Solucao(SolucaoEtapa::Mentalidade) => "solucao-mentalidade",
            Self::Solucao(SolucaoEtapa::Suplementacao) => "solucao-suplementacao",
            Self::Solucao(SolucaoEtapa::Alimentacao) => "solucao-alimentacao",
            Self::Solucao(SolucaoEtapa::AtividadeFisica) => "atividade-fisica",
        }
    }

    /// Track discriminator attached to field updates of solution sections.
    pub fn track(&self) -> Option<SolucaoEtapa> {
        match self {
            Self::Solucao(track) => Some(*track),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Whether a section payload carries generated content.
///
/// `null`, empty objects, empty arrays and blank strings count as absent.
/// Objects whose values are all absent count as absent too. Callers unwrap
/// any `{success, data}` envelope first.
pub fn section_has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(section_has_data),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resources() {
        assert_eq!(Section::Anamnese.resource(), "anamnese");
        assert_eq!(Section::Diagnostico.resource(), "diagnostico");
        assert_eq!(
            Section::Solucao(SolucaoEtapa::Mentalidade).resource(),
            "solucao-mentalidade"
        );
        assert_eq!(
            Section::Solucao(SolucaoEtapa::AtividadeFisica).resource(),
            "atividade-fisica"
        );
        assert_eq!(Section::solution_tracks().count(), 4);
    }

    #[test]
    fn test_section_has_data() {
        assert!(!section_has_data(&json!(null)));
        assert!(!section_has_data(&json!({})));
        assert!(!section_has_data(&json!([])));
        assert!(!section_has_data(&json!("  ")));
        assert!(!section_has_data(&json!({"data": null})));
        assert!(section_has_data(&json!({"d_estado_geral": {"resumo": "ok"}})));
        assert!(section_has_data(&json!([{"id": 1}])));
    }
}
