//! Typed clinical field paths.
//!
//! The wire form is a dotted string such as
//! `a_observacao_clinica_lab_2.sistema_endocrino_tireoide_tsh` or
//! `alimentacao.refeicoes.0.descricao`. The first segment names the table
//! (or JSON key) and decides which [`Section`] owns the field.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::section::Section;
use crate::status::SolucaoEtapa;

/// Table prefixes owned by the diagnosis section.
pub const DIAGNOSIS_TABLES: [&str; 9] = [
    "d_diagnostico_principal",
    "d_estado_geral",
    "d_estado_mental",
    "d_estado_fisiologico",
    "d_integracao_diagnostica",
    "d_habitos_vida",
    "d_mapa_sistemico",
    "d_linha_tempo",
    "d_sistemas_corporais",
];

/// Prefix of every anamnesis table.
const ANAMNESIS_PREFIX: &str = "a_";

/// Errors produced while parsing a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    #[error("field path is empty")]
    Empty,

    #[error("field path has an empty segment: {0}")]
    EmptySegment(String),

    #[error("field path needs a table and a field: {0}")]
    MissingField(String),

    #[error("no section owns field path: {0}")]
    UnknownSection(String),
}

/// A segment after the table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// A parsed field path, resolved to its owning section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    section: Section,
    table: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse a dotted path and resolve its section.
    pub fn parse(raw: &str) -> Result<Self, FieldPathError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FieldPathError::Empty);
        }

        let parts: Vec<&str> = raw.split('.').collect();
        if parts.iter().any(|part| part.trim().is_empty()) {
            return Err(FieldPathError::EmptySegment(raw.to_string()));
        }
        if parts.len() < 2 {
            return Err(FieldPathError::MissingField(raw.to_string()));
        }

        let table = parts[0].to_string();
        let section = section_for_table(&table)
            .ok_or_else(|| FieldPathError::UnknownSection(raw.to_string()))?;

        let segments = parts[1..]
            .iter()
            .map(|part| match part.parse::<usize>() {
                Ok(idx) => PathSegment::Index(idx),
                Err(_) => PathSegment::Key(part.to_string()),
            })
            .collect();

        Ok(Self {
            section,
            table,
            segments,
        })
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Last named key of the path.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

fn section_for_table(table: &str) -> Option<Section> {
    for track in SolucaoEtapa::ORDER {
        let key = track.path_key();
        if table == key || table.strip_prefix(key).is_some_and(|rest| rest.starts_with('_')) {
            return Some(Section::Solucao(track));
        }
    }

    if DIAGNOSIS_TABLES.iter().any(|prefix| table.starts_with(prefix)) {
        return Some(Section::Diagnostico);
    }

    if table.starts_with(ANAMNESIS_PREFIX) {
        return Some(Section::Anamnese);
    }

    None
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anamnesis_path() {
        let path = FieldPath::parse("a_observacao_clinica_lab_2.sistema_endocrino_tireoide_tsh").unwrap();
        assert_eq!(path.section(), Section::Anamnese);
        assert_eq!(path.table(), "a_observacao_clinica_lab_2");
        assert_eq!(path.leaf(), Some("sistema_endocrino_tireoide_tsh"));
    }

    #[test]
    fn test_every_diagnosis_table_routes_to_diagnosis() {
        for table in DIAGNOSIS_TABLES {
            let path = FieldPath::parse(&format!("{}.resumo", table)).unwrap();
            assert_eq!(path.section(), Section::Diagnostico, "table {}", table);
        }
    }

    #[test]
    fn test_solution_paths_carry_track() {
        let path = FieldPath::parse("alimentacao.refeicoes.0.descricao").unwrap();
        assert_eq!(path.section(), Section::Solucao(SolucaoEtapa::Alimentacao));
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("refeicoes".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("descricao".to_string()),
            ]
        );

        let path = FieldPath::parse("atividade_fisica_plano.frequencia").unwrap();
        assert_eq!(path.section(), Section::Solucao(SolucaoEtapa::AtividadeFisica));

        let path = FieldPath::parse("mentalidade.crencas.2").unwrap();
        assert_eq!(path.section(), Section::Solucao(SolucaoEtapa::Mentalidade));
        assert_eq!(path.leaf(), Some("crencas"));
    }

    #[test]
    fn test_track_key_needs_separator() {
        assert_eq!(
            FieldPath::parse("mentalidadex.campo").unwrap_err(),
            FieldPathError::UnknownSection("mentalidadex.campo".to_string())
        );
    }

    #[test]
    fn test_invalid_paths() {
        assert_eq!(FieldPath::parse("  ").unwrap_err(), FieldPathError::Empty);
        assert!(matches!(
            FieldPath::parse("a_tabela"),
            Err(FieldPathError::MissingField(_))
        ));
        assert!(matches!(
            FieldPath::parse("a_tabela..campo"),
            Err(FieldPathError::EmptySegment(_))
        ));
        assert!(matches!(
            FieldPath::parse("d_desconhecida.campo"),
            Err(FieldPathError::UnknownSection(_))
        ));
        assert!(matches!(
            FieldPath::parse("paciente.nome"),
            Err(FieldPathError::UnknownSection(_))
        ));
    }

    #[test]
    fn test_display_renders_wire_form() {
        let raw = "suplementacao.itens.3.dose";
        let path: FieldPath = raw.parse().unwrap();
        assert_eq!(path.to_string(), raw);
    }
}
