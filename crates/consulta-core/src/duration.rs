//! Consultation duration derivation and display.

use crate::consultation::{parse_timestamp, Consultation};

/// Upper bound for a duration computed from start/end timestamps (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

impl Consultation {
    /// Duration in seconds.
    ///
    /// Fallback order: explicit `duration` seconds, then `duracao` minutes,
    /// then `consulta_fim - consulta_inicio`. Non-positive values are
    /// unusable at every tier; the computed tier is capped at one day.
    pub fn duration_seconds(&self) -> Option<u64> {
        if let Some(secs) = self.duration.filter(|s| s.is_finite() && *s > 0.0) {
            return Some(secs.round() as u64);
        }

        if let Some(minutes) = self.duracao.filter(|m| m.is_finite() && *m > 0.0) {
            return Some((minutes * 60.0).round() as u64);
        }

        let start = parse_timestamp(self.consulta_inicio.as_deref()?)?;
        let end = parse_timestamp(self.consulta_fim.as_deref()?)?;
        let secs = (end - start).num_seconds();
        if secs <= 0 {
            return None;
        }
        Some((secs as u64).min(MAX_DURATION_SECS))
    }

    /// Human-readable duration, `"N/A"` when nothing usable is recorded.
    pub fn duration_label(&self) -> String {
        format_duration(self.duration_seconds())
    }
}

/// Format a duration in seconds for display.
pub fn format_duration(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds else {
        return "N/A".to_string();
    };

    let total_minutes = seconds / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours == 0 {
        format!("{} min", minutes)
    } else if minutes == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}min", hours, minutes)
    }
}
