use serde::{Deserialize, Serialize};

use super::{clean_text, format_list_human, DEFAULT_MAX_LIST_ITEMS};
use crate::domain::{EmbeddingDocument, Session, Speaker};

const PART_SEPARATOR: &str = ". ";
const DATE_FORMAT: &str = "%d/%m/%Y";
const TIME_FORMAT: &str = "%H:%M";

/// How session descriptions are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStyle {
    /// Labelled description with schedule, duration, speaker bio and topics.
    #[default]
    Detailed,
    /// Compact agenda line: name, date, time, place, speaker, topics.
    Agenda,
}

impl ContentStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "detailed" | "full" => Some(ContentStyle::Detailed),
            "agenda" | "simple" | "simplified" => Some(ContentStyle::Agenda),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStyle::Detailed => "detailed",
            ContentStyle::Agenda => "agenda",
        }
    }
}

/// Turns source records into the natural-language text that gets embedded.
///
/// Rendering is deterministic: the same record always yields the same text,
/// so re-running a sync over unchanged data rewrites identical content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentRenderer {
    style: ContentStyle,
}

impl ContentRenderer {
    pub fn new(style: ContentStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> ContentStyle {
        self.style
    }

    pub fn render_session(&self, session: &Session) -> String {
        match self.style {
            ContentStyle::Detailed => Self::render_session_detailed(session),
            ContentStyle::Agenda => Self::render_session_agenda(session),
        }
    }

    pub fn render_speaker(&self, speaker: &Speaker) -> String {
        let mut parts = vec![format!("Ponente: {}", speaker.name)];

        let bio = clean_text(speaker.bio.as_deref());
        if !bio.is_empty() {
            parts.push(format!("Biografía: {}", bio));
        }

        if !speaker.session_names.is_empty() {
            parts.push(format!(
                "Charlas: {}",
                format_list_human(&speaker.session_names, DEFAULT_MAX_LIST_ITEMS)
            ));
        }

        let tags = speaker.unique_tags();
        if !tags.is_empty() {
            parts.push(format!(
                "Áreas de expertise: {}",
                format_list_human(&tags, DEFAULT_MAX_LIST_ITEMS)
            ));
        }

        parts.push(format!("Número de charlas: {}", speaker.session_count));

        parts.join(PART_SEPARATOR)
    }

    pub fn session_document(&self, session: &Session) -> EmbeddingDocument {
        EmbeddingDocument::from_session(session, self.render_session(session))
    }

    pub fn speaker_document(&self, speaker: &Speaker) -> EmbeddingDocument {
        EmbeddingDocument::from_speaker(speaker, self.render_speaker(speaker))
    }

    fn render_session_detailed(session: &Session) -> String {
        let mut parts = vec![format!("Sesión: {}", session.name)];

        if let Some(date) = session.date {
            parts.push(format!("Fecha: {}", date.format(DATE_FORMAT)));
        }

        if let Some(schedule) = schedule(session) {
            parts.push(format!("Horario: {}", schedule));
        }

        if let Some(minutes) = session.duration_minutes() {
            parts.push(format!("Duración: {} minutos", minutes));
        }

        if let Some(location) = non_empty(session.location.as_deref()) {
            parts.push(format!("Ubicación: {}", location));
        }

        if let Some(speaker) = non_empty(session.speaker_name.as_deref()) {
            parts.push(format!("Ponente: {}", speaker));
            let bio = clean_text(session.speaker_bio.as_deref());
            if !bio.is_empty() {
                parts.push(format!("Sobre el ponente: {}", bio));
            }
        }

        if !session.tags.is_empty() {
            parts.push(format!(
                "Temas: {}",
                format_list_human(&session.tags, DEFAULT_MAX_LIST_ITEMS)
            ));
        }

        parts.join(PART_SEPARATOR)
    }

    fn render_session_agenda(session: &Session) -> String {
        let mut parts = vec![session.name.clone()];

        if let Some(date) = session.date {
            parts.push(date.format(DATE_FORMAT).to_string());
        }

        if let Some(schedule) = schedule(session) {
            parts.push(schedule);
        }

        if let Some(location) = non_empty(session.location.as_deref()) {
            parts.push(location.to_string());
        }

        if let Some(speaker) = non_empty(session.speaker_name.as_deref()) {
            parts.push(format!("Ponente: {}", speaker));
        }

        if !session.tags.is_empty() {
            parts.push(format!(
                "Temas: {}",
                format_list_human(&session.tags, DEFAULT_MAX_LIST_ITEMS)
            ));
        }

        parts.join(PART_SEPARATOR)
    }
}

fn schedule(session: &Session) -> Option<String> {
    let (start, end) = (session.start_time?, session.end_time?);
    Some(format!(
        "{} - {}",
        start.format(TIME_FORMAT),
        end.format(TIME_FORMAT)
    ))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn sample_session() -> Session {
        Session::new(42, "Async Rust en producción")
            .with_date(NaiveDate::from_ymd_opt(2025, 5, 17).unwrap())
            .with_schedule(
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 45, 0).unwrap(),
            )
            .with_location("Sala B")
            .with_event(1)
            .with_speaker(9, "Ana Pérez", Some("Ingeniera  de\nsistemas".to_string()))
            .with_tags(["rust", "async"])
    }

    #[test]
    fn test_detailed_session_rendering() {
        let renderer = ContentRenderer::new(ContentStyle::Detailed);
        let text = renderer.render_session(&sample_session());

        assert_eq!(
            text,
            "Sesión: Async Rust en producción. Fecha: 17/05/2025. Horario: 10:00 - 10:45. \
             Duración: 45 minutos. Ubicación: Sala B. Ponente: Ana Pérez. \
             Sobre el ponente: Ingeniera de sistemas. Temas: rust y async"
        );
    }

    #[test]
    fn test_agenda_session_rendering() {
        let renderer = ContentRenderer::new(ContentStyle::Agenda);
        let text = renderer.render_session(&sample_session());

        assert_eq!(
            text,
            "Async Rust en producción. 17/05/2025. 10:00 - 10:45. Sala B. \
             Ponente: Ana Pérez. Temas: rust y async"
        );
    }

    #[test]
    fn test_minimal_session_only_has_name() {
        let renderer = ContentRenderer::default();
        assert_eq!(
            renderer.render_session(&Session::new(1, "Apertura")),
            "Sesión: Apertura"
        );
    }

    #[test]
    fn test_bio_without_speaker_is_ignored() {
        let mut session = Session::new(1, "Panel");
        session.speaker_bio = Some("orphan bio".to_string());
        let text = ContentRenderer::default().render_session(&session);
        assert!(!text.contains("Sobre el ponente"));
    }

    #[test]
    fn test_speaker_rendering() {
        let speaker = Speaker::new(9, "Ana Pérez")
            .with_bio("Ingeniera de sistemas")
            .with_sessions(["Async Rust", "Tokio a fondo"])
            .with_tags(["rust", "async", "rust"]);

        let text = ContentRenderer::default().render_speaker(&speaker);

        assert_eq!(
            text,
            "Ponente: Ana Pérez. Biografía: Ingeniera de sistemas. \
             Charlas: Async Rust y Tokio a fondo. Áreas de expertise: rust y async. \
             Número de charlas: 2"
        );
    }

    #[test]
    fn test_speaker_without_sessions_still_reports_count() {
        let text = ContentRenderer::default().render_speaker(&Speaker::new(2, "Sin charlas"));
        assert_eq!(text, "Ponente: Sin charlas. Número de charlas: 0");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let renderer = ContentRenderer::default();
        let session = sample_session();
        assert_eq!(renderer.render_session(&session), renderer.render_session(&session));
    }

    #[test]
    fn test_style_parse() {
        assert_eq!(ContentStyle::parse("Agenda"), Some(ContentStyle::Agenda));
        assert_eq!(ContentStyle::parse("detailed"), Some(ContentStyle::Detailed));
        assert_eq!(ContentStyle::parse("verbose"), None);
    }
}
