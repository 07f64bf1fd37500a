//! Recorrido de demostración contra el backend en memoria: alta de un
//! alumno con IEP, selección de objetivos y un "me gusta" en el diario.
use chrono::{TimeZone, Utc};
use intake_adapters::InMemoryGateway;
use intake_core::{JournalFeed, SessionEvent, ToggleOutcome, WizardStep};
use intake_domain::{Attachment, JournalEntry, PrimaryFields, StudentRecord};
use log::info;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::{AppError, CoreError};

pub const SAMPLE_IEP: &str = "Student: Alex\n\
Goal 1: Read grade-level passages with 90% accuracy. Baseline: Reads with 70% accuracy.\n\
Goal 2: Solve two-step word problems. Baseline: Solves one-step problems.\n\
Goal 3: Write a five-sentence paragraph.";

/// Lo que deja el recorrido: alumno guardado, eventos y feed final.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub student: StudentRecord,
    pub events: Vec<SessionEvent>,
    pub entries: Vec<JournalEntry>,
    pub like: ToggleOutcome,
}

pub fn sample_entries() -> Vec<JournalEntry> {
    let at = |ts: i64| Utc.timestamp_opt(ts, 0).single().unwrap_or_default();
    let kyoto = JournalEntry::new(1, "Kyoto in spring", "Temples and cherry blossoms.", at(1_711_965_600));
    let lisbon = JournalEntry::new(2, "Lisbon trams", "Tram 28 all the way up.", at(1_712_052_000));
    vec![kyoto.with_likes(4).with_tags(["japan", "spring"]).with_location("Kyoto"),
         lisbon.with_tags(["portugal"])]
}

/// Backend en memoria sembrado con las entradas de ejemplo.
pub fn demo_gateway() -> Arc<InMemoryGateway> {
    Arc::new(InMemoryGateway::new().with_entries(sample_entries()))
}

pub async fn run_demo(config: &AppConfig, gateway: Arc<InMemoryGateway>) -> Result<DemoReport, AppError> {
    let session = config.session_builder(gateway.clone()).build();
    let fields = PrimaryFields::new().with("name", "Alex").with("grade", "2");
    let iep = Attachment::pdf("alex_iep.pdf", SAMPLE_IEP.as_bytes().to_vec());

    let step = session.submit_primary(&fields, Some(&iep)).await?;
    info!("demo: session at {step} with {} candidates", session.candidates().len());
    if step == WizardStep::GoalSelection {
        for goal in session.candidates().iter().take(2) {
            session.toggle_selection(goal)?;
        }
        session.commit_selection().await?;
    }
    let entity_id = session.entity_id()
                           .ok_or_else(|| AppError::from(CoreError::Internal("no student id".into())))?;
    let student = gateway.student(entity_id)
                         .ok_or_else(|| AppError::from(CoreError::Internal(format!("student {entity_id} missing"))))?;

    let feed = JournalFeed::new(gateway);
    feed.load().await?;
    let like = match feed.entries().first() {
        Some(first) => feed.toggle_like(first.id).await?,
        None => ToggleOutcome::Skipped,
    };

    Ok(DemoReport { student,
                    events: session.events(),
                    entries: feed.entries(),
                    like })
}
