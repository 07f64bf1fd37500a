//! Session module: máquina de estados del wizard de intake.
//!
//! `WizardSession` secuencia alta de la entidad primaria, extracción de
//! candidatos, selección y guardado contra un `ServiceGateway` inyectado.

pub mod builder;
pub mod core;
pub mod step;

pub use builder::SessionBuilder;
pub use self::core::{idempotency_key, CompletionListener, SessionSnapshot, WizardSession};
pub use step::WizardStep;

#[cfg(test)]
mod tests {
    use super::*;
    use ::core;
    use crate::errors::{RemoteError, SequenceError, WizardError};
    use crate::event::SessionEventKind;
    use crate::testing::{calls, StubGateway};
    use intake_domain::{Attachment, Goal, PrimaryFields};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn alex() -> PrimaryFields {
        PrimaryFields::new().with("name", "Alex").with("grade", "2")
    }

    fn iep() -> Attachment {
        Attachment::pdf("iep.pdf", b"%PDF-1.4 Goal 1: Read.".to_vec())
    }

    fn goal() -> Goal {
        Goal::new("Read 3 sentences", "1 sentence")
    }

    fn session(gw: &Arc<StubGateway>) -> WizardSession {
        WizardSession::new(gw.clone())
    }

    #[tokio::test]
    async fn submit_without_attachment_completes() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(42)));
        let s = session(&gw);
        let completed = Arc::new(Mutex::new(None));
        let sink = completed.clone();
        s.on_complete(move |id| *sink.lock().unwrap() = Some(id));

        let step = s.submit_primary(&alex(), None).await.expect("submit ok");

        assert_eq!(step, WizardStep::Complete);
        assert_eq!(s.entity_id(), Some(42));
        assert_eq!(gw.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*completed.lock().unwrap(), Some(42));
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn invalid_fields_never_reach_gateway() {
        let gw = Arc::new(StubGateway::default());
        let s = session(&gw);
        let err = s.submit_primary(&PrimaryFields::new().with("grade", "2"), None).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(s.error_message().as_deref(), Some("name is required"));
        assert_eq!(gw.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(s.step(), WizardStep::Form);
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn invalid_attachment_is_a_validation_error() {
        let gw = Arc::new(StubGateway::default());
        let s = session(&gw);
        let bad = Attachment::new("iep.docx", "application/msword", vec![1]);
        let err = s.submit_primary(&alex(), Some(&bad)).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(gw.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_failure_keeps_step_and_allows_retry() {
        let gw = Arc::new(StubGateway::default().with_create(Err(RemoteError::status(500, "db down")))
                                                .with_create(Ok(9)));
        let s = session(&gw);
        let err = s.submit_primary(&alex(), None).await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(s.step(), WizardStep::Form);
        assert_eq!(s.error_message().as_deref(), Some("Failed to add student"));
        let key_first = s.idempotency_key();

        // El reintento limpia el error y reutiliza la misma clave
        assert_eq!(s.submit_primary(&alex(), None).await, Ok(WizardStep::Complete));
        assert_eq!(s.error_message(), None);
        assert_eq!(s.idempotency_key(), key_first);
        assert_eq!(s.entity_id(), Some(9));
    }

    #[tokio::test]
    async fn extraction_failure_keeps_entity_and_retry_skips_create() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(7))
                                                .with_extract(Err(RemoteError::transport("timeout")))
                                                .with_extract(Ok(vec![goal()])));
        let s = session(&gw);
        let err = s.submit_primary(&alex(), Some(&iep())).await.unwrap_err();
        assert!(matches!(err, WizardError::Remote { .. }));
        assert_eq!(s.entity_id(), Some(7));
        assert_eq!(s.step(), WizardStep::Form);
        assert_eq!(s.error_message().as_deref(), Some("Error processing IEP file"));

        assert_eq!(s.submit_primary(&alex(), Some(&iep())).await, Ok(WizardStep::GoalSelection));
        assert_eq!(gw.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gw.extract_calls.load(Ordering::SeqCst), 2);
        assert!(s.events().iter().any(|e| matches!(e.kind, SessionEventKind::PrimaryReused { entity_id: 7 })));
    }

    #[tokio::test]
    async fn extract_requires_entity() {
        let gw = Arc::new(StubGateway::default());
        let s = session(&gw);
        let err = s.extract_candidates(&iep()).await.unwrap_err();
        assert_eq!(err, WizardError::Sequence(SequenceError::MissingEntity));
        assert_eq!(gw.extract_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_extraction_is_a_notice_not_an_error() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(3)).with_extract(Ok(vec![])));
        let s = session(&gw);
        assert_eq!(s.submit_primary(&alex(), Some(&iep())).await, Ok(WizardStep::GoalSelection));
        assert!(s.candidates().is_empty());
        assert_eq!(s.error_message(), None);
        assert_eq!(s.notice().as_deref(), Some(crate::constants::NOTHING_EXTRACTED_NOTICE));
        assert!(!s.can_commit());
    }

    #[tokio::test]
    async fn toggle_selection_twice_is_identity() {
        let other = Goal::new("Count to 20", "Counts to 10");
        let gw = Arc::new(StubGateway::default().with_extract(Ok(vec![goal(), other.clone()])));
        let s = session(&gw);
        s.submit_primary(&alex(), Some(&iep())).await.unwrap();

        assert_eq!(s.toggle_selection(&other), Ok(true));
        let before = s.selected();
        // Instancia distinta, mismo contenido
        let copy = Goal::new("Read 3 sentences", "1 sentence");
        assert_eq!(s.toggle_selection(&copy), Ok(true));
        assert_eq!(s.toggle_selection(&goal()), Ok(false));
        assert_eq!(s.selected(), before);
    }

    #[tokio::test]
    async fn toggle_rejects_unknown_items_and_wrong_step() {
        let gw = Arc::new(StubGateway::default().with_extract(Ok(vec![goal()])));
        let s = session(&gw);
        assert_eq!(s.toggle_selection(&goal()),
                   Err(WizardError::Sequence(SequenceError::WrongStep { expected: WizardStep::GoalSelection,
                                                                        actual: WizardStep::Form })));
        s.submit_primary(&alex(), Some(&iep())).await.unwrap();
        assert_eq!(s.toggle_selection(&Goal::new("x", "y")),
                   Err(WizardError::Sequence(SequenceError::UnknownItem)));
    }

    #[tokio::test]
    async fn commit_with_empty_selection_is_sequence_error() {
        let gw = Arc::new(StubGateway::default().with_extract(Ok(vec![goal()])));
        let s = session(&gw);
        s.submit_primary(&alex(), Some(&iep())).await.unwrap();
        let err = s.commit_selection().await.unwrap_err();
        assert_eq!(err, WizardError::Sequence(SequenceError::EmptySelection));
        assert_eq!(gw.save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn commit_failure_preserves_selection() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(5))
                                                .with_extract(Ok(vec![goal()]))
                                                .with_save(Err(RemoteError::status(503, "busy"))));
        let s = session(&gw);
        s.submit_primary(&alex(), Some(&iep())).await.unwrap();
        s.toggle_selection(&goal()).unwrap();

        assert!(s.commit_selection().await.unwrap_err().is_remote());
        assert_eq!(s.step(), WizardStep::GoalSelection);
        assert_eq!(s.selected(), vec![goal()]);
        assert_eq!(s.error_message().as_deref(), Some("Failed to save learning goals"));

        assert_eq!(s.commit_selection().await, Ok(WizardStep::Complete));
        assert_eq!(*gw.saved.lock().unwrap(), vec![goal()]);
    }

    #[tokio::test]
    async fn reset_only_from_complete() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(1)));
        let s = session(&gw);
        assert!(s.reset().unwrap_err().is_sequence());
        s.submit_primary(&alex(), None).await.unwrap();
        s.reset().expect("reset from complete");
        let snap = s.snapshot();
        assert_eq!(snap.step, WizardStep::Form);
        assert_eq!(snap.entity_id, None);
        assert_eq!(snap.generation, 1);
        assert!(snap.candidates.is_empty() && snap.selected.is_empty());
    }

    #[tokio::test]
    async fn back_keeps_entity_and_resubmit_does_not_create_again() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(11))
                                                .with_extract(Ok(vec![goal()]))
                                                .with_extract(Ok(vec![goal()])));
        let s = session(&gw);
        s.submit_primary(&alex(), Some(&iep())).await.unwrap();
        s.toggle_selection(&goal()).unwrap();
        s.back().unwrap();
        assert_eq!(s.step(), WizardStep::Form);
        assert_eq!(s.entity_id(), Some(11));
        assert!(s.selected().is_empty());

        s.submit_primary(&alex(), Some(&iep())).await.unwrap();
        assert_eq!(gw.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn edited_fields_after_back_are_rejected_not_dropped() {
        let gw = Arc::new(StubGateway::default().with_create(Ok(11))
                                                .with_extract(Ok(vec![goal()]))
                                                .with_extract(Ok(vec![goal()])));
        let s = session(&gw);
        let typo = PrimaryFields::new().with("name", "Alx").with("grade", "2");
        s.submit_primary(&typo, Some(&iep())).await.unwrap();
        let key = s.idempotency_key();
        s.back().unwrap();

        let fixed = PrimaryFields::new().with("name", "Alex").with("grade", "3");
        let err = s.submit_primary(&fixed, Some(&iep())).await.unwrap_err();
        assert_eq!(err, WizardError::Sequence(SequenceError::AlreadyCreated { entity_id: 11 }));
        assert_eq!(s.step(), WizardStep::Form);
        assert_eq!(s.notice().as_deref(), Some(crate::constants::ALREADY_CREATED_NOTICE));
        assert_eq!(s.idempotency_key(), key);
        assert!(!s.is_busy());
        assert_eq!(calls(&gw.create_calls), 1);
        assert_eq!(calls(&gw.extract_calls), 1);

        // Los campos guardados (salvo espacios) siguen adelante sin crear otra vez
        let same = PrimaryFields::new().with("name", " Alx ").with("grade", "2");
        assert_eq!(s.submit_primary(&same, Some(&iep())).await, Ok(WizardStep::GoalSelection));
        assert_eq!(s.notice(), None);
        assert_eq!(s.idempotency_key(), key);
        assert_eq!(calls(&gw.create_calls), 1);
    }

    #[tokio::test]
    async fn listeners_see_every_transition() {
        let gw = Arc::new(StubGateway::default().with_extract(Ok(vec![goal()])));
        let s = session(&gw);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        s.subscribe(move |ev| sink.lock().unwrap().push(ev.kind.clone()));

        s.submit_primary(&alex(), Some(&iep())).await.unwrap();
        s.toggle_selection(&goal()).unwrap();
        s.commit_selection().await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(matches!(seen[0], SessionEventKind::SessionStarted { generation: 0 }));
        assert!(seen.iter().any(|k| matches!(k, SessionEventKind::PrimaryCreated { entity_id: 1, .. })));
        assert!(seen.iter().any(|k| matches!(k, SessionEventKind::CandidatesExtracted { count: 1, .. })));
        assert!(seen.iter().any(|k| matches!(k, SessionEventKind::SelectionChanged { selected: 1 })));
        assert!(matches!(seen.last(), Some(SessionEventKind::StepChanged { to: WizardStep::Complete, .. })));
        assert_eq!(seen.len(), s.events().len());
    }

    #[tokio::test]
    async fn second_transition_while_busy_is_rejected() {
        let gw = Arc::new(StubGateway::default().gated().with_create(Ok(2)));
        let s = session(&gw);
        let fields = alex();
        let probe = async {
            gw.entered.notified().await;
            let busy = s.is_busy();
            let can_commit = s.can_commit();
            let second = s.submit_primary(&fields, None).await;
            gw.gate.notify_one();
            (busy, can_commit, second)
        };
        let (first, (busy, can_commit, second)) = tokio::join!(s.submit_primary(&fields, None), probe);

        assert!(busy);
        assert!(!can_commit);
        assert_eq!(second, Err(WizardError::Sequence(SequenceError::Busy)));
        assert_eq!(first, Ok(WizardStep::Complete));
        assert_eq!(gw.create_calls.load(Ordering::SeqCst), 1);
        assert!(!s.is_busy());
    }

    #[test]
    fn submit_stays_pending_until_gateway_answers() {
        let gw = Arc::new(StubGateway::default().gated().with_create(Ok(4)));
        let s = session(&gw);
        let fields = alex();
        let mut first = task::spawn(s.submit_primary(&fields, None));
        assert_pending!(first.poll());
        assert!(s.is_busy());

        let mut second = task::spawn(s.submit_primary(&fields, None));
        assert_ready_eq!(second.poll(), Err(WizardError::Sequence(SequenceError::Busy)));

        gw.gate.notify_one();
        assert!(first.is_woken());
        assert_ready_eq!(first.poll(), Ok(WizardStep::Complete));
        assert_eq!(s.entity_id(), Some(4));
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn abandon_discards_in_flight_response() {
        let gw = Arc::new(StubGateway::default().gated().with_create(Ok(99)));
        let s = session(&gw);
        let completed = Arc::new(AtomicUsize::new(0));
        let hits = completed.clone();
        s.on_complete(move |_| {
             hits.fetch_add(1, Ordering::SeqCst);
         });
        let fields = alex();
        let probe = async {
            gw.entered.notified().await;
            s.abandon();
            gw.gate.notify_one();
        };
        let (first, ()) = tokio::join!(s.submit_primary(&fields, None), probe);

        assert_eq!(first,
                   Err(WizardError::Sequence(SequenceError::StaleResponse { started: 0, current: 1 })));
        assert_eq!(s.entity_id(), None);
        assert_eq!(s.step(), WizardStep::Form);
        assert_eq!(s.generation(), 1);
        assert!(!s.is_busy());
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        assert!(s.events()
                 .iter()
                 .any(|e| matches!(e.kind, SessionEventKind::StaleResponseDiscarded { started: 0, current: 1 })));
    }

    #[test]
    fn idempotency_key_tracks_fields() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(idempotency_key(id, 0, &alex()), idempotency_key(id, 0, &alex()));
        assert_ne!(idempotency_key(id, 0, &alex()), idempotency_key(id, 0, &alex().with("grade", "3")));
        assert_ne!(idempotency_key(id, 0, &alex()), idempotency_key(id, 1, &alex()));
    }
}
