use intake_adapters::InMemoryGateway;
use intake_core::{Operation, RemoteError, SequenceError, ServiceGateway, SessionEventKind, WizardError, WizardSession,
                  WizardStep, ALREADY_CREATED_NOTICE, NOTHING_EXTRACTED_NOTICE};
use intake_domain::{Attachment, FieldRules, Goal, PrimaryFields};
use std::sync::{Arc, Mutex};

fn alex() -> PrimaryFields {
    PrimaryFields::new().with("name", "Alex").with("grade", "2")
}

fn iep(text: &str) -> Attachment {
    Attachment::pdf("iep.pdf", text.as_bytes().to_vec())
}

#[tokio::test]
async fn alex_without_attachment_completes_and_notifies() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::new(gw.clone());
    let done = Arc::new(Mutex::new(Vec::new()));
    let sink = done.clone();
    session.on_complete(move |id| sink.lock().unwrap().push(id));

    assert_eq!(session.submit_primary(&alex(), None).await, Ok(WizardStep::Complete));
    let id = session.entity_id().expect("entity created");
    assert_eq!(*done.lock().unwrap(), vec![id]);
    let stored = gw.fetch_primary(id).await.unwrap();
    assert_eq!((stored.name.as_str(), stored.grade.as_str()), ("Alex", "2"));
}

#[tokio::test]
async fn attachment_leads_to_goal_selection_with_one_candidate() {
    let gw = Arc::new(InMemoryGateway::new());
    // Seis alumnos previos: el siguiente id es 7
    for i in 0..6 {
        gw.create_primary(&alex(), &format!("seed-{i}")).await.unwrap();
    }
    let session = WizardSession::new(gw.clone());
    let step = session.submit_primary(&alex(), Some(&iep("Goal 1: Read 3 sentences. Baseline: Reads 1 sentence.")))
                      .await
                      .unwrap();
    assert_eq!(step, WizardStep::GoalSelection);
    assert_eq!(session.entity_id(), Some(7));
    assert_eq!(session.candidates(), vec![Goal::new("Read 3 sentences.", "Reads 1 sentence.")]);
    assert!(!session.can_commit());
}

#[tokio::test]
async fn empty_extraction_shows_notice() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::new(gw);
    let step = session.submit_primary(&alex(), Some(&iep("No goals here"))).await.unwrap();
    assert_eq!(step, WizardStep::GoalSelection);
    assert!(session.candidates().is_empty());
    assert_eq!(session.notice().as_deref(), Some(NOTHING_EXTRACTED_NOTICE));
    assert_eq!(session.error_message(), None);
    assert_eq!(session.commit_selection().await,
               Err(WizardError::Sequence(SequenceError::EmptySelection)));
}

#[tokio::test]
async fn full_flow_persists_selection_in_choice_order() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::new(gw.clone());
    let text = "Goal 1: Read 3 sentences. Baseline: Reads 1 sentence. Goal 2: Count to 20. Baseline: Counts to 10.";
    session.submit_primary(&alex(), Some(&iep(text))).await.unwrap();
    let candidates = session.candidates();
    session.toggle_selection(&candidates[1]).unwrap();
    session.toggle_selection(&candidates[0]).unwrap();
    assert!(session.can_commit());

    assert_eq!(session.commit_selection().await, Ok(WizardStep::Complete));
    let stored = gw.fetch_primary(session.entity_id().unwrap()).await.unwrap();
    let texts: Vec<&str> = stored.goals.iter().map(|g| g.text.as_str()).collect();
    assert_eq!(texts, vec!["Count to 20.", "Read 3 sentences."]);
}

#[tokio::test]
async fn retry_after_failed_extraction_does_not_create_twice() {
    let gw = Arc::new(InMemoryGateway::new());
    gw.fail_next(Operation::Extract, RemoteError::status(500, "pdf parser crashed"));
    let session = WizardSession::new(gw.clone());
    let pdf = iep("Goal 1: Read.");

    let err = session.submit_primary(&alex(), Some(&pdf)).await.unwrap_err();
    assert_eq!(err.user_message(), "Error processing IEP file");
    assert_eq!(session.step(), WizardStep::Form);

    assert_eq!(session.extract_candidates(&pdf).await, Ok(WizardStep::GoalSelection));
    assert_eq!(gw.calls(Operation::CreatePrimary), 1);
    assert_eq!(gw.student_count(), 1);
}

#[tokio::test]
async fn retried_create_reuses_idempotency_key() {
    let gw = Arc::new(InMemoryGateway::new());
    gw.fail_next(Operation::CreatePrimary, RemoteError::transport("connection reset"));
    let session = WizardSession::new(gw.clone());
    assert!(session.submit_primary(&alex(), None).await.unwrap_err().is_remote());
    assert_eq!(session.error_message().as_deref(), Some("Failed to add student"));
    let first_key = session.idempotency_key();

    session.submit_primary(&alex(), None).await.unwrap();
    assert_eq!(session.idempotency_key(), first_key);
    assert_eq!(gw.calls(Operation::CreatePrimary), 2);
}

#[tokio::test]
async fn lost_create_response_is_recovered_by_retry() {
    let gw = Arc::new(InMemoryGateway::new());
    gw.fail_after_commit(Operation::CreatePrimary, RemoteError::transport("timeout after commit"));
    let session = WizardSession::new(gw.clone());
    let padded = PrimaryFields::new().with("name", "Alex ").with("grade", "2");

    assert!(session.submit_primary(&padded, None).await.unwrap_err().is_remote());
    assert_eq!(session.entity_id(), None);
    assert_eq!(gw.student_count(), 1);

    assert_eq!(session.submit_primary(&alex(), None).await, Ok(WizardStep::Complete));
    assert_eq!(session.entity_id(), Some(1));
    assert_eq!(gw.student_count(), 1);
    assert_eq!(gw.calls(Operation::CreatePrimary), 2);
}

#[tokio::test]
async fn correcting_the_form_after_back_does_not_touch_the_student() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::new(gw.clone());
    let text = "Goal 1: Read 3 sentences. Baseline: Reads 1 sentence.";
    let typo = PrimaryFields::new().with("name", "Alx").with("grade", "2");
    session.submit_primary(&typo, Some(&iep(text))).await.unwrap();
    session.back().unwrap();

    let fixed = PrimaryFields::new().with("name", "Alex").with("grade", "3");
    let err = session.submit_primary(&fixed, Some(&iep(text))).await.unwrap_err();
    assert!(matches!(err, WizardError::Sequence(SequenceError::AlreadyCreated { .. })));
    assert_eq!(session.notice().as_deref(), Some(ALREADY_CREATED_NOTICE));
    assert_eq!(session.step(), WizardStep::Form);
    let stored = gw.student(session.entity_id().unwrap()).unwrap();
    assert_eq!((stored.name.as_str(), stored.grade.as_str()), ("Alx", "2"));
    assert_eq!(gw.calls(Operation::CreatePrimary), 1);
    assert_eq!(gw.calls(Operation::Extract), 1);
}

#[tokio::test]
async fn invalid_grade_is_rejected_locally() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::new(gw.clone());
    let err = session.submit_primary(&PrimaryFields::new().with("name", "Alex").with("grade", "9"), None)
                     .await
                     .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(gw.calls(Operation::CreatePrimary), 0);
    assert!(session.events()
                   .iter()
                   .any(|e| matches!(&e.kind, SessionEventKind::ValidationFailed { field: Some(f), .. } if f == "grade")));
}

#[tokio::test]
async fn builder_applies_custom_rules() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::builder(gw).rules(FieldRules::required_names(["name"])).build();
    let only_name = PrimaryFields::new().with("name", "Sam");
    assert_eq!(session.submit_primary(&only_name, None).await, Ok(WizardStep::Complete));
}

#[tokio::test]
async fn reset_starts_a_fresh_generation() {
    let gw = Arc::new(InMemoryGateway::new());
    let session = WizardSession::new(gw.clone());
    session.submit_primary(&alex(), None).await.unwrap();
    let first_key = session.idempotency_key();
    session.reset().unwrap();
    session.submit_primary(&alex(), None).await.unwrap();
    assert_ne!(session.idempotency_key(), first_key);
    assert_eq!(gw.student_count(), 2);
}
