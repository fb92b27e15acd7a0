mod support;

use std::sync::atomic::Ordering;

use eventhub::application::certificates::{IssuanceSummary, IssueError, IssueOptions};
use eventhub::application::mailer::MailError;
use eventhub::application::repos::RepoError;
use time::OffsetDateTime;
use uuid::Uuid;

use support::{Harness, RecordingMailer, ended_hours_ago};

#[tokio::test]
async fn every_participant_receives_a_certificate() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    for (name, email) in [
        ("Ada", "ada@example.org"),
        ("Grace", "grace@example.org"),
        ("Linus", "linus@example.org"),
    ] {
        harness.store.seed_participant(event.id, name, email).await;
    }

    let report = harness
        .certificates
        .issue_for_event(event.id, IssueOptions::default())
        .await
        .expect("issue");

    assert_eq!((report.sent, report.failed, report.total), (3, 0, 3));
    assert!(report.failures.is_empty());
    assert!(harness.store.event(event.id).await.expect("event").certificates_sent);
    for participant in harness.store.participants_of(event.id).await {
        assert!(participant.certificate_sent);
        assert!(participant.certificate_sent_at.is_some());
    }

    let sent = harness.mailer.sent.lock().await;
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|mail| mail.subject == "Certificate - RustConf"));
    assert!(sent.iter().all(|mail| mail.attachments.len() == 1));
}

#[tokio::test]
async fn one_failed_delivery_does_not_stop_the_batch() {
    let harness = Harness::new(RecordingMailer::failing_for(&["grace@example.org"]));
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let ada = harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;
    let grace = harness
        .store
        .seed_participant(event.id, "Grace", "grace@example.org")
        .await;

    let report = harness
        .certificates
        .issue_for_event(event.id, IssueOptions::default())
        .await
        .expect("issue");

    assert_eq!((report.sent, report.failed, report.total), (1, 1, 2));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].participant_id, grace.id);
    assert_eq!(report.failures[0].email, "grace@example.org");

    assert!(harness.store.participant(ada.id).await.expect("ada").certificate_sent);
    let grace = harness.store.participant(grace.id).await.expect("grace");
    assert!(!grace.certificate_sent);
    assert!(grace.certificate_sent_at.is_none());
    assert!(harness.store.event(event.id).await.expect("event").certificates_sent);
}

#[tokio::test]
async fn event_stays_pending_when_nothing_was_sent() {
    let harness = Harness::new(RecordingMailer::failing_for(&["ada@example.org"]));
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;

    let report = harness
        .certificates
        .issue_for_event(event.id, IssueOptions::default())
        .await
        .expect("issue");

    assert_eq!((report.sent, report.total), (0, 1));
    assert!(!harness.store.event(event.id).await.expect("event").certificates_sent);
}

#[tokio::test]
async fn foreign_participant_ids_are_ignored() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let other = harness.store.seed_event("Elsewhere", ended_hours_ago(1)).await;
    let outsider = harness
        .store
        .seed_participant(other.id, "Eve", "eve@example.org")
        .await;

    let summary = harness
        .certificates
        .issue_for_selected(event.id, &[outsider.id, Uuid::new_v4()], IssueOptions::default())
        .await
        .expect("issue");

    assert_eq!(summary, IssuanceSummary { sent: 0, total: 0 });
    assert!(harness.mailer.sent.lock().await.is_empty());
    assert!(!harness.store.participant(outsider.id).await.expect("eve").certificate_sent);
    assert!(!harness.store.event(event.id).await.expect("event").certificates_sent);
}

#[tokio::test]
async fn selected_issuance_never_flags_the_event() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let ada = harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;
    harness
        .store
        .seed_participant(event.id, "Grace", "grace@example.org")
        .await;

    let summary = harness
        .certificates
        .issue_for_selected(event.id, &[ada.id], IssueOptions::default())
        .await
        .expect("issue");

    assert_eq!(summary, IssuanceSummary { sent: 1, total: 1 });
    assert_eq!(harness.mailer.recipients().await, vec!["ada@example.org"]);
    assert!(!harness.store.event(event.id).await.expect("event").certificates_sent);
}

#[tokio::test]
async fn preview_leaves_delivery_state_alone() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let ada = harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;
    harness
        .certificates
        .issue_for_participant(ada.id)
        .await
        .expect("first send");
    let before = harness.store.participant(ada.id).await.expect("ada");
    let mails_before = harness.mailer.sent.lock().await.len();

    let pdf = harness
        .certificates
        .render_preview(ada.id)
        .await
        .expect("preview");

    assert!(pdf.starts_with(b"%PDF"));
    let after = harness.store.participant(ada.id).await.expect("ada");
    assert_eq!(after.certificate_sent_at, before.certificate_sent_at);
    assert_eq!(harness.mailer.sent.lock().await.len(), mails_before);
}

#[tokio::test]
async fn force_controls_resending() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let ada = harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;
    harness
        .store
        .seed_participant(event.id, "Grace", "grace@example.org")
        .await;
    harness
        .certificates
        .issue_for_participant(ada.id)
        .await
        .expect("first send");

    let skipped = harness
        .certificates
        .issue_for_event(event.id, IssueOptions::skip_sent())
        .await
        .expect("issue");
    assert_eq!((skipped.sent, skipped.total), (1, 1));

    let forced = harness
        .certificates
        .issue_for_event(event.id, IssueOptions { force: true })
        .await
        .expect("issue");
    assert_eq!((forced.sent, forced.total), (2, 2));
    assert_eq!(harness.renderer.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn single_send_surfaces_transport_errors() {
    let harness = Harness::new(RecordingMailer::failing_for(&["ada@example.org"]));
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let ada = harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;

    let err = harness
        .certificates
        .issue_for_participant(ada.id)
        .await
        .expect_err("transport rejects");

    assert!(matches!(
        err,
        IssueError::Dispatch(MailError::Rejected { status: 422, .. })
    ));
    assert!(!harness.store.participant(ada.id).await.expect("ada").certificate_sent);
}

#[tokio::test]
async fn unknown_targets_are_reported_as_missing() {
    let harness = Harness::new(RecordingMailer::default());

    assert!(matches!(
        harness
            .certificates
            .issue_for_event(Uuid::new_v4(), IssueOptions::default())
            .await,
        Err(IssueError::EventNotFound)
    ));
    assert!(matches!(
        harness.certificates.render_preview(Uuid::new_v4()).await,
        Err(IssueError::ParticipantNotFound)
    ));
}

#[tokio::test]
async fn sent_never_exceeds_total() {
    let harness = Harness::new(RecordingMailer::failing_for(&["p1@example.org", "p4@example.org"]));
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    for index in 0..6 {
        harness
            .store
            .seed_participant(event.id, &format!("P{index}"), &format!("p{index}@example.org"))
            .await;
    }

    let report = harness
        .certificates
        .issue_for_event(event.id, IssueOptions::default())
        .await
        .expect("issue");

    assert_eq!(report.total, 6);
    assert!(report.sent <= report.total);
    assert_eq!(report.sent + report.failed, report.total);
    assert_eq!(report.sent, 4);
}

#[tokio::test]
async fn sent_timestamps_are_taken_during_the_run() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(3)).await;
    for (name, email) in [("Ada", "ada@example.org"), ("Grace", "grace@example.org")] {
        harness.store.seed_participant(event.id, name, email).await;
    }

    let run_started = OffsetDateTime::now_utc();
    harness
        .certificates
        .issue_for_event(event.id, IssueOptions::default())
        .await
        .expect("issue");
    let run_finished = OffsetDateTime::now_utc();

    for participant in harness.store.participants_of(event.id).await {
        let sent_at = participant.certificate_sent_at.expect("sent timestamp");
        assert!(sent_at >= run_started, "{sent_at} precedes {run_started}");
        assert!(sent_at <= run_finished);
    }
}

#[tokio::test]
async fn flag_failure_surfaces_after_deliveries_are_recorded() {
    let harness = Harness::new(RecordingMailer::default());
    let event = harness.store.seed_event("RustConf", ended_hours_ago(1)).await;
    let ada = harness
        .store
        .seed_participant(event.id, "Ada", "ada@example.org")
        .await;
    harness.store.reject_event_flag.store(true, Ordering::SeqCst);

    let err = harness
        .certificates
        .issue_for_event(event.id, IssueOptions::default())
        .await
        .expect_err("flag write fails");

    assert!(matches!(err, IssueError::Repo(RepoError::Persistence(_))));
    assert_eq!(harness.mailer.recipients().await, vec!["ada@example.org"]);
    assert!(harness.store.participant(ada.id).await.expect("ada").certificate_sent);
    assert!(!harness.store.event(event.id).await.expect("event").certificates_sent);
}
