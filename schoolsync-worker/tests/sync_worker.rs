mod common;

use chrono::Duration;

use schoolsync_core::{LuckyNumber, NotificationType, StudentId, Subject, SyncConfig, Timetable};
use schoolsync_sync::{AuthFailure, SyncError};
use schoolsync_worker::{Delivered, SyncWorker};

use common::{exam, grade, lesson, member, note, today, Harness};

fn config(verification_rate: f64, notifications_enabled: bool) -> SyncConfig {
    SyncConfig {
        verification_rate,
        notifications_enabled,
        ..SyncConfig::default()
    }
}

fn deliveries_of(h: &Harness, kind: NotificationType) -> Vec<(String, Vec<String>, usize)> {
    h.notifier
        .delivered()
        .into_iter()
        .filter_map(|d| match d {
            Delivered::Notification {
                notification,
                scope_key,
                recipients,
            } if notification.kind == kind => Some((scope_key, recipients, notification.lines.len())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn one_grade_notification_for_two_accounts_of_one_pupil() {
    let h = Harness::new(config(1.0, true));
    *h.api.grades.lock().unwrap() = (vec![grade("Math", "5"), grade("Art", "4")], Vec::new());
    let members = [member("mother", 1, "Jan"), member("jan", 2, "Jan")];
    let worker = SyncWorker::new(h.ctx.clone(), &h.config);

    let report = worker.run(&members).await;

    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.anomalies().count(), 0, "both accounts see the same grades");
    let grades = deliveries_of(&h, NotificationType::NewGradeDetails);
    assert_eq!(
        grades,
        vec![(
            "Jan".to_string(),
            vec!["mother".to_string(), "jan".to_string()],
            2
        )]
    );

    let stored = h
        .repos
        .grades
        .grades_from_store(&members[0].semester)
        .await
        .expect("grades");
    assert!(stored.iter().all(|g| g.is_notified));

    worker.run(&members).await;
    assert_eq!(
        deliveries_of(&h, NotificationType::NewGradeDetails).len(),
        1,
        "nothing new on the second run"
    );
}

#[tokio::test]
async fn disabled_notifications_store_rows_as_notified() {
    let h = Harness::new(config(0.0, false));
    *h.api.grades.lock().unwrap() = (vec![grade("Math", "5")], Vec::new());
    *h.api.exams.lock().unwrap() = vec![exam("Math")];

    let report = SyncWorker::new(h.ctx.clone(), &h.config)
        .run(&[member("jan", 2, "Jan")])
        .await;

    assert!(report.is_success());
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test]
async fn exam_notification_is_shared_by_the_lesson_group() {
    let h = Harness::new(config(0.0, true));
    *h.api.exams.lock().unwrap() = vec![exam("Math"), exam("Physics")];
    let members = [member("ola", 1, "Ola"), member("jan", 2, "Jan")];

    SyncWorker::new(h.ctx.clone(), &h.config)
        .run(&members)
        .await;

    let exams = deliveries_of(&h, NotificationType::NewExam);
    assert_eq!(exams.len(), 1);
    assert_eq!(exams[0].0, "3b");
    assert_eq!(exams[0].1, vec!["ola", "jan"]);
    assert_eq!(exams[0].2, 2);
}

#[tokio::test]
async fn lucky_number_is_announced_once_per_school() {
    let h = Harness::new(config(0.0, true));
    *h.api.lucky_number.lock().unwrap() = Some(LuckyNumber {
        student_id: StudentId(100),
        date: today(),
        lucky_number: 13,
        ..LuckyNumber::default()
    });
    let members = [member("ola", 1, "Ola"), member("jan", 2, "Jan")];
    let worker = SyncWorker::new(h.ctx.clone(), &h.config);

    worker.run(&members).await;
    worker.run(&members).await;

    let announced: Vec<_> = h
        .notifier
        .notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationType::NewLuckyNumber)
        .collect();
    assert_eq!(announced.len(), 1);
    assert!(announced[0].title.contains("13"));
}

#[tokio::test]
async fn network_failures_are_reported_without_notifications() {
    let h = Harness::new(config(0.0, true));
    h.api.fail_with(SyncError::network("offline"));

    let report = SyncWorker::new(h.ctx.clone(), &h.config)
        .run(&[member("jan", 2, "Jan")])
        .await;

    assert!(!report.is_success());
    assert_eq!(report.works.len(), 12);
    assert!(report.works.iter().all(|w| w.failures.len() == 1));
    assert_eq!(report.captcha_prompts, 0);
    assert!(h.notifier.delivered().is_empty());
}

#[tokio::test]
async fn captcha_challenge_prompts_every_affected_account() {
    let h = Harness::new(config(0.0, true));
    h.api.fail_with(SyncError::Auth(AuthFailure::CaptchaRequired {
        url: "https://register.test/captcha".into(),
    }));
    let members = [member("mother", 1, "Jan"), member("jan", 2, "Jan")];

    let report = SyncWorker::new(h.ctx.clone(), &h.config)
        .run(&members)
        .await;

    assert_eq!(report.captcha_prompts, 2);
    let accounts: Vec<_> = h
        .notifier
        .delivered()
        .into_iter()
        .filter_map(|d| match d {
            Delivered::CaptchaRequired { account, .. } => Some(account),
            _ => None,
        })
        .collect();
    assert_eq!(accounts, vec!["mother", "jan"]);
}

#[tokio::test]
async fn timetable_changes_are_announced_once_per_lesson_group() {
    let h = Harness::new(config(0.0, true));
    *h.api.timetable.lock().unwrap() = vec![
        lesson(1, today(), "Math"),
        Timetable {
            subject_old: "Math".to_string(),
            changes: true,
            ..lesson(2, today(), "Physics")
        },
        Timetable {
            canceled: true,
            ..lesson(3, today() + Duration::days(1), "Art")
        },
    ];
    let members = [member("ola", 1, "Ola"), member("jan", 2, "Jan")];
    let worker = SyncWorker::new(h.ctx.clone(), &h.config);

    worker.run(&members).await;
    worker.run(&members).await;

    let changes = deliveries_of(&h, NotificationType::ChangeTimetable);
    assert_eq!(
        changes,
        vec![("3b".to_string(), vec!["ola".to_string(), "jan".to_string()], 2)]
    );
    let week = h
        .repos
        .timetable
        .timetable_from_store(&members[0].semester, today(), today() + Duration::days(7))
        .await
        .expect("lessons");
    assert_eq!(week.len(), 3);
    assert!(week.iter().all(|l| l.is_notified), "regular lessons settle silently");
}

#[tokio::test]
async fn duplicated_notes_are_announced_once_and_all_settled() {
    let h = Harness::new(config(0.0, true));
    *h.api.notes.lock().unwrap() = vec![note("late again"), note("late again"), note("praise")];
    let jan = member("jan", 2, "Jan");

    SyncWorker::new(h.ctx.clone(), &h.config)
        .run(std::slice::from_ref(&jan))
        .await;

    let notes = deliveries_of(&h, NotificationType::NewNote);
    assert_eq!(notes, vec![("Jan".to_string(), vec!["jan".to_string()], 2)]);
    let stored = h.repos.notes.notes_from_store(&jan.student).await.expect("notes");
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|n| n.is_notified));
}

#[tokio::test]
async fn attendance_summary_is_refreshed_for_every_subject() {
    let h = Harness::new(config(0.0, true));
    let subject = |real_id: i64, name: &str| Subject {
        student_id: StudentId(100),
        diary_id: 5,
        real_id,
        name: name.to_string(),
        ..Subject::default()
    };
    *h.api.subjects.lock().unwrap() = vec![subject(4, "Math"), subject(9, "Art")];

    let report = SyncWorker::new(h.ctx.clone(), &h.config)
        .run(&[member("jan", 2, "Jan")])
        .await;

    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(*h.api.summary_requests.lock().unwrap(), vec![-1, 4, 9]);
    let math = h
        .repos
        .attendance_summary
        .attendance_summary_from_store(&member("jan", 2, "Jan").semester, 4)
        .await
        .expect("summary");
    assert_eq!(math.len(), 1);
}
