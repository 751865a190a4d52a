use std::sync::Arc;

use course_core::model::{
    Course, CourseId, CourseStatus, Lecture, LectureId, StudentId,
};
use course_core::time::{fixed_clock, fixed_now};
use services::{CertificateService, LectureFlowService, LectureSignal};
use storage::repository::{CourseRepository, InMemoryRepository, ProgressRepository};

#[tokio::test]
async fn full_flow_watches_course_to_completion_and_resets() {
    let repo = InMemoryRepository::new();
    let course_id = CourseId::new(1);
    let student = StudentId::generate();

    let course = Course::new(
        course_id,
        "Smoke Course",
        vec![
            Lecture::new(LectureId::new(1), "Intro", None, true).unwrap(),
            Lecture::new(LectureId::new(2), "Middle", None, false).unwrap(),
            Lecture::new(LectureId::new(3), "Finale", None, false).unwrap(),
        ],
        true,
        true,
        fixed_now(),
    )
    .unwrap();
    repo.upsert_course(&course).await.unwrap();

    let flow = LectureFlowService::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let mut session = flow.start_session(student, course_id).await.unwrap();
    assert_eq!(session.status(), CourseStatus::NotStarted);

    // Watch the whole curriculum in order, following the advance signals.
    let mut watched = Vec::new();
    loop {
        let target = session.current_lecture().unwrap().id();
        watched.push(target);
        let outcome = flow.on_lecture_ended(&mut session, target).await.unwrap();
        assert!(outcome.persisted);
        match outcome.signal {
            LectureSignal::Advance { next } => {
                assert_eq!(session.current_lecture().unwrap().id(), next.id());
            }
            LectureSignal::CourseCompleted {
                completed,
                certificate_available,
            } => {
                assert!(completed);
                assert!(certificate_available);
                break;
            }
        }
    }

    assert_eq!(
        watched,
        vec![LectureId::new(1), LectureId::new(2), LectureId::new(3)]
    );
    assert!(session.is_completed());
    assert_eq!(session.completion_date(), Some(fixed_now()));
    assert!(CertificateService::check_eligibility(&session).is_ok());

    // Everything landed in storage.
    assert_eq!(repo.list_records(student, course_id).await.unwrap().len(), 3);
    let completion = repo
        .completion(student, course_id)
        .await
        .unwrap()
        .expect("completion row");
    assert!(completion.completed);

    // Rewatch from scratch.
    let snapshot = flow.reset_progress(&mut session).await.unwrap();
    assert_eq!(snapshot.status, CourseStatus::NotStarted);
    assert_eq!(
        session.current_lecture().unwrap().id(),
        LectureId::new(1)
    );
    assert!(repo.list_records(student, course_id).await.unwrap().is_empty());
    assert!(repo.completion(student, course_id).await.unwrap().is_none());
}
