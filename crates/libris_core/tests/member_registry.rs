mod common;

use common::{alice, fixed_clock, numbered_member, start_time};
use libris_core::{
    ErrorKind, FieldError, JsonFileStore, MemberChanges, MemberService, MemberServiceError,
    NewMember, SharedClock, MAX_ACTIVE_LOANS,
};
use std::path::Path;

fn open_members(dir: &Path) -> MemberService {
    let clock: SharedClock = fixed_clock();
    MemberService::open(JsonFileStore::new(dir.join("members.json")), clock).unwrap()
}

#[test]
fn add_stores_lowercase_email_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());

    let member = members.add(alice()).unwrap();
    assert_eq!(member.id, 1);
    assert_eq!(member.email, "alice@ex.com");
    assert_eq!(member.registered_at, start_time());
    assert_eq!((member.loan_count, member.active_loans), (0, 0));
    assert!(member.active);
}

#[test]
fn duplicate_email_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());
    members.add(alice()).unwrap();

    let err = members
        .add(NewMember {
            name: "Alice Dupont".to_string(),
            email: "  ALICE@ex.COM ".to_string(),
            ..alice()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        MemberServiceError::DuplicateEmail { existing_id: 1, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
    assert_eq!(members.list_all().len(), 1);
}

#[test]
fn invalid_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());

    let err = members
        .add(NewMember {
            name: "R2D2".to_string(),
            ..alice()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        MemberServiceError::Validation(FieldError::InvalidName { field: "name", .. })
    ));

    let err = members
        .add(NewMember {
            email: "alice.ex.com".to_string(),
            ..alice()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        MemberServiceError::Validation(FieldError::InvalidEmail(_))
    ));

    let err = members
        .add(NewMember {
            phone: "12 34".to_string(),
            ..alice()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(members.list_all().is_empty());
}

#[test]
fn find_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());
    members.add(alice()).unwrap();
    members.add(numbered_member(2)).unwrap();

    assert_eq!(members.find_by_email("ALICE@EX.COM").map(|m| m.id), Some(1));
    assert!(members.find_by_email("nobody@ex.com").is_none());
    assert_eq!(members.search("durand").len(), 1);
    assert_eq!(members.search("example.org").len(), 1);
    assert_eq!(members.search("").len(), 2);
}

#[test]
fn modify_validates_and_checks_email_uniqueness() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());
    members.add(alice()).unwrap();
    members.add(numbered_member(2)).unwrap();

    let updated = members
        .modify(
            1,
            MemberChanges {
                phone: Some("01 23 45 67 89".to_string()),
                email: Some("  ".to_string()),
                ..MemberChanges::default()
            },
        )
        .unwrap();
    assert_eq!(updated.phone, "01 23 45 67 89");
    assert_eq!(updated.email, "alice@ex.com");

    let err = members
        .modify(
            1,
            MemberChanges {
                name: Some("Alice Martin".to_string()),
                email: Some("Member2@Example.org".to_string()),
                ..MemberChanges::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        MemberServiceError::DuplicateEmail { existing_id: 2, .. }
    ));
    assert_eq!(members.find_by_id(1).unwrap().name, "Alice Durand");
}

#[test]
fn suspend_and_reactivate_toggle_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());
    members.add(alice()).unwrap();

    assert!(!members.suspend(1).unwrap().active);
    assert!(matches!(
        members.suspend(1).unwrap_err(),
        MemberServiceError::AlreadySuspended(1)
    ));
    assert!(members.list_active().is_empty());

    assert!(members.reactivate(1).unwrap().active);
    let err = members.reactivate(1).unwrap_err();
    assert!(matches!(err, MemberServiceError::AlreadyActive(1)));
    assert_eq!(err.kind(), ErrorKind::BusinessRuleViolation);

    assert_eq!(members.suspend(7).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn loan_counters_respect_limit_and_floor() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());
    members.add(alice()).unwrap();

    for _ in 0..MAX_ACTIVE_LOANS {
        members.add_loan_to_member(1).unwrap();
    }
    let err = members.add_loan_to_member(1).unwrap_err();
    assert!(matches!(err, MemberServiceError::LimitReached { id: 1, limit: 3 }));
    let member = members.find_by_id(1).unwrap();
    assert_eq!((member.active_loans, member.loan_count), (3, 3));

    for _ in 0..MAX_ACTIVE_LOANS + 1 {
        members.remove_loan_from_member(1).unwrap();
    }
    let member = members.find_by_id(1).unwrap();
    assert_eq!((member.active_loans, member.loan_count), (0, 3));

    members.suspend(1).unwrap();
    assert!(matches!(
        members.add_loan_to_member(1).unwrap_err(),
        MemberServiceError::Suspended(1)
    ));
}

#[test]
fn delete_refused_while_loans_outstanding() {
    let dir = tempfile::tempdir().unwrap();
    let mut members = open_members(dir.path());
    members.add(alice()).unwrap();
    members.add_loan_to_member(1).unwrap();

    let err = members.delete(1).unwrap_err();
    assert!(matches!(
        err,
        MemberServiceError::HasActiveLoans {
            id: 1,
            active_loans: 1
        }
    ));

    members.remove_loan_from_member(1).unwrap();
    assert_eq!(members.delete(1).unwrap().id, 1);
    assert!(members.find_by_id(1).is_none());
}

#[test]
fn reopen_persists_members_and_statistics() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut members = open_members(dir.path());
        members.add(alice()).unwrap();
        members.add(numbered_member(2)).unwrap();
        members.add(numbered_member(3)).unwrap();
        members.add_loan_to_member(2).unwrap();
        members.add_loan_to_member(3).unwrap();
        members.suspend(1).unwrap();
    }

    let mut members = open_members(dir.path());
    let stats = members.statistics();
    assert_eq!((stats.total, stats.active, stats.suspended), (3, 2, 1));
    assert_eq!(stats.most_active.map(|m| m.id), Some(2));

    assert_eq!(members.add(numbered_member(4)).unwrap().id, 4);
}
