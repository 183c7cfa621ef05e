use rusqlite::Connection;
use uuid::Uuid;
use venuedir_core::db::open_db_in_memory;
use venuedir_core::{
    DirectoryConfig, DirectoryError, InvariantViolation, NameMatch, Venue, VenueDirectoryService,
    VenueId, VenueListQuery, VenueProperties,
};

fn directory(conn: &Connection) -> VenueDirectoryService<'_> {
    VenueDirectoryService::new(conn, DirectoryConfig::default())
}

fn assign(service: &VenueDirectoryService<'_>, event_id: Uuid, name: &str) -> Venue {
    service
        .assign_by_name(event_id, name, &VenueProperties::default())
        .unwrap()
        .unwrap()
}

fn count_of(service: &VenueDirectoryService<'_>, venue_id: VenueId) -> u32 {
    service.get_venue(venue_id).unwrap().unwrap().event_count
}

fn assert_clean(service: &VenueDirectoryService<'_>) {
    let report = service.audit().unwrap();
    assert!(report.is_clean(), "violations: {:?}", report.violations);
}

#[test]
fn new_venue_by_name_starts_at_one_and_counts_later_assignments() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

    let loft = assign(&service, e1, "The Loft");
    assert_eq!(loft.name, "The Loft");
    assert_eq!(loft.event_count, 1);
    assert_clean(&service);

    let again = assign(&service, e2, "The Loft");
    assert_eq!(again.id, loft.id);
    assert_eq!(count_of(&service, loft.id), 2);
    assert_clean(&service);
}

#[test]
fn reassigning_to_a_new_venue_moves_the_count() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

    let loft = assign(&service, e1, "The Loft");
    assign(&service, e2, "The Loft");

    let annex = assign(&service, e1, "The Annex");
    assert_ne!(annex.id, loft.id);
    assert_eq!(count_of(&service, loft.id), 1);
    assert_eq!(count_of(&service, annex.id), 1);
    assert_eq!(service.get_venue_for_event(e1).unwrap(), Some(annex.id));
    assert_clean(&service);
}

#[test]
fn clearing_an_event_zeroes_the_venue_count() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    let annex = assign(&service, e1, "The Annex");
    let cleared = service.assign_by_id(e1, None).unwrap();

    assert_eq!(cleared, None);
    assert_eq!(count_of(&service, annex.id), 0);
    assert!(!service.event_has_venue(e1).unwrap());
    let reference = service.event_reference(e1).unwrap().unwrap();
    assert_eq!(reference.venue_name, "");
    assert_clean(&service);
}

#[test]
fn empty_or_blank_name_clears_the_venue() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    let loft = assign(&service, e1, "The Loft");
    let result = service
        .assign_by_name(e1, "   ", &VenueProperties::default())
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(count_of(&service, loft.id), 0);
    assert_eq!(service.get_venue_for_event(e1).unwrap(), None);
}

#[test]
fn assigning_the_current_name_twice_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    let loft = assign(&service, e1, "The Loft");
    let first = assign(&service, e1, "The Loft");
    let second = assign(&service, e1, "  The Loft ");

    assert_eq!(first.id, loft.id);
    assert_eq!(second.id, loft.id);
    assert_eq!(count_of(&service, loft.id), 1);
    assert_eq!(service.list_venues(&VenueListQuery::default()).unwrap().len(), 1);
    assert_clean(&service);
}

#[test]
fn deleting_a_venue_removes_every_relationship() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let events: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    let loft = assign(&service, events[0], "The Loft");
    assign(&service, events[1], "The Loft");
    assign(&service, events[2], "The Loft");
    assert_eq!(count_of(&service, loft.id), 3);

    let mut detached = service.delete_venue(loft.id).unwrap();
    detached.sort();
    let mut expected = events.clone();
    expected.sort();
    assert_eq!(detached, expected);

    assert_eq!(service.get_venue(loft.id).unwrap(), None);
    assert!(service.events_for_venue(loft.id).unwrap().is_empty());
    for event_id in &events {
        assert_eq!(service.venue_for_event(*event_id).unwrap(), None);
    }
    assert_clean(&service);

    let err = service.delete_venue(loft.id).unwrap_err();
    assert!(matches!(err, DirectoryError::VenueNotFound(id) if id == loft.id));
}

#[test]
fn new_venue_takes_seed_properties_but_not_seed_name() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    let seed = VenueProperties::named("ignored").with_timezone("America/Chicago");
    let venue = service
        .assign_by_name(Uuid::new_v4(), "Mohawk", &seed)
        .unwrap()
        .unwrap();

    assert_eq!(venue.name, "Mohawk");
    assert_eq!(venue.timezone, "America/Chicago");
    assert_eq!(service.find_by_name("ignored").unwrap(), None);
}

#[test]
fn assign_by_id_rejects_missing_venue_and_keeps_previous_link() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    let loft = assign(&service, e1, "The Loft");
    let missing = Uuid::new_v4();
    let err = service.assign_by_id(e1, Some(missing)).unwrap_err();

    assert!(matches!(err, DirectoryError::VenueNotFound(id) if id == missing));
    assert_eq!(err.code(), "venue_not_found");
    assert_eq!(service.get_venue_for_event(e1).unwrap(), Some(loft.id));
    assert_eq!(count_of(&service, loft.id), 1);
}

#[test]
fn assign_by_id_moves_between_existing_venues() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    let loft = service
        .create_venue(&VenueProperties::named("The Loft"))
        .unwrap();
    let annex = service
        .create_venue(&VenueProperties::named("The Annex"))
        .unwrap();
    assert_eq!(loft.event_count, 0);

    let linked = service.assign_by_id(e1, Some(loft.id)).unwrap().unwrap();
    assert_eq!(linked.event_count, 1);

    let moved = service.assign_by_id(e1, Some(annex.id)).unwrap().unwrap();
    assert_eq!(moved.id, annex.id);
    assert_eq!(moved.event_count, 1);
    assert_eq!(count_of(&service, loft.id), 0);
    assert_clean(&service);
}

#[test]
fn duplicate_names_are_suffixed_through_the_service() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    let first = service
        .create_venue(&VenueProperties::named("Echo Lounge"))
        .unwrap();
    let second = service
        .create_venue(&VenueProperties::named("Echo Lounge"))
        .unwrap();
    let third = service
        .create_venue(&VenueProperties::named("Echo Lounge"))
        .unwrap();

    assert_eq!(first.name, "Echo Lounge");
    assert_eq!(second.name, "Echo Lounge 2");
    assert_eq!(third.name, "Echo Lounge 3");

    let linked = assign(&service, Uuid::new_v4(), "Echo Lounge");
    assert_eq!(linked.id, first.id);
}

#[test]
fn rename_updates_event_references() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

    let loft = assign(&service, e1, "The Loft");
    assign(&service, e2, "The Loft");

    let renamed = service
        .update_venue(loft.id, &VenueProperties::named("Loft Upstairs"))
        .unwrap();
    assert_eq!(renamed.name, "Loft Upstairs");
    assert_eq!(renamed.event_count, 2);

    for event_id in [e1, e2] {
        let reference = service.event_reference(event_id).unwrap().unwrap();
        assert_eq!(reference.venue_name, "Loft Upstairs");
    }
    assert_clean(&service);

    let moved = assign(&service, e1, "Loft Upstairs");
    assert_eq!(moved.id, loft.id);
}

#[test]
fn case_insensitive_matching_reuses_existing_venue() {
    let conn = open_db_in_memory().unwrap();
    let service = VenueDirectoryService::new(
        &conn,
        DirectoryConfig {
            name_match: NameMatch::CaseInsensitive,
            ..DirectoryConfig::default()
        },
    );
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

    let loft = assign(&service, e1, "The Loft");
    let same = assign(&service, e2, "the loft");
    assert_eq!(same.id, loft.id);
    assert_eq!(count_of(&service, loft.id), 2);

    let noop = assign(&service, e1, "THE LOFT");
    assert_eq!(noop.id, loft.id);
    assert_eq!(count_of(&service, loft.id), 2);
    assert_clean(&service);
}

#[test]
fn exact_matching_keeps_differently_cased_venues_apart() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);

    let upper = assign(&service, Uuid::new_v4(), "The Loft");
    let lower = assign(&service, Uuid::new_v4(), "the loft");

    assert_ne!(upper.id, lower.id);
    assert_eq!(lower.name, "the loft");
    assert_clean(&service);
}

#[test]
fn invariant_violation_rolls_back_the_whole_unit() {
    let conn = open_db_in_memory().unwrap();
    // Two live names that only collide under case-insensitive comparison.
    conn.execute_batch(
        "INSERT INTO venues (uuid, name) VALUES
            ('00000000-0000-4000-8000-000000000001', 'The Loft'),
            ('00000000-0000-4000-8000-000000000002', 'the loft');",
    )
    .unwrap();
    let loft: VenueId = "00000000-0000-4000-8000-000000000001".parse().unwrap();

    let service = VenueDirectoryService::new(
        &conn,
        DirectoryConfig {
            name_match: NameMatch::CaseInsensitive,
            ..DirectoryConfig::default()
        },
    );
    let e1 = Uuid::new_v4();
    let err = service.assign_by_id(e1, Some(loft)).unwrap_err();

    assert!(matches!(err, DirectoryError::InvariantViolation(_)));
    assert_eq!(err.code(), "invariant_violation");
    assert_eq!(service.get_venue_for_event(e1).unwrap(), None);
    assert_eq!(service.event_reference(e1).unwrap(), None);
    assert_eq!(count_of(&service, loft), 0);
    assert!(conn.is_autocommit());

    let report = service.audit().unwrap();
    assert!(report
        .violations
        .iter()
        .any(|violation| matches!(violation, InvariantViolation::DuplicateName { .. })));
}

#[test]
fn audit_reports_tampered_counts_and_references() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    let loft = assign(&service, e1, "The Loft");
    conn.execute(
        "UPDATE venues SET event_count = 5 WHERE uuid = ?1;",
        [loft.id.to_string()],
    )
    .unwrap();
    conn.execute(
        "UPDATE event_refs SET venue_name = 'Elsewhere' WHERE event_uuid = ?1;",
        [e1.to_string()],
    )
    .unwrap();

    let report = service.audit().unwrap();
    assert_eq!(report.venues_checked, 1);
    assert_eq!(report.events_checked, 1);
    assert!(report.violations.contains(&InvariantViolation::CountMismatch {
        venue_id: loft.id,
        stored: 5,
        linked: 1,
    }));
    assert!(report
        .violations
        .contains(&InvariantViolation::StaleEventRef { event_id: e1 }));

    // The next mutation touching the venue recomputes its count.
    assign(&service, Uuid::new_v4(), "The Loft");
    assert_eq!(count_of(&service, loft.id), 2);
}

#[test]
fn verification_can_be_disabled() {
    let conn = open_db_in_memory().unwrap();
    let service = VenueDirectoryService::new(
        &conn,
        DirectoryConfig {
            verify_invariants: false,
            ..DirectoryConfig::default()
        },
    );
    assert!(!service.config().verify_invariants);

    let venue = assign(&service, Uuid::new_v4(), "Mohawk");
    assert_eq!(venue.event_count, 1);
    assert_clean(&service);
}

#[test]
fn venue_for_event_returns_the_full_record() {
    let conn = open_db_in_memory().unwrap();
    let service = directory(&conn);
    let e1 = Uuid::new_v4();

    assert_eq!(service.venue_for_event(e1).unwrap(), None);
    let seed = VenueProperties::default().with_city("Austin");
    let venue = service
        .assign_by_name(e1, "Mohawk", &seed)
        .unwrap()
        .unwrap();

    let loaded = service.venue_for_event(e1).unwrap().unwrap();
    assert_eq!(loaded, venue);
    assert_eq!(loaded.address_line(), "Austin");
}
