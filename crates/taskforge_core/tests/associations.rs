use rusqlite::types::Value;
use rusqlite::Connection;
use taskforge_core::db::open_db_in_memory;
use taskforge_core::model::{PERMISSIONS, PROJECTS, PROJECT_MEMBERS, ROLES, ROLE_PERMISSIONS, USERS};
use taskforge_core::record::{
    record, PersistenceKind, RecordError, RecordRepository, SqliteRecordRepository,
};
use taskforge_core::service::{ProjectService, RoleService, ServiceError};

fn create(conn: &Connection, entity: &taskforge_core::record::EntityDescriptor, pairs: &[(&str, Value)]) -> i64 {
    let repo = SqliteRecordRepository::try_new(conn, entity).unwrap();
    repo.create(record(pairs.iter().cloned())).unwrap()
}

fn seed_permissions(conn: &Connection) -> Vec<i64> {
    ["projects.read", "projects.write", "users.invite"]
        .iter()
        .map(|name| create(conn, &PERMISSIONS, &[("name", Value::Text((*name).into()))]))
        .collect()
}

fn seed_user(conn: &Connection, email: &str) -> i64 {
    create(
        conn,
        &USERS,
        &[
            ("first_name", Value::Text("Test".into())),
            ("last_name", Value::Text("User".into())),
            ("email", Value::Text(email.into())),
            ("status", Value::Text("active".into())),
        ],
    )
}

#[test]
fn set_permissions_replaces_the_whole_set() {
    let mut conn = open_db_in_memory().unwrap();
    let permissions = seed_permissions(&conn);
    let role = create(&conn, &ROLES, &[("name", Value::Text("editor".into()))]);

    let mut service = RoleService::new(&mut conn);
    let stored = service
        .set_permissions(role, &[permissions[2], permissions[0], permissions[2]])
        .unwrap();
    assert_eq!(stored, vec![permissions[0], permissions[2]]);

    let stored = service.set_permissions(role, &[permissions[1]]).unwrap();
    assert_eq!(stored, vec![permissions[1]]);
    assert_eq!(service.permissions(role).unwrap(), vec![permissions[1]]);

    let records = service.permission_records(role).unwrap();
    assert_eq!(
        records[0].get("name"),
        Some(&Value::Text("projects.write".into()))
    );

    assert!(service.set_permissions(role, &[]).unwrap().is_empty());
}

#[test]
fn failed_replacement_leaves_previous_links() {
    let mut conn = open_db_in_memory().unwrap();
    let permissions = seed_permissions(&conn);
    let role = create(&conn, &ROLES, &[("name", Value::Text("editor".into()))]);

    let mut service = RoleService::new(&mut conn);
    service
        .set_permissions(role, &[permissions[0], permissions[1]])
        .unwrap();

    let err = service
        .set_permissions(role, &[permissions[2], 9_999])
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Record(RecordError::Persistence {
            kind: PersistenceKind::Constraint,
            ..
        })
    ));
    assert_eq!(
        service.permissions(role).unwrap(),
        vec![permissions[0], permissions[1]]
    );
}

#[test]
fn deleted_roles_reject_permission_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let permissions = seed_permissions(&conn);
    let role = create(&conn, &ROLES, &[("name", Value::Text("legacy".into()))]);
    SqliteRecordRepository::try_new(&conn, &ROLES)
        .unwrap()
        .delete(role)
        .unwrap();

    let mut service = RoleService::new(&mut conn);
    let err = service.set_permissions(role, &permissions).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "Role", id } if id == role));
    assert!(ROLE_PERMISSIONS.linked_ids(&conn, role).unwrap().is_empty());
}

#[test]
fn linked_permission_cannot_be_hard_deleted() {
    let mut conn = open_db_in_memory().unwrap();
    let permissions = seed_permissions(&conn);
    let role = create(&conn, &ROLES, &[("name", Value::Text("editor".into()))]);
    RoleService::new(&mut conn)
        .set_permissions(role, &[permissions[0]])
        .unwrap();

    let repo = SqliteRecordRepository::try_new(&conn, &PERMISSIONS).unwrap();
    assert!(matches!(
        repo.delete(permissions[0]),
        Err(RecordError::Persistence {
            kind: PersistenceKind::Constraint,
            ..
        })
    ));
    assert!(repo.delete(permissions[1]).unwrap());
}

#[test]
fn assign_member_upserts_project_role() {
    let conn = open_db_in_memory().unwrap();
    let project = create(&conn, &PROJECTS, &[("name", Value::Text("Apollo".into()))]);
    let viewer = create(&conn, &ROLES, &[("name", Value::Text("viewer".into()))]);
    let lead = create(&conn, &ROLES, &[("name", Value::Text("lead".into()))]);
    let alice = seed_user(&conn, "alice@example.com");
    let bob = seed_user(&conn, "bob@example.com");

    let service = ProjectService::new(&conn);
    service.assign_member(project, bob, Some(viewer)).unwrap();
    service.assign_member(project, alice, None).unwrap();
    service.assign_member(project, bob, Some(lead)).unwrap();

    let members = service.members(project).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].user.id, alice);
    assert_eq!(members[0].role_id, None);
    assert_eq!(members[1].user.email, "bob@example.com");
    assert_eq!(members[1].role_id, Some(lead));
    assert_eq!(
        PROJECT_MEMBERS.linked_ids(&conn, project).unwrap(),
        vec![alice, bob]
    );

    assert!(service.remove_member(project, alice).unwrap());
    assert!(!service.remove_member(project, alice).unwrap());
    assert_eq!(service.members(project).unwrap().len(), 1);
}

#[test]
fn members_skip_soft_deleted_users() {
    let conn = open_db_in_memory().unwrap();
    let project = create(&conn, &PROJECTS, &[("name", Value::Text("Apollo".into()))]);
    let alice = seed_user(&conn, "alice@example.com");
    let bob = seed_user(&conn, "bob@example.com");

    let service = ProjectService::new(&conn);
    service.assign_member(project, alice, None).unwrap();
    service.assign_member(project, bob, None).unwrap();
    SqliteRecordRepository::try_new(&conn, &USERS)
        .unwrap()
        .delete(bob)
        .unwrap();

    let members = service.members(project).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user.id, alice);
}

#[test]
fn assign_member_requires_existing_project_and_user() {
    let conn = open_db_in_memory().unwrap();
    let project = create(&conn, &PROJECTS, &[("name", Value::Text("Apollo".into()))]);
    let alice = seed_user(&conn, "alice@example.com");
    let service = ProjectService::new(&conn);

    assert!(matches!(
        service.assign_member(404, alice, None),
        Err(ServiceError::NotFound { entity: "Project", id: 404 })
    ));
    assert!(matches!(
        service.assign_member(project, 404, None),
        Err(ServiceError::NotFound { entity: "User", id: 404 })
    ));
    assert!(matches!(
        service.members(404),
        Err(ServiceError::NotFound { entity: "Project", .. })
    ));
}
