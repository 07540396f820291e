//! End-to-end scenarios against the in-memory store.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};

use iamkit_auth::{
    DecisionBasis, DenialReason, EdgeUpsert, GuardVerdict, MutationOperation, MutationRequest,
    Permission, PermissionName, Role, RoleAssignment, RoleName,
};
use iamkit_core::{PermissionId, PrincipalId, RoleId, TenantId};
use iamkit_infra::{InMemoryRbacStore, StoreError};

struct Seed {
    store: InMemoryRbacStore,
    tenant: TenantId,
    super_admin: RoleId,
    admin: RoleId,
    operador: RoleId,
}

fn seed() -> Seed {
    iamkit_observability::init();

    let store = InMemoryRbacStore::default();
    let tenant = TenantId::new();
    let now = Utc::now();

    let super_admin = Role::new(RoleId::new(), "SuperAdmin").with_level(100);
    let admin = Role::new(RoleId::new(), "Admin").with_level(50);
    let operador = Role::new(RoleId::new(), "Operador").with_level(10);
    let listar = Permission::new(PermissionId::new(), "Usuarios.Listar");
    let criar = Permission::new(PermissionId::new(), "Usuarios.Criar");
    let ver = Permission::new(PermissionId::new(), "Dashboard.Ver");

    for role in [&super_admin, &admin, &operador] {
        store.upsert_role(tenant, role.clone()).unwrap();
    }
    for permission in [&listar, &criar, &ver] {
        store.upsert_permission(tenant, permission.clone()).unwrap();
    }
    store.grant_permission(tenant, admin.id, listar.id, now).unwrap();
    store.grant_permission(tenant, admin.id, criar.id, now).unwrap();
    store.grant_permission(tenant, operador.id, listar.id, now).unwrap();
    store.grant_permission(tenant, operador.id, ver.id, now).unwrap();

    Seed {
        store,
        tenant,
        super_admin: super_admin.id,
        admin: admin.id,
        operador: operador.id,
    }
}

impl Seed {
    fn principal(&self, roles: &[RoleId]) -> PrincipalId {
        let id = PrincipalId::new();
        self.store.create_principal(self.tenant, id).unwrap();
        for role in roles {
            self.store
                .assign_role(self.tenant, id, *role, RoleAssignment::at(Utc::now()))
                .unwrap();
        }
        id
    }

    fn apply(&self, request: MutationRequest) -> Result<(), StoreError> {
        self.store
            .apply_mutation(self.tenant, &request, Utc::now())
            .map(|_| ())
    }
}

fn names(items: &[&'static str]) -> BTreeSet<PermissionName> {
    items.iter().copied().map(PermissionName::new).collect()
}

#[test]
fn union_of_two_roles_is_deduplicated() {
    let s = seed();
    let u1 = s.principal(&[s.admin, s.operador]);

    let resolved = s.store.resolve(s.tenant, u1, Utc::now()).unwrap();
    assert_eq!(
        resolved,
        names(&["Dashboard.Ver", "Usuarios.Criar", "Usuarios.Listar"])
    );
    assert!(s.store.authorize(s.tenant, u1, "Usuarios.Criar", Utc::now()));
    assert!(!s.store.authorize(s.tenant, u1, "Usuarios.Excluir", Utc::now()));
}

#[test]
fn super_admin_is_allowed_anything() {
    let s = seed();
    let u2 = s.principal(&[s.super_admin]);

    assert!(s.store.resolve(s.tenant, u2, Utc::now()).unwrap().is_empty());
    assert!(s.store.authorize(s.tenant, u2, "Qualquer.Coisa", Utc::now()));

    let explanation = s
        .store
        .explain(s.tenant, u2, "Qualquer.Coisa", Utc::now())
        .unwrap();
    assert!(explanation.granted);
    assert_eq!(explanation.basis, DecisionBasis::SuperAdmin);
}

#[test]
fn last_super_admin_survives_sequential_removal() {
    let s = seed();
    let u3 = s.principal(&[s.super_admin]);
    let u4 = s.principal(&[s.super_admin]);

    s.apply(MutationRequest::new(u3, MutationOperation::Deactivate))
        .unwrap();

    let err = s
        .apply(MutationRequest::new(u4, MutationOperation::Deactivate))
        .unwrap_err();
    assert_eq!(err, StoreError::GuardDenied(DenialReason::LastSuperAdmin));

    let remaining = s.store.active_super_admins(s.tenant, Utc::now()).unwrap();
    assert_eq!(remaining, BTreeSet::from([u4]));
    assert!(s.store.authorize(s.tenant, u4, "Usuarios.Listar", Utc::now()));
    assert!(!s.store.authorize(s.tenant, u3, "Usuarios.Listar", Utc::now()));
}

#[test]
fn expired_super_admin_does_not_count_as_a_holder() {
    let s = seed();
    let now = Utc::now();
    let active = s.principal(&[s.super_admin]);
    let lapsed = s.principal(&[]);
    s.store
        .assign_role(
            s.tenant,
            lapsed,
            s.super_admin,
            RoleAssignment::at(now - Duration::days(30)).expiring_at(now - Duration::days(1)),
        )
        .unwrap();

    let verdict = s
        .store
        .check_mutation(
            s.tenant,
            &MutationRequest::new(active, MutationOperation::RemoveRole(RoleName::super_admin())),
            now,
        )
        .unwrap();
    assert_eq!(verdict, GuardVerdict::Denied(DenialReason::LastSuperAdmin));
    assert!(!s.store.authorize(s.tenant, lapsed, "Usuarios.Listar", now));
}

#[test]
fn replace_roles_swaps_assignments_and_records_the_actor() {
    let s = seed();
    let boss = s.principal(&[s.super_admin]);
    let target = s.principal(&[s.operador]);

    let outcome = s
        .store
        .apply_mutation(
            s.tenant,
            &MutationRequest::new(
                target,
                MutationOperation::ReplaceRoles(BTreeSet::from([RoleName::new("Admin")])),
            )
            .by(boss),
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.edges_activated, 1);
    assert_eq!(outcome.edges_deactivated, 1);

    let resolved = s.store.resolve(s.tenant, target, Utc::now()).unwrap();
    assert_eq!(resolved, names(&["Usuarios.Criar", "Usuarios.Listar"]));

    let snapshot = s.store.snapshot(s.tenant).unwrap();
    let edge = snapshot
        .account(&target)
        .unwrap()
        .roles
        .iter()
        .find(|e| e.role_id == s.admin)
        .unwrap();
    assert_eq!(edge.assigned_by, Some(boss));
}

#[test]
fn permanent_delete_respects_dependencies_and_self() {
    let s = seed();
    let keeper = s.principal(&[s.super_admin]);
    let author = s.principal(&[s.operador]);
    let plain = s.principal(&[s.operador]);
    s.store.record_audit_authorship(s.tenant, author, 12).unwrap();

    let err = s
        .apply(MutationRequest::new(author, MutationOperation::Delete).by(keeper))
        .unwrap_err();
    assert_eq!(err.denial_reason(), Some(DenialReason::HasDependencies));

    // Soft deactivation never checks dependencies.
    s.apply(MutationRequest::new(author, MutationOperation::Deactivate).by(keeper))
        .unwrap();

    let err = s
        .apply(MutationRequest::new(keeper, MutationOperation::Delete).by(keeper))
        .unwrap_err();
    assert_eq!(err.denial_reason(), Some(DenialReason::SelfOperationForbidden));

    s.apply(MutationRequest::new(plain, MutationOperation::Delete).by(keeper))
        .unwrap();
    assert!(s.store.snapshot(s.tenant).unwrap().account(&plain).is_none());
}

#[test]
fn revoke_then_regrant_reactivates_instead_of_duplicating() {
    let s = seed();
    let u1 = s.principal(&[s.operador]);
    let snapshot = s.store.snapshot(s.tenant).unwrap();
    let ver = snapshot
        .graph()
        .permission_by_name(&PermissionName::new("Dashboard.Ver"))
        .unwrap()
        .id;

    assert!(s.store.revoke_permission(s.tenant, s.operador, ver).unwrap());
    assert!(!s.store.authorize(s.tenant, u1, "Dashboard.Ver", Utc::now()));

    let outcome = s
        .store
        .grant_permission(s.tenant, s.operador, ver, Utc::now())
        .unwrap();
    assert_eq!(outcome, EdgeUpsert::Reactivated);
    assert!(s.store.authorize(s.tenant, u1, "Dashboard.Ver", Utc::now()));

    let edges = s.store.snapshot(s.tenant).unwrap().graph().edges().len();
    assert_eq!(edges, snapshot.graph().edges().len());
}

#[test]
fn deactivating_a_role_orphans_its_edges_until_cleanup() {
    let s = seed();
    let u1 = s.principal(&[s.admin, s.operador]);
    let now = Utc::now();

    s.store.set_role_active(s.tenant, s.admin, false).unwrap();
    assert_eq!(
        s.store.resolve(s.tenant, u1, now).unwrap(),
        names(&["Dashboard.Ver", "Usuarios.Listar"])
    );

    let report = s.store.orphan_report(s.tenant).unwrap();
    assert_eq!(report.grants_on_inactive_roles.len(), 2);
    assert_eq!(report.assignments_of_inactive_roles, vec![(u1, s.admin)]);

    let cleaned = s.store.cleanup_orphans(s.tenant).unwrap();
    assert_eq!(cleaned, report);
    assert!(s.store.orphan_report(s.tenant).unwrap().is_empty());

    // Reactivating the role does not bring back cleaned edges.
    s.store.set_role_active(s.tenant, s.admin, true).unwrap();
    assert!(!s.store.authorize(s.tenant, u1, "Usuarios.Criar", now));
}

#[test]
fn tenants_do_not_share_anything() {
    let a = seed();
    let other = TenantId::new();
    let u2 = a.principal(&[a.super_admin]);

    assert!(a.store.resolve(other, u2, Utc::now()).unwrap().is_empty());
    assert!(!a.store.authorize(other, u2, "Usuarios.Listar", Utc::now()));
    assert!(matches!(
        a.store.explain(other, u2, "Usuarios.Listar", Utc::now()),
        Err(StoreError::UnknownPrincipal(_))
    ));
}

#[test]
fn lapsed_assignment_is_renewed_by_reassigning() {
    let s = seed();
    let now = Utc::now();
    let keeper = s.principal(&[s.super_admin]);
    let lapsed = s.principal(&[]);
    s.store
        .assign_role(
            s.tenant,
            lapsed,
            s.super_admin,
            RoleAssignment::at(now - Duration::days(30)).expiring_at(now - Duration::days(1)),
        )
        .unwrap();
    assert!(!s.store.authorize(s.tenant, lapsed, "Usuarios.Listar", now));

    let outcome = s
        .store
        .assign_role(
            s.tenant,
            lapsed,
            s.super_admin,
            RoleAssignment::at(now).expiring_at(now + Duration::days(30)),
        )
        .unwrap();
    assert_eq!(outcome, EdgeUpsert::Reactivated);
    assert!(s.store.authorize(s.tenant, lapsed, "Usuarios.Listar", now));
    assert_eq!(
        s.store.active_super_admins(s.tenant, now).unwrap(),
        BTreeSet::from([keeper, lapsed])
    );
}

#[test]
fn replace_roles_renews_a_lapsed_assignment() {
    let s = seed();
    let now = Utc::now();
    let boss = s.principal(&[s.super_admin]);
    let target = s.principal(&[]);
    s.store
        .assign_role(
            s.tenant,
            target,
            s.admin,
            RoleAssignment::at(now - Duration::days(30)).expiring_at(now - Duration::days(1)),
        )
        .unwrap();

    let outcome = s
        .store
        .apply_mutation(
            s.tenant,
            &MutationRequest::new(
                target,
                MutationOperation::ReplaceRoles(BTreeSet::from([RoleName::new("Admin")])),
            )
            .by(boss),
            now,
        )
        .unwrap();

    assert_eq!(outcome.edges_activated, 1);
    assert!(s.store.authorize(s.tenant, target, "Usuarios.Criar", now));
}

#[test]
fn super_admin_role_stays_active_while_held() {
    let s = seed();
    let only = s.principal(&[s.super_admin]);

    let err = s.store.set_role_active(s.tenant, s.super_admin, false).unwrap_err();
    assert_eq!(err, StoreError::GuardDenied(DenialReason::LastSuperAdmin));
    assert_eq!(
        s.store.active_super_admins(s.tenant, Utc::now()).unwrap(),
        BTreeSet::from([only])
    );

    // Other roles are not protected.
    s.store.set_role_active(s.tenant, s.operador, false).unwrap();
}
