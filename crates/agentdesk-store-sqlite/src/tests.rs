//! Integration tests for `SqliteStore` against in-memory databases.

use agentdesk_core::{
  Entity, Id, PageRequest,
  agent::{AgentChanges, AgentType, NewAgent},
  credential::{NewCredential, OpaquePayload},
  store::{
    AgentRepository, CredentialRepository, SupplierRepository,
    TransactionCoordinator, UserRepository,
  },
  supplier::NewSupplier,
  user::{NewUser, UserChanges},
};
use tokio_util::sync::CancellationToken;

use crate::{Ctx, Error, ErrorKind, Result, SqliteStore, StoreConfig, Transaction};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn ctx() -> Ctx { Ctx::new() }

async fn iata(s: &SqliteStore, email: &str) -> Id {
  s.create_agent(&ctx(), NewAgent::iata("Sky Tours", email))
    .await
    .unwrap()
    .id
}

// ─── Agents ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_agent_with_hierarchy() {
  let s = store().await;
  let root = iata(&s, "root@sky.example").await;
  let child = s
    .create_agent(&ctx(), NewAgent::sub_agent("Desk 1", "d1@sky.example", root))
    .await
    .unwrap();

  let view = s.get_agent(&ctx(), root).await.unwrap();
  assert_eq!(view.agent.id, root);
  assert_eq!(view.agent.agent_type, AgentType::Iata);
  assert!(view.parent.is_none());
  assert_eq!(view.children.len(), 1);
  assert_eq!(view.children[0].id, child.id);

  let view = s.get_agent_by_email(&ctx(), "d1@sky.example").await.unwrap();
  assert_eq!(view.agent.id, child.id);
  assert_eq!(view.parent.map(|p| p.id), Some(root));
  assert!(view.children.is_empty());
}

#[tokio::test]
async fn get_missing_agent_is_not_found() {
  let s = store().await;
  let err = s.get_agent(&ctx(), Id::new()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Agent, .. }));
}

#[tokio::test]
async fn sub_agent_requires_live_parent() {
  let s = store().await;

  let mut orphan = NewAgent::iata("Desk", "desk@sky.example");
  orphan.agent_type = AgentType::SubAgent;
  let err = s.create_agent(&ctx(), orphan).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  let err = s
    .create_agent(&ctx(), NewAgent::sub_agent("Desk", "desk@sky.example", Id::new()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  let root = iata(&s, "root@sky.example").await;
  s.delete_agent(&ctx(), root).await.unwrap();
  let err = s
    .create_agent(&ctx(), NewAgent::sub_agent("Desk", "desk@sky.example", root))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

#[tokio::test]
async fn agent_email_is_unique_among_live_rows() {
  let s = store().await;
  let first = iata(&s, "dup@sky.example").await;

  let err = s
    .create_agent(&ctx(), NewAgent::iata("Other", "dup@sky.example"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ConstraintViolation(_)));

  s.delete_agent(&ctx(), first).await.unwrap();
  let again = s
    .create_agent(&ctx(), NewAgent::iata("Other", "dup@sky.example"))
    .await
    .unwrap();
  assert_ne!(again.id, first);
}

#[tokio::test]
async fn update_agent_applies_changes() {
  let s = store().await;
  let id = iata(&s, "a@sky.example").await;

  let updated = s
    .update_agent(
      &ctx(),
      id,
      AgentChanges {
        name: Some("Sky Tours Ltd".into()),
        is_active: Some(false),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(updated.name, "Sky Tours Ltd");
  assert!(!updated.is_active);

  let fetched = s.get_agent(&ctx(), id).await.unwrap().agent;
  assert_eq!(fetched, updated);
}

#[tokio::test]
async fn update_missing_or_deleted_agent_is_not_found() {
  let s = store().await;
  let err = s
    .update_agent(&ctx(), Id::new(), AgentChanges::default())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let id = iata(&s, "a@sky.example").await;
  s.delete_agent(&ctx(), id).await.unwrap();
  let err = s
    .update_agent(&ctx(), id, AgentChanges { name: Some("x".into()), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn reparenting_under_a_descendant_is_rejected() {
  let s = store().await;
  let a = iata(&s, "a@sky.example").await;
  let b = s
    .create_agent(&ctx(), NewAgent::sub_agent("B", "b@sky.example", a))
    .await
    .unwrap()
    .id;
  let c = s
    .create_agent(&ctx(), NewAgent::sub_agent("C", "c@sky.example", b))
    .await
    .unwrap()
    .id;

  let err = s
    .update_agent(
      &ctx(),
      a,
      AgentChanges {
        agent_type: Some(AgentType::SubAgent),
        parent_agent_id: Some(Some(c)),
        ..Default::default()
      },
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  // The rejected update left the tree untouched.
  let view = s.get_agent(&ctx(), a).await.unwrap();
  assert_eq!(view.agent.agent_type, AgentType::Iata);
  assert!(view.agent.parent_agent_id.is_none());

  // Moving a leaf to another branch is fine.
  let d = iata(&s, "d@sky.example").await;
  let moved = s
    .update_agent(
      &ctx(),
      c,
      AgentChanges { parent_agent_id: Some(Some(d)), ..Default::default() },
    )
    .await
    .unwrap();
  assert_eq!(moved.parent_agent_id, Some(d));
}

#[tokio::test]
async fn reparenting_onto_deleted_agent_is_rejected() {
  let s = store().await;
  let a = iata(&s, "a@sky.example").await;
  let b = iata(&s, "b@sky.example").await;
  let c = s
    .create_agent(&ctx(), NewAgent::sub_agent("C", "c@sky.example", a))
    .await
    .unwrap()
    .id;
  s.delete_agent(&ctx(), b).await.unwrap();

  let err = s
    .update_agent(
      &ctx(),
      c,
      AgentChanges { parent_agent_id: Some(Some(b)), ..Default::default() },
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

#[tokio::test]
async fn delete_twice_reports_not_found() {
  let s = store().await;
  let id = iata(&s, "a@sky.example").await;

  s.delete_agent(&ctx(), id).await.unwrap();
  let err = s.delete_agent(&ctx(), id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = s.get_agent(&ctx(), id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn concurrent_deletes_have_exactly_one_winner() {
  let s = store().await;
  let id = iata(&s, "a@sky.example").await;

  let (c1, c2) = (ctx(), ctx());
  let (first, second) =
    tokio::join!(s.delete_agent(&c1, id), s.delete_agent(&c2, id));

  let outcomes = [first, second];
  assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(
    outcomes
      .iter()
      .filter_map(|r| r.as_ref().err())
      .all(|e| e.kind() == ErrorKind::NotFound)
  );
}

#[tokio::test]
async fn concurrent_deletes_in_separate_units_of_work() {
  let s = store().await;
  let id = iata(&s, "a@sky.example").await;

  let tasks: Vec<_> = (0..2)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move {
        let store = &s;
        store
          .run_in_transaction(&ctx(), move |tx| async move {
            store.delete_agent(&tx, id).await
          })
          .await
      })
    })
    .collect();

  let mut ok = 0;
  let mut not_found = 0;
  for task in tasks {
    match task.await.unwrap() {
      Ok(()) => ok += 1,
      Err(e) if e.kind() == ErrorKind::NotFound => not_found += 1,
      Err(e) => panic!("unexpected error: {e}"),
    }
  }
  assert_eq!((ok, not_found), (1, 1));
}

#[tokio::test]
async fn agent_with_live_sub_agents_cannot_be_deleted() {
  let s = store().await;
  let root = iata(&s, "root@sky.example").await;
  let child = s
    .create_agent(&ctx(), NewAgent::sub_agent("Desk", "desk@sky.example", root))
    .await
    .unwrap()
    .id;

  let err = s.delete_agent(&ctx(), root).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  // Both rows are still live and the child's parent still resolves.
  let view = s.get_agent(&ctx(), child).await.unwrap();
  assert!(view.parent.as_ref().is_some_and(|p| p.is_live()));

  // Inactive children still count as live.
  s.update_agent(
    &ctx(),
    child,
    AgentChanges { is_active: Some(false), ..Default::default() },
  )
  .await
  .unwrap();
  let err = s.delete_agent(&ctx(), root).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  // Leaves first, then the parent.
  s.delete_agent(&ctx(), child).await.unwrap();
  s.delete_agent(&ctx(), root).await.unwrap();
  let err = s.get_agent(&ctx(), root).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleting_agent_keeps_users_and_credentials() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let supplier = s
    .create_supplier(&ctx(), NewSupplier::new("SABRE", "Sabre GDS"))
    .await
    .unwrap();
  let user = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "h1").for_agent(agent))
    .await
    .unwrap();
  let cred = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, "ct"))
    .await
    .unwrap();

  s.delete_agent(&ctx(), agent).await.unwrap();

  let user = s.get_user(&ctx(), user.id).await.unwrap();
  assert_eq!(user.agent_id, Some(agent));
  let cred = s.get_credential(&ctx(), cred.id).await.unwrap();
  assert_eq!(cred.agent_id, agent);
}

#[tokio::test]
async fn children_include_inactive_but_not_deleted() {
  let s = store().await;
  let root = iata(&s, "root@sky.example").await;

  let mut sleeping = NewAgent::sub_agent("Sleeping", "s@sky.example", root);
  sleeping.is_active = false;
  let sleeping = s.create_agent(&ctx(), sleeping).await.unwrap();
  let awake = s
    .create_agent(&ctx(), NewAgent::sub_agent("Awake", "w@sky.example", root))
    .await
    .unwrap();
  let gone = s
    .create_agent(&ctx(), NewAgent::sub_agent("Gone", "g@sky.example", root))
    .await
    .unwrap();
  s.delete_agent(&ctx(), gone.id).await.unwrap();

  let children = s.get_agents_by_parent(&ctx(), root).await.unwrap();
  let ids: Vec<Id> = children.iter().map(|a| a.id).collect();
  assert_eq!(ids, vec![sleeping.id, awake.id]);

  let active: Vec<Id> =
    s.get_active_agents(&ctx()).await.unwrap().iter().map(|a| a.id).collect();
  assert_eq!(active, vec![root, awake.id]);

  let inactive: Vec<Id> =
    s.get_inactive_agents(&ctx()).await.unwrap().iter().map(|a| a.id).collect();
  assert_eq!(inactive, vec![sleeping.id]);
}

#[tokio::test]
async fn list_pages_are_disjoint_and_cover_total() {
  let s = store().await;
  let mut created = Vec::new();
  for i in 0..5 {
    created.push(iata(&s, &format!("agent{i}@sky.example")).await);
  }
  let deleted = iata(&s, "deleted@sky.example").await;
  s.delete_agent(&ctx(), deleted).await.unwrap();

  let first = s.list_agents(&ctx(), PageRequest::new(0, 2)).await.unwrap();
  let second = s.list_agents(&ctx(), PageRequest::new(2, 2)).await.unwrap();
  let third = s.list_agents(&ctx(), PageRequest::new(4, 2)).await.unwrap();

  assert_eq!(first.total, 5);
  assert_eq!(second.total, 5);
  assert!(first.has_more());
  assert!(!third.has_more());

  let all: Vec<Id> = [first, second, third]
    .into_iter()
    .flat_map(|p| p.items)
    .map(|a| a.id)
    .collect();
  assert_eq!(all, created);
}

#[tokio::test]
async fn offset_past_the_end_returns_an_empty_page() {
  let s = store().await;
  iata(&s, "a@sky.example").await;
  iata(&s, "b@sky.example").await;

  for offset in [2, 1 << 63, u64::MAX] {
    let page = s
      .list_agents(&ctx(), PageRequest::new(offset, 10))
      .await
      .unwrap();
    assert!(page.items.is_empty(), "offset {offset} returned rows");
    assert_eq!(page.total, 2);
    assert_eq!(page.offset, offset);
    assert!(!page.has_more());
  }

  let page = s
    .list_suppliers(&ctx(), PageRequest::new(u64::MAX, 10))
    .await
    .unwrap();
  assert!(page.items.is_empty());
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let user = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "h1").for_agent(agent))
    .await
    .unwrap();

  let by_id = s.get_user(&ctx(), user.id).await.unwrap();
  assert_eq!(by_id, user);
  let by_email = s.get_user_by_email(&ctx(), "ana@sky.example").await.unwrap();
  assert_eq!(by_email.id, user.id);
  assert_eq!(by_email.password_hash, "h1");
}

#[tokio::test]
async fn user_email_is_unique_among_live_rows() {
  let s = store().await;
  let first = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "h1"))
    .await
    .unwrap();

  let err = s
    .create_user(&ctx(), NewUser::new("Ana B", "ana@sky.example", "h2"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  s.delete_user(&ctx(), first.id).await.unwrap();
  s.create_user(&ctx(), NewUser::new("Ana B", "ana@sky.example", "h2"))
    .await
    .unwrap();
}

#[tokio::test]
async fn user_for_deleted_agent_is_rejected() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  s.delete_agent(&ctx(), agent).await.unwrap();

  let err = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "h1").for_agent(agent))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

#[tokio::test]
async fn update_password_touches_only_the_secret() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let before = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "old").for_agent(agent))
    .await
    .unwrap();

  s.update_password(&ctx(), before.id, "new").await.unwrap();

  let after = s.get_user(&ctx(), before.id).await.unwrap();
  assert_eq!(after.password_hash, "new");
  assert_eq!(after.name, before.name);
  assert_eq!(after.email, before.email);
  assert_eq!(after.agent_id, before.agent_id);
  assert_eq!(after.is_active, before.is_active);
  assert_eq!(after.created_at, before.created_at);
  assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn update_password_for_missing_user_is_not_found() {
  let s = store().await;
  let err = s.update_password(&ctx(), Id::new(), "x").await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::User, .. }));
}

#[tokio::test]
async fn update_user_keeps_password() {
  let s = store().await;
  let user = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "secret"))
    .await
    .unwrap();
  let agent = iata(&s, "a@sky.example").await;

  let updated = s
    .update_user(
      &ctx(),
      user.id,
      UserChanges {
        agent_id: Some(Some(agent)),
        name: Some("Ana Maria".into()),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(updated.agent_id, Some(agent));

  let fetched = s.get_user(&ctx(), user.id).await.unwrap();
  assert_eq!(fetched.name, "Ana Maria");
  assert_eq!(fetched.password_hash, "secret");
}

#[tokio::test]
async fn users_by_agent_and_activity() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;

  let ana = s
    .create_user(&ctx(), NewUser::new("Ana", "ana@sky.example", "h").for_agent(agent))
    .await
    .unwrap();
  let mut idle = NewUser::new("Bo", "bo@sky.example", "h").for_agent(agent);
  idle.is_active = false;
  let bo = s.create_user(&ctx(), idle).await.unwrap();
  let loner = s
    .create_user(&ctx(), NewUser::new("Cy", "cy@sky.example", "h"))
    .await
    .unwrap();

  let for_agent: Vec<Id> =
    s.get_users_by_agent(&ctx(), agent).await.unwrap().iter().map(|u| u.id).collect();
  assert_eq!(for_agent, vec![ana.id, bo.id]);

  let active: Vec<Id> =
    s.get_active_users(&ctx()).await.unwrap().iter().map(|u| u.id).collect();
  assert_eq!(active, vec![ana.id, loner.id]);

  let page = s.list_users(&ctx(), PageRequest::default()).await.unwrap();
  assert_eq!(page.total, 3);
}

// ─── Suppliers ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn supplier_code_is_unique() {
  let s = store().await;
  s.create_supplier(&ctx(), NewSupplier::new("AMADEUS", "Amadeus"))
    .await
    .unwrap();
  let err = s
    .create_supplier(&ctx(), NewSupplier::new("AMADEUS", "Amadeus again"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  let found = s.get_supplier_by_code(&ctx(), "AMADEUS").await.unwrap();
  assert_eq!(found.name, "Amadeus");
}

#[tokio::test]
async fn supplier_pages_are_disjoint_and_cover_total() {
  let s = store().await;
  let mut created = Vec::new();
  for code in ["AMADEUS", "SABRE", "GALILEO", "WORLDSPAN", "APOLLO"] {
    let supplier = s
      .create_supplier(&ctx(), NewSupplier::new(code, code.to_lowercase()))
      .await
      .unwrap();
    created.push(supplier.id);
  }
  s.delete_supplier(&ctx(), created.pop().unwrap()).await.unwrap();

  let mut seen = Vec::new();
  let mut offset = 0;
  loop {
    let page = s
      .list_suppliers(&ctx(), PageRequest::new(offset, 3))
      .await
      .unwrap();
    assert_eq!(page.total, 4);
    seen.extend(page.items.iter().map(|sup| sup.id));
    if !page.has_more() {
      break;
    }
    offset += 3;
  }
  assert_eq!(seen, created);
}

#[tokio::test]
async fn supplier_delete_is_restrained_by_live_credentials() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let supplier = s
    .create_supplier(&ctx(), NewSupplier::new("AMADEUS", "Amadeus"))
    .await
    .unwrap();
  let cred = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, "ct"))
    .await
    .unwrap();

  let err = s.delete_supplier(&ctx(), supplier.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
  s.get_supplier(&ctx(), supplier.id).await.unwrap();

  s.delete_credential(&ctx(), cred.id).await.unwrap();
  s.delete_supplier(&ctx(), supplier.id).await.unwrap();

  let err = s.get_supplier(&ctx(), supplier.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = s.delete_supplier(&ctx(), supplier.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Credentials ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn amadeus_credential_lifecycle() {
  let s = store().await;
  let supplier = s
    .create_supplier(&ctx(), NewSupplier::new("AMADEUS", "Amadeus"))
    .await
    .unwrap();
  let agent = iata(&s, "a@x.com").await;

  let first = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, "ct1"))
    .await
    .unwrap();

  let err = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, "ct2"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  let rotated = s
    .update_credential(&ctx(), first.id, OpaquePayload::from("ct3"))
    .await
    .unwrap();
  assert_eq!(rotated.id, first.id);

  let current = s
    .get_credential_by_agent_and_supplier(&ctx(), agent, supplier.id)
    .await
    .unwrap();
  assert_eq!(current.id, first.id);
  assert_eq!(current.payload.as_bytes(), b"ct3");
  assert_eq!(current.created_at, first.created_at);
}

#[tokio::test]
async fn credential_pair_is_reusable_after_disconnect() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let supplier = s
    .create_supplier(&ctx(), NewSupplier::new("SABRE", "Sabre"))
    .await
    .unwrap();

  let first = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, "one"))
    .await
    .unwrap();
  s.delete_credential(&ctx(), first.id).await.unwrap();

  let err = s
    .get_credential_by_agent_and_supplier(&ctx(), agent, supplier.id)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let second = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, "two"))
    .await
    .unwrap();
  assert_ne!(second.id, first.id);

  let err = s
    .update_credential(&ctx(), first.id, OpaquePayload::from("late"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let live = s.list_credentials_for_agent(&ctx(), agent).await.unwrap();
  assert_eq!(live.len(), 1);
  assert_eq!(live[0].payload.as_bytes(), b"two");
}

#[tokio::test]
async fn payload_bytes_are_stored_verbatim() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let supplier = s
    .create_supplier(&ctx(), NewSupplier::new("GALILEO", "Galileo"))
    .await
    .unwrap();

  let blob: Vec<u8> = (0..=255u8).rev().collect();
  let cred = s
    .create_credential(&ctx(), NewCredential::new(agent, supplier.id, blob.clone()))
    .await
    .unwrap();

  let fetched = s.get_credential(&ctx(), cred.id).await.unwrap();
  assert_eq!(fetched.payload.into_bytes(), blob);

  let page = s.list_credentials(&ctx(), PageRequest::default()).await.unwrap();
  assert_eq!(page.total, 1);
}

#[tokio::test]
async fn credential_for_unknown_supplier_is_rejected() {
  let s = store().await;
  let agent = iata(&s, "a@sky.example").await;
  let err = s
    .create_credential(&ctx(), NewCredential::new(agent, Id::new(), "ct"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

// ─── Units of work ───────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_unit_of_work_leaves_storage_unchanged() {
  let s = store().await;
  let store = &s;

  let result: Result<()> = s
    .run_in_transaction(&ctx(), move |tx| async move {
      let agent = store
        .create_agent(&tx, NewAgent::iata("Sky", "sky@sky.example"))
        .await?;
      store
        .create_user(&tx, NewUser::new("Ana", "ana@sky.example", "h").for_agent(agent.id))
        .await?;
      Err(Error::constraint("abandon onboarding"))
    })
    .await;

  let err = result.unwrap_err();
  assert!(matches!(&err, Error::ConstraintViolation(msg) if msg == "abandon onboarding"));

  let err = s.get_agent_by_email(&ctx(), "sky@sky.example").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = s.get_user_by_email(&ctx(), "ana@sky.example").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn successful_unit_of_work_commits_everything() {
  let s = store().await;
  let store = &s;
  let supplier = s
    .create_supplier(&ctx(), NewSupplier::new("AMADEUS", "Amadeus"))
    .await
    .unwrap();

  let (agent, cred) = s
    .run_in_transaction(&ctx(), move |tx| async move {
      let agent = store
        .create_agent(&tx, NewAgent::iata("Sky", "sky@sky.example"))
        .await?;
      let cred = store
        .create_credential(&tx, NewCredential::new(agent.id, supplier.id, "ct1"))
        .await?;
      // Reads inside the unit of work see its own writes.
      store.get_agent(&tx, agent.id).await?;
      Ok::<_, Error>((agent, cred))
    })
    .await
    .unwrap();

  s.get_agent(&ctx(), agent.id).await.unwrap();
  let found = s
    .get_credential_by_agent_and_supplier(&ctx(), agent.id, supplier.id)
    .await
    .unwrap();
  assert_eq!(found.id, cred.id);
}

#[tokio::test]
async fn nested_unit_of_work_reuses_the_outer_transaction() {
  let s = store().await;
  let store = &s;

  let (outer, inner) = s
    .run_in_transaction(&ctx(), move |outer| async move {
      let outer_id = outer.unit_of_work().map(Transaction::id);
      let inner_id = store
        .run_in_transaction(&outer, |inner| async move {
          Ok::<_, Error>(inner.unit_of_work().map(Transaction::id))
        })
        .await?;
      Ok::<_, Error>((outer_id, inner_id))
    })
    .await
    .unwrap();

  assert!(outer.is_some());
  assert_eq!(outer, inner);
}

#[tokio::test]
async fn inner_failure_rolls_back_the_whole_unit() {
  let s = store().await;
  let store = &s;

  let result: Result<()> = s
    .run_in_transaction(&ctx(), move |outer| async move {
      store
        .create_agent(&outer, NewAgent::iata("Sky", "sky@sky.example"))
        .await?;
      store
        .run_in_transaction(&outer, move |inner| async move {
          store
            .create_agent(&inner, NewAgent::iata("Sea", "sea@sky.example"))
            .await?;
          Err::<(), _>(Error::constraint("inner gave up"))
        })
        .await
    })
    .await;
  assert!(result.is_err());

  let page = s.list_agents(&ctx(), PageRequest::default()).await.unwrap();
  assert_eq!(page.total, 0);
}

#[tokio::test]
async fn cancelled_unit_of_work_rolls_back() {
  let s = store().await;
  let store = &s;
  let token = CancellationToken::new();
  let cancel = token.clone();

  let result: Result<()> = s
    .run_in_transaction(&Ctx::with_cancellation(token), move |tx| async move {
      store
        .create_agent(&tx, NewAgent::iata("Sky", "sky@sky.example"))
        .await?;
      cancel.cancel();
      std::future::pending::<Result<()>>().await
    })
    .await;

  assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
  let err = s.get_agent_by_email(&ctx(), "sky@sky.example").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn cancelled_context_performs_no_writes() {
  let s = store().await;
  let cancelled = ctx();
  cancelled.cancellation().cancel();

  let err = s
    .create_agent(&cancelled, NewAgent::iata("Sky", "sky@sky.example"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Cancelled);

  let page = s.list_agents(&ctx(), PageRequest::default()).await.unwrap();
  assert_eq!(page.total, 0);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_store_persists_across_reopen() {
  let path = std::env::temp_dir().join(format!("agentdesk-test-{}.db", Id::new()));

  {
    let s = SqliteStore::open_with(StoreConfig::file(&path)).await.unwrap();
    s.create_supplier(&ctx(), NewSupplier::new("AMADEUS", "Amadeus"))
      .await
      .unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let found = s.get_supplier_by_code(&ctx(), "AMADEUS").await.unwrap();
  assert_eq!(found.code, "AMADEUS");
  drop(s);

  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}
