use bson::{Bson, doc};
use docmodel::{memory::InMemoryStore, prelude::*};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;

async fn posts() -> (Arc<Model>, Arc<InMemoryStore>) {
    let backend = Arc::new(InMemoryStore::builder().build().await.unwrap());
    let schema = Schema::builder()
        .required("title", SchemaType::String)
        .field("views", SchemaType::Number)
        .field("published", SchemaType::Boolean)
        .collection("blog_posts")
        .build();

    (Model::builder("Post", schema, backend.clone()).build(), backend)
}

fn watch(model: &Model) -> Arc<Mutex<Vec<LifecycleEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    model.subscribe(Arc::new(move |_: &str, event: &LifecycleEvent| sink.lock().push(event.clone())));
    seen
}

#[tokio::test]
async fn save_update_remove_round() {
    let (posts, backend) = posts().await;
    let events = watch(&posts);

    let mut post = posts.new_document();
    post.set("title", "hello").unwrap();
    post.set("views", "3").unwrap();
    assert!(post.is_new());

    let inserted = posts.save(&mut post).await.unwrap();
    assert_eq!(post.id(), Some(inserted.id.clone()));
    assert!(inserted.rev.starts_with("1-"));
    assert_eq!(post.state(), DocumentState::Clean);
    assert!(!post.is_modified("title"));

    post.set("published", "true").unwrap();
    let updated = posts.save(&mut post).await.unwrap();
    assert_eq!(updated.id, inserted.id);
    assert!(updated.rev.starts_with("2-"));

    let stored = posts.find_by_id(&inserted.id).await.unwrap().unwrap();
    assert_eq!(stored.get("views"), Some(&Bson::Int64(3)));
    assert_eq!(stored.get("published"), Some(&Bson::Boolean(true)));
    assert_eq!(stored.rev(), Some(updated.rev));

    posts.remove(&post).await.unwrap();
    assert!(post.is_removed());
    assert_eq!(post.id(), None);
    assert!(backend.is_empty("blog_posts").await);
    assert!(posts.find_by_id(&inserted.id).await.unwrap().is_none());

    assert_eq!(*events.lock(), vec![
        LifecycleEvent::IsNew { id: None, is_new: false },
        LifecycleEvent::Save { id: inserted.id.clone() },
        LifecycleEvent::Save { id: inserted.id.clone() },
        LifecycleEvent::Remove { id: inserted.id },
    ]);
}

#[tokio::test]
async fn failed_insert_can_be_retried() {
    let (posts, _backend) = posts().await;
    posts
        .create(vec![doc! { "_id": "taken", "title": "first" }])
        .await
        .unwrap();

    let mut post = posts.new_document_from(doc! { "_id": "taken", "title": "second" }).unwrap();
    let error = posts.save(&mut post).await.unwrap_err();

    assert_eq!(
        error,
        ModelError::persistence("insert", ModelError::DocumentAlreadyExists("taken".into(), "blog_posts".into()))
    );
    assert!(post.is_new());
    assert!(post.is_modified("title"));

    post.set("_id", "free").unwrap();
    let saved = posts.save(&mut post).await.unwrap();
    assert_eq!(saved.id, "free");
    assert_eq!(post.state(), DocumentState::Clean);
}

#[tokio::test]
async fn stale_update_conflicts_and_stays_persisted() {
    let (posts, _backend) = posts().await;
    let created = posts.create(vec![doc! { "title": "draft" }]).await.unwrap();
    let id = created[0].id().unwrap();

    let mut first = posts.find_by_id(&id).await.unwrap().unwrap();
    let mut second = posts.find_by_id(&id).await.unwrap().unwrap();

    first.set("title", "edited once").unwrap();
    posts.save(&mut first).await.unwrap();

    second.set("title", "edited twice").unwrap();
    let error = posts.save(&mut second).await.unwrap_err();

    match error {
        ModelError::Persistence { operation, source } => {
            assert_eq!(operation, "update");
            assert!(matches!(*source, ModelError::Conflict { .. }));
        }
        other => panic!("expected a persistence error, got {other:?}"),
    }
    assert_eq!(second.state(), DocumentState::Clean);
    assert!(!second.is_new());
}

#[tokio::test]
async fn concurrent_removes_settle_together() {
    let (posts, backend) = posts().await;
    let created = posts.create(vec![doc! { "title": "doomed" }]).await.unwrap();
    let post = &created[0];

    let (first, second) = futures::join!(posts.remove(post), posts.remove(post));

    assert_eq!(first, Ok(()));
    assert_eq!(second, Ok(()));
    assert!(post.is_removed());
    assert!(backend.is_empty("blog_posts").await);
}

#[tokio::test]
async fn removed_documents_stay_removed() {
    let (posts, _backend) = posts().await;
    let mut created = posts.create(vec![doc! { "title": "gone" }]).await.unwrap();
    let mut post = created.remove(0);

    posts.remove(&post).await.unwrap();

    assert!(matches!(posts.save(&mut post).await, Err(ModelError::InvalidState(_))));
    assert!(matches!(posts.remove(&post).await, Err(ModelError::InvalidState(_))));
}

#[tokio::test]
async fn bulk_create_reports_the_first_failure() {
    let (posts, backend) = posts().await;

    let error = posts
        .create(vec![
            doc! { "_id": "a", "title": "a" },
            doc! { "_id": "a", "title": "a again" },
            doc! { "_id": "c", "title": "c" },
        ])
        .await
        .unwrap_err();

    assert!(matches!(error, ModelError::Persistence { operation: "insert", .. }));
    assert_eq!(backend.len("blog_posts").await, 2);
}

#[tokio::test]
async fn unhandled_save_failures_reach_the_error_channel() {
    let (posts, _backend) = posts().await;
    let mut errors = posts.errors().subscribe();

    let mut untitled = posts.new_document();
    posts.save_detached(&mut untitled).await;

    assert_eq!(
        errors.next().await,
        Some(ModelError::Validation { path: "title".into(), reason: "path is required".into() })
    );
}
