//! Round trips against a scratch Postgres database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p trendly-discussion -- --ignored`.

use serde_json::json;
use sqlx::types::Uuid;
use trendly_database::ConstraintViolation;
use trendly_discussion::store::connect;
use trendly_discussion::{
    DeleteReport, DiscussionError, DiscussionRoom, DiscussionStore, Keyword, NewComment, PgDiscussionStore, Vote,
};

async fn store() -> PgDiscussionStore {
    dotenv::dotenv().ok();
    let pool = connect(false, true, false)
        .await
        .expect("DATABASE_URL must point at a scratch database");
    PgDiscussionStore::new(pool.clone())
}

fn unique_text(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..16])
}

fn anon(text: &str) -> NewComment {
    NewComment::new("anon", "pw", "nick", text).from_ip("127.0.0.1")
}

#[tokio::test]
#[ignore]
async fn room_defaults_are_applied() {
    let store = store().await;
    let room = store.open_room(DiscussionRoom::new(unique_text("room"), vec![])).await.unwrap();

    assert!(!room.is_closed);
    assert!(room.created_at > 0);
    assert!(room.updated_at.is_none());
    assert_eq!(room.comment_count, Some(0));
    assert!(room.keyword_id_list.0.is_empty());
    assert!(room.sentiment_snapshot.0.is_empty());

    let closed = store.close_room(room.id).await.unwrap();
    assert!(closed.is_closed);
    assert!(closed.updated_at.is_some());
    assert!(matches!(store.close_room(room.id).await, Err(DiscussionError::RoomAlreadyClosed(_))));
}

#[tokio::test]
#[ignore]
async fn room_delete_cascades_and_detaches_keywords() {
    let store = store().await;
    let room = store.open_room(DiscussionRoom::new(unique_text("room"), vec![])).await.unwrap();
    let kw = store
        .track_keyword(Keyword::new(unique_text("kw"), 1, "news", json!({}), "", ""))
        .await
        .unwrap();
    store.attach_room(kw.id, Some(room.id)).await.unwrap();

    let top = store.post_comment(room.id, anon("top")).await.unwrap();
    let reply = store.post_comment(room.id, anon("reply").reply_to(top.id)).await.unwrap();

    let report = store.delete_room(room.id).await.unwrap();
    assert_eq!(report, DeleteReport { rooms: 1, comments: 2, keywords_detached: 1 });

    assert!(store.comment(top.id).await.unwrap().is_none());
    assert!(store.comment(reply.id).await.unwrap().is_none());
    let kw = store.keyword(kw.id).await.unwrap().expect("keyword survives its room");
    assert!(kw.current_discussion_room.is_none());
}

#[tokio::test]
#[ignore]
async fn comment_delete_removes_subtree_and_fixes_counters() {
    let store = store().await;
    let room = store.open_room(DiscussionRoom::new(unique_text("room"), vec![])).await.unwrap();
    let root = store.post_comment(room.id, anon("root")).await.unwrap();
    let child = store.post_comment(room.id, anon("child").reply_to(root.id)).await.unwrap();
    let grandchild = store.post_comment(room.id, anon("grandchild").reply_to(child.id)).await.unwrap();

    assert_eq!(store.room(room.id).await.unwrap().unwrap().comment_count, Some(3));
    assert_eq!(store.comment(root.id).await.unwrap().unwrap().sub_comment_count, 1);

    let report = store.delete_comment(child.id).await.unwrap();
    assert_eq!(report.comments, 2);
    assert!(store.comment(grandchild.id).await.unwrap().is_none());
    assert_eq!(store.comment(root.id).await.unwrap().unwrap().sub_comment_count, 0);
    assert_eq!(store.room(room.id).await.unwrap().unwrap().comment_count, Some(1));
    assert_eq!(store.comments_in_room(room.id).await.unwrap().len(), 1);

    store.delete_room(room.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn keyword_text_lookup_uses_index() {
    let store = store().await;
    let text = unique_text("kw");
    let first = store.track_keyword(Keyword::new(&text, 2, "news", json!({}), "", "")).await.unwrap();
    let found = store.keywords_by_text(&text).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, first.id);

    let index: Option<String> = sqlx::query_scalar(
        "SELECT indexdef FROM pg_indexes WHERE tablename = 'keywords' AND indexname = 'idx_keywords_keyword'",
    )
    .fetch_optional(store.pool())
    .await
    .unwrap();
    assert!(index.is_some());
}

#[tokio::test]
#[ignore]
async fn over_length_and_invalid_writes_are_rejected() {
    let store = store().await;
    let room = store.open_room(DiscussionRoom::new(unique_text("room"), vec![])).await.unwrap();

    assert!(matches!(
        store.post_comment(room.id, anon(&"x".repeat(401))).await,
        Err(DiscussionError::Constraint(ConstraintViolation::TooLong { column: "comment", .. }))
    ));
    assert!(matches!(
        store.post_comment(Uuid::new_v4(), anon("nowhere")).await,
        Err(DiscussionError::NotFound { entity: "discussion_room", .. })
    ));

    let comment = store.post_comment(room.id, anon("ok")).await.unwrap();
    let voted = store.vote(comment.id, Vote::Like).await.unwrap();
    assert_eq!(voted.like_count, 1);

    store.delete_room(room.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn preset_comment_count_is_reset_on_open() {
    let store = store().await;
    let mut draft = DiscussionRoom::new(unique_text("room"), vec![]);
    draft.comment_count = Some(5);

    let room = store.open_room(draft).await.unwrap();
    assert_eq!(room.comment_count, Some(0));

    let comment = store.post_comment(room.id, anon("only")).await.unwrap();
    store.delete_comment(comment.id).await.unwrap();
    assert_eq!(store.room(room.id).await.unwrap().unwrap().comment_count, Some(0));

    store.delete_room(room.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn back_to_back_keywords_keep_insertion_order() {
    let store = store().await;
    let rank = 10_000 + (Uuid::new_v4().as_u128() % 20_000) as i16;
    let text = unique_text("kw");

    let older = store.track_keyword(Keyword::new(&text, rank, "news", json!({}), "", "")).await.unwrap();
    let newer = store.track_keyword(Keyword::new(&text, rank, "news", json!({}), "", "")).await.unwrap();
    assert!(newer.seq > older.seq);

    let current = store.current_keywords(i16::MAX as usize).await.unwrap();
    let at_rank: Vec<Uuid> = current.iter().filter(|k| k.rank == rank).map(|k| k.id).collect();
    assert_eq!(at_rank, vec![newer.id]);

    let by_text: Vec<Uuid> = store.keywords_by_text(&text).await.unwrap().iter().map(|k| k.id).collect();
    assert_eq!(by_text, vec![newer.id, older.id]);
}
