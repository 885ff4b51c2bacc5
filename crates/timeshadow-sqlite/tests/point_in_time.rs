//! Integration tests for point-in-time reads against SQLite.

mod common;

use chrono::Duration;
use std::sync::Arc;

use common::{harness, harness_with, Comment, Post, Tag, User};
use timeshadow_core::{ContextTimeMachine, PreloadCondition, Query, Expr};

/// Test the rename scenario: each as-of time sees the name current then.
#[test]
fn test_reconstructs_each_version() {
    let h = harness();

    let t1 = h.tick();
    let mut user = User::new("John Doe", "john.doe@example.com");
    h.db.create(&mut user).unwrap();

    let t2 = h.tick();
    user.name = "Jane Doe".to_string();
    h.db.save(&user).unwrap();

    let by_id = || Query::new().eq("id", user.id);

    h.time.set(t1);
    let then: Vec<User> = h.db.find(by_id()).unwrap();
    assert_eq!(then.len(), 1);
    assert_eq!(then[0].name, "John Doe");

    h.time.set(t2);
    let then: Vec<User> = h.db.find(by_id()).unwrap();
    assert_eq!(then[0].name, "Jane Doe");

    // Between the two writes the first version is still current.
    h.time.set(t1 + Duration::seconds(5));
    let then: Vec<User> = h.db.find(by_id()).unwrap();
    assert_eq!(then[0].name, "John Doe");

    // Before the entity existed there is nothing to see.
    h.time.set(t1 - Duration::seconds(1));
    assert!(h.db.find::<User>(by_id()).unwrap().is_empty());

    h.time.clear();
    let now: User = h.db.first(by_id()).unwrap().unwrap();
    assert_eq!(now.name, "Jane Doe");
}

/// Test that reads without an as-of time never touch a log table.
#[test]
fn test_current_reads_do_not_query_log_tables() {
    let h = harness();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    let mut post = Post::new(user.id, "hello");
    h.db.create(&mut post).unwrap();

    h.executor().clear();
    let users: Vec<User> = h
        .db
        .find(Query::new().preload("Posts").preload("Manager"))
        .unwrap();
    assert_eq!(users[0].posts.len(), 1);

    let statements = h.executor().statements();
    assert!(!statements.is_empty());
    assert!(statements.iter().all(|sql| !sql.contains("shadow_")));
}

/// Test that an unscoped read returns live rows even with an as-of time.
#[test]
fn test_unscoped_read_ignores_as_of() {
    let h = harness();
    let t1 = h.tick();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    h.tick();
    user.name = "Jane".to_string();
    h.db.save(&user).unwrap();

    h.time.set(t1);
    let live: Vec<User> = h.db.find(Query::new().unscoped()).unwrap();
    assert_eq!(live[0].name, "Jane");
}

/// Test that versions of different keys do not interfere.
#[test]
fn test_interleaved_keys_resolve_independently() {
    let h = harness();

    h.tick();
    let mut a = User::new("A1", "a@example.com");
    h.db.create(&mut a).unwrap();
    h.tick();
    let mut b = User::new("B1", "b@example.com");
    h.db.create(&mut b).unwrap();
    let t3 = h.tick();
    a.name = "A2".to_string();
    h.db.save(&a).unwrap();
    let t4 = h.tick();
    b.name = "B2".to_string();
    h.db.save(&b).unwrap();

    h.time.set(t3);
    let users: Vec<User> = h.db.find(Query::new().order("id")).unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["A2", "B1"]);

    h.time.set(t4);
    let users: Vec<User> = h.db.find(Query::new().order("id")).unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["A2", "B2"]);
}

/// Test that caller filters apply to the historical row, not the live one.
#[test]
fn test_filters_match_historical_values() {
    let h = harness();
    let t1 = h.tick();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    h.tick();
    user.name = "Jane".to_string();
    h.db.save(&user).unwrap();

    h.time.set(t1);
    let found: Vec<User> = h.db.find(Query::new().eq("name", "John")).unwrap();
    assert_eq!(found.len(), 1);
    assert!(h.db.find::<User>(Query::new().eq("name", "Jane")).unwrap().is_empty());
}

/// Test the request-context time provider.
#[test]
fn test_as_of_from_request_context() {
    let h = harness_with(Arc::new(ContextTimeMachine));
    let t1 = h.tick();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    h.tick();
    user.name = "Jane".to_string();
    h.db.save(&user).unwrap();

    let then: Vec<User> = h.db.find(Query::new().as_of(t1)).unwrap();
    assert_eq!(then[0].name, "John");
    let now: Vec<User> = h.db.find(Query::new()).unwrap();
    assert_eq!(now[0].name, "Jane");
}

/// Test that preloaded relations are reconstructed at the same instant.
#[test]
fn test_preloads_are_historical() {
    let h = harness();

    h.tick();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    let mut post = Post::new(user.id, "first draft");
    h.db.create(&mut post).unwrap();
    let mut comment = Comment::new(post.id, "nice");
    h.db.create(&mut comment).unwrap();
    let t1 = h.tick();

    h.tick();
    post.title = "final".to_string();
    h.db.save(&post).unwrap();
    comment.body = "edited".to_string();
    h.db.save(&comment).unwrap();
    let mut second = Post::new(user.id, "later post");
    h.db.create(&mut second).unwrap();

    h.time.set(t1);
    let users: Vec<User> = h
        .db
        .find(Query::new().preload("Posts").preload("Posts.Comments"))
        .unwrap();
    assert_eq!(users[0].posts.len(), 1);
    assert_eq!(users[0].posts[0].title, "first draft");
    assert_eq!(users[0].posts[0].comments[0].body, "nice");

    h.time.clear();
    let users: Vec<User> = h
        .db
        .find(Query::new().preload("Posts.Comments"))
        .unwrap();
    assert_eq!(users[0].posts.len(), 2);
    assert_eq!(users[0].posts[0].title, "final");
    assert_eq!(users[0].posts[0].comments[0].body, "edited");
}

/// Test that overlapping preload paths rewrite the shared hop once.
#[test]
fn test_overlapping_preloads_rewrite_once() {
    let h = harness();
    h.tick();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    let mut post = Post::new(user.id, "p");
    h.db.create(&mut post).unwrap();
    h.db.create(&mut Comment::new(post.id, "c")).unwrap();
    let t1 = h.tick();

    h.time.set(t1);
    h.executor().clear();
    h.db
        .find::<User>(Query::new().preload("Posts").preload("Posts.Comments"))
        .unwrap();

    let statements = h.executor().statements();
    let posts: Vec<&String> = statements
        .iter()
        .filter(|sql| sql.contains("FROM shadow_posts AS posts"))
        .collect();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].matches("shadow_seq IN").count(), 1);

    let comments: Vec<&String> = statements
        .iter()
        .filter(|sql| sql.contains("FROM shadow_comments AS comments"))
        .collect();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].matches("shadow_seq IN").count(), 1);
}

/// Test that caller conditions on an intermediate hop survive the rewrite.
#[test]
fn test_intermediate_hop_conditions_are_kept() {
    let h = harness();
    h.tick();
    let mut user = User::new("John", "john@example.com");
    h.db.create(&mut user).unwrap();
    let mut keep = Post::new(user.id, "keep");
    h.db.create(&mut keep).unwrap();
    let mut drop = Post::new(user.id, "drop");
    h.db.create(&mut drop).unwrap();
    h.db.create(&mut Comment::new(keep.id, "c1")).unwrap();
    h.db.create(&mut Comment::new(drop.id, "c2")).unwrap();
    let t1 = h.tick();

    h.time.set(t1);
    let users: Vec<User> = h
        .db
        .find(
            Query::new()
                .preload_with(
                    "Posts",
                    vec![PreloadCondition::Filter(Expr::eq("title", "keep"))],
                )
                .preload("Posts.Comments"),
        )
        .unwrap();
    assert_eq!(users[0].posts.len(), 1);
    assert_eq!(users[0].posts[0].title, "keep");
    assert_eq!(users[0].posts[0].comments.len(), 1);
}

/// Test a relation back to the root's own type.
#[test]
fn test_self_relation_follows_root_time() {
    let h = harness();
    h.tick();
    let mut boss = User::new("Ada", "ada@example.com");
    h.db.create(&mut boss).unwrap();
    let mut report = User::new("Bob", "bob@example.com");
    report.manager_id = Some(boss.id);
    h.db.create(&mut report).unwrap();
    let t1 = h.tick();

    h.tick();
    boss.name = "Ada Lovelace".to_string();
    h.db.save(&boss).unwrap();

    h.time.set(t1);
    let bob: User = h
        .db
        .first(Query::new().eq("id", report.id).preload("Manager"))
        .unwrap()
        .unwrap();
    assert_eq!(bob.manager.unwrap().name, "Ada");
}

/// Test that entities without a log table read live rows at any time.
#[test]
fn test_unversioned_entity_reads_live_rows() {
    let h = harness();
    let t1 = h.tick();
    h.tick();
    let mut tag = Tag {
        id: 0,
        label: "rust".into(),
    };
    h.db.create(&mut tag).unwrap();

    h.time.set(t1);
    let tags: Vec<Tag> = h.db.find(Query::new()).unwrap();
    assert_eq!(tags, vec![tag]);
}
