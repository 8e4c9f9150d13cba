use url::Url;

use hypematch::prelude::*;

async fn connect() -> (Database, StoryStore) {
    let url = Url::parse("mem://?ns=hypematch&db=test").unwrap();
    let database = Database::connect(url).await.expect("in-memory store");
    let store = StoryStore::new(database.clone());
    (database, store)
}

async fn seed_user(database: &Database, name: &str) -> User {
    let user = User::new(
        name.to_string(),
        Url::parse("https://cdn.example/avatar.png").unwrap(),
    );
    let created: Vec<User> = database
        .create("users")
        .content(&user)
        .await
        .expect("user created");
    created.into_iter().next().expect("user returned")
}

fn story_by(author: &User, posted: Timestamp) -> Story {
    Story::posted_at(
        author.id.clone(),
        author.display_name.clone(),
        author.avatar_url.clone(),
        Url::parse("https://cdn.example/story.jpg").unwrap(),
        MediaType::Image,
        Some("gig tonight".to_string()),
        posted,
    )
}

#[tokio::test]
async fn creating_a_story_stores_expiry_and_bumps_the_author_counter() {
    let (database, store) = connect().await;
    let author = seed_user(&database, "mika").await;

    let posted = Timestamp::from_millis(1_000);
    let story = store
        .create_story(story_by(&author, posted))
        .await
        .expect("story created");

    assert_eq!(story.created_at, posted);
    assert_eq!(story.expires_at, posted.plus_millis(STORY_TTL_MS));
    assert_eq!(story.view_count, 0);
    assert!(!story.highlighted);

    let refreshed: Option<User> = database
        .select(author.id.clone())
        .await
        .expect("author still present");
    assert_eq!(refreshed.expect("author").story_count, 1);
}

#[tokio::test]
async fn fan_out_returns_the_union_across_author_batches() {
    let (database, store) = connect().await;
    let posted = Timestamp::from_millis(0);

    let mut authors = Vec::new();
    for n in 0..25 {
        let author = seed_user(&database, &format!("artist-{n}")).await;
        store
            .create_story(story_by(&author, posted))
            .await
            .expect("story created");
        authors.push(author.id);
    }

    let stories = store
        .active_by_authors(&authors, posted.plus_millis(1))
        .await;

    assert_eq!(stories.len(), 25, "one story per author across 3 batches");
}

#[tokio::test]
async fn expired_stories_drop_out_of_fan_out_unless_highlighted() {
    let (database, store) = connect().await;
    let author = seed_user(&database, "mika").await;
    let posted = Timestamp::from_millis(0);

    let expired = store
        .create_story(story_by(&author, posted))
        .await
        .expect("story created");
    let highlighted = store
        .create_story(story_by(&author, posted))
        .await
        .expect("story created");
    store
        .set_highlighted(&highlighted.id, true)
        .await
        .expect("highlight set");

    let at_expiry = posted.plus_millis(STORY_TTL_MS);
    let visible = store.active_by_authors(&[author.id], at_expiry).await;

    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, highlighted.id);
    assert!(!visible.iter().any(|story| story.id == expired.id));
}

#[tokio::test]
async fn deleting_is_scoped_to_the_author() {
    let (database, store) = connect().await;
    let author = seed_user(&database, "mika").await;
    let intruder = seed_user(&database, "rin").await;

    let story = store
        .create_story(story_by(&author, Timestamp::from_millis(0)))
        .await
        .expect("story created");

    store
        .delete_story(&story.id, &intruder.id)
        .await
        .expect("scoped delete is a no-op");
    let still_there: Vec<Story> = store
        .stories_by_author(&author.id)
        .await
        .expect("stories read");
    assert_eq!(still_there.len(), 1);

    store
        .delete_story(&story.id, &author.id)
        .await
        .expect("owner delete");
    let gone: Vec<Story> = store
        .stories_by_author(&author.id)
        .await
        .expect("stories read");
    assert!(gone.is_empty());

    let refreshed: Option<User> = database
        .select(author.id.clone())
        .await
        .expect("author still present");
    assert_eq!(refreshed.expect("author").story_count, 0);
}

#[tokio::test]
async fn view_counter_increments_are_cumulative() {
    let (database, store) = connect().await;
    let author = seed_user(&database, "mika").await;
    let story = store
        .create_story(story_by(&author, Timestamp::from_millis(0)))
        .await
        .expect("story created");

    store
        .increment_view_count(&story.id)
        .await
        .expect("first bump");
    store
        .increment_view_count(&story.id)
        .await
        .expect("second bump");

    let refreshed: Option<Story> = database
        .select(story.id.clone())
        .await
        .expect("story still present");
    assert_eq!(refreshed.expect("story").view_count, 2);
}

#[tokio::test]
async fn highlights_list_only_highlighted_stories_newest_first() {
    let (database, store) = connect().await;
    let author = seed_user(&database, "mika").await;

    let plain = story_by(&author, Timestamp::from_millis(10));
    let older = story_by(&author, Timestamp::from_millis(20));
    let newer = story_by(&author, Timestamp::from_millis(30));

    store.create_story(plain).await.expect("story created");
    let older = store.create_story(older).await.expect("story created");
    let newer = store.create_story(newer).await.expect("story created");
    store
        .set_highlighted(&older.id, true)
        .await
        .expect("highlight set");
    store
        .set_highlighted(&newer.id, true)
        .await
        .expect("highlight set");

    let highlights = store.highlights(&author.id).await.expect("highlights read");

    let ids: Vec<_> = highlights.iter().map(|story| story.id.clone()).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[tokio::test]
async fn sweep_removes_only_expired_unhighlighted_stories() {
    let (database, store) = connect().await;
    let author = seed_user(&database, "mika").await;
    let posted = Timestamp::from_millis(0);

    let expired = store
        .create_story(story_by(&author, posted))
        .await
        .expect("story created");
    let keepsake = store
        .create_story(story_by(&author, posted))
        .await
        .expect("story created");
    store
        .set_highlighted(&keepsake.id, true)
        .await
        .expect("highlight set");
    let fresh_posted = posted.plus_millis(STORY_TTL_MS);
    let fresh = store
        .create_story(story_by(&author, fresh_posted))
        .await
        .expect("story created");

    let removed = store
        .sweep_expired(posted.plus_millis(STORY_TTL_MS))
        .await
        .expect("sweep");
    assert_eq!(removed, 1);

    let remaining: Vec<Story> = store
        .stories_by_author(&author.id)
        .await
        .expect("stories read");
    let ids: Vec<_> = remaining.iter().map(|story| story.id.clone()).collect();
    assert!(ids.contains(&keepsake.id), "highlighted story survives");
    assert!(ids.contains(&fresh.id), "unexpired story survives");
    assert!(!ids.contains(&expired.id), "expired story is gone");

    let refreshed: Option<User> = database
        .select(author.id.clone())
        .await
        .expect("author still present");
    assert_eq!(refreshed.expect("author").story_count, 2);
}
