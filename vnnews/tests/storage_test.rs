use common::{init_db_pool, NewsSource};
use sqlx::SqlitePool;
use vnnews::storage::{self, NewsItem};

async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("news.db");
    let pool = init_db_pool(db_path.to_str().expect("utf-8 path"))
        .await
        .expect("init pool");
    storage::ensure_schema(&pool).await.expect("ensure schema");
    (dir, pool)
}

fn item(title: &str, time: &str, is_new: bool, source: NewsSource) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        time: time.to_string(),
        content: format!("Nội dung của {}", title),
        summary: format!("Tóm tắt của {}", title),
        link: format!("https://example.com/{}", title.len()),
        is_new,
        source,
    }
}

#[tokio::test]
async fn upsert_updates_existing_title_in_place() {
    let (_dir, pool) = test_pool().await;

    let mut news = item("Tiêu đề", "2025-05-05 10:00:00", true, NewsSource::VnExpress);
    storage::upsert_news(&pool, &news).await.expect("insert");

    news.time = "2025-05-05 11:00:00".to_string();
    news.summary = "Tóm tắt mới".to_string();
    news.is_new = false;
    storage::upsert_news(&pool, &news).await.expect("update");

    let rows = storage::latest_news(&pool, 10, Some(NewsSource::VnExpress))
        .await
        .expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time, "2025-05-05 11:00:00");
    assert_eq!(rows[0].summary, "Tóm tắt mới");
    assert!(!rows[0].is_new);
}

#[tokio::test]
async fn same_title_under_another_source_is_a_separate_row() {
    let (_dir, pool) = test_pool().await;

    storage::upsert_news(
        &pool,
        &item("Cùng tiêu đề", "2025-05-05 10:00:00", true, NewsSource::VnExpress),
    )
    .await
    .expect("insert vnexpress");
    storage::upsert_news(
        &pool,
        &item("Cùng tiêu đề", "2025-05-05 10:00:00", true, NewsSource::Hour24),
    )
    .await
    .expect("insert 24h");

    let all = storage::latest_news(&pool, 10, None).await.expect("read");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn latest_news_orders_by_time_and_respects_limit() {
    let (_dir, pool) = test_pool().await;

    for (title, time) in [
        ("Sáng", "2025-05-05 08:00:00"),
        ("Trưa", "2025-05-05 12:00:00"),
        ("Tối", "2025-05-05 20:00:00"),
    ] {
        storage::upsert_news(&pool, &item(title, time, true, NewsSource::VnExpress))
            .await
            .expect("insert");
    }
    storage::upsert_news(
        &pool,
        &item("Nguồn khác", "2025-05-05 23:00:00", true, NewsSource::Hour24),
    )
    .await
    .expect("insert 24h");

    let rows = storage::latest_news(&pool, 10, Some(NewsSource::VnExpress))
        .await
        .expect("read");
    let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, ["Tối", "Trưa", "Sáng"]);

    let capped = storage::latest_news(&pool, 2, Some(NewsSource::VnExpress))
        .await
        .expect("read capped");
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[0].title, "Tối");
}

#[tokio::test]
async fn mark_all_old_scopes_to_one_source() {
    let (_dir, pool) = test_pool().await;

    storage::upsert_news(
        &pool,
        &item("VnExpress mới", "2025-05-05 10:00:00", true, NewsSource::VnExpress),
    )
    .await
    .expect("insert");
    storage::upsert_news(
        &pool,
        &item("24h mới", "2025-05-05 10:00:00", true, NewsSource::Hour24),
    )
    .await
    .expect("insert");

    storage::mark_all_old(&pool, Some(NewsSource::VnExpress))
        .await
        .expect("demote");

    let vnexpress = storage::latest_news(&pool, 10, Some(NewsSource::VnExpress))
        .await
        .expect("read");
    assert!(vnexpress.iter().all(|r| !r.is_new));

    let hour24 = storage::latest_news(&pool, 10, Some(NewsSource::Hour24))
        .await
        .expect("read");
    assert!(hour24.iter().all(|r| r.is_new));
}

#[tokio::test]
async fn delete_old_news_keeps_the_newest_rows_per_source() {
    let (_dir, pool) = test_pool().await;

    for hour in 1..=5 {
        storage::upsert_news(
            &pool,
            &item(
                &format!("VnExpress {}", hour),
                &format!("2025-05-05 {:02}:00:00", hour),
                false,
                NewsSource::VnExpress,
            ),
        )
        .await
        .expect("insert");
    }
    storage::upsert_news(
        &pool,
        &item("24h giữ lại", "2025-05-01 00:00:00", false, NewsSource::Hour24),
    )
    .await
    .expect("insert");

    storage::delete_old_news(&pool, 3, Some(NewsSource::VnExpress))
        .await
        .expect("prune");

    let vnexpress = storage::latest_news(&pool, 10, Some(NewsSource::VnExpress))
        .await
        .expect("read");
    let titles: Vec<&str> = vnexpress.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, ["VnExpress 5", "VnExpress 4", "VnExpress 3"]);

    // Pruning one source must not touch the other, even with older rows.
    let hour24 = storage::latest_news(&pool, 10, Some(NewsSource::Hour24))
        .await
        .expect("read");
    assert_eq!(hour24.len(), 1);
}

#[tokio::test]
async fn api_key_roundtrip_overwrites_previous_value() {
    let (_dir, pool) = test_pool().await;

    assert_eq!(
        storage::get_gemini_api_key(&pool).await.expect("read empty"),
        None
    );

    storage::set_gemini_api_key(&pool, "khoa-dau-tien-123")
        .await
        .expect("store");
    assert_eq!(
        storage::get_gemini_api_key(&pool).await.expect("read").as_deref(),
        Some("khoa-dau-tien-123")
    );

    storage::set_gemini_api_key(&pool, "khoa-thu-hai-456")
        .await
        .expect("overwrite");
    assert_eq!(
        storage::get_gemini_api_key(&pool).await.expect("read").as_deref(),
        Some("khoa-thu-hai-456")
    );
}
