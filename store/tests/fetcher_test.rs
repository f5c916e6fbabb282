//! Repository fetcher tests against an in-process HTTP server

mod common;

use common::{spawn_server, World};
use serde_json::json;
use store::catalog::{FetchError, HttpRepositoryFetcher, RepositoryFetcher, RepositoryList};

fn manifest(apps: serde_json::Value) -> String {
    json!({ "apps": apps }).to_string()
}

async fn mixed_server() -> common::TestServer {
    let mut world = World::default();
    world.manifests.insert(
        "one.json".to_string(),
        manifest(json!([
            {"name": "Editor", "version": "1.0", "download": "editor.wpk", "icon": "icons/editor.png"},
            {"name": "Shared", "version": "1.0", "download": "https://mirror.example/shared.wpk"}
        ])),
    );
    world.manifests.insert(
        "two.json".to_string(),
        manifest(json!([
            {"name": "Shared", "version": "2.0", "download": "shared.wpk"},
            {"name": "Broken", "download": "broken.wpk"}
        ])),
    );
    world
        .manifests
        .insert("garbage.json".to_string(), "<html>oops</html>".to_string());
    world
        .manifests
        .insert("empty.json".to_string(), json!({"name": "no apps"}).to_string());
    spawn_server(world).await
}

#[tokio::test]
async fn test_fetch_repository_tags_and_resolves_urls() {
    let server = mixed_server().await;
    let fetcher = HttpRepositoryFetcher::default();
    let repo = server.repo_url("one.json");

    let packages = fetcher.fetch_repository(&repo).await.unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].repo_url, repo);
    assert_eq!(packages[0].repo_base, server.url("/repos"));
    assert_eq!(packages[0].download_url(), server.url("/repos/editor.wpk"));
    assert_eq!(
        packages[0].icon_url().as_deref(),
        Some(server.url("/repos/icons/editor.png").as_str())
    );
    assert_eq!(packages[1].download_url(), "https://mirror.example/shared.wpk");
}

#[tokio::test]
async fn test_fetch_repository_errors() {
    let server = mixed_server().await;
    let fetcher = HttpRepositoryFetcher::default();

    let missing = server.repo_url("missing.json");
    match fetcher.fetch_repository(&missing).await {
        Err(FetchError::Status { status, url }) => {
            assert_eq!(status, 404);
            assert_eq!(url, missing);
        }
        other => panic!("expected status error, got {other:?}"),
    }

    let garbage = server.repo_url("garbage.json");
    assert!(matches!(
        fetcher.fetch_repository(&garbage).await,
        Err(FetchError::Parse { .. })
    ));

    // Nothing listens on port 9 of the loopback interface
    assert!(matches!(
        fetcher.fetch_repository("http://127.0.0.1:9/repo.json").await,
        Err(FetchError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_fetch_all_isolates_failures_and_keeps_order() {
    let server = mixed_server().await;
    let fetcher = HttpRepositoryFetcher::default();
    let repositories = RepositoryList::new(
        [
            server.repo_url("missing.json"),
            server.repo_url("one.json"),
            server.repo_url("garbage.json"),
            server.repo_url("empty.json"),
            server.repo_url("two.json"),
        ],
        "unused",
    );

    let packages = fetcher.fetch_all(&repositories).await;
    let rows: Vec<(&str, &str)> = packages
        .iter()
        .map(|p| (p.name.as_str(), p.version.as_str()))
        .collect();
    // duplicates across repositories are kept; malformed entries are dropped
    assert_eq!(
        rows,
        vec![("Editor", "1.0"), ("Shared", "1.0"), ("Shared", "2.0")]
    );
    assert_eq!(packages[2].repo_url, server.repo_url("two.json"));
}

#[tokio::test]
async fn test_fetch_all_with_every_repository_down_is_empty() {
    let server = mixed_server().await;
    let fetcher = HttpRepositoryFetcher::default();
    let repositories = RepositoryList::new([server.repo_url("missing.json")], "unused");
    assert!(fetcher.fetch_all(&repositories).await.is_empty());
}
