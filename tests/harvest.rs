use std::path::Path;
use std::time::Duration;

use papers_scrap::{
    process::process_site, request::PolitenessDelay, HarvestConfig, CSV_HEADER, OUTPUT_FILE,
};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, root: &Path, newest: u16, oldest: u16) -> HarvestConfig {
    HarvestConfig {
        base_url: Url::parse(&server.uri()).unwrap(),
        storage_root: root.to_path_buf(),
        newest_year: newest,
        oldest_year: oldest,
        workers: 3,
        politeness: PolitenessDelay::none(),
        drain_timeout: Duration::from_secs(60),
    }
}

fn index_page(papers: &[(&str, &str)]) -> String {
    let entries: String = papers
        .iter()
        .map(|(href, title)| format!(r#"<li class="conference"><a href="{href}">{title}</a></li>"#))
        .collect();
    format!(r#"<html><body><ul class="paper-list">{entries}</ul></body></html>"#)
}

async fn mount_html(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_bytes(server: &MockServer, at: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

fn records(root: &Path) -> Vec<String> {
    let csv = std::fs::read_to_string(root.join(OUTPUT_FILE)).unwrap();
    assert!(csv.starts_with(CSV_HEADER));
    csv.lines().skip(1).map(str::to_string).collect()
}

#[tokio::test]
async fn index_with_three_links_submits_three_tasks() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/paper_files/paper/2023",
        index_page(&[("/p/1", "One"), ("/p/2", "Two"), ("/p/3", "Three")]),
    )
    .await;
    for n in 1..=3 {
        mount_html(&server, &format!("/p/{n}"), format!("<i>Author {n}</i>")).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let report = process_site(config(&server, dir.path(), 2023, 2023))
        .await
        .unwrap();

    assert_eq!(report.partitions_submitted, 1);
    assert_eq!(report.items_submitted, 3);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.downloads_completed, 0);

    let mut lines = records(dir.path());
    lines.sort();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.ends_with(",\"N/A\"")));
}

#[tokio::test]
async fn paper_page_yields_authors_and_downloaded_pdf() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/paper_files/paper/2023",
        index_page(&[("/paper_files/paper/2023/hash/abc-Abstract.html", "Sparse Things")]),
    )
    .await;
    mount_html(
        &server,
        "/paper_files/paper/2023/hash/abc-Abstract.html",
        r#"<html><body>
            <h4>Authors</h4><p><i>A. Smith</i>, <i>B. Lee</i></p>
            <a href="/paper_files/paper/2023/file/abc-Paper.pdf">Paper</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_bytes(&server, "/paper_files/paper/2023/file/abc-Paper.pdf", b"%PDF-1.4 sparse").await;

    let dir = tempfile::tempdir().unwrap();
    let report = process_site(config(&server, dir.path(), 2023, 2023))
        .await
        .unwrap();
    assert_eq!(report.records_written, 1);
    assert_eq!(report.downloads_completed, 1);

    let lines = records(dir.path());
    assert_eq!(lines.len(), 1);
    let expected = format!(
        "2023,\"Sparse Things\",\"A. Smith; B. Lee\",\"{0}/paper_files/paper/2023/hash/abc-Abstract.html\",\"{0}/paper_files/paper/2023/file/abc-Paper.pdf\"",
        server.uri()
    );
    assert_eq!(lines[0], expected);

    let pdf = dir.path().join("2023").join("Sparse_Things.pdf");
    assert_eq!(std::fs::read(pdf).unwrap(), b"%PDF-1.4 sparse");
}

#[tokio::test]
async fn failed_index_fetch_skips_only_that_year() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper_files/paper/2022"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/paper_files/paper/2021",
        index_page(&[("/p/a", "Alpha"), ("/p/b", "Beta")]),
    )
    .await;
    mount_html(&server, "/p/a", "<i>X</i>".to_string()).await;
    mount_html(&server, "/p/b", "<i>Y</i>".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let report = process_site(config(&server, dir.path(), 2022, 2021))
        .await
        .unwrap();

    assert_eq!(report.partitions_skipped, 1);
    assert_eq!(report.partitions_submitted, 1);
    assert_eq!(report.records_written, 2);

    let lines = records(dir.path());
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("2021,")));
    assert!(dir.path().join("2022").is_dir());
}

#[tokio::test]
async fn colliding_titles_share_one_file_and_keep_both_records() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/paper_files/paper/2020",
        index_page(&[("/p/1", "Deep Nets!"), ("/p/2", "Deep Nets?")]),
    )
    .await;
    mount_html(&server, "/p/1", "<i>First</i><a href='/f/1.pdf'>pdf</a>".to_string()).await;
    mount_html(&server, "/p/2", "<i>Second</i><a href='/f/2.pdf'>pdf</a>".to_string()).await;
    mount_bytes(&server, "/f/1.pdf", b"first body").await;
    mount_bytes(&server, "/f/2.pdf", b"second body").await;

    let dir = tempfile::tempdir().unwrap();
    let report = process_site(config(&server, dir.path(), 2020, 2020))
        .await
        .unwrap();
    assert_eq!(report.records_written, 2);
    assert_eq!(report.downloads_completed, 2);

    let year_dir = dir.path().join("2020");
    let files: Vec<_> = std::fs::read_dir(&year_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
    let contents = std::fs::read(year_dir.join("Deep_Nets_.pdf")).unwrap();
    assert!(contents == b"first body" || contents == b"second body");

    let lines = records(dir.path());
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.contains("\"Deep Nets!\",\"First\"")));
    assert!(lines.iter().any(|l| l.contains("\"Deep Nets?\",\"Second\"")));
}

#[tokio::test]
async fn unreachable_paper_pages_lose_only_their_own_records() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/paper_files/paper/2019",
        index_page(&[("/p/ok", "Fine"), ("/p/down", "Broken")]),
    )
    .await;
    mount_html(&server, "/p/ok", "<i>Someone</i>".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let report = process_site(config(&server, dir.path(), 2019, 2019))
        .await
        .unwrap();

    assert_eq!(report.items_submitted, 2);
    assert_eq!(report.records_written, 1);
    assert_eq!(report.items_skipped, 1);
    assert_eq!(report.stragglers, 0);

    let lines = records(dir.path());
    assert_eq!(lines, vec![format!(
        "2019,\"Fine\",\"Someone\",\"{}/p/ok\",\"N/A\"",
        server.uri()
    )]);
}
