//! End-to-end harvest runs against a mock fetcher.
//!
//! Each test reads a link table from disk, runs the full pipeline and checks
//! the CSV that lands on disk.

use std::path::{Path, PathBuf};

use stance_harvest::{
    read_links,
    testing::{issue_page, MockFetcher},
    FaultPolicy, HarvestConfig, HarvestError, Harvester, IssueExtractor, SENTINEL,
};
use tokio_util::sync::CancellationToken;

/// Helper to write a link table and return its path.
fn link_table(dir: &Path, rows: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("links.csv");
    let mut contents = String::from("name,link\n");
    for (name, link) in rows {
        contents.push_str(&format!("{name},{link}\n"));
    }
    std::fs::write(&path, contents).unwrap();
    path
}

fn read_output(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn harvester(fetcher: MockFetcher) -> Harvester<MockFetcher> {
    Harvester::new(
        fetcher,
        IssueExtractor::default(),
        HarvestConfig::new().without_delay().sort_rows(),
    )
}

#[tokio::test]
async fn test_single_candidate_columns_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a")]);
    let output = dir.path().join("stances.csv");
    let fetcher = MockFetcher::new().with_page(
        "http://x/a",
        issue_page(&[("Tax", "Yes"), ("Healthcare", "No")]),
    );

    let report = harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        read_output(&output),
        vec![vec!["name", "Healthcare", "Tax"], vec!["A", "No", "Yes"]]
    );
    assert_eq!(report.rows, 1);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_none_link_is_all_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a"), ("B", "None")]);
    let output = dir.path().join("stances.csv");
    let fetcher = MockFetcher::new().with_page(
        "http://x/a",
        issue_page(&[("Tax", "Yes"), ("Healthcare", "No")]),
    );

    harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await
        .unwrap();

    let rows = read_output(&output);
    assert_eq!(rows[2], vec!["B", SENTINEL, SENTINEL]);
}

#[tokio::test]
async fn test_only_candidate_without_link_gives_name_only_table() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("B", "None")]);
    let output = dir.path().join("stances.csv");

    harvester(MockFetcher::new())
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(read_output(&output), vec![vec!["name"], vec!["B"]]);
}

#[tokio::test]
async fn test_issue_found_later_is_backfilled_for_earlier_rows() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a"), ("B", "http://x/b")]);
    let output = dir.path().join("stances.csv");
    let fetcher = MockFetcher::new()
        .with_page("http://x/a", issue_page(&[("Tax", "Yes")]))
        .with_page("http://x/b", issue_page(&[("Tax", "No"), ("Guns", "Yes")]));

    harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        read_output(&output),
        vec![
            vec!["name", "Guns", "Tax"],
            vec!["A", SENTINEL, "Yes"],
            vec!["B", "Yes", "No"],
        ]
    );
}

#[tokio::test]
async fn test_server_error_still_produces_file() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a"), ("C", "http://x/c")]);
    let output = dir.path().join("stances.csv");
    let fetcher = MockFetcher::new()
        .with_page("http://x/a", issue_page(&[("Tax", "Yes")]))
        .with_status("http://x/c", 500);

    let report = harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await
        .unwrap();

    let rows = read_output(&output);
    assert_eq!(rows[2], vec!["C", SENTINEL]);
    assert_eq!(report.fetch_failures, 1);
}

#[tokio::test]
async fn test_every_row_has_full_width() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(
        dir.path(),
        &[
            ("A", "http://x/a"),
            ("B", "http://x/b"),
            ("C", "http://x/c"),
            ("D", ""),
            ("E", "http://x/e"),
        ],
    );
    let output = dir.path().join("stances.csv");
    let fetcher = MockFetcher::new()
        .with_page("http://x/a", issue_page(&[("Tax", "Yes")]))
        .with_page("http://x/b", issue_page(&[("Guns", "No"), ("Abortion", "Yes")]))
        .with_transport_failure("http://x/c")
        .with_page("http://x/e", issue_page(&[("Healthcare", "Undecided")]));

    harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await
        .unwrap();

    let rows = read_output(&output);
    let header = &rows[0];
    assert_eq!(header, &vec!["name", "Abortion", "Guns", "Healthcare", "Tax"]);
    let mut sorted = header[1..].to_vec();
    sorted.sort();
    assert_eq!(&header[1..], sorted.as_slice());
    for row in &rows[1..] {
        assert_eq!(row.len(), header.len(), "row {:?}", row);
    }
}

#[tokio::test]
async fn test_faulted_candidate_policy_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a"), ("Z", "http://x/z")]);
    let fetcher = MockFetcher::new()
        .with_page("http://x/a", issue_page(&[("Tax", "Yes")]))
        .with_fault("http://x/z");

    let dropped = dir.path().join("dropped.csv");
    harvester(fetcher.clone())
        .run(read_links(&links).unwrap(), &dropped, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(read_output(&dropped).len(), 2);

    let kept = dir.path().join("kept.csv");
    Harvester::new(
        fetcher,
        IssueExtractor::default(),
        HarvestConfig::new()
            .without_delay()
            .sort_rows()
            .with_fault_policy(FaultPolicy::SentinelRow),
    )
    .run(read_links(&links).unwrap(), &kept, &CancellationToken::new())
    .await
    .unwrap();
    assert_eq!(read_output(&kept)[2], vec!["Z", SENTINEL]);
}

#[tokio::test]
async fn test_cancelled_run_leaves_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a")]);
    let output = dir.path().join("stances.csv");
    std::fs::write(&output, "name,Tax\nOld,Yes\n").unwrap();
    let fetcher = MockFetcher::new().with_page("http://x/a", issue_page(&[("Tax", "No")]));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &cancel)
        .await;

    assert!(matches!(result, Err(HarvestError::Cancelled)));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "name,Tax\nOld,Yes\n");
}

#[tokio::test]
async fn test_unwritable_destination_is_write_error() {
    let dir = tempfile::tempdir().unwrap();
    let links = link_table(dir.path(), &[("A", "http://x/a")]);
    let output = dir.path().join("missing").join("stances.csv");
    let fetcher = MockFetcher::new().with_page("http://x/a", issue_page(&[("Tax", "No")]));

    let result = harvester(fetcher)
        .run(read_links(&links).unwrap(), &output, &CancellationToken::new())
        .await;

    tokio_test::assert_err!(&result);
    assert!(matches!(result, Err(HarvestError::Write(_))));
    assert!(!output.exists());
}
