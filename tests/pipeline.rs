use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use epl_standings::config::{ApiConfig, EtlConfig, Target};
use epl_standings::pipeline::{EtlError, execute, run_etl};
use epl_standings::sqlite_store::SqliteStore;
use epl_standings::store::{DatabaseStatus, StandingsStore};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

/// Serves exactly one HTTP response and hands back the raw request head.
fn serve_once(status: &str, body: String) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
    let addr = listener.local_addr().expect("listener addr");
    let status = status.to_string();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).expect("read request");
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .expect("write response");
        let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
    });
    (format!("http://{addr}"), rx)
}

fn config(api_host: String, db_path: PathBuf) -> EtlConfig {
    EtlConfig {
        api: ApiConfig {
            host: api_host,
            key: "test-key".to_string(),
        },
        target: Target::Sqlite(db_path),
        league: 39,
        season: 2023,
    }
}

#[test]
fn full_run_loads_every_team() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("epl.sqlite");
    let (host, requests) = serve_once("200 OK", read_fixture("standings.json"));
    let cfg = config(host, db_path.clone());
    let mut store = SqliteStore::new(db_path);

    let before = chrono::Utc::now();
    let summary = execute(&cfg, &mut store).expect("run should succeed");
    assert!(summary.started_at >= before);
    assert!(summary.started_at <= chrono::Utc::now());
    assert_eq!(summary.fetched, 4);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.database, DatabaseStatus::Created);
    assert_eq!(summary.upserted, 4);

    let head = requests.recv().unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /standings?league=39&season=2023 "));
    assert!(head.contains("x-apisports-key: test-key"));

    let rows = store.load_season(2023).unwrap();
    let positions = rows.iter().map(|r| r.position).collect::<Vec<_>>();
    assert_eq!(positions, vec![1, 2, 3, 8]);
    assert_eq!(rows[3].description, "EPL: Next Season");
}

#[test]
fn rerun_overwrites_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("epl.sqlite");

    let (host, _rx) = serve_once("200 OK", read_fixture("standings.json"));
    let mut store = SqliteStore::new(db_path.clone());
    assert!(run_etl(&config(host, db_path.clone()), &mut store));

    let updated = read_fixture("standings.json").replace("\"points\": 91", "\"points\": 94");
    let (host, _rx) = serve_once("200 OK", updated);
    let summary = execute(&config(host, db_path), &mut store).unwrap();
    assert_eq!(summary.database, DatabaseStatus::AlreadyExists);

    let rows = store.load_season(2023).unwrap();
    assert_eq!(rows.len(), 4);
    let city = rows.iter().find(|r| r.team_id == 50).unwrap();
    assert_eq!(city.points, 94);
}

#[test]
fn partial_payload_still_loads_good_entries() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("epl.sqlite");
    let broken = read_fixture("standings.json").replacen("\"goalsDiff\": 45,", "", 1);
    let (host, _rx) = serve_once("200 OK", broken);
    let mut store = SqliteStore::new(db_path.clone());

    let summary = execute(&config(host, db_path), &mut store).unwrap();
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].error.key(), "goalsDiff");
    assert_eq!(summary.upserted, 3);
    assert!(store.load_season(2023).unwrap().iter().all(|r| r.team_id != 40));
}

#[test]
fn http_failure_fails_run_without_touching_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("epl.sqlite");
    let (host, _rx) = serve_once(
        "500 Internal Server Error",
        r#"{"message":"boom"}"#.to_string(),
    );
    let cfg = config(host, db_path.clone());
    let mut store = SqliteStore::new(db_path.clone());

    assert!(!run_etl(&cfg, &mut store));
    assert!(!db_path.exists());
}

#[test]
fn api_error_payload_is_an_extract_failure() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("epl.sqlite");
    let (host, _rx) = serve_once("200 OK", read_fixture("api_errors.json"));
    let mut store = SqliteStore::new(db_path.clone());

    let err = execute(&config(host, db_path.clone()), &mut store).unwrap_err();
    assert!(matches!(err, EtlError::Extract(_)));
    assert!(err.to_string().contains("request limit"));
    assert!(!db_path.exists());
}

#[test]
fn unwritable_target_is_a_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the database file should be.
    let db_path = dir.path().join("taken");
    fs::create_dir(&db_path).unwrap();
    let (host, _rx) = serve_once("200 OK", read_fixture("standings.json"));
    let mut store = SqliteStore::new(db_path.clone());

    let err = execute(&config(host, db_path), &mut store).unwrap_err();
    assert!(matches!(err, EtlError::Load { .. }));
    assert!(err.to_string().contains(&store.describe()));
}
