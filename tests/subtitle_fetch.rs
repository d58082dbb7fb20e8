use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tanglecast::config::GatewayConfig;
use tanglecast::gateway::GatewayClient;
use tanglecast::media::MediaCandidate;
use tanglecast::player::PlayerCommand;
use tanglecast::subtitles::{
    SubtitleAction, SubtitleError, SubtitleGroup, build_candidates, fetch_subtitle,
};

const MAGNET: &str = "magnet:?xt=urn:btih:abc";
const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello\n";

fn client_for(server: &MockServer) -> GatewayClient {
    GatewayClient::new(&GatewayConfig {
        url: server.uri(),
        username: "user".to_string(),
        password: "pass".to_string(),
    })
}

fn group() -> SubtitleGroup {
    let files = vec![
        MediaCandidate::new("Big Movie/a.srt", 100),
        MediaCandidate::new("Big Movie/b.mp4", 700_000_000),
        MediaCandidate::new("Big Movie/c.en.srt", 100),
    ];
    SubtitleGroup::new(build_candidates(&files, "Big Movie/b.mp4"))
}

#[tokio::test]
async fn test_fetch_writes_file_and_activates_track() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/stream"))
        .and(query_param("magnet", MAGNET))
        .and(query_param("path", "Big Movie/a.srt"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SRT))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut group = group();
    let Some(SubtitleAction::Fetch { index, remote_path }) = group.select(1) else {
        panic!("bundle track should need a download");
    };
    assert_eq!(remote_path, "Big Movie/a.srt");
    assert_eq!(group.pending(), Some(index));

    let saved = fetch_subtitle(&client_for(&mock_server), MAGNET, &remote_path, dir.path())
        .await
        .unwrap();

    assert_eq!(saved, dir.path().join("a.srt"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), SRT);

    let command = group.fetch_succeeded(index, saved.clone());
    assert_eq!(command, Some(PlayerCommand::SetSubtitleFile(saved)));
    assert_eq!(group.active(), index);
    assert_eq!(group.pending(), None);
}

#[tokio::test]
async fn test_fetch_not_found_keeps_previous_track() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let mut group = group();
    let Some(SubtitleAction::Fetch { index, remote_path }) = group.select(2) else {
        panic!("bundle track should need a download");
    };

    let result = fetch_subtitle(&client_for(&mock_server), MAGNET, &remote_path, dir.path()).await;
    match result {
        Err(SubtitleError::Status(status)) => assert_eq!(status.as_u16(), 404),
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(!dir.path().join("c.en.srt").exists());

    group.fetch_failed(index);
    assert_eq!(group.active(), 0);
    assert_eq!(group.pending(), None);
}

#[tokio::test]
async fn test_stale_fetch_is_ignored() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SRT))
        .mount(&mock_server)
        .await;

    let mut group = group();
    let Some(SubtitleAction::Fetch { index, remote_path }) = group.select(1) else {
        panic!("bundle track should need a download");
    };

    // The user switches subtitles off while the download is running
    assert_eq!(
        group.select(0),
        Some(SubtitleAction::Apply(PlayerCommand::ClearSubtitles))
    );

    let saved = fetch_subtitle(&client_for(&mock_server), MAGNET, &remote_path, dir.path())
        .await
        .unwrap();
    assert_eq!(group.fetch_succeeded(index, saved), None);
    assert_eq!(group.active(), 0);
}
