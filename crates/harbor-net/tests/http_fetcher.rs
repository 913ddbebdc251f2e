//! HttpFetcher against a local mock origin.

use std::time::Duration;

use harbor_net::{Fetcher, HttpFetcher, LoaderConfig, NetError, Request, ResponseSource, Url};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(LoaderConfig::default()).unwrap()
}

#[tokio::test]
async fn fetches_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/css/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("body { margin: 0 }", "text/css")
                .insert_header("cache-control", "max-age=60"),
        )
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/css/style.css", server.uri())).unwrap();
    let response = fetcher().fetch(&Request::get(url)).await.unwrap();

    assert!(response.ok());
    assert_eq!(response.source, ResponseSource::Network);
    assert_eq!(response.header("content-type"), Some("text/css"));
    assert_eq!(response.header("cache-control"), Some("max-age=60"));
    assert_eq!(response.text().unwrap(), "body { margin: 0 }");
}

#[tokio::test]
async fn non_success_status_is_still_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
    let response = fetcher().fetch(&Request::get(url)).await.unwrap();

    assert_eq!(response.status.as_u16(), 404);
    assert!(!response.ok());
}

#[tokio::test]
async fn slow_origin_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();
    let request = Request::get(url).timeout(Duration::from_millis(50));
    let result = fetcher().fetch(&request).await;

    assert!(matches!(result, Err(NetError::Timeout(_))));
}

#[tokio::test]
async fn unreachable_origin_is_an_error() {
    // Nothing listens on port 9 of the loopback interface.
    let url = Url::parse("http://127.0.0.1:9/").unwrap();
    let result = fetcher().fetch(&Request::get(url)).await;
    assert!(result.is_err());
}
