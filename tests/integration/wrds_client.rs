//! HTTP client tests against a mock WRDS-style endpoint.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dealer_ratios::models::{EffectiveEnd, EffectiveRange, EntityRecord};
use dealer_ratios::wrds::{FundamentalsSource, WrdsClient};

const FUNDQ_HEADER: &str = "datadate,atq,actq,ltq,lctq,teqq,ceqq,pstkq,mibnq,cshoq,prccq,gvkey,conm";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entity(gvkey: i64, name: &str) -> EntityRecord {
    EntityRecord {
        gvkey,
        name: name.to_string(),
        sic: Some(6211),
        effective: None,
    }
}

#[tokio::test]
async fn test_shared_range_fetch_parses_and_resolves_rows() {
    let server = MockServer::start().await;
    let body = format!(
        "{FUNDQ_HEADER}\n\
         2000-03-31,100.5,,80.0,,,,,,4.0,25.0,100,PRIMARY DEALER CO\n\
         2000-06-30,0.0,45.0,,,20.5,,,,,,200,BANK CO\n"
    );
    Mock::given(method("GET"))
        .and(path("/comp/fundq"))
        .and(query_param("user", "tester"))
        .and(query_param("gvkeys", "000100,000200"))
        .and(query_param("start", "1960-01-01"))
        .and(query_param("end", "2012-12-31"))
        .and(query_param("indfmt", "INDL"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = WrdsClient::with_base_url(&server.uri(), "tester").unwrap();
    let rows = client
        .fetch_shared_range(
            &[entity(100, "PRIMARY DEALER CO"), entity(200, "BANK CO")],
            date(1960, 1, 1),
            date(2012, 12, 31),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].gvkey, 100);
    assert_eq!(rows[0].total_assets, Some(100.5));
    assert_eq!(rows[0].book_debt, Some(80.0));
    assert_eq!(rows[0].market_equity, Some(100.0));
    // zero atq falls back to actq
    assert_eq!(rows[1].total_assets, Some(45.0));
    assert_eq!(rows[1].book_equity, Some(20.5));
    assert_eq!(rows[1].market_equity, None);
}

#[tokio::test]
async fn test_header_only_response_yields_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/comp/fundq"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("{FUNDQ_HEADER}\n")))
        .mount(&server)
        .await;

    let client = WrdsClient::with_base_url(&server.uri(), "tester").unwrap();
    let rows = client
        .fetch_shared_range(&[entity(100, "PD CO")], date(1960, 1, 1), date(2012, 12, 31))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_server_error_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/comp/fundq"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = WrdsClient::with_base_url(&server.uri(), "tester").unwrap();
    let result = client
        .fetch_shared_range(&[entity(100, "PD CO")], date(1960, 1, 1), date(2012, 12, 31))
        .await;
    let err = result.unwrap_err().to_string();
    assert!(err.contains("500"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_missing_username_is_an_error_before_any_request() {
    let server = MockServer::start().await;
    // no mock mounted: a request would 404, but we should never get that far
    let client = WrdsClient::with_base_url(&server.uri(), "").unwrap();
    let result = client
        .fetch_shared_range(&[entity(100, "PD CO")], date(1960, 1, 1), date(2012, 12, 31))
        .await;
    assert!(result.unwrap_err().to_string().contains("WRDS_USERNAME"));
}

#[tokio::test]
async fn test_empty_entity_set_skips_the_request() {
    let server = MockServer::start().await;
    let client = WrdsClient::with_base_url(&server.uri(), "tester").unwrap();
    let rows = client
        .fetch_shared_range(&[], date(1960, 1, 1), date(2012, 12, 31))
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_per_entity_fetch_uses_effective_ranges() {
    let server = MockServer::start().await;
    let body = format!("{FUNDQ_HEADER}\n2001-03-31,50.0,,,,,,,,,,100,PD CO\n");
    Mock::given(method("GET"))
        .and(path("/comp/fundq"))
        .and(query_param("gvkeys", "000100"))
        .and(query_param("start", "2000-01-01"))
        .and(query_param("end", "2005-06-30"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let with_range = EntityRecord {
        gvkey: 100,
        name: "PD CO".to_string(),
        sic: Some(6211),
        effective: Some(EffectiveRange {
            start: date(2000, 1, 1),
            end: EffectiveEnd::On(date(2005, 6, 30)),
        }),
    };
    // entities without effective dates are skipped, not fetched
    let without_range = entity(999, "NO DATES CO");

    let client = WrdsClient::with_base_url(&server.uri(), "tester").unwrap();
    let rows = client
        .fetch_per_entity(&[with_range, without_range], date(2012, 12, 31))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].gvkey, 100);
}

#[tokio::test]
async fn test_per_entity_current_end_clamps_to_fallback() {
    let server = MockServer::start().await;
    let body = format!("{FUNDQ_HEADER}\n2010-03-31,50.0,,,,,,,,,,100,PD CO\n");
    Mock::given(method("GET"))
        .and(path("/comp/fundq"))
        .and(query_param("start", "2000-01-01"))
        .and(query_param("end", "2012-12-31"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let open_ended = EntityRecord {
        gvkey: 100,
        name: "PD CO".to_string(),
        sic: Some(6211),
        effective: Some(EffectiveRange {
            start: date(2000, 1, 1),
            end: EffectiveEnd::Current,
        }),
    };

    let client = WrdsClient::with_base_url(&server.uri(), "tester").unwrap();
    let rows = client
        .fetch_per_entity(&[open_ended], date(2012, 12, 31))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
