use futures::stream::{self, StreamExt};

use crate::feed::fetcher;
use crate::feed::normalizer;
use crate::feed::types::{
    CanonicalItem, FeedDescriptor, FetchConfig, FetchError, InvalidConfig, NormalizeConfig,
    MAX_CONCURRENCY,
};

/// Result of one fetch-and-normalize attempt for one feed.
///
/// Produced once per feed per cycle and consumed immediately by the digest
/// aggregator; nothing is retained across cycles.
#[derive(Debug)]
pub struct FetchOutcome {
    pub feed: FeedDescriptor,
    pub result: Result<Vec<CanonicalItem>, FetchError>,
}

/// Fetches and normalizes every feed under a bounded pool.
///
/// At most `min(cfg.concurrency, MAX_CONCURRENCY, feeds.len())` tasks run
/// at once. A feed whose fetch or parse fails yields a `Failure` outcome
/// for that feed alone: it never aborts or delays its siblings, and there
/// is no early return: the call completes only once every feed has an
/// outcome. Outcomes come back in input order regardless of completion
/// order; each task fills exactly one slot keyed by its input index.
pub async fn fetch_all(
    client: &reqwest::Client,
    feeds: Vec<FeedDescriptor>,
    fetch_cfg: &FetchConfig,
    norm_cfg: &NormalizeConfig,
) -> Result<Vec<FetchOutcome>, InvalidConfig> {
    fetch_cfg.validate()?;
    norm_cfg.validate()?;

    if feeds.is_empty() {
        return Ok(Vec::new());
    }

    let width = fetch_cfg
        .concurrency
        .min(MAX_CONCURRENCY)
        .min(feeds.len());

    let mut indexed: Vec<(usize, FetchOutcome)> = stream::iter(feeds.into_iter().enumerate())
        .map(|(idx, feed)| {
            let client = client.clone();
            let timeout = fetch_cfg.timeout;
            let norm_cfg = norm_cfg.clone();
            async move {
                let result = fetch_one(&client, &feed, timeout, &norm_cfg).await;
                if let Err(e) = &result {
                    tracing::warn!(feed = %feed.xml_url, error = %e, "feed skipped this cycle");
                }
                (idx, FetchOutcome { feed, result })
            }
        })
        .buffer_unordered(width)
        .collect()
        .await;

    // Completion order is arbitrary; callers see input order.
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, outcome)| outcome).collect())
}

async fn fetch_one(
    client: &reqwest::Client,
    feed: &FeedDescriptor,
    timeout: std::time::Duration,
    norm_cfg: &NormalizeConfig,
) -> Result<Vec<CanonicalItem>, FetchError> {
    let bytes = fetcher::fetch_bytes(client, &feed.xml_url, timeout).await?;
    Ok(normalizer::normalize(&bytes, feed, norm_cfg)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(title: &str) -> String {
        format!(
            r#"<rss version="2.0"><channel>
              <item><title>{title}</title><link>https://example.com/x</link>
              <pubDate>Mon, 05 Jan 2026 09:00:00 GMT</pubDate>
              <description>s</description></item>
            </channel></rss>"#
        )
    }

    fn descriptor(name: &str, url: String) -> FeedDescriptor {
        FeedDescriptor {
            name: name.to_string(),
            xml_url: url,
            html_url: None,
            category: Some("Test".to_string()),
        }
    }

    async fn mount_feed(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn outcomes_preserve_input_order() {
        let server = MockServer::start().await;
        for route in ["a", "b", "c"] {
            mount_feed(&server, &format!("/{route}"), rss(route)).await;
        }

        let feeds = vec![
            descriptor("a", format!("{}/a", server.uri())),
            descriptor("b", format!("{}/b", server.uri())),
            descriptor("c", format!("{}/c", server.uri())),
        ];
        let client = fetcher::build_client().unwrap();
        let outcomes = fetch_all(
            &client,
            feeds,
            &FetchConfig::default(),
            &NormalizeConfig::default(),
        )
        .await
        .unwrap();

        let names: Vec<&str> = outcomes.iter().map(|o| o.feed.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[tokio::test]
    async fn failing_feed_does_not_poison_siblings() {
        let server = MockServer::start().await;
        mount_feed(&server, "/good", rss("good")).await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not xml"))
            .mount(&server)
            .await;

        let feeds = vec![
            descriptor("good", format!("{}/good", server.uri())),
            descriptor("bad", format!("{}/bad", server.uri())),
            descriptor("garbage", format!("{}/garbage", server.uri())),
        ];
        let client = fetcher::build_client().unwrap();
        let outcomes = fetch_all(
            &client,
            feeds,
            &FetchConfig::default(),
            &NormalizeConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(FetchError::HttpStatus(500))
        ));
        assert!(matches!(
            outcomes[2].result,
            Err(FetchError::Parse(crate::feed::types::ParseError::MalformedXml(_)))
        ));
    }

    #[tokio::test]
    async fn hanging_feed_only_costs_its_own_timeout() {
        let server = MockServer::start().await;
        for route in ["f1", "f2", "f4", "f5"] {
            mount_feed(&server, &format!("/{route}"), rss(route)).await;
        }
        Mock::given(method("GET"))
            .and(path("/f3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss("f3"))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let feeds = (1..=5)
            .map(|i| descriptor(&format!("f{i}"), format!("{}/f{i}", server.uri())))
            .collect();
        let client = fetcher::build_client().unwrap();
        let cfg = FetchConfig {
            timeout: Duration::from_millis(300),
            concurrency: 2,
        };
        let outcomes = fetch_all(&client, feeds, &cfg, &NormalizeConfig::default())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 5);
        for (i, outcome) in outcomes.iter().enumerate() {
            if i == 2 {
                assert!(matches!(outcome.result, Err(FetchError::Network(_))));
            } else {
                assert_eq!(outcome.result.as_ref().unwrap().len(), 1);
            }
        }
    }

    #[tokio::test]
    async fn zero_concurrency_fails_fast() {
        let client = fetcher::build_client().unwrap();
        let cfg = FetchConfig {
            concurrency: 0,
            ..FetchConfig::default()
        };
        let err = fetch_all(
            &client,
            vec![descriptor("x", "http://localhost/feed".to_string())],
            &cfg,
            &NormalizeConfig::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, InvalidConfig::ZeroConcurrency);
    }

    #[tokio::test]
    async fn empty_feed_list_yields_no_outcomes() {
        let client = fetcher::build_client().unwrap();
        let outcomes = fetch_all(
            &client,
            Vec::new(),
            &FetchConfig::default(),
            &NormalizeConfig::default(),
        )
        .await
        .unwrap();
        assert!(outcomes.is_empty());
    }
}
