//! Defect link lookup for a launch
//!
//! Walks the paginated test-item collection of a launch, keeps items triaged
//! as product bugs and extracts the issue-tracker link from the analyst
//! comment. The output is a deduplicated, lexicographically sorted list. A
//! failing page aborts the whole lookup: a partial list must never be
//! mistaken for a complete one, so callers treat an error as "unknown"
//! rather than "zero defects".

use super::PortalClient;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{ItemPage, TestItem};
use std::collections::BTreeSet;

/// Issue type locator of a product bug in ReportPortal
const DEFECT_ISSUE_TYPE: &str = "pb001";

/// Comment prefixes recognized as issue-tracker links
const TRACKER_PREFIXES: [&str; 2] = [
    "https://jira.a2nta.ru/browse/",
    "https://youtrack.a2nta.ru/issue/",
];

/// Page size of the item query
const PAGE_SIZE: u32 = 100;

impl PortalClient {
    /// Collect the issue-tracker links of all defect items under a launch
    ///
    /// Fetches page 1, reads the total page count from the envelope and
    /// fetches the remaining pages sequentially. Each page request is
    /// individually retried; exhaustion on any page fails the whole lookup.
    pub async fn fetch_defects(
        &self,
        token: &str,
        project: &str,
        launch_id: u64,
        retry: &RetryConfig,
    ) -> Result<Vec<String>> {
        let mut links = BTreeSet::new();

        let first = with_retry(retry, || {
            self.request_item_page(token, project, launch_id, 1)
        })
        .await?;
        collect_tracker_links(&first.content, &mut links);

        let total_pages = first.page.total_pages.max(1);
        for page_number in 2..=total_pages {
            let page = with_retry(retry, || {
                self.request_item_page(token, project, launch_id, page_number)
            })
            .await?;
            collect_tracker_links(&page.content, &mut links);
        }

        tracing::debug!(
            launch_id,
            pages = total_pages,
            links = links.len(),
            "defect lookup done"
        );
        Ok(links.into_iter().collect())
    }

    async fn request_item_page(
        &self,
        token: &str,
        project: &str,
        launch_id: u64,
        page_number: u32,
    ) -> Result<ItemPage> {
        let url = self.endpoint(&format!("api/v1/{project}/item/v2"))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("filter.eq.launchId", launch_id.to_string()),
                ("filter.in.issueType", DEFECT_ISSUE_TYPE.to_string()),
                ("page.page", page_number.to_string()),
                ("page.size", PAGE_SIZE.to_string()),
                ("page.sort", "startTime,ASC".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "item endpoint for {project} launch {launch_id} page {page_number} returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(response.json().await?)
    }
}

/// Extract tracker links from the defect items of one page
///
/// Only the leading token of the comment is considered; analysts paste the
/// link first and occasionally add free text after it.
fn collect_tracker_links(items: &[TestItem], links: &mut BTreeSet<String>) {
    for item in items {
        let Some(issue) = &item.issue else { continue };
        if issue.issue_type != DEFECT_ISSUE_TYPE {
            continue;
        }
        let Some(comment) = &issue.comment else { continue };
        let Some(first_token) = comment.split_whitespace().next() else {
            continue;
        };
        if TRACKER_PREFIXES.iter().any(|p| first_token.starts_with(p)) {
            links.insert(first_token.to_string());
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::types::ItemIssue;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn defect_item(id: u64, comment: &str) -> TestItem {
        TestItem {
            id,
            issue: Some(ItemIssue {
                issue_type: DEFECT_ISSUE_TYPE.to_string(),
                comment: Some(comment.to_string()),
            }),
        }
    }

    #[test]
    fn duplicate_links_collapse_and_output_is_sorted() {
        let items = vec![
            defect_item(1, "https://jira.a2nta.ru/browse/QA-9"),
            defect_item(2, "https://jira.a2nta.ru/browse/QA-1"),
            defect_item(3, "https://jira.a2nta.ru/browse/QA-9"),
            defect_item(4, "https://youtrack.a2nta.ru/issue/APP-3 flaky on CI"),
        ];
        let mut links = BTreeSet::new();
        collect_tracker_links(&items, &mut links);

        let links: Vec<String> = links.into_iter().collect();
        assert_eq!(
            links,
            vec![
                "https://jira.a2nta.ru/browse/QA-1",
                "https://jira.a2nta.ru/browse/QA-9",
                "https://youtrack.a2nta.ru/issue/APP-3",
            ]
        );
    }

    #[test]
    fn comments_without_a_recognized_prefix_are_ignored() {
        let items = vec![
            defect_item(1, "see the attached log"),
            defect_item(2, "http://jira.a2nta.ru/browse/QA-1"),
            TestItem {
                id: 3,
                issue: Some(ItemIssue {
                    issue_type: "ab001".to_string(),
                    comment: Some("https://jira.a2nta.ru/browse/QA-2".to_string()),
                }),
            },
            TestItem { id: 4, issue: None },
            TestItem {
                id: 5,
                issue: Some(ItemIssue {
                    issue_type: DEFECT_ISSUE_TYPE.to_string(),
                    comment: None,
                }),
            },
        ];
        let mut links = BTreeSet::new();
        collect_tracker_links(&items, &mut links);
        assert!(links.is_empty());
    }

    fn item_page_json(page_number: u32, total_pages: u32, ids: std::ops::Range<u64>) -> serde_json::Value {
        let content: Vec<serde_json::Value> = ids
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "issue": {
                        "issueType": "pb001",
                        "comment": format!("https://jira.a2nta.ru/browse/QA-{id}")
                    }
                })
            })
            .collect();
        serde_json::json!({
            "content": content,
            "page": {"number": page_number, "totalPages": total_pages}
        })
    }

    fn client_for(server: &MockServer) -> PortalClient {
        PortalClient::new(&PortalConfig {
            base_url: server.uri(),
            username: "qa-bot".to_string(),
            password: "hunter2".to_string(),
        })
        .unwrap()
    }

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn all_pages_are_fetched_sequentially_and_merged() {
        let server = MockServer::start().await;
        for (page_number, ids) in [(1u32, 0u64..100), (2, 100..200), (3, 200..250)] {
            Mock::given(method("GET"))
                .and(path("/api/v1/superadmin_personal/item/v2"))
                .and(query_param("filter.eq.launchId", "812"))
                .and(query_param("filter.in.issueType", "pb001"))
                .and(query_param("page.page", page_number.to_string()))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(item_page_json(page_number, 3, ids)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = client_for(&server);
        let links = client
            .fetch_defects("tok", "superadmin_personal", 812, &no_retry())
            .await
            .unwrap();

        assert_eq!(links.len(), 250, "all distinct links across 3 pages");
        let mut sorted = links.clone();
        sorted.sort();
        assert_eq!(links, sorted, "output is lexicographically sorted");
    }

    #[tokio::test]
    async fn single_page_response_issues_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/superadmin_personal/item/v2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(item_page_json(1, 1, 0..2)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let links = client
            .fetch_defects("tok", "superadmin_personal", 1, &no_retry())
            .await
            .unwrap();
        assert_eq!(links.len(), 2);
    }

    #[tokio::test]
    async fn failing_page_aborts_the_whole_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/superadmin_personal/item/v2"))
            .and(query_param("page.page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(item_page_json(1, 2, 0..100)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/superadmin_personal/item/v2"))
            .and(query_param("page.page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_defects("tok", "superadmin_personal", 1, &no_retry())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)), "got {err:?}");
    }
}
