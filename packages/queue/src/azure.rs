//! Azure Storage Queue client (REST, SAS-authenticated).
//!
//! - Dequeue: `GET {endpoint}/{queue}/messages?numofmessages=1&visibilitytimeout=N`
//! - Acknowledge: `DELETE {endpoint}/{queue}/messages/{id}?popreceipt=R`
//!
//! The SAS token is appended verbatim to every request's query string, so
//! it must grant `process` (read + delete) rights on the queue.
//!
//! See <https://learn.microsoft.com/en-us/rest/api/storageservices/get-messages>

use std::time::Duration;

use reqwest::StatusCode;

use crate::{LeaseToken, QueueError, WorkItem, WorkQueue, body_preview};

/// Storage service REST version sent in `x-ms-version`.
const API_VERSION: &str = "2019-12-12";

/// Default lease taken on a dequeued message.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(300);

/// An Azure Storage queue.
#[derive(Debug, Clone)]
pub struct AzureQueue {
    client: reqwest::Client,
    endpoint: String,
    queue_name: String,
    sas_token: String,
    visibility_timeout: Duration,
}

impl AzureQueue {
    /// Creates a client for `queue_name` under `endpoint`
    /// (e.g. `https://myaccount.queue.core.windows.net`).
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        queue_name: impl Into<String>,
        sas_token: &str,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            queue_name: queue_name.into(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    /// Sets how long a dequeued message stays invisible to other readers.
    #[must_use]
    pub const fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Default queue endpoint for a storage account.
    #[must_use]
    pub fn account_endpoint(account: &str) -> String {
        format!("https://{account}.queue.core.windows.net")
    }

    /// Builds `{endpoint}/{queue}/{path}` with the SAS token attached.
    fn url(&self, path: &str) -> String {
        let mut url = format!("{}/{}/{path}", self.endpoint, self.queue_name);
        if !self.sas_token.is_empty() {
            url.push('?');
            url.push_str(&self.sas_token);
        }
        url
    }
}

#[async_trait::async_trait]
impl WorkQueue for AzureQueue {
    async fn dequeue(&self) -> Result<Option<WorkItem>, QueueError> {
        let visibility = self.visibility_timeout.as_secs().max(1).to_string();
        let resp = self
            .client
            .get(self.url("messages"))
            .query(&[
                ("numofmessages", "1"),
                ("visibilitytimeout", visibility.as_str()),
            ])
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(QueueError::UnexpectedStatus {
                status: status.as_u16(),
                body: body_preview(&body),
            });
        }

        Ok(parse_messages(&body)?.into_iter().next())
    }

    async fn acknowledge(&self, lease: &LeaseToken) -> Result<(), QueueError> {
        let resp = self
            .client
            .delete(self.url(&format!("messages/{}", lease.message_id())))
            .query(&[("popreceipt", lease.pop_receipt())])
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            log::warn!(
                "Message {} was already gone when acknowledging",
                lease.message_id()
            );
            return Ok(());
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(QueueError::UnexpectedStatus {
                status: status.as_u16(),
                body: body_preview(&body),
            });
        }

        Ok(())
    }
}

/// Parses a `QueueMessagesList` document into work items.
fn parse_messages(body: &str) -> Result<Vec<WorkItem>, QueueError> {
    let xml = body.trim_start_matches('\u{feff}').trim();
    if xml.is_empty() {
        return Ok(Vec::new());
    }

    let doc = roxmltree::Document::parse(xml).map_err(|e| QueueError::Malformed {
        message: format!("invalid XML: {e}"),
    })?;

    doc.descendants()
        .filter(|node| node.has_tag_name("QueueMessage"))
        .map(|message| {
            let field = |name: &str| {
                message
                    .children()
                    .find(|child| child.has_tag_name(name))
                    .and_then(|child| child.text())
            };
            let required = |name: &str| {
                field(name).ok_or_else(|| QueueError::Malformed {
                    message: format!("QueueMessage missing {name}"),
                })
            };

            let message_id = required("MessageId")?;
            let pop_receipt = required("PopReceipt")?;
            let tile_id = field("MessageText").unwrap_or_default().trim().to_string();
            let dequeue_count = field("DequeueCount")
                .and_then(|count| count.trim().parse().ok())
                .unwrap_or(1);

            Ok(WorkItem {
                tile_id,
                lease: LeaseToken::new(message_id, pop_receipt),
                dequeue_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::status_code;
    use httptest::{Expectation, Server};

    use super::*;

    const ONE_MESSAGE: &str = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
        <QueueMessagesList>\
          <QueueMessage>\
            <MessageId>5974b586-0df3-4e2d-ad0c-18e3892bfca2</MessageId>\
            <InsertionTime>Fri, 09 Oct 2009 21:04:30 GMT</InsertionTime>\
            <ExpirationTime>Fri, 16 Oct 2009 21:04:30 GMT</ExpirationTime>\
            <PopReceipt>YzQ4Yzg1MDIGM0MDFiZDAwYzEw</PopReceipt>\
            <TimeNextVisible>Fri, 09 Oct 2009 23:29:20 GMT</TimeNextVisible>\
            <DequeueCount>3</DequeueCount>\
            <MessageText>10_600_170</MessageText>\
          </QueueMessage>\
        </QueueMessagesList>";

    fn queue(server: &Server) -> AzureQueue {
        AzureQueue::new(
            reqwest::Client::new(),
            &server.url_str(""),
            "unfetched",
            "?sv=2019-12-12&sig=abc",
        )
        .with_visibility_timeout(Duration::from_secs(120))
    }

    #[test]
    fn parses_message_list() {
        let items = parse_messages(ONE_MESSAGE).unwrap();
        assert_eq!(
            items,
            vec![WorkItem {
                tile_id: "10_600_170".to_string(),
                lease: LeaseToken::new(
                    "5974b586-0df3-4e2d-ad0c-18e3892bfca2",
                    "YzQ4Yzg1MDIGM0MDFiZDAwYzEw"
                ),
                dequeue_count: 3,
            }]
        );
    }

    #[test]
    fn empty_list_has_no_items() {
        let items = parse_messages(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessagesList />",
        )
        .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn missing_pop_receipt_is_malformed() {
        let err = parse_messages(
            "<QueueMessagesList><QueueMessage><MessageId>1</MessageId>\
             <MessageText>1_0_0</MessageText></QueueMessage></QueueMessagesList>",
        )
        .unwrap_err();
        assert!(matches!(err, QueueError::Malformed { .. }));
    }

    #[tokio::test]
    async fn dequeue_requests_one_message_with_lease() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/unfetched/messages"),
                request::query(url_decoded(contains(("numofmessages", "1")))),
                request::query(url_decoded(contains(("visibilitytimeout", "120")))),
                request::query(url_decoded(contains(("sig", "abc")))),
            ])
            .respond_with(status_code(200).body(ONE_MESSAGE)),
        );

        let item = queue(&server).dequeue().await.unwrap().unwrap();
        assert_eq!(item.tile_id, "10_600_170");
        assert_eq!(item.lease.pop_receipt(), "YzQ4Yzg1MDIGM0MDFiZDAwYzEw");
    }

    #[tokio::test]
    async fn dequeue_surfaces_auth_failures() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/unfetched/messages"))
                .respond_with(status_code(403).body("AuthenticationFailed")),
        );

        let err = queue(&server).dequeue().await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::UnexpectedStatus { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn acknowledge_deletes_with_pop_receipt() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("DELETE", "/unfetched/messages/msg-1"),
                request::query(url_decoded(contains(("popreceipt", "AgAAAA+w==")))),
                request::query(url_decoded(contains(("sv", "2019-12-12")))),
            ])
            .respond_with(status_code(204)),
        );

        queue(&server)
            .acknowledge(&LeaseToken::new("msg-1", "AgAAAA+w=="))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn acknowledging_a_vanished_message_succeeds() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/unfetched/messages/msg-1"))
                .respond_with(status_code(404)),
        );

        queue(&server)
            .acknowledge(&LeaseToken::new("msg-1", "receipt"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_acknowledgment_is_an_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/unfetched/messages/msg-1"))
                .respond_with(status_code(400).body("PopReceiptMismatch")),
        );

        let err = queue(&server)
            .acknowledge(&LeaseToken::new("msg-1", "stale"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::UnexpectedStatus { status: 400, .. }
        ));
    }
}
