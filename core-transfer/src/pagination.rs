//! # Cursor-Based Pagination
//!
//! Walks a server-paginated result set to the end, one request at a time.
//!
//! The engine never invents tokens: every next request uses the token the
//! previous response handed back, whether that is an opaque string, a numeric
//! offset rendered as a string or a full "next link" URL. A token the server
//! already issued once is treated as a protocol error, otherwise a
//! misbehaving server would keep the loop alive forever.

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

use crate::error::{Result, TransferError};

/// Server page cursor; `None` wherever it appears means "first page"
pub type PageToken = String;

/// One parsed page, or the accumulated outcome of a whole listing
#[derive(Debug)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub next_token: Option<PageToken>,
    pub error: Option<TransferError>,
}

impl<T> PageResult<T> {
    /// A page followed by more pages
    pub fn page(items: Vec<T>, next_token: Option<PageToken>) -> Self {
        Self {
            items,
            next_token,
            error: None,
        }
    }

    /// The final page
    pub fn last(items: Vec<T>) -> Self {
        Self::page(items, None)
    }

    /// A failed page. Never carries a next token.
    pub fn failed(items: Vec<T>, error: TransferError) -> Self {
        Self {
            items,
            next_token: None,
            error: Some(error),
        }
    }

    /// No error and nothing left to fetch
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.next_token.is_none()
    }

    /// Drop partial items on error
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.items),
        }
    }
}

/// Supplies the two callbacks the paginator needs
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Request for the page identified by `token`.
    ///
    /// `Ok(None)` means no request is possible (e.g. the source was torn
    /// down); the paginator stops and returns what it has.
    fn build_request(&self, token: Option<&str>) -> Result<Option<HttpRequest>>;

    /// Parse a raw response, whatever its status, into a page.
    fn parse_page(&self, response: &HttpResponse) -> PageResult<Self::Item>;
}

/// Drives a [`PageSource`] until the server reports no further pages
pub struct Paginator<'a, S: PageSource + ?Sized> {
    http_client: &'a dyn HttpClient,
    source: &'a S,
}

impl<'a, S: PageSource + ?Sized> Paginator<'a, S> {
    pub fn new(http_client: &'a dyn HttpClient, source: &'a S) -> Self {
        Self {
            http_client,
            source,
        }
    }

    /// Fetch every page and concatenate the items in page order.
    ///
    /// On error the items gathered so far are returned alongside the error,
    /// the caller decides whether a partial listing is usable. Failed pages
    /// are never retried here.
    #[instrument(skip(self))]
    pub async fn run_to_completion(&self) -> PageResult<S::Item> {
        let mut items = Vec::new();
        let mut token: Option<PageToken> = None;
        let mut seen_tokens: HashSet<PageToken> = HashSet::new();
        let mut page_count = 0u32;

        loop {
            let request = match self.source.build_request(token.as_deref()) {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(page_count, "Page source produced no request, stopping");
                    return PageResult::last(items);
                }
                Err(e) => return PageResult::failed(items, e),
            };

            page_count += 1;
            debug!("Fetching page {} (token: {:?})", page_count, token);

            let url = request.url.clone();
            let response = match self.http_client.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(page_count, error = %e, "Page request failed");
                    return PageResult::failed(items, e.into());
                }
            };

            let page = self.source.parse_page(&response);
            items.extend(page.items);

            if let Some(error) = page.error {
                warn!(page_count, error = %error, "Page reported an error");
                return PageResult::failed(items, error.with_context(&url, None));
            }

            match page.next_token {
                None => {
                    debug!(page_count, total_items = items.len(), "Listing complete");
                    return PageResult::last(items);
                }
                Some(next) => {
                    if let Some(current) = token.take() {
                        seen_tokens.insert(current);
                    }
                    if seen_tokens.contains(&next) {
                        warn!(page_count, "Server repeated a page token");
                        return PageResult::failed(
                            items,
                            TransferError::PaginationProtocol { token: next },
                        );
                    }
                    token = Some(next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpMethod;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves pages keyed by token from memory; the page body is the token
    /// the request asked for.
    struct MapSource {
        pages: HashMap<Option<String>, (Vec<u32>, Option<String>)>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl MapSource {
        fn new(pages: Vec<(Option<&str>, Vec<u32>, Option<&str>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(token, items, next)| {
                        (token.map(String::from), (items, next.map(String::from)))
                    })
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageSource for MapSource {
        type Item = u32;

        fn build_request(&self, token: Option<&str>) -> Result<Option<HttpRequest>> {
            self.requested
                .lock()
                .unwrap()
                .push(token.map(String::from));
            let url = format!("https://list.test/?token={}", token.unwrap_or(""));
            Ok(Some(HttpRequest::new(HttpMethod::Get, url)))
        }

        fn parse_page(&self, response: &HttpResponse) -> PageResult<u32> {
            let token = response.text().unwrap();
            let key = if token.is_empty() { None } else { Some(token) };
            match self.pages.get(&key) {
                Some((items, next)) => PageResult::page(items.clone(), next.clone()),
                None => PageResult::failed(vec![], TransferError::bad_response("unknown token")),
            }
        }
    }

    /// Echoes the `token` query parameter back as the body
    struct EchoClient;

    #[async_trait]
    impl HttpClient for EchoClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            let token = request
                .url
                .split("token=")
                .nth(1)
                .unwrap_or_default()
                .to_string();
            Ok(HttpResponse::new(200, token))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl HttpClient for FailingClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::OperationFailed("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_three_pages_in_order() {
        let source = MapSource::new(vec![
            (None, vec![1, 2], Some("A")),
            (Some("A"), vec![3, 4], Some("B")),
            (Some("B"), vec![5], None),
        ]);

        let result = Paginator::new(&EchoClient, &source).run_to_completion().await;

        assert!(result.is_complete());
        assert_eq!(result.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            *source.requested.lock().unwrap(),
            vec![None, Some("A".to_string()), Some("B".to_string())]
        );
    }

    #[tokio::test]
    async fn test_repeated_token_aborts() {
        let source = MapSource::new(vec![
            (None, vec![1], Some("A")),
            (Some("A"), vec![2], Some("A")),
        ]);

        let result = Paginator::new(&EchoClient, &source).run_to_completion().await;

        assert_eq!(result.items, vec![1, 2]);
        assert!(result.next_token.is_none());
        assert!(matches!(
            result.error,
            Some(TransferError::PaginationProtocol { ref token }) if token == "A"
        ));
    }

    #[tokio::test]
    async fn test_token_cycle_aborts() {
        let source = MapSource::new(vec![
            (None, vec![1], Some("A")),
            (Some("A"), vec![2], Some("B")),
            (Some("B"), vec![3], Some("A")),
        ]);

        let result = Paginator::new(&EchoClient, &source).run_to_completion().await;

        assert_eq!(result.items, vec![1, 2, 3]);
        assert!(matches!(
            result.error,
            Some(TransferError::PaginationProtocol { .. })
        ));
        assert_eq!(source.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_immediately() {
        let source = MapSource::new(vec![(None, vec![1], None)]);

        let result = Paginator::new(&FailingClient, &source).run_to_completion().await;

        assert!(result.items.is_empty());
        assert!(matches!(result.error, Some(TransferError::Transport(_))));
        assert_eq!(source.requested.lock().unwrap().len(), 1);
    }

    /// Gives up building requests once it is asked for `stop_at`
    struct TornDownSource<'a> {
        inner: &'a MapSource,
        stop_at: &'static str,
    }

    impl PageSource for TornDownSource<'_> {
        type Item = u32;

        fn build_request(&self, token: Option<&str>) -> Result<Option<HttpRequest>> {
            if token == Some(self.stop_at) {
                return Ok(None);
            }
            self.inner.build_request(token)
        }

        fn parse_page(&self, response: &HttpResponse) -> PageResult<u32> {
            self.inner.parse_page(response)
        }
    }

    #[tokio::test]
    async fn test_source_without_request_ends_listing() {
        let inner = MapSource::new(vec![
            (None, vec![1, 2], Some("A")),
            (Some("A"), vec![3], None),
        ]);
        let source = TornDownSource {
            inner: &inner,
            stop_at: "A",
        };

        let result = Paginator::new(&EchoClient, &source).run_to_completion().await;

        assert!(result.is_complete());
        assert!(result.error.is_none());
        assert!(result.next_token.is_none());
        assert_eq!(result.items, vec![1, 2]);
        // Only the first page was ever sent
        assert_eq!(*inner.requested.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_page_error_keeps_partial_items() {
        let source = MapSource::new(vec![(None, vec![1, 2], Some("missing"))]);

        let result = Paginator::new(&EchoClient, &source).run_to_completion().await;

        assert_eq!(result.items, vec![1, 2]);
        match result.error {
            Some(TransferError::BadServerResponse { url, .. }) => {
                assert_eq!(url, "https://list.test/?token=missing");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_failed_page_never_has_token() {
        let page: PageResult<u32> = PageResult::failed(vec![1], TransferError::Cancelled);

        assert!(page.next_token.is_none());
        assert!(!page.is_complete());
        assert!(page.into_result().is_err());
    }
}
