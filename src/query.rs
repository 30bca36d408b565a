use std::sync::mpsc::Sender;
use std::thread;

use crate::api::{ApiClient, Resource};
use crate::error::{CarteiraError, Result};
use crate::filters::ApiParams;
use crate::models::Page;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    pub entity: &'static str,
    pub params: ApiParams,
}

impl QueryKey {
    pub fn new(entity: &'static str, params: ApiParams) -> Self {
        Self { entity, params }
    }
}

pub struct ListResponse<T> {
    pub key: QueryKey,
    pub generation: u64,
    pub result: Result<Page<T>>,
}

#[derive(Debug)]
pub enum Accepted {
    Applied,
    /// The fetch was current but failed; previous rows are kept.
    Failed(CarteiraError),
    Stale,
}

/// Fetch state of one list view. A response is applied only when its key is
/// current and its generation is not older than the last one applied.
pub struct ListQuery<T> {
    key: Option<QueryKey>,
    issued: u64,
    applied: u64,
    page: Page<T>,
    loading: bool,
    stale: bool,
    error: Option<String>,
}

impl<T> Default for ListQuery<T> {
    fn default() -> Self {
        Self {
            key: None,
            issued: 0,
            applied: 0,
            page: Page::default(),
            loading: false,
            stale: true,
            error: None,
        }
    }
}

impl<T> ListQuery<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `key` current and hand out the generation for its fetch.
    pub fn request(&mut self, key: QueryKey) -> u64 {
        self.issued += 1;
        self.key = Some(key);
        self.loading = true;
        self.stale = false;
        self.issued
    }

    pub fn accept(&mut self, response: ListResponse<T>) -> Accepted {
        let current = self.key.as_ref() == Some(&response.key);
        if !current || response.generation < self.applied {
            log::debug!(
                "dropping stale {} response (generation {}, current {})",
                response.key.entity,
                response.generation,
                self.issued
            );
            return Accepted::Stale;
        }

        self.applied = response.generation;
        if response.generation >= self.issued {
            self.loading = false;
        }

        match response.result {
            Ok(page) => {
                self.page = page;
                self.error = None;
                Accepted::Applied
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Accepted::Failed(e)
            }
        }
    }

    /// Mark the cached page out of date; the owner re-fetches.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn needs_fetch(&self) -> bool {
        self.stale || self.key.is_none()
    }

    pub fn key(&self) -> Option<&QueryKey> {
        self.key.as_ref()
    }

    pub fn page(&self) -> &Page<T> {
        &self.page
    }

    pub fn items(&self) -> &[T] {
        &self.page.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Run the list fetch on a worker thread and post the response back.
pub fn spawn_list<T, E>(api: ApiClient, key: QueryKey, generation: u64, tx: Sender<E>)
where
    T: Resource,
    E: From<ListResponse<T>> + Send + 'static,
{
    thread::spawn(move || {
        let result = api.list::<T>(&key.params);
        let response = ListResponse {
            key,
            generation,
            result,
        };
        if tx.send(E::from(response)).is_err() {
            log::debug!("list response arrived after its view closed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterState;

    fn key(search: &str) -> QueryKey {
        let mut f = FilterState::new();
        f.set_search(search);
        QueryKey::new("/clients", f.api_params().with_page(1, 20))
    }

    fn page(items: Vec<u32>) -> Page<u32> {
        Page {
            total: items.len() as u64,
            items,
            page: 1,
            size: 20,
            pages: 1,
        }
    }

    fn ok(key: QueryKey, generation: u64, items: Vec<u32>) -> ListResponse<u32> {
        ListResponse {
            key,
            generation,
            result: Ok(page(items)),
        }
    }

    #[test]
    fn test_applies_current_response() {
        let mut q = ListQuery::new();
        assert!(q.needs_fetch());
        let g = q.request(key("a"));
        assert!(q.is_loading());
        assert!(matches!(q.accept(ok(key("a"), g, vec![1, 2])), Accepted::Applied));
        assert_eq!(q.items(), &[1, 2]);
        assert!(!q.is_loading());
        assert!(!q.needs_fetch());
    }

    #[test]
    fn test_drops_response_for_superseded_key() {
        let mut q = ListQuery::new();
        let g1 = q.request(key("a"));
        let g2 = q.request(key("ab"));
        assert!(matches!(q.accept(ok(key("a"), g1, vec![9])), Accepted::Stale));
        assert!(q.items().is_empty());
        assert!(q.is_loading());
        assert!(matches!(q.accept(ok(key("ab"), g2, vec![3])), Accepted::Applied));
        assert_eq!(q.items(), &[3]);
    }

    #[test]
    fn test_out_of_order_same_key_keeps_newest() {
        let mut q = ListQuery::new();
        let g1 = q.request(key("a"));
        let g2 = q.request(key("a"));
        assert!(matches!(q.accept(ok(key("a"), g2, vec![2])), Accepted::Applied));
        assert!(matches!(q.accept(ok(key("a"), g1, vec![1])), Accepted::Stale));
        assert_eq!(q.items(), &[2]);
    }

    #[test]
    fn test_failure_keeps_previous_rows() {
        let mut q = ListQuery::new();
        let g = q.request(key("a"));
        q.accept(ok(key("a"), g, vec![1]));
        let g = q.request(key("a"));
        let outcome = q.accept(ListResponse {
            key: key("a"),
            generation: g,
            result: Err(CarteiraError::Remote {
                status: 500,
                detail: None,
            }),
        });
        assert!(matches!(outcome, Accepted::Failed(_)));
        assert_eq!(q.items(), &[1]);
        assert!(q.error().is_some());
        assert!(!q.is_loading());
    }

    #[test]
    fn test_invalidate_requests_refetch() {
        let mut q: ListQuery<u32> = ListQuery::new();
        let g = q.request(key("a"));
        q.accept(ok(key("a"), g, vec![]));
        assert!(!q.needs_fetch());
        q.invalidate();
        assert!(q.needs_fetch());
    }
}
