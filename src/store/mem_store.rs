use std::sync::Mutex;

use crate::document::RawDocument;
use crate::store::{
    find_by_title_in, find_in, DocIndex, DocStore, FindOptions, PostFilter, PostUpdate,
    StoreError, StoreResult, Visibility,
};

/// In-memory store. Backs handler-level tests and doubles as a scratch
/// backend when no store root is mounted.
#[derive(Default)]
pub struct MemStore {
    docs: Mutex<Vec<RawDocument>>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }

    pub fn with_documents(docs: Vec<RawDocument>) -> MemStore {
        MemStore {
            docs: Mutex::new(docs),
        }
    }

    fn snapshot(&self) -> Vec<RawDocument> {
        self.docs.lock().unwrap().clone()
    }
}

impl DocStore for MemStore {
    fn find(&self, filter: &PostFilter, options: &FindOptions) -> StoreResult<Vec<RawDocument>> {
        Ok(find_in(&self.snapshot(), filter, options))
    }

    fn count_documents(&self, filter: &PostFilter) -> StoreResult<usize> {
        Ok(self.snapshot().iter().filter(|d| filter.matches(d)).count())
    }

    fn find_by_id(&self, id: i64, visibility: Visibility) -> StoreResult<Option<RawDocument>> {
        let docs = self.snapshot();
        let index = DocIndex::build(&docs);
        Ok(index.find_by_id(&docs, id, visibility).cloned())
    }

    fn find_by_oid(&self, oid: &str, visibility: Visibility) -> StoreResult<Option<RawDocument>> {
        let docs = self.snapshot();
        let index = DocIndex::build(&docs);
        Ok(index.find_by_oid(&docs, oid, visibility).cloned())
    }

    fn find_by_slug(
        &self,
        slug: &str,
        visibility: Visibility,
    ) -> StoreResult<Option<RawDocument>> {
        let docs = self.snapshot();
        let index = DocIndex::build(&docs);
        Ok(index.find_by_slug(&docs, slug, visibility).cloned())
    }

    fn find_by_title(
        &self,
        title: &str,
        visibility: Visibility,
    ) -> StoreResult<Option<RawDocument>> {
        Ok(find_by_title_in(&self.snapshot(), title, visibility).cloned())
    }

    fn insert_one(&self, doc: RawDocument) -> StoreResult<()> {
        if doc.oid.is_none() {
            return Err(StoreError::Malformed {
                path: "(new document)".to_string(),
                reason: "missing object identifier".to_string(),
            });
        }

        let mut docs = self.docs.lock().unwrap();
        if docs.iter().any(|d| d.oid == doc.oid) {
            return Err(StoreError::Malformed {
                path: "(new document)".to_string(),
                reason: "duplicate object identifier".to_string(),
            });
        }
        docs.push(doc);
        Ok(())
    }

    fn update_one(&self, oid: &str, update: &PostUpdate) -> StoreResult<Option<RawDocument>> {
        let mut docs = self.docs.lock().unwrap();
        for doc in docs.iter_mut() {
            if doc.oid.as_deref() == Some(oid) {
                update.apply_to(doc);
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    fn update_many(&self, filter: &PostFilter, update: &PostUpdate) -> StoreResult<usize> {
        let mut docs = self.docs.lock().unwrap();
        let mut updated = 0;
        for doc in docs.iter_mut() {
            if filter.matches(doc) {
                update.apply_to(doc);
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn delete_one(&self, oid: &str) -> StoreResult<bool> {
        let mut docs = self.docs.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| d.oid.as_deref() != Some(oid));
        Ok(docs.len() < before)
    }

    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
