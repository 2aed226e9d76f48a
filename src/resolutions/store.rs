use std::sync::{Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;

use crate::resolutions::{
    error::ResolutionError,
    types::{Resolution, ResolutionFilter, ResolutionId, ResolutionTitle},
};

const SEED_RESOLUTIONS: [(&str, bool); 2] = [
    ("Walk 20 minutes daily", false),
    ("Run 20 minutes daily", true),
];

/// In-memory record collection plus the id counter.
///
/// Both live behind one mutex so id assignment and in-place mutation are
/// serialized; the lock is only held for a single in-memory step and never
/// across an `.await`.
#[derive(Debug)]
pub struct ResolutionStore {
    state: Mutex<StoreState>,
}

#[derive(Debug)]
struct StoreState {
    records: Vec<Resolution>,
    /// `None` once `i64::MAX` has been handed out.
    next_id: Option<ResolutionId>,
}

impl StoreState {
    fn position(&self, id: ResolutionId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    fn push(
        &mut self,
        title: ResolutionTitle,
        is_done: bool,
        now: OffsetDateTime,
    ) -> Result<Resolution, ResolutionError> {
        let id = self.next_id.ok_or(ResolutionError::IdsExhausted)?;
        let record = Resolution {
            id,
            title,
            is_done,
            created_at: now,
            updated_at: None,
        };
        self.next_id = id.checked_add(1);
        self.records.push(record.clone());
        Ok(record)
    }
}

impl Default for ResolutionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                records: Vec::new(),
                next_id: Some(1),
            }),
        }
    }

    pub fn with_seed_data() -> Self {
        let store = Self::new();
        let now = OffsetDateTime::now_utc();
        {
            let mut state = store.lock();
            for (title, is_done) in SEED_RESOLUTIONS {
                if state
                    .push(ResolutionTitle::from_static(title), is_done, now)
                    .is_err()
                {
                    break;
                }
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching records in insertion order.
    pub fn list(&self, filter: &ResolutionFilter) -> Vec<Resolution> {
        self.lock()
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: ResolutionId) -> Option<Resolution> {
        let state = self.lock();
        state.position(id).map(|index| state.records[index].clone())
    }

    /// Appends a new open record under the next id. Ids are never handed
    /// out twice, so the store refuses new records once they run out.
    pub fn insert(
        &self,
        title: ResolutionTitle,
        now: OffsetDateTime,
    ) -> Result<Resolution, ResolutionError> {
        self.lock().push(title, false, now)
    }

    pub fn replace(
        &self,
        id: ResolutionId,
        title: ResolutionTitle,
        is_done: bool,
        now: OffsetDateTime,
    ) -> Option<Resolution> {
        let mut state = self.lock();
        let index = state.position(id)?;
        let record = &mut state.records[index];
        record.title = title;
        record.is_done = is_done;
        record.updated_at = Some(now);
        Some(record.clone())
    }

    pub fn remove(&self, id: ResolutionId) -> Option<Resolution> {
        let mut state = self.lock();
        let index = state.position(id)?;
        Some(state.records.remove(index))
    }
}
