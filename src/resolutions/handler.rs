use std::sync::Arc;

use time::OffsetDateTime;

use crate::resolutions::{
    error::{ResolutionError, not_found, validation},
    store::ResolutionStore,
    types::{
        ResolutionDetail, ResolutionFilter, ResolutionId, ResolutionList, ResolutionPayload,
        ResolutionSummary, ResolutionTitle, ResolutionUpdated,
    },
};

/// Validates raw request input and runs the matching store step.
#[derive(Debug, Clone)]
pub struct ResolutionHandler {
    store: Arc<ResolutionStore>,
}

impl ResolutionHandler {
    pub fn new(store: Arc<ResolutionStore>) -> Self {
        Self { store }
    }

    pub fn list(
        &self,
        is_done: Option<&str>,
        title: Option<&str>,
    ) -> Result<ResolutionList, ResolutionError> {
        let is_done = match is_done.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(
                parse_bool(raw).ok_or_else(|| validation("isDone must be true or false"))?,
            ),
            None => None,
        };
        let title = title
            .filter(|needle| !needle.trim().is_empty())
            .map(str::to_string);

        let filter = ResolutionFilter { is_done, title };
        let items = self
            .store
            .list(&filter)
            .iter()
            .map(ResolutionSummary::from)
            .collect();
        Ok(ResolutionList { items })
    }

    pub fn get(&self, id: ResolutionId) -> Result<ResolutionDetail, ResolutionError> {
        ensure_positive(id, "id must be greater than zero")?;
        self.store
            .get(id)
            .map(|record| ResolutionDetail::from(&record))
            .ok_or_else(|| not_found(id))
    }

    /// `isDone` from the payload is ignored; new records always start open.
    pub fn create(
        &self,
        payload: Option<ResolutionPayload>,
    ) -> Result<ResolutionDetail, ResolutionError> {
        let title =
            ResolutionTitle::parse(payload.as_ref().and_then(|body| body.title.as_deref()))?;
        let created = self.store.insert(title, OffsetDateTime::now_utc())?;
        Ok(ResolutionDetail::from(&created))
    }

    pub fn replace(
        &self,
        route_id: ResolutionId,
        payload: Option<ResolutionPayload>,
    ) -> Result<ResolutionUpdated, ResolutionError> {
        ensure_positive(route_id, "route id must be greater than zero")?;

        let Some((body_id, payload)) = payload.and_then(|payload| {
            payload
                .id
                .filter(|id| *id != 0)
                .map(|body_id| (body_id, payload))
        }) else {
            return Err(validation("body id is required"));
        };
        if body_id != route_id {
            return Err(ResolutionError::IdMismatch { route_id, body_id });
        }

        let title = ResolutionTitle::parse(payload.title.as_deref())?;
        let is_done = payload.is_done.unwrap_or(false);

        self.store
            .replace(route_id, title, is_done, OffsetDateTime::now_utc())
            .map(|record| ResolutionUpdated::from(&record))
            .ok_or_else(|| not_found(route_id))
    }

    pub fn delete(&self, id: ResolutionId) -> Result<(), ResolutionError> {
        ensure_positive(id, "id must be greater than zero")?;
        self.store.remove(id).map(|_| ()).ok_or_else(|| not_found(id))
    }
}

fn ensure_positive(id: ResolutionId, detail: &str) -> Result<(), ResolutionError> {
    if id <= 0 {
        return Err(validation(detail));
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
