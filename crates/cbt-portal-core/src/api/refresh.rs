//! De-duplication of concurrent token refreshes.
//!
//! With a rotating-refresh-token backend only the first refresh using a
//! given token can succeed. When several calls hit 401 at once they must
//! share that single refresh, or every loser would clear the session.

use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::debug;

use super::ApiError;
use crate::models::TokenPair;

pub(crate) type RefreshFuture = BoxFuture<'static, Result<TokenPair, ApiError>>;

struct InFlight {
    refresh_token: String,
    outcome: Shared<RefreshFuture>,
}

pub(crate) struct RefreshCoordinator {
    dedupe: bool,
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(dedupe: bool) -> Self {
        Self {
            dedupe,
            in_flight: Mutex::new(None),
        }
    }

    /// Refresh with `refresh_token`, joining an in-flight refresh for the
    /// same token if there is one. `start` is only called when a new
    /// refresh has to be issued.
    pub(crate) async fn run<F>(&self, refresh_token: String, start: F) -> Result<TokenPair, ApiError>
    where
        F: FnOnce(String) -> RefreshFuture,
    {
        if !self.dedupe {
            return start(refresh_token).await;
        }

        let outcome = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(existing) if existing.refresh_token == refresh_token => {
                    debug!("Joining in-flight token refresh");
                    existing.outcome.clone()
                }
                _ => {
                    let outcome = start(refresh_token.clone()).shared();
                    *slot = Some(InFlight {
                        refresh_token: refresh_token.clone(),
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        let result = outcome.await;

        // First waiter to observe completion releases the handle
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|existing| existing.refresh_token == refresh_token)
        {
            *slot = None;
        }

        result
    }
}
