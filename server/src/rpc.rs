//! Remote interface: maps each wire call onto one store operation
//!
//! Every store error is turned into a reply here, so nothing but a `Reply`
//! ever leaves this module.

use crate::store::{ApplyOutcome, StateStore, UpdateError};
use log::{debug, warn};
use shared::{Call, Reply};

pub async fn dispatch(store: &StateStore, call: Call) -> Reply {
    match call {
        Call::Join { identity } => match store.join(&identity).await {
            Ok(snapshot) => Reply::Snapshot(snapshot),
            Err(e) => {
                warn!("Join by '{}' failed: {}", identity, e);
                Reply::Failed {
                    reason: e.to_string(),
                }
            }
        },

        Call::GetSnapshot => Reply::Snapshot(store.snapshot().await),

        Call::SubmitUpdate(update) => {
            let result = store.apply_update(&update).await;
            Reply::Ack(acknowledge(&update.identity, update.sequence, result))
        }

        Call::SubmitCommand(command) => {
            let result = store.apply_command(&command).await;
            Reply::Ack(acknowledge(&command.identity, command.sequence, result))
        }
    }
}

fn acknowledge(identity: &str, sequence: i64, result: Result<ApplyOutcome, UpdateError>) -> bool {
    match result {
        Ok(ApplyOutcome::Applied) => {
            debug!("Applied update {} from '{}'", sequence, identity);
            true
        }
        Ok(ApplyOutcome::Duplicate) => true,
        Err(e) => {
            warn!("Rejected update {} from '{}': {}", sequence, identity, e);
            false
        }
    }
}
