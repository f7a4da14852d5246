//! Change watch for requested jobs.
//!
//! The Firestore REST surface has no streaming listen, so the watch is a
//! polling loop over a structured query. Emission order follows query
//! results; a document is emitted once and re-emitted only if it leaves and
//! re-enters the requested set. Duplicate or stale notifications are
//! harmless: the claim compare-and-set downstream arbitrates ownership.
//!
//! The channel is unbounded, matching the push-notification source this
//! replaces; candidate volume is one document per submitted job, so the
//! queue stays small in practice.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use roar_models::{Job, JobStatus, JobType};

use crate::client::FirestoreClient;
use crate::repos::{collections, document_to_job};
use crate::types::{StructuredQuery, ToFirestoreValue};

/// Start watching for `requested` jobs of one type.
///
/// Returns the notification stream; the background poll task exits when the
/// receiver is dropped.
pub fn watch_requested(client: FirestoreClient, job_type: JobType) -> mpsc::UnboundedReceiver<Job> {
    let (tx, rx) = mpsc::unbounded_channel();
    let interval = client.config().watch_interval;

    tokio::spawn(async move {
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            if tx.is_closed() {
                debug!("Job watch for {} closed", job_type);
                return;
            }

            let query = StructuredQuery::collection_where_eq(
                collections::JOBS,
                [
                    ("status", JobStatus::Requested.as_str().to_firestore_value()),
                    ("type", job_type.as_str().to_firestore_value()),
                ],
            );

            match client.run_query(query).await {
                Ok(docs) => {
                    let mut current = HashSet::with_capacity(docs.len());

                    for doc in &docs {
                        let job = match document_to_job(doc) {
                            Ok(job) => job,
                            Err(e) => {
                                warn!("Skipping malformed job document: {}", e);
                                continue;
                            }
                        };

                        current.insert(job.id.as_str().to_string());

                        if seen.contains(job.id.as_str()) {
                            continue;
                        }

                        debug!("Observed requested job {} ({})", job.id, job_type);
                        if tx.send(job).is_err() {
                            return;
                        }
                    }

                    // Documents that left the requested set can be emitted
                    // again if they ever come back; forget them.
                    seen = current;
                }
                Err(e) => {
                    warn!("Job watch query for {} failed: {}", job_type, e);
                }
            }

            tokio::time::sleep(interval).await;
        }
    });

    rx
}
