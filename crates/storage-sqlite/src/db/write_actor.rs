use super::DbPool;
use crate::errors::StorageError;
use categorizable_core::errors::{DatabaseError, Error, Result};
use diesel::SqliteConnection;
use log::{debug, error};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

// Type alias for the job to be executed by the writer actor.
// It takes a mutable reference to a SqliteConnection and returns a core Result.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type AnyBox = Box<dyn Any + Send + 'static>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    // Each job is a boxed closure; the oneshot sender carries the type-erased reply.
    #[allow(clippy::type_complexity)]
    tx: mpsc::Sender<(Job<AnyBox>, oneshot::Sender<Result<AnyBox>>)>,
}

impl WriteHandle {
    /// Executes `job` on the writer's dedicated connection inside one
    /// `BEGIN IMMEDIATE` transaction. Any error rolls the transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as AnyBox)),
                ret_tx,
            ))
            .await
            .map_err(|_| writer_gone("Writer actor's receiving channel was closed"))?;

        let boxed = ret_rx
            .await
            .map_err(|_| writer_gone("Writer actor dropped the reply sender"))??;

        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| writer_gone("Failed to downcast writer actor result"))
    }
}

fn writer_gone(message: &str) -> Error {
    Error::Database(DatabaseError::Internal(message.to_string()))
}

/// Spawns a background Tokio task that acts as the single writer to the database.
///
/// The actor owns one pooled connection and runs every job serially, so
/// concurrent structural mutations never interleave.
pub fn spawn_writer(pool: Arc<DbPool>) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(Job<AnyBox>, oneshot::Sender<Result<AnyBox>>)>(1024);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer actor could not acquire a connection: {}", e);
                // Dropping the receiver makes every pending and future exec fail.
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<AnyBox> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(Error::from);

            if reply_tx.send(result).is_err() {
                debug!("Write job requester went away before the reply");
            }
        }
    });

    WriteHandle { tx }
}
