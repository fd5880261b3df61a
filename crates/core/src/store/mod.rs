//! Job store - durable queue of jobs, thumbnails and sequences.

mod error;
mod sqlite;
mod traits;
mod types;

pub use error::StoreError;
pub use sqlite::SqliteJobStore;
pub use traits::JobStore;
pub use types::{Job, JobStatus, NewJob, SelectionPolicy, Thumbnail, VideoSequence};
