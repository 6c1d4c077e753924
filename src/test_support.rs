//! Test doubles shared across unit and integration tests.
//!
//! Every double records its calls behind an `Arc<Mutex<_>>`, so clones
//! handed to the code under test stay observable from the test.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::instrument::WithSubscriber;
use tracing_subscriber::fmt::MakeWriter;

use crate::artifact::Artifact;
use crate::instance::Instance;
use crate::peer::{PeerError, PeerFuture, PeerProvisioner};
use crate::pipeline::{Task, TaskError, TaskFuture};
use crate::repository::{LocalInstanceRepository, RepositoryError, RepositoryFuture};
use crate::snapshot::{ClientFuture, DataStoreClient, DataStoreError};
use crate::storage::{ObjectStore, StorageError, StorageFuture};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, ordered log of events recorded by doubles.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&self, event: impl Into<String>) {
        locked(&self.events).push(event.into());
    }

    /// Returns every event recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        locked(&self.events).clone()
    }
}

/// Collects formatted log lines emitted while a future runs.
#[derive(Clone, Debug, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `future` with a subscriber that writes into this capture.
    pub async fn run<F: Future>(&self, future: F) -> F::Output {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        future.with_subscriber(subscriber).await
    }

    /// Returns every captured line.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&locked(&self.buffer))
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Counts captured lines containing `needle`.
    #[must_use]
    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }
}

/// Writer handed out by [`LogCapture`].
#[derive(Debug)]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        locked(&self.buffer).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Task that records each application and returns a scripted outcome.
#[derive(Clone, Debug)]
pub struct ScriptedTask {
    name: String,
    failure: Option<TaskError>,
    relocate_to: Option<Utf8PathBuf>,
    log: EventLog,
}

impl ScriptedTask {
    /// Creates a task that passes the artifact through unchanged.
    #[must_use]
    pub fn succeeding(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            failure: None,
            relocate_to: None,
            log: log.clone(),
        }
    }

    /// Creates a task that fails with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: TaskError, log: &EventLog) -> Self {
        Self {
            failure: Some(error),
            ..Self::succeeding(name, log)
        }
    }

    /// Makes a succeeding task re-point the artifact at `path`.
    #[must_use]
    pub fn relocating_to(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.relocate_to = Some(path.into());
        self
    }

    /// Boxes the task for use in a pipeline.
    #[must_use]
    pub fn boxed(self) -> Box<dyn Task> {
        Box::new(self)
    }
}

impl Task for ScriptedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, artifact: Artifact) -> TaskFuture<'_> {
        Box::pin(async move {
            self.log.push(format!("{}:{}", self.name, artifact.path()));
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(match &self.relocate_to {
                Some(path) => artifact.relocated(path.clone()),
                None => artifact,
            })
        })
    }
}

#[derive(Debug)]
struct DataStoreState {
    saved_at: i64,
    in_progress: bool,
    polls_before_finish: u32,
    polls_left: u32,
    never_finish: bool,
    background_save_failure: Option<String>,
    background_saves: u32,
}

/// In-memory stand-in for a data-store connection.
#[derive(Clone, Debug)]
pub struct FakeDataStore {
    address: String,
    snapshot_path: Utf8PathBuf,
    state: Arc<Mutex<DataStoreState>>,
}

impl FakeDataStore {
    /// Creates a client whose background saves finish on the first poll.
    #[must_use]
    pub fn new(address: impl Into<String>, snapshot_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            address: address.into(),
            snapshot_path: snapshot_path.into(),
            state: Arc::new(Mutex::new(DataStoreState {
                saved_at: 1_700_000_000,
                in_progress: false,
                polls_before_finish: 0,
                polls_left: 0,
                never_finish: false,
                background_save_failure: None,
                background_saves: 0,
            })),
        }
    }

    /// Delays save completion by `polls` last-save reads.
    pub fn advance_after_polls(&self, polls: u32) {
        locked(&self.state).polls_before_finish = polls;
    }

    /// Makes background saves never complete.
    pub fn never_finish(&self) {
        locked(&self.state).never_finish = true;
    }

    /// Makes the background save command fail with `message`.
    pub fn fail_background_save(&self, message: impl Into<String>) {
        locked(&self.state).background_save_failure = Some(message.into());
    }

    /// Number of background saves requested.
    #[must_use]
    pub fn background_saves(&self) -> u32 {
        locked(&self.state).background_saves
    }
}

impl DataStoreClient for FakeDataStore {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn last_save(&self) -> ClientFuture<'_, i64> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            if state.in_progress && !state.never_finish {
                if state.polls_left == 0 {
                    state.saved_at += 1;
                    state.in_progress = false;
                } else {
                    state.polls_left -= 1;
                }
            }
            Ok(state.saved_at)
        })
    }

    fn background_save(&self) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.background_saves += 1;
            if let Some(message) = state.background_save_failure.clone() {
                return Err(DataStoreError {
                    command: String::from("BGSAVE"),
                    message,
                });
            }
            state.in_progress = true;
            state.polls_left = state.polls_before_finish;
            Ok(())
        })
    }

    fn snapshot_path(&self) -> ClientFuture<'_, Utf8PathBuf> {
        Box::pin(async move { Ok(self.snapshot_path.clone()) })
    }
}

/// Object store that records uploads instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct RecordingStore {
    uploads: Arc<Mutex<Vec<(String, String)>>>,
    failure: Arc<Mutex<Option<StorageError>>>,
}

impl RecordingStore {
    /// Creates a store that accepts every upload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent upload fail with `error`.
    pub fn fail_with(&self, error: StorageError) {
        *locked(&self.failure) = Some(error);
    }

    /// Returns `(local_path, remote_path)` pairs for every upload attempt.
    #[must_use]
    pub fn uploads(&self) -> Vec<(String, String)> {
        locked(&self.uploads).clone()
    }
}

impl ObjectStore for RecordingStore {
    fn upload<'a>(
        &'a self,
        local_path: &'a Utf8Path,
        remote_path: &'a str,
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            locked(&self.uploads).push((local_path.to_string(), remote_path.to_owned()));
            match locked(&self.failure).clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

/// Repository call recorded by [`InMemoryRepository`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RepositoryCall {
    /// `create(id)`
    Create(String),
    /// `create_mirror(instance)`
    CreateMirror(String),
    /// `find_by_id(id)`
    FindById(String),
    /// `destroy(id)`
    Destroy(String),
    /// `instance_exists(id)`
    InstanceExists(String),
}

#[derive(Debug, Default)]
struct RepositoryState {
    instances: BTreeMap<String, Instance>,
    next_port: u16,
    calls: Vec<RepositoryCall>,
    create_failure: Option<RepositoryError>,
    destroy_failure: Option<RepositoryError>,
    exists_failure: Option<RepositoryError>,
    find_failure: Option<RepositoryError>,
}

/// Local repository backed by a map.
#[derive(Clone, Debug)]
pub struct InMemoryRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Creates an empty repository allocating ports from 6380.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RepositoryState {
                next_port: 6380,
                ..RepositoryState::default()
            })),
        }
    }

    /// Seeds an existing instance.
    #[must_use]
    pub fn with_instance(self, instance: Instance) -> Self {
        locked(&self.state)
            .instances
            .insert(instance.id.clone(), instance);
        self
    }

    /// Makes `create` and `create_mirror` fail with `error`.
    pub fn fail_create(&self, error: RepositoryError) {
        locked(&self.state).create_failure = Some(error);
    }

    /// Makes `destroy` fail with `error`.
    pub fn fail_destroy(&self, error: RepositoryError) {
        locked(&self.state).destroy_failure = Some(error);
    }

    /// Makes `instance_exists` fail with `error`.
    pub fn fail_exists(&self, error: RepositoryError) {
        locked(&self.state).exists_failure = Some(error);
    }

    /// Makes `find_by_id` fail with `error`.
    pub fn fail_find(&self, error: RepositoryError) {
        locked(&self.state).find_failure = Some(error);
    }

    /// Reports whether `instance_id` is currently stored.
    #[must_use]
    pub fn contains(&self, instance_id: &str) -> bool {
        locked(&self.state).instances.contains_key(instance_id)
    }

    /// Returns the stored descriptor for `instance_id`.
    #[must_use]
    pub fn get(&self, instance_id: &str) -> Option<Instance> {
        locked(&self.state).instances.get(instance_id).cloned()
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RepositoryCall> {
        locked(&self.state).calls.clone()
    }

    fn insert(&self, instance: Instance) -> Result<(), RepositoryError> {
        let mut state = locked(&self.state);
        if let Some(err) = state.create_failure.clone() {
            return Err(err);
        }
        if state.instances.contains_key(&instance.id) {
            return Err(RepositoryError::AlreadyExists {
                instance_id: instance.id,
            });
        }
        state.instances.insert(instance.id.clone(), instance);
        Ok(())
    }
}

impl LocalInstanceRepository for InMemoryRepository {
    fn create<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            let port = {
                let mut state = locked(&self.state);
                state.calls.push(RepositoryCall::Create(instance_id.to_owned()));
                let port = state.next_port;
                state.next_port = state.next_port.saturating_add(1);
                port
            };
            self.insert(Instance::new(
                instance_id,
                port,
                format!("password-{instance_id}"),
            ))
        })
    }

    fn create_mirror<'a>(&'a self, instance: &'a Instance) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            locked(&self.state)
                .calls
                .push(RepositoryCall::CreateMirror(instance.id.clone()));
            self.insert(instance.clone())
        })
    }

    fn find_by_id<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, Instance> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.calls.push(RepositoryCall::FindById(instance_id.to_owned()));
            if let Some(err) = state.find_failure.clone() {
                return Err(err);
            }
            state
                .instances
                .get(instance_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound {
                    instance_id: instance_id.to_owned(),
                })
        })
    }

    fn destroy<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.calls.push(RepositoryCall::Destroy(instance_id.to_owned()));
            if let Some(err) = state.destroy_failure.clone() {
                return Err(err);
            }
            state
                .instances
                .remove(instance_id)
                .map(|_| ())
                .ok_or_else(|| RepositoryError::NotFound {
                    instance_id: instance_id.to_owned(),
                })
        })
    }

    fn instance_exists<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, bool> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state
                .calls
                .push(RepositoryCall::InstanceExists(instance_id.to_owned()));
            if let Some(err) = state.exists_failure.clone() {
                return Err(err);
            }
            Ok(state.instances.contains_key(instance_id))
        })
    }
}

/// Peer call recorded by [`RecordingPeer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PeerCall {
    /// Mirror creation for the descriptor.
    Create(Instance),
    /// Mirror removal for the instance id.
    Destroy(String),
}

#[derive(Debug, Default)]
struct PeerState {
    calls: Vec<PeerCall>,
    create_failure: Option<PeerError>,
    destroy_failure: Option<PeerError>,
}

/// Peer provisioner that records calls instead of using the network.
#[derive(Clone, Debug, Default)]
pub struct RecordingPeer {
    state: Arc<Mutex<PeerState>>,
}

impl RecordingPeer {
    /// Creates a peer that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes peer creation fail with `error`.
    pub fn fail_create(&self, error: PeerError) {
        locked(&self.state).create_failure = Some(error);
    }

    /// Makes peer destruction fail with `error`.
    pub fn fail_destroy(&self, error: PeerError) {
        locked(&self.state).destroy_failure = Some(error);
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<PeerCall> {
        locked(&self.state).calls.clone()
    }
}

impl PeerProvisioner for RecordingPeer {
    fn create_peer_instance<'a>(&'a self, instance: &'a Instance) -> PeerFuture<'a> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.calls.push(PeerCall::Create(instance.clone()));
            state.create_failure.clone().map_or(Ok(()), Err)
        })
    }

    fn destroy_peer_instance<'a>(&'a self, instance: &'a Instance) -> PeerFuture<'a> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.calls.push(PeerCall::Destroy(instance.id.clone()));
            state.destroy_failure.clone().map_or(Ok(()), Err)
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
