use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, trace, warn};
use tracing_error::SpanTrace;

use crate::country::{Dataset, Parsed, parse_countries};
use crate::domain::{TVConfig, TVError};

pub const DEFAULT_URL: &str =
    "https://restcountries.com/v3.1/all?fields=name,capital,population,area,flags";

// Pause before attempt n+1 is RETRY_DELAY * n
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Where the dataset comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Url(String),
    File(PathBuf),
}

impl Default for Source {
    fn default() -> Self {
        Source::Url(DEFAULT_URL.to_string())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{url}"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchState {
    Pending,
    Success(Dataset),
    Failed(String),
}

/// Fetches the dataset once in the background and reports the outcome through [`DataSource::poll`].
pub struct DataSource {
    source: Source,
    retries: u32,
    timeout: Duration,
    state: FetchState,
    rejected: usize,
    receiver: Option<Receiver<Result<Parsed, TVError>>>,
    started: Instant,
}

impl DataSource {
    pub fn spawn(config: &TVConfig) -> Self {
        let mut source = DataSource {
            source: config.source.clone(),
            retries: config.fetch_retries,
            timeout: config.fetch_timeout,
            state: FetchState::Pending,
            rejected: 0,
            receiver: None,
            started: Instant::now(),
        };
        source.start();
        source
    }

    /// A source that already resolved, no thread involved.
    #[cfg(test)]
    pub fn resolved(outcome: Result<Parsed, TVError>) -> Self {
        let mut source = DataSource {
            source: Source::default(),
            retries: 0,
            timeout: Duration::ZERO,
            state: FetchState::Pending,
            rejected: 0,
            receiver: None,
            started: Instant::now(),
        };
        source.resolve(outcome);
        source
    }

    fn start(&mut self) {
        let (tx, rx) = mpsc::channel();
        let source = self.source.clone();
        let retries = self.retries;
        let timeout = self.timeout;

        self.state = FetchState::Pending;
        self.started = Instant::now();
        let spawned = thread::Builder::new()
            .name("fetch".into())
            .spawn(move || {
                // The receiver is gone if the session ended first, nothing left to report to.
                let _ = tx.send(fetch(&source, retries, timeout));
            });

        match spawned {
            Ok(_) => self.receiver = Some(rx),
            Err(e) => self.resolve(Err(TVError::IoError(e))),
        }
    }

    /// Non blocking check for the fetch result. Returns true if the state changed.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = &self.receiver else {
            return false;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(TVError::LoadingFailed(
                "fetch worker stopped without a result".into(),
            )),
        };
        self.resolve(outcome);
        true
    }

    /// Block until the fetch resolved or the timeout passed.
    #[cfg(test)]
    pub fn wait(&mut self, timeout: Duration) -> &FetchState {
        let deadline = Instant::now() + timeout;
        while matches!(self.state, FetchState::Pending) && Instant::now() < deadline {
            if !self.poll() {
                thread::sleep(Duration::from_millis(5));
            }
        }
        &self.state
    }

    fn resolve(&mut self, outcome: Result<Parsed, TVError>) {
        self.receiver = None;
        let elapsed = self.started.elapsed().as_millis();
        self.state = match outcome {
            Ok(parsed) => {
                info!(
                    "Fetched {} countries in {elapsed}ms ({} rejected)",
                    parsed.countries.len(),
                    parsed.rejected
                );
                self.rejected = parsed.rejected;
                FetchState::Success(parsed.into_dataset())
            }
            Err(e) => {
                error!("Fetching countries from {} failed after {elapsed}ms: {e}", self.source);
                FetchState::Failed(e.to_string())
            }
        };
    }

    /// Start another fetch. Only a failed source can be retried.
    pub fn retry(&mut self) -> bool {
        if !matches!(self.state, FetchState::Failed(_)) {
            return false;
        }
        trace!("Retrying fetch from {}", self.source);
        self.rejected = 0;
        self.start();
        true
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[instrument(skip_all, fields(source = %source))]
pub fn fetch(source: &Source, retries: u32, timeout: Duration) -> Result<Parsed, TVError> {
    let result = match source {
        Source::Url(url) => fetch_url(url, retries, timeout),
        Source::File(path) => load_file(path),
    };
    if let Err(e) = &result {
        error!("{e}\n{}", SpanTrace::capture());
    }
    result
}

fn fetch_url(url: &str, retries: u32, timeout: Duration) -> Result<Parsed, TVError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;

    let attempts = retries + 1;
    let mut attempt = 1;
    loop {
        match request(&client, url) {
            Ok(payload) => return parse_countries(&payload),
            Err(e) if attempt < attempts => {
                warn!("Fetch attempt {attempt}/{attempts} failed: {e}");
                thread::sleep(RETRY_DELAY * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn request(client: &reqwest::blocking::Client, url: &str) -> Result<String, TVError> {
    trace!("GET {url}");
    let payload = client.get(url).send()?.error_for_status()?.text()?;
    Ok(payload)
}

fn load_file(path: &Path) -> Result<Parsed, TVError> {
    let path = expand_path(path)?;
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TVError::FileNotFound,
        ErrorKind::PermissionDenied => TVError::PermissionDenied,
        _ => TVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TVError::LoadingFailed("Not a file!".into()));
    }
    trace!("Reading {} bytes from {}", metadata.len(), path.display());
    parse_countries(&fs::read_to_string(&path)?)
}

fn expand_path(path: &Path) -> Result<PathBuf, TVError> {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::LoadingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/countries.json");

    fn config(source: Source) -> TVConfig {
        TVConfig::default()
            .source(source)
            .fetch_retries(0)
            .fetch_timeout(Duration::from_secs(2))
    }

    // An address nobody listens on
    fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/all")
    }

    #[test]
    fn loads_fixture_file() {
        let mut source = DataSource::spawn(&config(Source::File(FIXTURE.into())));
        match source.wait(Duration::from_secs(5)) {
            FetchState::Success(dataset) => {
                assert_eq!(dataset.len(), 6);
                assert_eq!(dataset[0].display_name, "Botswana");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(source.rejected(), 1);
    }

    #[test]
    fn missing_file_fails() {
        let missing = Source::File("/does/not/exist.json".into());
        let err = fetch(&missing, 0, Duration::ZERO).unwrap_err();
        assert!(matches!(err, TVError::FileNotFound));
    }

    #[test]
    fn directory_is_not_a_dataset() {
        let dir = env!("CARGO_MANIFEST_DIR");
        let err = fetch(&Source::File(dir.into()), 0, Duration::ZERO).unwrap_err();
        assert!(matches!(err, TVError::LoadingFailed(_)));
    }

    #[test]
    fn expands_environment_variables() {
        let path = expand_path(Path::new("$CARGO_MANIFEST_DIR/tests")).unwrap();
        assert_eq!(path, PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests")));
    }

    #[test]
    fn unreachable_server_ends_in_failed_state() {
        let mut source = DataSource::spawn(&config(Source::Url(closed_port_url())));
        match source.wait(Duration::from_secs(10)) {
            FetchState::Failed(reason) => assert!(reason.starts_with("network error")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    const SERVER_ERROR: &[u8] = b"HTTP/1.1 500 Internal Server Error\r\n\
        Content-Length: 0\r\n\
        Connection: close\r\n\r\n";

    // Answers every request with a 500 and counts the connections
    fn failing_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        thread::spawn(move || {
            for mut stream in listener.incoming().flatten() {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(SERVER_ERROR);
            }
        });
        (format!("http://127.0.0.1:{port}/all"), connections)
    }

    #[test]
    fn server_errors_use_every_attempt() {
        let (url, connections) = failing_server();
        let err = fetch(&Source::Url(url), 1, Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, TVError::NetworkError(_)));
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn only_failed_sources_retry() {
        let mut ok = DataSource::resolved(Ok(Parsed::default()));
        assert!(!ok.retry());

        let mut failed = DataSource::resolved(Err(TVError::NetworkError("boom".into())));
        assert!(matches!(failed.state(), FetchState::Failed(_)));
        failed.source = Source::File(FIXTURE.into());
        assert!(failed.retry());
        assert!(matches!(failed.state(), FetchState::Pending));
        assert!(matches!(
            failed.wait(Duration::from_secs(5)),
            FetchState::Success(_)
        ));
    }
}
