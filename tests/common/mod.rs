//! Shared utilities for integration testing.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use http_middlewares::config::ServerConfig;
use http_middlewares::http::{echo_app, HttpServer};
use http_middlewares::lifecycle::Shutdown;
use http_middlewares::mimic::Mimic;
use http_middlewares::observability::metrics;
use metrics_exporter_prometheus::PrometheusHandle;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const MOCKS: &str = r#"
endpoints:
  - method: GET
    uri: /ping
    response:
      status: 200
      headers:
        Content-Type: application/json
        X-Mock: "1"
      body: '{"message":"pong"}'
  - method: POST
    uri: /login
    params: password=secret&user=ana
    response:
      status: 201
      body: welcome
  - method: GET
    uri: /broken
"#;

/// A running server plus everything needed to poke at it.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub mimic: Arc<Mimic>,
    pub mocks: NamedTempFile,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Overwrite the mock file and reload it.
    pub fn rewrite_mocks(&mut self, content: &str) {
        let file = self.mocks.as_file_mut();
        file.set_len(0).unwrap();
        std::io::Seek::rewind(file).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.sync_all().unwrap();
        self.mimic.load(self.mocks.path()).unwrap();
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap();
    }
}

/// Write `content` to a temporary `.yml` file.
pub fn mock_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// The process-wide recorder; installed once per test binary.
pub fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| metrics::install_recorder().unwrap())
        .clone()
}

/// Start a server on an ephemeral port with the given config and mocks.
pub async fn start_server(mut config: ServerConfig, mocks: &str) -> TestServer {
    let mocks = mock_file(mocks);
    config.mimic.path = mocks.path().display().to_string();

    let mimic = Arc::new(Mimic::new());
    mimic.load(mocks.path()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let metrics_enabled = config.observability.metrics_enabled;
    let mut server = HttpServer::new(config, mimic.clone(), echo_app());
    if metrics_enabled {
        server = server.with_metrics(metrics_handle());
    }

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestServer {
        addr,
        mimic,
        mocks,
        shutdown,
        task,
    }
}

/// Config with only the mock interceptor enabled.
pub fn mimic_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.mimic.enabled = true;
    config.observability.metrics_enabled = false;
    config
}
