/// Local static file server
///
/// Serves the working directory over `http://localhost:<port>/` so the map
/// page is loaded from an http origin. Listening happens on one dedicated
/// thread with its own tokio runtime; `stop` shuts it down gracefully and
/// joins the thread, releasing the port.

use axum::Router;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind localhost:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start server thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Handle to a running server
struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

pub struct FileServer {
    port: u16,
    root: PathBuf,
    running: Option<Running>,
}

impl FileServer {
    /// Create a stopped server for `root` on `port` (0 picks a free port)
    pub fn new(port: u16, root: impl Into<PathBuf>) -> Self {
        Self { port, root: root.into(), running: None }
    }

    /// Bind the port and start serving. Binding happens before this returns,
    /// so a port in use is reported here.
    pub fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if let Some(running) = &self.running {
            return Ok(running.addr);
        }

        let to_bind_error = |source| ServerError::Bind { port: self.port, source };
        let listener = TcpListener::bind(("127.0.0.1", self.port)).map_err(to_bind_error)?;
        listener.set_nonblocking(true).map_err(to_bind_error)?;
        let addr = listener.local_addr().map_err(to_bind_error)?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new().fallback_service(ServeDir::new(&self.root));

        let thread = std::thread::Builder::new()
            .name("file-server".to_string())
            .spawn(move || serve(listener, app, shutdown_rx))
            .map_err(ServerError::Spawn)?;

        log::info!("🌐 Serving {} at http://localhost:{}/", self.root.display(), addr.port());
        self.running = Some(Running { addr, shutdown, thread });
        Ok(addr)
    }

    /// Stop serving and release the port. No-op if not running.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            if running.thread.join().is_err() {
                log::error!("File server thread panicked");
            }
            log::info!("🛑 File server on port {} stopped", running.addr.port());
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Base URL files are served under, e.g. `http://localhost:8000/`
    pub fn base_url(&self) -> String {
        let port = self.running.as_ref().map_or(self.port, |r| r.addr.port());
        format!("http://localhost:{port}/")
    }

    /// URL of a file relative to the served root
    pub fn url_for(&self, file: &str) -> String {
        format!("{}{}", self.base_url(), file.trim_start_matches('/'))
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(listener: TcpListener, app: Router, shutdown: oneshot::Receiver<()>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("File server runtime failed to start: {e}");
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("File server listener unusable: {e}");
                return;
            }
        };
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown.await;
            })
            .await;
        if let Err(e) = result {
            log::error!("File server stopped with error: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_files_and_releases_port() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("map.html"), "<html>map</html>").unwrap();

        let mut server = FileServer::new(0, dir.path());
        let addr = server.start().unwrap();
        assert!(server.is_running());

        let url = server.url_for("map.html");
        assert_eq!(url, format!("http://localhost:{}/map.html", addr.port()));

        let body = reqwest::get(format!("http://127.0.0.1:{}/map.html", addr.port()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "<html>map</html>");

        let missing = reqwest::get(format!("http://127.0.0.1:{}/nope.html", addr.port())).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        drop(missing);

        server.stop();
        assert!(!server.is_running());

        // the port can be bound again once stopped
        let mut again = FileServer::new(addr.port(), dir.path());
        again.start().unwrap();
        again.stop();
    }

    #[test]
    fn test_port_in_use_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = FileServer::new(0, dir.path());
        let addr = first.start().unwrap();

        let mut second = FileServer::new(addr.port(), dir.path());
        assert!(matches!(second.start(), Err(ServerError::Bind { .. })));
        assert!(!second.is_running());
    }

    #[test]
    fn test_base_url_before_start_uses_configured_port() {
        let server = FileServer::new(8000, ".");
        assert_eq!(server.base_url(), "http://localhost:8000/");
        assert_eq!(server.url_for("/map.html"), "http://localhost:8000/map.html");
    }
}
