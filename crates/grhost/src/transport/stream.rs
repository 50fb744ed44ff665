use grhost_core::LocalEndpoint;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Byte stream a transport adapter runs over
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Connect to a local endpoint the game process listens on
pub async fn connect_local(endpoint: &LocalEndpoint) -> io::Result<Box<dyn AsyncStream>> {
    match endpoint {
        LocalEndpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        LocalEndpoint::Unix(path) => Ok(Box::new(tokio::net::UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        LocalEndpoint::Unix(path) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unix sockets are not available: {}", path.display()),
        )),
    }
}

/// Listening side of a local endpoint, for transports where the game dials in
pub enum LocalListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: std::path::PathBuf,
    },
}

impl LocalListener {
    pub async fn bind(endpoint: &LocalEndpoint) -> io::Result<Self> {
        match endpoint {
            LocalEndpoint::Tcp(addr) => Ok(LocalListener::Tcp(TcpListener::bind(addr).await?)),
            #[cfg(unix)]
            LocalEndpoint::Unix(path) => {
                // A socket file left behind by a previous platform run blocks bind
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                Ok(LocalListener::Unix {
                    listener: tokio::net::UnixListener::bind(path)?,
                    path: path.clone(),
                })
            }
            #[cfg(not(unix))]
            LocalEndpoint::Unix(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix sockets are not available: {}", path.display()),
            )),
        }
    }

    /// Address actually bound, with the OS-assigned port filled in
    pub fn local_endpoint(&self) -> io::Result<LocalEndpoint> {
        match self {
            LocalListener::Tcp(listener) => Ok(LocalEndpoint::Tcp(listener.local_addr()?)),
            #[cfg(unix)]
            LocalListener::Unix { path, .. } => Ok(LocalEndpoint::Unix(path.clone())),
        }
    }

    pub async fn accept(&self) -> io::Result<Box<dyn AsyncStream>> {
        match self {
            LocalListener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                debug!(peer = %peer, "Accepted tcp connection");
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            LocalListener::Unix { listener, path } => {
                let (stream, _) = listener.accept().await?;
                debug!(path = %path.display(), "Accepted unix connection");
                Ok(Box::new(stream))
            }
        }
    }
}

#[cfg(unix)]
impl Drop for LocalListener {
    fn drop(&mut self) {
        if let LocalListener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}
