use crate::echo::{self, EchoState};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::IntoFuture;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::watch;

const LISTEN_BACKLOG: i32 = 1024;

pub fn router(state: EchoState) -> Router {
    Router::new()
        .fallback(echo::echo_handler)
        .with_state(state)
}

/// A bound listener plus the switch that stops it.
pub struct ServerHandle {
    listener: TcpListener,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ServerHandle {
    /// Binds all interfaces. The IPv6 socket has `IPV6_V6ONLY` switched off
    /// so IPv4 clients reach it as `::ffff:a.b.c.d` whatever the host default
    /// is. Hosts without IPv6, or without v4-mapped support, get a plain IPv4
    /// listener.
    pub async fn bind(port: u16) -> io::Result<Self> {
        let listener = match bind_dual_stack(port) {
            Ok(listener) => TcpListener::from_std(listener)?,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
                ) =>
            {
                return Err(e);
            }
            Err(_) => TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            listener,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Sending `true` stops [`serve`](Self::serve) without draining
    /// in-flight requests.
    pub fn shutdown_trigger(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    pub async fn serve(self, state: EchoState) -> io::Result<()> {
        let ServerHandle {
            listener,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;

        let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app).into_future();

        tokio::select! {
            result = server => result,
            _ = wait_for_shutdown(&mut shutdown_rx) => Ok(()),
        }
    }
}

fn bind_dual_stack(port: u16) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)).into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
