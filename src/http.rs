// SPDX-License-Identifier: GPL-3.0-or-later
//! The HTTP surface (spec §4.F, §6): `GET /` and `GET /stream`.
use std::net::Ipv6Addr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use hyper::Body;
use pin_project::pin_project;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;
use warp::http::Response;
use warp::Filter;

use crate::broadcaster::Broadcaster;
use crate::grid::{PixelGrid, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::subscriber::{SubscriberId, SubscriberSet};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// Shared state handed to every route.
pub struct AppState {
    pub grid: Arc<PixelGrid>,
    pub subscribers: Arc<SubscriberSet>,
    pub broadcaster: Arc<Broadcaster>,
    pub interface_name: String,
}

/// Build the combined `/` + `/stream` filter. Anything else falls through
/// to warp's default 404.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let root_state = Arc::clone(&state);
    let root = warp::path::end()
        .and(warp::get())
        .map(move || serve_root(&root_state));

    let stream_state = Arc::clone(&state);
    let stream = warp::path("stream")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || serve_stream(&stream_state));

    root.or(stream).unify()
}

fn serve_root(state: &AppState) -> Response<Body> {
    let base_ip = discover_base_ip(&state.interface_name).unwrap_or_default();
    let page = INDEX_TEMPLATE
        .replace("{{BASE_IP}}", &base_ip)
        .replace("{{WIDTH}}", &CANVAS_WIDTH.to_string())
        .replace("{{HEIGHT}}", &CANVAS_HEIGHT.to_string());
    Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Body::from(page))
        .unwrap()
}

fn serve_stream(state: &AppState) -> Response<Body> {
    let (id, rx) = state.subscribers.register();
    state.broadcaster.ensure_running();

    let byte_stream = ReceiverStream::new(rx).map(|event| Ok::<_, std::io::Error>(Bytes::from(event)));
    let guarded = DisconnectingStream {
        inner: byte_stream,
        id,
        subscribers: Arc::clone(&state.subscribers),
    };
    let body = Body::wrap_stream(guarded);

    Response::builder()
        .status(200)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(body)
        .unwrap()
}

/// Wraps the subscriber's byte stream so that when it is dropped — because
/// the client disconnected and hyper stopped polling the response body —
/// the subscriber is removed from the set (spec §4.F step 6).
///
/// Rust's `Sender`/`Receiver` don't need the `channelClosedFirst` bookkeeping
/// the source uses to avoid double-closing a channel: dropping either half
/// of an mpsc channel is always safe, and [SubscriberSet::remove] is
/// idempotent, so it's harmless whether this guard or the broadcaster's
/// eviction runs first.
#[pin_project(PinnedDrop)]
struct DisconnectingStream<S> {
    #[pin]
    inner: S,
    id: SubscriberId,
    subscribers: Arc<SubscriberSet>,
}

impl<S: Stream> Stream for DisconnectingStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

#[pin_project::pinned_drop]
impl<S> PinnedDrop for DisconnectingStream<S> {
    fn drop(self: Pin<&mut Self>) {
        if self.subscribers.remove(self.id) {
            debug!(id = ?self.id, "subscriber disconnected");
        }
    }
}

/// Select one IPv6 address bound to `interface_name`: global unicast
/// preferred, else unique-local, ignoring link-local (spec §6 "Base IP
/// discovery").
pub fn discover_base_ip(interface_name: &str) -> Option<String> {
    let interfaces = if_addrs::get_if_addrs().ok()?;
    let mut global = None;
    let mut unique_local = None;
    for iface in interfaces {
        if iface.name != interface_name {
            continue;
        }
        let ip = match iface.addr.ip() {
            std::net::IpAddr::V6(v6) => v6,
            std::net::IpAddr::V4(_) => continue,
        };
        if is_link_local(&ip) {
            continue;
        }
        if is_unique_local(&ip) {
            unique_local.get_or_insert(ip);
        } else {
            global.get_or_insert(ip);
        }
    }
    let selected = global.or(unique_local)?;
    Some(trim_trailing_colon(selected))
}

fn is_link_local(addr: &Ipv6Addr) -> bool {
    let octets = addr.octets();
    octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80
}

fn is_unique_local(addr: &Ipv6Addr) -> bool {
    (addr.octets()[0] & 0xfe) == 0xfc
}

fn trim_trailing_colon(addr: Ipv6Addr) -> String {
    let s = addr.to_string();
    if s.len() == 21 && s.ends_with(':') {
        s.trim_end_matches(':').to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_local_is_excluded() {
        let addr: Ipv6Addr = "fe80::1".parse().unwrap();
        assert!(is_link_local(&addr));
    }

    #[test]
    fn unique_local_is_detected() {
        let addr: Ipv6Addr = "fd00::1".parse().unwrap();
        assert!(is_unique_local(&addr));
        assert!(!is_link_local(&addr));
    }

    #[test]
    fn global_unicast_is_neither() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert!(!is_link_local(&addr));
        assert!(!is_unique_local(&addr));
    }
}
