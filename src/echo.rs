use crate::console;
use axum::extract::{ConnectInfo, State};
use askama::Template;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};

const RULE: &str = "=========================================================";

/// Per-server settings the handler reads; never mutated while serving.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoState {
    pub verbose: bool,
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Html,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// Everything the echo reports about one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub date: String,
    pub time: String,
    pub method: String,
    pub host: String,
    pub target: String,
    pub ip: IpAddr,
    pub remote_port: u16,
    pub user_agent: Option<String>,
    pub cookies: Vec<Field>,
    pub headers: Vec<Field>,
}

// ---------------------------------------------------------------------------
// Address normalisation
// ---------------------------------------------------------------------------

/// `::ffff:203.0.113.5` becomes `203.0.113.5`; every other address is kept.
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    raw.split(',').next()?.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Building the summary
// ---------------------------------------------------------------------------

fn header_text(value: &header::HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

fn parse_cookies(headers: &HeaderMap) -> Vec<Field> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .flat_map(|value| {
            header_text(value)
                .split(';')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((name, value)) => Field {
                        name: name.trim().to_string(),
                        value: value.trim().to_string(),
                    },
                    None => Field {
                        name: pair.to_string(),
                        value: String::new(),
                    },
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

impl RequestSummary {
    pub fn from_parts(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        peer: SocketAddr,
        received_at: DateTime<Utc>,
        trust_proxy: bool,
    ) -> Self {
        let client_ip = if trust_proxy {
            forwarded_for(headers).unwrap_or(peer.ip())
        } else {
            peer.ip()
        };

        let host = headers
            .get(header::HOST)
            .map(header_text)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        Self {
            date: received_at.format("%Y-%m-%d").to_string(),
            time: received_at.format("%H:%M:%S").to_string(),
            method: method.to_string(),
            host,
            target,
            ip: normalize_ip(client_ip),
            remote_port: peer.port(),
            user_agent: headers.get(header::USER_AGENT).map(header_text),
            cookies: parse_cookies(headers),
            headers: headers
                .iter()
                .map(|(name, value)| Field {
                    name: name.to_string(),
                    value: header_text(value),
                })
                .collect(),
        }
    }

    fn user_agent_or_dash(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("-")
    }

    fn render_with(
        &self,
        label: impl Fn(&str) -> String,
        value: impl Fn(&str) -> String,
    ) -> String {
        let mut out = String::new();
        out.push('\n');
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&format!(
            "{} {} {}\n",
            label("Server Time (UTC):"),
            value(&self.date),
            value(&self.time)
        ));
        out.push_str(&format!(
            "{} {} {}{}\n\n",
            label("Requested:"),
            value(&self.method),
            value(&self.host),
            value(&self.target)
        ));
        out.push_str(&format!("{} {}\n\n", label("Your IP:"), value(&self.ip.to_string())));
        out.push_str(&format!(
            "{} {}\n\n",
            label("Remote Port:"),
            value(&self.remote_port.to_string())
        ));
        out.push_str(&format!(
            "{} {}\n",
            label("User-Agent:"),
            value(self.user_agent_or_dash())
        ));
        if !self.cookies.is_empty() {
            out.push('\n');
            out.push_str(&label("Cookies:"));
            out.push('\n');
            for cookie in &self.cookies {
                out.push_str(&format!("{}: {}\n", cookie.name, cookie.value));
            }
        }
        out.push('\n');
        out.push_str(&label("Headers:"));
        out.push('\n');
        for field in &self.headers {
            out.push_str(&format!("{}: {}\n", field.name, field.value));
        }
        out.push_str(RULE);
        out.push('\n');
        out
    }

    pub fn render_text(&self) -> String {
        self.render_with(str::to_string, str::to_string)
    }

    /// Same layout as [`render_text`](Self::render_text), coloured for a terminal.
    pub fn render_console(&self) -> String {
        self.render_with(console::label, console::value)
    }

    pub fn render_html(&self) -> askama::Result<String> {
        EchoPage {
            summary: self,
            rule: RULE,
        }
        .render()
    }
}

#[derive(Template)]
#[template(path = "echo.html")]
struct EchoPage<'a> {
    summary: &'a RequestSummary,
    rule: &'a str,
}

// ---------------------------------------------------------------------------
// Content negotiation
// ---------------------------------------------------------------------------

/// JSON when asked for it, plain text for curl and clients that send no
/// user agent, HTML for everything else.
pub fn negotiate(headers: &HeaderMap) -> ResponseFormat {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept.contains("application/json") {
        return ResponseFormat::Json;
    }

    match headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        None => ResponseFormat::Text,
        Some(agent) if agent.contains("curl") => ResponseFormat::Text,
        Some(_) => ResponseFormat::Html,
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub async fn echo_handler(
    State(state): State<EchoState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let summary =
        RequestSummary::from_parts(&method, &uri, &headers, peer, Utc::now(), state.trust_proxy);

    if state.verbose {
        println!("{}", summary.render_console());
    }

    match negotiate(&headers) {
        ResponseFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            summary.render_text(),
        )
            .into_response(),
        ResponseFormat::Html => match summary.render_html() {
            Ok(page) => Html(page).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        },
        ResponseFormat::Json => Json(summary).into_response(),
    }
}
