//! # Server Status
//!
//! Answers the `0xFF 0xFF` status query with a tsqp XML document.
//!
//! Rendering reads the account store for the online player count, so the
//! finished document is cached per world for [`STATUS_REFRESH`]. The per-world
//! slot is locked across the refresh, so callers arriving while a document is
//! being rebuilt wait for it and share the result instead of rebuilding it
//! themselves.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::StatusConfig;
use crate::error::Result;

/// How long a rendered document is served before it is rebuilt
pub const STATUS_REFRESH: Duration = Duration::from_secs(5);

/// Name reported in the `server` attribute
pub const SERVER_NAME: &str = "OTLS";

#[derive(Debug, Clone)]
struct CachedStatus {
    document: Bytes,
    rendered_at: Instant,
}

type Slot = Arc<Mutex<Option<CachedStatus>>>;

/// Rendered status documents keyed by world id
#[derive(Debug)]
pub struct StatusCache {
    refresh: Duration,
    slots: StdMutex<HashMap<u8, Slot>>,
    peak_players: AtomicU32,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(STATUS_REFRESH)
    }
}

impl StatusCache {
    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            slots: StdMutex::new(HashMap::new()),
            peak_players: AtomicU32::new(0),
        }
    }

    fn slot(&self, world_id: u8) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(world_id).or_default().clone()
    }

    /// Return the cached document for `world_id`, rendering it with `render`
    /// when it is missing or older than the refresh interval.
    ///
    /// A failed render leaves the previous document in place and is returned
    /// to the caller.
    pub async fn get_or_refresh<F, Fut>(&self, world_id: u8, render: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let slot = self.slot(world_id);
        let mut cached = slot.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.rendered_at.elapsed() < self.refresh {
                trace!(world_id, "Serving cached status");
                return Ok(entry.document.clone());
            }
        }

        let document = Bytes::from(render().await?);
        debug!(world_id, size = document.len(), "Status document rendered");
        *cached = Some(CachedStatus {
            document: document.clone(),
            rendered_at: Instant::now(),
        });
        Ok(document)
    }

    /// Record an online count and return the highest seen so far.
    pub fn observe_players(&self, online: u32) -> u32 {
        self.peak_players
            .fetch_max(online, Ordering::Relaxed)
            .max(online)
    }

    pub fn peak_players(&self) -> u32 {
        self.peak_players.load(Ordering::Relaxed)
    }
}

/// Live values that go into one status document
#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot<'a> {
    pub config: &'a StatusConfig,
    pub uptime_secs: u64,
    pub players_online: u32,
    pub players_peak: u32,
}

impl StatusSnapshot<'_> {
    pub fn to_xml(&self) -> String {
        let c = self.config;
        let mut xml = XmlWriter::new();

        xml.start("serverinfo")
            .attr("uptime", self.uptime_secs)
            .attr("ip", &c.ip)
            .attr("servername", &c.servername)
            .attr("port", c.port)
            .attr("location", &c.location)
            .attr("url", &c.url)
            .attr("server", SERVER_NAME)
            .attr("version", env!("CARGO_PKG_VERSION"))
            .attr("client", &c.client)
            .end_empty();
        xml.start("owner")
            .attr("name", &c.owner_name)
            .attr("email", &c.owner_email)
            .end_empty();
        xml.start("players")
            .attr("online", self.players_online)
            .attr("max", c.max_players)
            .attr("peak", self.players_peak)
            .end_empty();
        xml.start("monsters").attr("total", c.monsters).end_empty();
        xml.start("npcs").attr("total", c.npcs).end_empty();
        xml.start("rates")
            .attr("experience", c.rates.experience)
            .attr("skill", c.rates.skill)
            .attr("loot", c.rates.loot)
            .attr("magic", c.rates.magic)
            .attr("spawn", c.rates.spawn)
            .end_empty();
        xml.start("map")
            .attr("name", &c.map_name)
            .attr("author", &c.map_author)
            .attr("width", c.map_width)
            .attr("height", c.map_height)
            .end_empty();
        xml.text_element("motd", &c.motd);

        xml.finish()
    }
}

/// Just enough XML for the status document
struct XmlWriter {
    out: String,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            out: String::from("<?xml version=\"1.0\"?>\n<tsqp version=\"1.0\">"),
        }
    }

    fn start(&mut self, tag: &str) -> &mut Self {
        self.out.push('<');
        self.out.push_str(tag);
        self
    }

    fn attr(&mut self, name: &str, value: impl ToString) -> &mut Self {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        escape_into(&mut self.out, &value.to_string());
        self.out.push('"');
        self
    }

    fn end_empty(&mut self) {
        self.out.push_str("/>");
    }

    fn text_element(&mut self, tag: &str, text: &str) {
        self.start(tag);
        self.out.push('>');
        escape_into(&mut self.out, text);
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn finish(mut self) -> String {
        self.out.push_str("</tsqp>");
        self.out
    }
}

fn escape_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
}
