//! Host side telemetry sinks.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use occupancy_monitor::telemetry::{NotificationSink, PersistenceSink, Record, Telemetry};
use serde::{Deserialize, Serialize};

/// Format of the write-time stamp, UTC.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A persisted line of the occupancy log.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Row {
    pub timestamp: String,
    #[serde(flatten)]
    pub record: Record,
}

/// Append-only JSON lines log. The file and its directory are created on first append.
pub struct JsonLines {
    path: PathBuf,
}

impl JsonLines {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))
    }

    /// The last `limit` rows in chronological order.
    pub fn tail(&self, limit: usize) -> anyhow::Result<Vec<Row>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("opening {}", self.path.display())),
        };
        let mut rows = std::collections::VecDeque::with_capacity(limit);
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}", self.path.display(), n + 1))?;
            if rows.len() == limit {
                rows.pop_front();
            }
            if limit > 0 {
                rows.push_back(row);
            }
        }
        Ok(rows.into())
    }
}

impl PersistenceSink for JsonLines {
    type Error = anyhow::Error;

    fn append(&mut self, record: &Record) -> Result<(), Self::Error> {
        let row = Row {
            timestamp: chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            record: *record,
        };
        let mut line = serde_json::to_string(&row)?;
        line.push('\n');
        self.open()?.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Posts telemetry as JSON to a webhook. A single attempt with a short timeout.
pub struct Webhook {
    client: reqwest::blocking::Client,
    url: String,
}

impl Webhook {
    pub const TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()?;
        Ok(Self { client, url })
    }
}

impl NotificationSink for Webhook {
    type Error = anyhow::Error;

    fn send(&mut self, telemetry: &Telemetry) -> Result<(), Self::Error> {
        let body = telemetry
            .to_json()
            .map_err(|e| anyhow::anyhow!("encoding telemetry: {:?}", e))?;
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()?;
        if response.status() != reqwest::StatusCode::OK {
            bail!("webhook response: {}", response.status());
        }
        Ok(())
    }
}

/// Notification sink used when no webhook is configured.
pub enum Notifier {
    Webhook(Webhook),
    Disabled,
}

impl NotificationSink for Notifier {
    type Error = anyhow::Error;

    fn send(&mut self, telemetry: &Telemetry) -> Result<(), Self::Error> {
        match self {
            Self::Webhook(hook) => hook.send(telemetry),
            Self::Disabled => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(current_count: u32) -> Record {
        Record {
            current_count,
            avg_occupancy: 1.25,
            max_occupancy: 3,
            temperature: 22.5,
            limit_exceeded: false,
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "occupancy-monitor-{}-{}",
            name,
            std::process::id()
        ));
        fs::remove_dir_all(&dir).ok();
        dir.join("data").join("occupancy.jsonl")
    }

    #[test]
    fn appends_and_tails() {
        let path = scratch("tail");
        let mut log = JsonLines::new(&path);
        assert!(log.tail(10).unwrap().is_empty());

        for c in 0..5 {
            log.append(&record(c)).unwrap();
        }

        let rows = log.tail(3).unwrap();
        let counts: Vec<u32> = rows.iter().map(|r| r.record.current_count).collect();
        assert_eq!(counts, [2, 3, 4]);
        assert_eq!(rows[0].timestamp.len(), "2024-01-01 00:00:00".len());
        assert_eq!(log.tail(100).unwrap().len(), 5);
        assert!(log.tail(0).unwrap().is_empty());

        fs::remove_dir_all(path.parent().unwrap().parent().unwrap()).ok();
    }

    #[test]
    fn row_is_flat() {
        let row = Row {
            timestamp: "2024-01-01 00:00:00".into(),
            record: record(2),
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.starts_with("{\"timestamp\":\"2024-01-01 00:00:00\",\"current_count\":2,"));
        assert_eq!(serde_json::from_str::<Row>(&json).unwrap(), row);
    }

    fn telemetry() -> Telemetry {
        Telemetry {
            avg_occupancy: 0.0,
            max_occupancy: 0,
            current_count: 0,
            limit_exceeded: false,
            temperature: 22.0,
            ac_on: false,
        }
    }

    /// Accepts one request on a local port. Answers with `response` once the JSON body has
    /// arrived, or holds the connection open without answering.
    fn webhook_server(response: Option<&'static str>) -> String {
        use std::io::Read;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/webhook/occupancy", listener.local_addr().unwrap());
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"}") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            match response {
                Some(response) => {
                    stream.write_all(response.as_bytes()).ok();
                }
                None => std::thread::sleep(Duration::from_secs(3)),
            }
        });
        url
    }

    #[test]
    fn disabled_notifier_accepts_everything() {
        assert!(Notifier::Disabled.send(&telemetry()).is_ok());
    }

    #[test]
    fn webhook_accepts_ok() {
        let url = webhook_server(Some("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"));
        let mut hook = Webhook::new(url).unwrap();
        assert!(hook.send(&telemetry()).is_ok());
    }

    #[test]
    fn webhook_error_status_fails() {
        let url = webhook_server(Some(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
        ));
        let mut hook = Webhook::new(url).unwrap();
        assert!(hook.send(&telemetry()).is_err());
    }

    #[test]
    fn webhook_times_out() {
        let url = webhook_server(None);
        let mut hook = Webhook::new(url).unwrap();
        let start = std::time::Instant::now();
        assert!(hook.send(&telemetry()).is_err());
        assert!(start.elapsed() >= Webhook::TIMEOUT);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
