//! Telecommand queue consumed by the sender/receiver family.
//!
//! The queue is strictly FIFO: entries are consumed in insertion order. Besides telecommands,
//! it carries directives which are executed by the sender when they are dequeued.
//!
//! Queues can also be written as a line based script:
//!
//! ```text
//! # Comment
//! print Testing Service 17
//! tc 17 1 1700
//! wait 2.0
//! tc 200 1 2000 4400affe0000000100
//! timeout 10
//! export log/tmtc_log_service17.txt
//! ```
use crate::ecss::PusError;
use crate::tc::{PackedTc, PusTcCreator};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcQueueEntry {
    Telecommand(PackedTc),
    /// Suspend the sender. The wait time is also added to the TM timeout.
    Wait(Duration),
    /// Print the text and add it to the file buffer separated by blank lines.
    Print(String),
    /// Print the text and add it to the file buffer as is.
    RawPrint(String),
    /// Write the buffered output to the given file.
    Export(PathBuf),
    /// Set the TM timeout of the sender.
    SetTimeout(Duration),
}

impl TcQueueEntry {
    pub fn is_telecommand(&self) -> bool {
        matches!(self, TcQueueEntry::Telecommand(_))
    }

    /// Build a directive from its tagged form. Telecommands use the `tc` tag followed by
    /// service, subservice, SSC and optional hex encoded application data.
    pub fn from_tagged(tag: &str, arg: &str, apid: u16) -> Result<Self, QueueEntryError> {
        let arg = arg.trim();
        match tag {
            "wait" => Ok(TcQueueEntry::Wait(parse_seconds(tag, arg)?)),
            "print" => Ok(TcQueueEntry::Print(arg.to_string())),
            "rawprint" => Ok(TcQueueEntry::RawPrint(arg.to_string())),
            "export" => {
                if arg.is_empty() {
                    return Err(QueueEntryError::MissingArgument("export"));
                }
                Ok(TcQueueEntry::Export(PathBuf::from(arg)))
            }
            "timeout" => Ok(TcQueueEntry::SetTimeout(parse_seconds(tag, arg)?)),
            "tc" => parse_telecommand(arg, apid),
            _ => Err(QueueEntryError::UnknownTag(tag.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueEntryError {
    #[error("unknown queue entry tag {0:?}")]
    UnknownTag(String),
    #[error("missing argument for {0} entry")]
    MissingArgument(&'static str),
    #[error("invalid argument {value:?} for {tag} entry")]
    InvalidArgument { tag: String, value: String },
    #[error("line {line}: {source}")]
    Script {
        line: usize,
        #[source]
        source: Box<QueueEntryError>,
    },
    #[error("packing telecommand failed: {0}")]
    Pus(#[from] PusError),
}

fn invalid(tag: &str, value: &str) -> QueueEntryError {
    QueueEntryError::InvalidArgument {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

fn parse_seconds(tag: &str, arg: &str) -> Result<Duration, QueueEntryError> {
    let secs: f64 = arg.parse().map_err(|_| invalid(tag, arg))?;
    Duration::try_from_secs_f64(secs).map_err(|_| invalid(tag, arg))
}

fn parse_telecommand(arg: &str, apid: u16) -> Result<TcQueueEntry, QueueEntryError> {
    let mut fields = arg.split_whitespace();
    let mut next_field =
        |name: &'static str| fields.next().ok_or(QueueEntryError::MissingArgument(name));
    let service = next_field("tc service")?;
    let subservice = next_field("tc subservice")?;
    let ssc = next_field("tc ssc")?;
    let service: u8 = service.parse().map_err(|_| invalid("tc", service))?;
    let subservice: u8 = subservice.parse().map_err(|_| invalid("tc", subservice))?;
    let ssc: u16 = ssc.parse().map_err(|_| invalid("tc", ssc))?;
    let app_data = match fields.next() {
        Some(hex_data) => hex::decode(hex_data).map_err(|_| invalid("tc", hex_data))?,
        None => Vec::new(),
    };
    if let Some(extra) = fields.next() {
        return Err(invalid("tc", extra));
    }
    let tc = PusTcCreator::new(apid, service, subservice, ssc, &app_data)?;
    Ok(TcQueueEntry::Telecommand(tc.pack()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TcQueue {
    entries: VecDeque<TcQueueEntry>,
}

impl TcQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TcQueueEntry) {
        self.entries.push_back(entry);
    }

    pub fn push_tc(&mut self, tc: &PusTcCreator) -> Result<(), PusError> {
        self.push(TcQueueEntry::Telecommand(tc.pack()?));
        Ok(())
    }

    pub fn push_wait(&mut self, wait_time: Duration) {
        self.push(TcQueueEntry::Wait(wait_time));
    }

    pub fn push_print(&mut self, text: impl Into<String>) {
        self.push(TcQueueEntry::Print(text.into()));
    }

    pub fn push_raw_print(&mut self, text: impl Into<String>) {
        self.push(TcQueueEntry::RawPrint(text.into()));
    }

    pub fn push_export(&mut self, path: impl Into<PathBuf>) {
        self.push(TcQueueEntry::Export(path.into()));
    }

    pub fn push_timeout(&mut self, timeout: Duration) {
        self.push(TcQueueEntry::SetTimeout(timeout));
    }

    /// Remove the oldest entry.
    pub fn pop(&mut self) -> Option<TcQueueEntry> {
        self.entries.pop_front()
    }

    pub fn append(&mut self, other: &mut TcQueue) {
        self.entries.append(&mut other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_telecommands(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_telecommand()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TcQueueEntry> {
        self.entries.iter()
    }

    /// Parse a queue script. Empty lines and lines starting with `#` are skipped. The first
    /// word of each line is the entry tag, the rest of the line is its argument.
    pub fn from_script(script: &str, apid: u16) -> Result<Self, QueueEntryError> {
        let mut queue = Self::new();
        for (idx, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (tag, arg) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let entry =
                TcQueueEntry::from_tagged(tag, arg, apid).map_err(|e| QueueEntryError::Script {
                    line: idx + 1,
                    source: Box::new(e),
                })?;
            queue.push(entry);
        }
        Ok(queue)
    }
}

impl FromIterator<TcQueueEntry> for TcQueue {
    fn from_iter<I: IntoIterator<Item = TcQueueEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = TcQueue::new();
        queue.push_print("first");
        queue
            .push_tc(&PusTcCreator::new(0x73, 17, 1, 1700, &[]).unwrap())
            .unwrap();
        queue.push_wait(Duration::from_secs(2));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.num_telecommands(), 1);
        assert_eq!(queue.pop(), Some(TcQueueEntry::Print("first".to_string())));
        let Some(TcQueueEntry::Telecommand(tc)) = queue.pop() else {
            panic!("expected telecommand");
        };
        assert_eq!(tc.info.ssc, 1700);
        assert_eq!(queue.pop(), Some(TcQueueEntry::Wait(Duration::from_secs(2))));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_script() {
        let script = "\
# Service 17 test
print Testing Service 17
tc 17 1 1700
wait 1.5
tc 200 1 2000 4400AFFE0000000100
timeout 10
rawprint done
export log/tmtc_log_service17.txt
";
        let mut queue = TcQueue::from_script(script, 0x73).unwrap();
        assert_eq!(queue.len(), 7);
        assert_eq!(queue.num_telecommands(), 2);
        assert_eq!(
            queue.pop(),
            Some(TcQueueEntry::Print("Testing Service 17".to_string()))
        );
        queue.pop();
        assert_eq!(
            queue.pop(),
            Some(TcQueueEntry::Wait(Duration::from_millis(1500)))
        );
        let Some(TcQueueEntry::Telecommand(mode_tc)) = queue.pop() else {
            panic!("expected telecommand");
        };
        assert_eq!(mode_tc.info.service, 200);
        assert_eq!(
            mode_tc.info.data,
            vec![0x44, 0x00, 0xAF, 0xFE, 0, 0, 0, 1, 0]
        );
        assert_eq!(
            queue.pop(),
            Some(TcQueueEntry::SetTimeout(Duration::from_secs(10)))
        );
    }

    #[test]
    fn test_unknown_tag() {
        let error = TcQueue::from_script("print ok\nsleep 3\n", 0x73).unwrap_err();
        assert_eq!(
            error,
            QueueEntryError::Script {
                line: 2,
                source: Box::new(QueueEntryError::UnknownTag("sleep".to_string()))
            }
        );
    }

    #[test]
    fn test_invalid_arguments() {
        assert_eq!(
            TcQueueEntry::from_tagged("wait", "soon", 0).unwrap_err(),
            QueueEntryError::InvalidArgument {
                tag: "wait".to_string(),
                value: "soon".to_string()
            }
        );
        assert_eq!(
            TcQueueEntry::from_tagged("tc", "17", 0).unwrap_err(),
            QueueEntryError::MissingArgument("tc subservice")
        );
        assert!(TcQueueEntry::from_tagged("tc", "17 1 0 zz", 0).is_err());
        assert!(TcQueueEntry::from_tagged("tc", "300 1 0", 0).is_err());
        assert!(TcQueueEntry::from_tagged("wait", "-1", 0).is_err());
        assert_eq!(
            TcQueueEntry::from_tagged("export", "", 0).unwrap_err(),
            QueueEntryError::MissingArgument("export")
        );
    }
}
