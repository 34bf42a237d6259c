//! Embedded draw commands
//!
//! Agents can send debug drawings to the monitor. Recorded logs keep them
//! in front of the message they arrived with, as bracketed groups of signed
//! byte values:
//!
//! ```text
//! [1,0,-3,12][7,7]((time 4.2))(RDS 0 1)(...)
//! ```

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use tracing::error;

const GROUP_START: char = '[';
const GROUP_END: char = ']';

/// Notified when a line carried draw commands.
pub trait LogfileListener: Send + Sync {
    fn draw_commands_found(&self);
}

/// Executes decoded draw command buffers.
pub trait DrawCommandSink: Send {
    fn execute(&mut self, bytes: &[u8]);
}

/// Optional observers attached to a log reader.
#[derive(Clone, Default)]
pub struct LogHooks {
    pub listener: Option<Arc<dyn LogfileListener>>,
    pub sink: Option<Arc<Mutex<dyn DrawCommandSink>>>,
}

impl LogHooks {
    pub fn with_listener(mut self, listener: Arc<dyn LogfileListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_sink(mut self, sink: Arc<Mutex<dyn DrawCommandSink>>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for LogHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHooks")
            .field("listener", &self.listener.is_some())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Strip the leading draw command groups from a log line.
///
/// The listener hears once per line that carried at least one complete
/// group; the sink, if attached, receives the bytes of each group. An
/// unterminated group is left in place.
pub fn strip_draw_commands<'a>(line: &'a str, hooks: &LogHooks) -> &'a str {
    let mut rest = line;
    while rest.starts_with(GROUP_START) {
        let Some(end) = rest.find(GROUP_END) else {
            break;
        };
        if let Some(sink) = &hooks.sink {
            let bytes = parse_draw_bytes(&rest[1..end]);
            let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
            sink.execute(&bytes);
        }
        rest = &rest[end + 1..];
    }

    if rest.len() < line.len()
        && let Some(listener) = &hooks.listener
    {
        listener.draw_commands_found();
    }
    rest
}

/// Decode a comma separated list of signed bytes. Values that do not parse
/// are logged and skipped.
pub fn parse_draw_bytes(group: &str) -> Vec<u8> {
    group
        .split(',')
        .filter_map(|value| {
            let value = value.trim();
            match value.parse::<i8>() {
                Ok(b) => Some(b as u8),
                Err(e) => {
                    error!("error parsing byte '{}' of draw command: {}", value, e);
                    None
                }
            }
        })
        .collect()
}

/// Encode a draw command buffer as a log group.
pub fn format_draw_group(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 2);
    out.push(GROUP_START);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", *b as i8);
    }
    out.push(GROUP_END);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl LogfileListener for Counter {
        fn draw_commands_found(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Collect(Vec<Vec<u8>>);

    impl DrawCommandSink for Collect {
        fn execute(&mut self, bytes: &[u8]) {
            self.0.push(bytes.to_vec());
        }
    }

    #[test]
    fn test_plain_line_is_untouched() {
        let counter = Arc::new(Counter::default());
        let hooks = LogHooks::default().with_listener(counter.clone());
        assert_eq!(strip_draw_commands("((time 1))(RSG 0 1)", &hooks), "((time 1))(RSG 0 1)");
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_groups_are_stripped_and_reported_once() {
        let counter = Arc::new(Counter::default());
        let sink = Arc::new(Mutex::new(Collect::default()));
        let hooks = LogHooks::default()
            .with_listener(counter.clone())
            .with_sink(sink.clone());

        let rest = strip_draw_commands("[1, 2,-3][ 127 ,-128]((time 1))(RDS 0 1)", &hooks);

        assert_eq!(rest, "((time 1))(RDS 0 1)");
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        let executed = &sink.lock().unwrap().0;
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0], vec![1, 2, 253]);
        assert_eq!(executed[1], vec![127, 128]);
    }

    #[test]
    fn test_bad_bytes_are_skipped() {
        assert_eq!(parse_draw_bytes("1,x,300,4"), vec![1, 4]);
    }

    #[test]
    fn test_unterminated_group_is_kept() {
        let counter = Arc::new(Counter::default());
        let sink = Arc::new(Mutex::new(Collect::default()));
        let hooks = LogHooks::default()
            .with_listener(counter.clone())
            .with_sink(sink.clone());

        assert_eq!(strip_draw_commands("[1,2((time 1))", &hooks), "[1,2((time 1))");
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert!(sink.lock().unwrap().0.is_empty());

        // a complete group before the broken one still counts
        assert_eq!(strip_draw_commands("[5][1,2((time 1))", &hooks), "[1,2((time 1))");
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(sink.lock().unwrap().0, vec![vec![5]]);
    }

    #[test]
    fn test_format_group() {
        let group = format_draw_group(&[0, 5, 0xff]);
        assert_eq!(group, "[0,5,-1]");
        assert_eq!(parse_draw_bytes(&group[1..group.len() - 1]), vec![0, 5, 0xff]);
    }
}
