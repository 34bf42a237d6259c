//! Integration tests for the monitor client
//!
//! Logs flowing through readers, analyzer and player, live sessions recorded
//! and replayed, and the behavioral guarantees of the protocol layer.


#[cfg(test)]
pub(crate) mod test_utils {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use std::sync::mpsc::Receiver;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crate::dispatch::{MessageDispatcher, World};
    use crate::scene::SceneSkeleton;

    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Shared world with a scene that tracks full/diff consistency.
    pub fn skeleton_world() -> Arc<Mutex<World>> {
        Arc::new(Mutex::new(World::new(Box::new(SceneSkeleton::new()))))
    }

    /// Apply `lines[..=frame]` in order to a fresh headless world.
    pub fn replay_through(lines: &[String], frame: usize) -> MessageDispatcher {
        let dispatcher = MessageDispatcher::new(Arc::new(Mutex::new(World::headless())));
        for line in &lines[..=frame] {
            dispatcher.dispatch(line).unwrap();
        }
        dispatcher
    }

    /// Receive until `pred` matches, failing after [`TIMEOUT`].
    pub fn wait_for<T: std::fmt::Debug>(rx: &Receiver<T>, pred: impl Fn(&T) -> bool) -> T {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("timed out waiting for event: {}", e),
            }
        }
    }

    pub fn write_zip(path: &Path, entry: &str, lines: &[String]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        zip.start_file(entry, zip::write::SimpleFileOptions::default())
            .unwrap();
        for line in lines {
            writeln!(zip, "{}", line).unwrap();
        }
        zip.finish().unwrap();
    }

    pub fn write_tar_bz2(path: &Path, entry: &str, lines: &[String]) {
        let content: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let encoder =
            bzip2::write::BzEncoder::new(File::create(path).unwrap(), bzip2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, entry, content.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }
}
