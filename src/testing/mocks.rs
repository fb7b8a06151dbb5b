use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::core::{MutexExt, ServiceError};
use crate::service::unit::{CtlOutput, SystemCtl};

pub enum ScriptStep {
    /// Served over as many reads as the chunk size requires.
    Data(Vec<u8>),
    Fail(io::ErrorKind),
    /// One read returning 0.
    Eof,
    /// Blocks the read, then continues with the next step.
    Stall(Duration),
}

/// Source replaying a fixed script, then reporting end-of-data forever.
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared read counter, still readable after the source moved into a worker.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl Read for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        loop {
            let Some(step) = self.steps.pop_front() else {
                return Ok(0);
            };
            match step {
                ScriptStep::Data(bytes) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.steps.push_front(ScriptStep::Data(bytes[n..].to_vec()));
                    }
                    return Ok(n);
                }
                ScriptStep::Fail(kind) => {
                    return Err(io::Error::new(kind, "scripted failure"));
                }
                ScriptStep::Eof => return Ok(0),
                ScriptStep::Stall(duration) => std::thread::sleep(duration),
            }
        }
    }
}

/// Byte at `offset` of the stream produced by [`CountingSource`].
pub fn counting_byte(offset: u64) -> u8 {
    (offset % 251) as u8
}

pub fn counting_bytes(len: usize) -> Vec<u8> {
    (0..len as u64).map(counting_byte).collect()
}

/// Endless deterministic stream, so rotated files can be checked for gaps
/// and duplicates by concatenation.
pub struct CountingSource {
    offset: u64,
    delay: Duration,
}

impl CountingSource {
    pub fn new(delay: Duration) -> Self {
        Self { offset: 0, delay }
    }
}

impl Read for CountingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        for b in buf.iter_mut() {
            *b = counting_byte(self.offset);
            self.offset += 1;
        }
        Ok(buf.len())
    }
}

/// Random-data source (the `/dev/urandom` test setup) with a tap recording
/// everything it produced.
pub struct RandomSource {
    rng: StdRng,
    remaining: usize,
    tap: Arc<Mutex<Vec<u8>>>,
}

impl RandomSource {
    pub fn seeded(seed: u64, total: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            remaining: total,
            tap: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tap(&self) -> Arc<Mutex<Vec<u8>>> {
        self.tap.clone()
    }
}

impl Read for RandomSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining);
        if n == 0 {
            return Ok(0);
        }
        self.rng.fill_bytes(&mut buf[..n]);
        self.remaining -= n;
        self.tap.lock_or_recover("testing.random_source").extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Records systemctl invocations instead of running them.
#[derive(Clone, Default)]
pub struct RecordingSystemCtl {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    active_state: Arc<Mutex<String>>,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl RecordingSystemCtl {
    pub fn new(active_state: &str) -> Self {
        Self {
            active_state: Arc::new(Mutex::new(active_state.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock_or_recover("testing.systemctl.calls").clone()
    }

    pub fn set_active_state(&self, state: &str) {
        *self.active_state.lock_or_recover("testing.systemctl.state") = state.to_string();
    }

    /// The next invocation exits non-zero with `stderr`.
    pub fn fail_next(&self, stderr: &str) {
        *self.fail_next.lock_or_recover("testing.systemctl.fail") = Some(stderr.to_string());
    }
}

impl SystemCtl for RecordingSystemCtl {
    fn run(&self, args: &[&str]) -> Result<CtlOutput, ServiceError> {
        self.calls.lock_or_recover("testing.systemctl.record")
            .push(args.iter().map(|a| a.to_string()).collect());

        if let Some(stderr) = self.fail_next.lock_or_recover("testing.systemctl.fail").take() {
            return Ok(CtlOutput {
                success: false,
                stdout: String::new(),
                stderr,
            });
        }

        if args.first() == Some(&"is-active") {
            let state = self.active_state.lock_or_recover("testing.systemctl.state").clone();
            return Ok(CtlOutput {
                success: state == "active",
                stdout: state,
                stderr: String::new(),
            });
        }

        Ok(CtlOutput {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Creates a named pipe at `path`. With a writer attached and nothing written
/// it behaves like an idle trace pipe.
#[cfg(unix)]
pub fn make_fifo(path: &std::path::Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `c_path` is NUL-terminated and outlives the call.
    if unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_splits_data_across_reads() {
        let mut source = ScriptedSource::new(vec![ScriptStep::Data(b"abcdef".to_vec())]);
        let mut buf = [0u8; 4];

        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert_eq!(source.reads().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn counting_source_continues_across_reads() {
        let mut source = CountingSource::new(Duration::ZERO);
        let mut a = [0u8; 300];
        let mut b = [0u8; 10];
        source.read(&mut a).unwrap();
        source.read(&mut b).unwrap();

        let mut joined = a.to_vec();
        joined.extend_from_slice(&b);
        assert_eq!(joined, counting_bytes(310));
    }

    #[test]
    fn random_source_taps_output() {
        let mut source = RandomSource::seeded(7, 100);
        let tap = source.tap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();

        assert_eq!(out.len(), 100);
        assert_eq!(*tap.lock().unwrap(), out);
    }
}
