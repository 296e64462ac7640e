//! Data transfer unit test.
//!
//! Writes a byte pattern on the source port and expects to read the same bytes
//! on the destination port, once per configured baud rate.

use crate::config::runner_config::TransferConfig;
use crate::ports;
use crate::unit_test::{Completion, Outcome, UnitTest, UnitTestBase};
use anyhow::{Result, bail};
use log::{debug, info};
use mio_serial::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Per-read timeout of the destination port; the overall limit is
/// `TransferConfig::timeout`, enforced by [`read_exact_within`].
const READ_POLL: Duration = Duration::from_millis(50);

pub struct TransferUnitTest {
    base: UnitTestBase,
    config: TransferConfig,
}

impl TransferUnitTest {
    pub fn new(base: UnitTestBase, config: TransferConfig) -> Self {
        Self { base, config }
    }

    fn transfer_at(&self, baud_rate: u32) -> Result<()> {
        let mut src = ports::open_port(self.base.src_port_name(), baud_rate, self.config.timeout)?;
        let mut dst = ports::open_port(self.base.dst_port_name(), baud_rate, READ_POLL)?;
        let pair = [
            (self.base.src_port_name(), &src),
            (self.base.dst_port_name(), &dst),
        ];
        for (name, port) in pair {
            if let Err(e) = port.clear(ClearBuffer::All) {
                debug!("Clearing buffers of {name} failed: {e}");
            }
        }

        let sent = pattern(self.config.payload_len, baud_rate);
        src.write_all(&sent)?;
        src.flush()?;

        let received = read_exact_within(&mut *dst, sent.len(), self.config.timeout)?;
        compare(&sent, &received)
    }
}

impl UnitTest for TransferUnitTest {
    fn base(&self) -> &UnitTestBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut UnitTestBase {
        &mut self.base
    }

    fn start(&mut self, completion: Completion) {
        info!(
            "Transfer: {} -> {} at {:?}",
            self.base.src_port_name(),
            self.base.dst_port_name(),
            self.config.baud_rates
        );
        let mut failed = Vec::new();
        for &baud_rate in &self.config.baud_rates {
            match self.transfer_at(baud_rate) {
                Ok(()) => self.base.log_line(&format!("{baud_rate} baud: ok")),
                Err(e) => {
                    self.base.log_line(&format!("{baud_rate} baud: {e:#}"));
                    failed.push(baud_rate.to_string());
                }
            }
        }

        let outcome = if self.config.baud_rates.is_empty() {
            Outcome::Failed("no baud rates configured".to_string())
        } else if failed.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed(format!("failed at {} baud", failed.join(", ")))
        };
        self.base.log_line(&outcome.to_string());
        completion.finish(outcome);
    }
}

/// Deterministic payload; varies with the baud rate so a stale buffer from a
/// previous rate cannot pass.
fn pattern(len: usize, baud_rate: u32) -> Vec<u8> {
    let seed = (baud_rate % 251) as usize;
    (0..len).map(|i| ((i + seed) % 256) as u8).collect()
}

/// Reads `len` bytes, giving up once `timeout` has passed since the call.
/// Individual reads are expected to return (or time out) well within it.
fn read_exact_within<R: Read + ?Sized>(
    port: &mut R,
    len: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let start = Instant::now();
    let mut received = Vec::with_capacity(len);
    let mut buf = [0u8; 256];
    while received.len() < len {
        if start.elapsed() >= timeout {
            bail!("timeout: received {} of {len} bytes", received.len());
        }
        match port.read(&mut buf) {
            Ok(0) => thread::sleep(Duration::from_millis(10)),
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => return Err(e.into()),
        }
    }
    received.truncate(len);
    Ok(received)
}

fn compare(sent: &[u8], received: &[u8]) -> Result<()> {
    if sent.len() != received.len() {
        bail!("length mismatch: sent {} received {}", sent.len(), received.len());
    }
    if let Some(pos) = sent.iter().zip(received).position(|(a, b)| a != b) {
        bail!(
            "data mismatch at byte {pos}: sent {:#04x} received {:#04x}",
            sent[pos],
            received[pos]
        );
    }
    Ok(())
}
