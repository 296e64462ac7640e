//! Modem control lines unit test for null-modem wired pairs: RTS drives the
//! peer's CTS and DTR drives the peer's DSR.

use crate::ports;
use crate::unit_test::{Completion, Outcome, UnitTest, UnitTestBase};
use anyhow::Result;
use log::info;
use mio_serial::SerialPort;
use std::thread;
use std::time::Duration;

/// Time the lines get to settle after a change.
const SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
enum Line {
    RtsCts,
    DtrDsr,
}

impl Line {
    fn label(self) -> &'static str {
        match self {
            Line::RtsCts => "RTS->CTS",
            Line::DtrDsr => "DTR->DSR",
        }
    }

    fn drive(self, port: &mut dyn SerialPort, level: bool) -> Result<()> {
        match self {
            Line::RtsCts => port.write_request_to_send(level)?,
            Line::DtrDsr => port.write_data_terminal_ready(level)?,
        }
        Ok(())
    }

    fn sense(self, port: &mut dyn SerialPort) -> Result<bool> {
        Ok(match self {
            Line::RtsCts => port.read_clear_to_send()?,
            Line::DtrDsr => port.read_data_set_ready()?,
        })
    }
}

pub struct SignalsUnitTest {
    base: UnitTestBase,
}

impl SignalsUnitTest {
    pub fn new(base: UnitTestBase) -> Self {
        Self { base }
    }

    /// Returns the mismatching line/level combinations.
    fn check(&self) -> Result<Vec<String>> {
        let timeout = Duration::from_millis(500);
        let mut src = ports::open_port(self.base.src_port_name(), 9600, timeout)?;
        let mut dst = ports::open_port(self.base.dst_port_name(), 9600, timeout)?;

        let mut mismatches = Vec::new();
        for line in [Line::RtsCts, Line::DtrDsr] {
            for level in [true, false] {
                line.drive(&mut *src, level)?;
                thread::sleep(SETTLE);
                let seen = line.sense(&mut *dst)?;
                self.base
                    .log_line(&format!("{} set {level} read {seen}", line.label()));
                if seen != level {
                    mismatches.push(format!("{} {level}", line.label()));
                }
            }
        }
        Ok(mismatches)
    }
}

impl UnitTest for SignalsUnitTest {
    fn base(&self) -> &UnitTestBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut UnitTestBase {
        &mut self.base
    }

    fn start(&mut self, completion: Completion) {
        info!(
            "Signals: {} -> {}",
            self.base.src_port_name(),
            self.base.dst_port_name()
        );
        let outcome = match self.check() {
            Ok(mismatches) if mismatches.is_empty() => Outcome::Passed,
            Ok(mismatches) => Outcome::Failed(format!("mismatch on {}", mismatches.join(", "))),
            Err(e) => Outcome::Failed(format!("{e:#}")),
        };
        self.base.log_line(&outcome.to_string());
        completion.finish(outcome);
    }
}
