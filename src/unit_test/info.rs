//! Port information unit test.

use crate::ports;
use crate::unit_test::{Completion, Outcome, UnitTest, UnitTestBase};
use log::info;
use std::time::Duration;

pub struct InfoUnitTest {
    base: UnitTestBase,
}

impl InfoUnitTest {
    pub fn new(base: UnitTestBase) -> Self {
        Self { base }
    }

    /// Logs what is known about `name`; returns a failure reason if the port
    /// is missing or cannot be opened.
    fn inspect(&self, role: &str, name: &str) -> Option<String> {
        match ports::find_port(name) {
            Some(port_info) => self
                .base
                .log_line(&format!("{role} {}", ports::describe(&port_info))),
            None => {
                self.base.log_line(&format!("{role} {name} not found"));
                return Some(format!("{role} port {name} not found"));
            }
        }

        match ports::open_port(name, 9600, Duration::from_millis(500)) {
            Ok(port) => {
                let settings = format!(
                    "{role} {name} opened: baud={} data_bits={:?} parity={:?} stop_bits={:?} flow={:?}",
                    port.baud_rate().map(|b| b.to_string()).unwrap_or_else(|_| "?".into()),
                    port.data_bits().ok(),
                    port.parity().ok(),
                    port.stop_bits().ok(),
                    port.flow_control().ok(),
                );
                self.base.log_line(&settings);
                None
            }
            Err(e) => {
                self.base.log_line(&format!("{role} {name} open failed: {e:#}"));
                Some(format!("{role} port {name} cannot be opened"))
            }
        }
    }
}

impl UnitTest for InfoUnitTest {
    fn base(&self) -> &UnitTestBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut UnitTestBase {
        &mut self.base
    }

    fn start(&mut self, completion: Completion) {
        info!(
            "Info: {} -> {}",
            self.base.src_port_name(),
            self.base.dst_port_name()
        );
        let failures: Vec<String> = [
            ("source", self.base.src_port_name().to_string()),
            ("destination", self.base.dst_port_name().to_string()),
        ]
        .iter()
        .filter_map(|(role, name)| self.inspect(role, name))
        .collect();

        let outcome = if failures.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed(failures.join("; "))
        };
        self.base.log_line(&outcome.to_string());
        completion.finish(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;
    use crate::settings::MemorySettings;
    use crate::unit_test::UnitId;
    use std::fs;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[test]
    fn missing_ports_fail_and_are_logged() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("info.log");
        let logger = Rc::new(Logger::new());
        logger.set_file_name(&log_path);

        let base = UnitTestBase::new(UnitId::Info, logger, Rc::new(MemorySettings::new()));
        let mut test = InfoUnitTest::new(base);
        test.set_pair("/dev/pairtestor-missing-a", "/dev/pairtestor-missing-b");

        let (tx, rx) = flume::unbounded();
        test.start(Completion::new(1, 0, UnitId::Info, tx));

        let event = rx.try_recv().unwrap();
        assert!(event.outcome.is_failure());
        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("/dev/pairtestor-missing-a not found"));
        assert!(log.contains("/dev/pairtestor-missing-b not found"));
    }
}
