//! 硬件单元测试
//!
//! A "unit test" here is a hardware exercise for a pair of serial ports, not a
//! `#[test]` function. Every unit shares [`UnitTestBase`] for its identity,
//! its persisted enable flag and the port pair of the current run, and
//! implements [`UnitTest::start`] to do the actual work.

use crate::config::runner_config::TransferConfig;
use crate::logger::Logger;
use crate::settings::{self, SharedSettings};
use anyhow::Result;
use log::{debug, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::rc::Rc;
use strum::{EnumIter, IntoEnumIterator};

mod info;
mod signals;
mod transfer;

pub use info::InfoUnitTest;
pub use signals::SignalsUnitTest;
pub use transfer::TransferUnitTest;

/// Known unit test kinds. The numeric value is what the settings keys and the
/// runner config refer to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum UnitId {
    Info = 0,
    Transfer = 1,
    Signals = 2,
}

impl UnitId {
    pub fn name(self) -> &'static str {
        match self {
            UnitId::Info => "Info",
            UnitId::Transfer => "Transfer",
            UnitId::Signals => "Signals",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UnitId::Info => "Show enumeration details of both ports and check they can be opened",
            UnitId::Transfer => "Send a byte pattern from source to destination at several baud rates",
            UnitId::Signals => "Check RTS/CTS and DTR/DSR wiring of a null-modem pair",
        }
    }

    /// Settings key holding the enable flag of this unit.
    pub fn enable_key(self) -> String {
        format!("{}/enable", u8::from(self))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a unit test reports when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => f.write_str("PASSED"),
            Outcome::Failed(reason) => write!(f, "FAILED: {reason}"),
        }
    }
}

/// Completion event delivered to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFinished {
    /// Run the event belongs to.
    pub run: u64,
    /// Position of the test in the scheduler's list.
    pub index: usize,
    pub id: UnitId,
    pub outcome: Outcome,
}

/// 完成通知句柄
///
/// Handed to [`UnitTest::start`]. Consuming it with [`Completion::finish`]
/// reports the outcome; dropping it unfinished reports a failure, so each
/// `start()` yields exactly one event.
pub struct Completion {
    run: u64,
    index: usize,
    id: UnitId,
    tx: Option<flume::Sender<TestFinished>>,
}

impl Completion {
    pub fn new(run: u64, index: usize, id: UnitId, tx: flume::Sender<TestFinished>) -> Self {
        Self {
            run,
            index,
            id,
            tx: Some(tx),
        }
    }

    pub fn finish(mut self, outcome: Outcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            let event = TestFinished {
                run: self.run,
                index: self.index,
                id: self.id,
                outcome,
            };
            // the receiver only goes away together with the scheduler
            if tx.send(event).is_err() {
                debug!("Scheduler gone, dropping completion of {}", self.id);
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!("Unit test {} finished without reporting an outcome", self.id);
            self.send(Outcome::Failed("no outcome reported".to_string()));
        }
    }
}

/// Shared state of every unit test.
pub struct UnitTestBase {
    id: UnitId,
    logger: Rc<Logger>,
    settings: SharedSettings,
    src_port_name: String,
    dst_port_name: String,
}

impl UnitTestBase {
    pub fn new(id: UnitId, logger: Rc<Logger>, settings: SharedSettings) -> Self {
        Self {
            id,
            logger,
            settings,
            src_port_name: String::new(),
            dst_port_name: String::new(),
        }
    }

    /// 设置本次运行的串口对
    pub fn set_pair(&mut self, src: &str, dst: &str) {
        self.src_port_name = src.to_string();
        self.dst_port_name = dst.to_string();
    }

    pub fn set_enable(&self, enable: bool) -> Result<()> {
        self.settings.set_value(&self.id.enable_key(), enable.into())
    }

    /// Always read back from the settings store.
    pub fn is_enabled(&self) -> bool {
        settings::bool_value(&*self.settings, &self.id.enable_key())
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn description(&self) -> &'static str {
        self.id.description()
    }

    pub fn src_port_name(&self) -> &str {
        &self.src_port_name
    }

    pub fn dst_port_name(&self) -> &str {
        &self.dst_port_name
    }

    /// Appends one timestamped line tagged with the unit name to the run log.
    pub fn log_line(&self, line: &str) {
        self.logger.add_content(
            &format!("[{}] {}: {line}\n", crate::utils::timestamp(), self.name()),
            false,
        );
    }
}

/// 单元测试特质
pub trait UnitTest {
    fn base(&self) -> &UnitTestBase;

    fn base_mut(&mut self) -> &mut UnitTestBase;

    /// Runs the test against the pair set with [`UnitTestBase::set_pair`] and
    /// reports through `completion`. Findings go to the run log before the
    /// outcome is reported.
    fn start(&mut self, completion: Completion);

    fn id(&self) -> UnitId {
        self.base().id()
    }

    fn name(&self) -> &'static str {
        self.base().name()
    }

    fn description(&self) -> &'static str {
        self.base().description()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    fn set_enable(&self, enable: bool) -> Result<()> {
        self.base().set_enable(enable)
    }

    fn set_pair(&mut self, src: &str, dst: &str) {
        self.base_mut().set_pair(src, dst)
    }
}

/// Everything a unit test needs at construction.
#[derive(Clone)]
pub struct UnitContext {
    pub logger: Rc<Logger>,
    pub settings: SharedSettings,
    pub transfer: TransferConfig,
}

/// 单元测试工厂
pub struct UnitTestFactory;

impl UnitTestFactory {
    pub fn create(id: UnitId, context: &UnitContext) -> Box<dyn UnitTest> {
        let base = UnitTestBase::new(id, context.logger.clone(), context.settings.clone());
        match id {
            UnitId::Info => Box::new(InfoUnitTest::new(base)),
            UnitId::Transfer => Box::new(TransferUnitTest::new(base, context.transfer.clone())),
            UnitId::Signals => Box::new(SignalsUnitTest::new(base)),
        }
    }

    /// `None` for ids no unit is registered under.
    pub fn create_from_raw(raw: u8, context: &UnitContext) -> Option<Box<dyn UnitTest>> {
        UnitId::try_from(raw)
            .ok()
            .map(|id| Self::create(id, context))
    }

    /// Builds the list for `raw_ids`, skipping unknown ids.
    pub fn create_list(raw_ids: &[u8], context: &UnitContext) -> Vec<Box<dyn UnitTest>> {
        raw_ids
            .iter()
            .filter_map(|&raw| {
                let test = Self::create_from_raw(raw, context);
                if test.is_none() {
                    warn!("Skipping unknown unit test id {raw}");
                }
                test
            })
            .collect()
    }

    pub fn create_all(context: &UnitContext) -> Vec<Box<dyn UnitTest>> {
        UnitId::iter().map(|id| Self::create(id, context)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemorySettings, MockSettingsStore, SettingValue};

    fn context() -> UnitContext {
        UnitContext {
            logger: Rc::new(Logger::new()),
            settings: Rc::new(MemorySettings::new()),
            transfer: TransferConfig::default(),
        }
    }

    #[test]
    fn enable_flag_round_trips_through_storage() {
        let ctx = context();
        for test in UnitTestFactory::create_all(&ctx) {
            assert!(!test.is_enabled());
            test.set_enable(true).unwrap();
            assert!(test.is_enabled());
            test.set_enable(false).unwrap();
            assert!(!test.is_enabled());
        }
    }

    #[test]
    fn enable_flag_is_not_cached() {
        let ctx = context();
        let test = UnitTestFactory::create(UnitId::Transfer, &ctx);
        ctx.settings.set_value("1/enable", true.into()).unwrap();
        assert!(test.is_enabled());
        ctx.settings.set_value("1/enable", false.into()).unwrap();
        assert!(!test.is_enabled());
    }

    #[test]
    fn set_enable_writes_numeric_key() {
        let mut store = MockSettingsStore::new();
        store
            .expect_set_value()
            .withf(|key, value| key == "2/enable" && *value == SettingValue::Bool(true))
            .times(1)
            .returning(|_, _| Ok(()));
        let base = UnitTestBase::new(UnitId::Signals, Rc::new(Logger::new()), Rc::new(store));
        base.set_enable(true).unwrap();
    }

    #[test]
    fn unknown_raw_id_yields_nothing() {
        let ctx = context();
        assert!(UnitTestFactory::create_from_raw(0, &ctx).is_some());
        assert!(UnitTestFactory::create_from_raw(42, &ctx).is_none());

        let list = UnitTestFactory::create_list(&[2, 42, 0], &ctx);
        let ids: Vec<UnitId> = list.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![UnitId::Signals, UnitId::Info]);
    }

    #[test]
    fn dropped_completion_reports_failure() {
        let (tx, rx) = flume::unbounded();
        drop(Completion::new(3, 1, UnitId::Transfer, tx.clone()));
        Completion::new(3, 2, UnitId::Signals, tx).finish(Outcome::Passed);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.index, 1);
        assert!(first.outcome.is_failure());
        let second = rx.try_recv().unwrap();
        assert_eq!(second.outcome, Outcome::Passed);
        assert!(rx.try_recv().is_err());
    }
}
