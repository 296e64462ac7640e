use pairtestor::logger::{Logger, STARTED_BANNER, STOPPED_BANNER};
use pairtestor::scheduler::{Progress, RunState, Scheduler, SchedulerOptions, StartRefusal};
use pairtestor::settings::{FileSettings, SharedSettings};
use pairtestor::unit_test::{Completion, Outcome, UnitId, UnitTest, UnitTestBase};
use pairtestor::view_model::{Role, TestsViewModel};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::time::Duration;
use tempfile::tempdir;

/// Writes a line to the run log and passes.
struct Loud {
    base: UnitTestBase,
    order: Rc<RefCell<Vec<UnitId>>>,
}

impl UnitTest for Loud {
    fn base(&self) -> &UnitTestBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut UnitTestBase {
        &mut self.base
    }

    fn start(&mut self, completion: Completion) {
        self.order.borrow_mut().push(self.base.id());
        self.base.log_line(&format!(
            "{} -> {}",
            self.base.src_port_name(),
            self.base.dst_port_name()
        ));
        completion.finish(Outcome::Passed);
    }
}

// 完整运行：通过列表模型启用测试，再按顺序执行
#[test]
fn test_checklist_driven_run() {
    let temp_dir = tempdir().unwrap();
    let settings: SharedSettings =
        Rc::new(FileSettings::open(temp_dir.path().join("settings.toml")).unwrap());
    let logger = Rc::new(Logger::new());
    let order = Rc::new(RefCell::new(Vec::new()));

    let tests: Vec<Box<dyn UnitTest>> = [UnitId::Info, UnitId::Transfer, UnitId::Signals]
        .into_iter()
        .map(|id| {
            Box::new(Loud {
                base: UnitTestBase::new(id, logger.clone(), settings.clone()),
                order: order.clone(),
            }) as Box<dyn UnitTest>
        })
        .collect();
    let mut scheduler = Scheduler::new(
        tests,
        logger,
        settings.clone(),
        SchedulerOptions {
            start_delay: Duration::from_millis(5),
            app_dir: temp_dir.path().to_path_buf(),
        },
    );

    assert_eq!(
        scheduler.request_start("COM1", "COM2"),
        Err(StartRefusal::NoEnabledTests)
    );

    {
        let mut model = TestsViewModel::new(scheduler.tests());
        assert!(model.set_data(model.index(1), true, Role::CheckState).unwrap());
        assert!(model.set_data(model.index(2), true, Role::CheckState).unwrap());
    }

    scheduler.request_start("COM1", "COM2").unwrap();
    assert_eq!(scheduler.state(), RunState::Running);
    scheduler.run_until_idle();

    assert_eq!(*order.borrow(), vec![UnitId::Transfer, UnitId::Signals]);
    assert_eq!(scheduler.progress(), Progress { value: 2, maximum: 2 });
    assert_eq!(scheduler.state(), RunState::Idle);
    assert_eq!(scheduler.cursor(), 0);
    assert!(scheduler.summary().all_passed());

    let log = fs::read_to_string(temp_dir.path().join("pairtestor.log")).unwrap();
    assert_eq!(log.matches(STARTED_BANNER).count(), 1);
    assert_eq!(log.matches(STOPPED_BANNER).count(), 1);
    assert_eq!(log.matches("COM1 -> COM2").count(), 2);
    let transfer = log.find("Transfer: COM1").unwrap();
    let signals = log.find("Signals: COM1").unwrap();
    assert!(log.find(STARTED_BANNER).unwrap() < transfer);
    assert!(transfer < signals);
    assert!(signals < log.find(STOPPED_BANNER).unwrap());

    // the enable flags outlive the store instance
    let reopened = FileSettings::open(temp_dir.path().join("settings.toml")).unwrap();
    let base = UnitTestBase::new(UnitId::Signals, Rc::new(Logger::new()), Rc::new(reopened));
    assert!(base.is_enabled());
}
