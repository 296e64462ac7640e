use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use pairtestor::config::{CliArgs, RunnerConfig};
use pairtestor::logger::Logger;
use pairtestor::ports;
use pairtestor::scheduler::{Scheduler, SchedulerOptions};
use pairtestor::settings::{self, FileSettings, SettingsStore, SharedSettings};
use pairtestor::unit_test::{UnitContext, UnitTestFactory};
use pairtestor::view_model::{CheckState, ModelData, Role, TestsViewModel};
use std::process::ExitCode;
use std::rc::Rc;

fn main() -> ExitCode {
    let args = CliArgs::parse_args();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.get_log_level()),
    )
    .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when a run had failed unit tests.
fn run(args: &CliArgs) -> Result<bool> {
    let config = match &args.config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    debug!("Runner config: {config:?}");

    let store = FileSettings::open(&args.settings)?;
    debug!("Settings file: {}", store.path().display());
    let settings: SharedSettings = Rc::new(store);
    apply_run_options(args, &*settings)?;

    if args.ports {
        for name in ports::pair_candidates() {
            let line = ports::find_port(&name)
                .map(|info| ports::describe(&info))
                .unwrap_or(name);
            println!("{line}");
        }
    }

    let logger = Rc::new(Logger::new());
    let context = UnitContext {
        logger: logger.clone(),
        settings: settings.clone(),
        transfer: config.transfer.clone(),
    };
    let tests = UnitTestFactory::create_list(&config.tests, &context);
    let mut scheduler = Scheduler::new(
        tests,
        logger,
        settings,
        SchedulerOptions {
            start_delay: config.start_delay,
            app_dir: config.app_dir(),
        },
    );

    update_checklist(args, &scheduler)?;

    if !args.run {
        return Ok(true);
    }
    let Some((src, dst)) = args.get_pair() else {
        return Ok(true);
    };
    for name in [src, dst] {
        if ports::find_port(name).is_none() {
            warn!("Port {name} is not among the available serial ports");
        }
    }

    scheduler.on_progress(|p| info!("Progress {}/{}", p.value, p.maximum));
    if let Err(refusal) = scheduler.request_start(src, dst) {
        warn!("Run not started: {refusal}");
        return Ok(true);
    }
    scheduler.run_until_idle();

    let summary = scheduler.summary();
    for result in &summary.results {
        println!("{:<10} {}", result.id.name(), result.outcome);
    }
    println!("Log written to {}", scheduler.log_file().display());
    Ok(summary.all_passed())
}

/// Persists the option flags given on the command line.
fn apply_run_options(args: &CliArgs, store: &dyn SettingsStore) -> Result<()> {
    if let Some(name) = &args.log_file {
        store.set_value(settings::LOG_FILE_NAME_KEY, name.as_str().into())?;
    }
    if let Some(clear) = args.clear_log_on_start {
        store.set_value(settings::CLEAR_LOG_ON_START_KEY, clear.into())?;
    }
    if let Some(brk) = args.break_on_error {
        store.set_value(settings::BREAK_ON_ERROR_KEY, brk.into())?;
    }
    Ok(())
}

/// Applies `--enable`/`--disable` through the list model and prints it for
/// `--list`.
fn update_checklist(args: &CliArgs, scheduler: &Scheduler) -> Result<()> {
    let mut model = TestsViewModel::new(scheduler.tests());
    model.on_data_changed(|index, _| debug!("Checklist row {:?} changed", index.row()));

    let changes = args
        .enable
        .iter()
        .map(|&id| (id, true))
        .chain(args.disable.iter().map(|&id| (id, false)));
    for (raw, enable) in changes {
        let row = scheduler.tests().iter().position(|t| u8::from(t.id()) == raw);
        match row {
            Some(row) => {
                if model.set_data(model.index(row), enable, Role::CheckState)? {
                    info!(
                        "{} {}",
                        if enable { "Enabled" } else { "Disabled" },
                        scheduler.tests()[row].name()
                    );
                }
            }
            None => warn!("No unit test with id {raw}"),
        }
    }

    if args.list {
        for row in 0..model.row_count() {
            let index = model.index(row);
            let checked = matches!(
                model.data(index, Role::CheckState),
                Some(ModelData::Check(CheckState::Checked))
            );
            let name = match model.data(index, Role::Display) {
                Some(ModelData::Text(name)) => name,
                _ => continue,
            };
            let test = &scheduler.tests()[row];
            println!(
                "[{}] {} {:<10} {}",
                if checked { "x" } else { " " },
                u8::from(test.id()),
                name,
                test.description()
            );
        }
    }
    Ok(())
}
