//! 测试日志文件
//!
//! The run log written by the scheduler and by every unit test. The file is
//! opened and closed on each write so no handle is held between tests.

use log::debug;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Banner written when a run starts.
pub const STARTED_BANNER: &str = "\n*** S T A R T E D ***\n";
/// Banner written when a run stops.
pub const STOPPED_BANNER: &str = "\n*** S T O P P E D ***\n";

#[derive(Debug, Default)]
pub struct Logger {
    file_name: RefCell<PathBuf>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置日志文件路径
    pub fn set_file_name<P: AsRef<Path>>(&self, name: P) {
        *self.file_name.borrow_mut() = name.as_ref().to_path_buf();
    }

    pub fn file_name(&self) -> PathBuf {
        self.file_name.borrow().clone()
    }

    /// Writes `content` to the log file, truncating it first when `clear_all`
    /// is set and appending otherwise.
    ///
    /// Failures are swallowed: a log that cannot be opened loses the content.
    pub fn add_content(&self, content: &str, clear_all: bool) {
        let path = self.file_name.borrow();
        let mut options = OpenOptions::new();
        options.create(true);
        if clear_all {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        let mut file = match options.open(&*path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Unable to open log file {}: {e}", path.display());
                return;
            }
        };
        if let Err(e) = file.write_all(content.as_bytes()) {
            debug!("Unable to write log file {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn appends_unless_cleared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        let logger = Logger::new();
        logger.set_file_name(&path);

        logger.add_content("one\n", false);
        logger.add_content("two\n", false);
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");

        logger.add_content(STARTED_BANNER, true);
        assert_eq!(fs::read_to_string(&path).unwrap(), STARTED_BANNER);
    }

    #[test]
    fn unopenable_file_is_silently_ignored() {
        let dir = tempdir().unwrap();
        let logger = Logger::new();
        // a directory cannot be opened for writing
        logger.set_file_name(dir.path());
        logger.add_content("lost", false);
        logger.add_content("lost", true);
        assert!(dir.path().is_dir());
    }
}
