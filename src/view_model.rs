//! Checkable list model over the unit tests.
//!
//! Rows map positionally onto the scheduler's test list. The check state of a
//! row is the test's persisted enable flag.

use crate::unit_test::UnitTest;
use anyhow::Result;

/// Row position, or invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelIndex {
    row: Option<usize>,
}

impl ModelIndex {
    pub fn new(row: usize) -> Self {
        Self { row: Some(row) }
    }

    pub fn invalid() -> Self {
        Self { row: None }
    }

    pub fn is_valid(&self) -> bool {
        self.row.is_some()
    }

    pub fn row(&self) -> Option<usize> {
        self.row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Display,
    CheckState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Unchecked,
}

impl From<bool> for CheckState {
    fn from(value: bool) -> Self {
        if value {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelData {
    Text(String),
    Check(CheckState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    pub enabled: bool,
    pub checkable: bool,
    pub selectable: bool,
}

type DataChangedListener<'a> = Box<dyn FnMut(ModelIndex, ModelIndex) + 'a>;

/// 测试列表视图模型
pub struct TestsViewModel<'a> {
    tests: &'a [Box<dyn UnitTest>],
    listeners: Vec<DataChangedListener<'a>>,
}

impl<'a> TestsViewModel<'a> {
    pub fn new(tests: &'a [Box<dyn UnitTest>]) -> Self {
        Self {
            tests,
            listeners: Vec::new(),
        }
    }

    /// Registers an observer called with `(top_left, bottom_right)` after a
    /// row changed.
    pub fn on_data_changed<F>(&mut self, listener: F)
    where
        F: FnMut(ModelIndex, ModelIndex) + 'a,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn row_count(&self) -> usize {
        self.tests.len()
    }

    pub fn index(&self, row: usize) -> ModelIndex {
        if row < self.tests.len() {
            ModelIndex::new(row)
        } else {
            ModelIndex::invalid()
        }
    }

    fn test_at(&self, index: ModelIndex) -> Option<&'a dyn UnitTest> {
        index
            .row()
            .and_then(|row| self.tests.get(row))
            .map(|test| test.as_ref())
    }

    pub fn data(&self, index: ModelIndex, role: Role) -> Option<ModelData> {
        let test = self.test_at(index)?;
        Some(match role {
            Role::Display => ModelData::Text(test.name().to_string()),
            Role::CheckState => ModelData::Check(test.is_enabled().into()),
        })
    }

    /// The list has no header.
    pub fn header_data(&self, _section: usize, _role: Role) -> Option<ModelData> {
        None
    }

    pub fn flags(&self, index: ModelIndex) -> ItemFlags {
        let valid = index.is_valid();
        ItemFlags {
            enabled: true,
            checkable: valid,
            selectable: valid,
        }
    }

    /// Updates the enable flag of the row at `index`. Returns whether
    /// anything changed; observers hear about the row only in that case.
    pub fn set_data(&mut self, index: ModelIndex, value: bool, role: Role) -> Result<bool> {
        if role != Role::CheckState {
            return Ok(false);
        }
        let Some(test) = self.test_at(index) else {
            return Ok(false);
        };
        if test.is_enabled() == value {
            return Ok(false);
        }
        test.set_enable(value)?;
        for listener in self.listeners.iter_mut() {
            listener(index, index);
        }
        Ok(true)
    }
}
