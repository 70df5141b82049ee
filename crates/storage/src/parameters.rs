//! Parameter groups taking part in an update.
//!
//! An update stacks the active entries of every group into one column per
//! realization:
//!
//! ```text
//!            iens 0   iens 1   ...
//! MULTFLT  [ F1       F1           ]   rows 0..3
//!          [ F2       F2           ]
//!          [ F3       F3           ]
//! OTHER    [ ...                   ]   rows 3..
//! ```

use enkf_foundation::ParameterKey;
use enkf_node::{ActiveList, AnyNode, EnkfNode};

/// One parameter group and the entries of it that are updated.
#[derive(Debug)]
pub struct Parameter {
    /// Node the realizations are allocated from.
    pub template: AnyNode,
    pub active: ActiveList,
}

impl Parameter {
    /// Every entry of `template` active.
    pub fn new(template: AnyNode) -> Self {
        Self {
            template,
            active: ActiveList::All,
        }
    }

    pub fn with_active(mut self, active: ActiveList) -> Self {
        self.active = active;
        self
    }

    pub fn key(&self) -> &ParameterKey {
        self.template.key()
    }

    /// Rows this group occupies in a column.
    pub fn rows(&self) -> usize {
        self.active.active_size(self.template.size())
    }
}

/// Total rows of a column stacking `parameters`.
pub fn row_count(parameters: &[Parameter]) -> usize {
    parameters.iter().map(Parameter::rows).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use enkf_node::{MultfltConfig, ParameterConfig, ParameterSpec, Prior};

    fn template(key: &str, size: usize) -> AnyNode {
        let params = (0..size)
            .map(|i| ParameterSpec::new(format!("F{i}"), Prior::Raw))
            .collect();
        let config: ParameterConfig = MultfltConfig::new(key, params).unwrap().shared().into();
        config.alloc().unwrap()
    }

    #[test]
    fn test_rows_follow_active_list() {
        let all = Parameter::new(template("MULTFLT", 4));
        let some =
            Parameter::new(template("OTHER", 5)).with_active(ActiveList::partial(vec![4, 1]));
        assert_eq!(all.rows(), 4);
        assert_eq!(some.rows(), 2);
        assert_eq!(some.key().as_str(), "OTHER");
        assert_eq!(row_count(&[all, some]), 6);
    }
}
