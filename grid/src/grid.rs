use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConfigMap, Error};

/// One entry of `test_config`: parameter names mapped to candidate values,
/// kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisGroup {
    axes: Vec<(String, Vec<Value>)>,
}

impl AxisGroup {
    /// Build a group from a JSON object. Every value must be a list.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let mut axes = Vec::with_capacity(map.len());
        for (name, values) in map {
            match values {
                Value::Array(values) => axes.push((name, values)),
                other => return Err(Error::AxisNotList(name, other.to_string()).into()),
            }
        }
        Ok(Self { axes })
    }

    /// Parameter names and their candidate values, in declaration order.
    pub fn axes(&self) -> &[(String, Vec<Value>)] {
        &self.axes
    }

    /// Number of configurations this group expands to.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push the Cartesian product of this group's axes onto `out`.
    /// The rightmost axis varies fastest.
    pub fn expand_into(&self, out: &mut Vec<ConfigMap>) {
        if self.is_empty() {
            return;
        }
        let mut indices = vec![0usize; self.axes.len()];
        loop {
            let config = self
                .axes
                .iter()
                .zip(&indices)
                .map(|((name, values), &i)| (name.clone(), values[i].clone()))
                .collect();
            out.push(config);

            // advance the odometer:
            let mut axis = self.axes.len();
            loop {
                if axis == 0 {
                    return;
                }
                axis -= 1;
                indices[axis] += 1;
                if indices[axis] < self.axes[axis].1.len() {
                    break;
                }
                indices[axis] = 0;
            }
        }
    }
}

/// The full `test_config`: a list of axis groups.
/// Groups are expanded independently and concatenated, never crossed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    groups: Vec<AxisGroup>,
}

impl Default for GridSpec {
    /// No grid means exactly one configuration with no overrides.
    fn default() -> Self {
        Self {
            groups: vec![AxisGroup::default()],
        }
    }
}

impl GridSpec {
    pub fn from_maps(maps: Vec<Map<String, Value>>) -> Result<Self> {
        let groups = maps
            .into_iter()
            .map(AxisGroup::from_map)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[AxisGroup] {
        &self.groups
    }

    /// Total number of configurations across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(AxisGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand every group in declaration order.
    pub fn expand(&self) -> Vec<ConfigMap> {
        let mut out = Vec::with_capacity(self.len());
        for group in &self.groups {
            group.expand_into(&mut out);
        }
        out
    }
}
