//! Deterministic string forms of a configuration, e.g. "lr-0.1,method-GAN,".

use std::borrow::Cow;

use serde_json::Value;

use crate::{AxisGroup, ConfigMap, SchedulerSettings};

const PATH_SEPARATORS: [char; 2] = ['/', '\\'];

/// Strings render bare; everything else renders as compact JSON.
pub fn render_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

impl SchedulerSettings {
    /// Render `config` as `key<indicator>value<separator>...`, sorted by key.
    ///
    /// The unfiltered form labels log lines. The filtered form names folders:
    /// ignored keys are dropped, values are cut to `config_string_value_maxlen`
    /// characters, and ignored characters and path separators are stripped
    /// from the result.
    pub fn test_config_string(&self, config: &ConfigMap, filtered: bool) -> String {
        let mut buf = String::with_capacity(64);
        self.push_test_config_string(config, filtered, &mut buf);
        buf
    }

    fn push_test_config_string(&self, config: &ConfigMap, filtered: bool, buf: &mut String) {
        for (key, value) in config {
            if filtered && self.ignored_keys_for_folder_name.contains(key) {
                continue;
            }
            buf.push_str(key);
            buf.push_str(&self.test_config_string_indicator);
            let value = render_value(value);
            if filtered {
                buf.extend(value.chars().take(self.config_string_value_maxlen));
            } else {
                buf.push_str(&value);
            }
            buf.push_str(&self.test_config_string_separator);
        }
        if filtered {
            for ignored in &self.ignored_characters_for_folder_name {
                if !ignored.is_empty() && buf.contains(ignored.as_str()) {
                    *buf = buf.replace(ignored.as_str(), "");
                }
            }
            // the folder name must stay a single path component:
            buf.retain(|c| !PATH_SEPARATORS.contains(&c));
        }
    }

    /// One-line summary of a whole grid: each group's value lists, sorted by
    /// key, with the instance separator after every group.
    pub fn grid_summary_string(&self, groups: &[AxisGroup]) -> String {
        let mut buf = String::with_capacity(128);
        for group in groups {
            let mut axes: Vec<_> = group.axes().iter().collect();
            axes.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, values) in axes {
                buf.push_str(key);
                buf.push_str(&self.test_config_string_indicator);
                buf.push_str(&Value::Array(values.clone()).to_string());
                buf.push_str(&self.test_config_string_separator);
            }
            buf.push_str(&self.test_config_string_inst_separator);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GridSpec, RawSchedulerSettings};
    use serde_json::json;

    fn settings(extra: Value) -> (SchedulerSettings, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut value = json!({"gpu": ["0"], "temp_folder": dir.path()});
        if let (Value::Object(base), Value::Object(extra)) = (&mut value, extra) {
            base.extend(extra);
        }
        let raw: RawSchedulerSettings = serde_json::from_value(value).unwrap();
        (raw.try_into().unwrap(), dir)
    }

    fn config(value: Value) -> ConfigMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sorted_by_key() {
        let (s, _dir) = settings(json!({}));
        let c = config(json!({"b": 2, "a": 1}));
        assert_eq!(s.test_config_string(&c, false), "a-1,b-2,");
        assert_eq!(s.test_config_string(&c, true), "a-1,b-2,");
    }

    #[test]
    fn test_strings_render_bare() {
        let (s, _dir) = settings(json!({}));
        let c = config(json!({"method": "GAN", "lr": 0.5, "flag": true}));
        assert_eq!(s.test_config_string(&c, false), "flag-true,lr-0.5,method-GAN,");
    }

    #[test]
    fn test_filtered_drops_ignored_keys() {
        let (s, _dir) = settings(json!({"ignored_keys_for_folder_name": ["a"]}));
        let c = config(json!({"a": 1, "b": 2}));
        assert_eq!(s.test_config_string(&c, true), "b-2,");
        assert_eq!(s.test_config_string(&c, false), "a-1,b-2,");
    }

    #[test]
    fn test_filtered_strips_ignored_characters() {
        let (s, _dir) = settings(json!({"ignored_characters_for_folder_name": [" "]}));
        let c = config(json!({"name": "a b c"}));
        assert_eq!(s.test_config_string(&c, true), "name-abc,");
        assert_eq!(s.test_config_string(&c, false), "name-a b c,");
    }

    #[test]
    fn test_default_ignored_characters_strip_brackets() {
        let (s, _dir) = settings(json!({}));
        let c = config(json!({"layers": [64, 64]}));
        assert_eq!(s.test_config_string(&c, true), "layers-64,64,");
    }

    #[test]
    fn test_filtered_truncates_values() {
        let (s, _dir) = settings(json!({"config_string_value_maxlen": 2}));
        let c = config(json!({"greeting": "hello"}));
        assert_eq!(s.test_config_string(&c, true), "greeting-he,");
        assert_eq!(s.test_config_string(&c, false), "greeting-hello,");
    }

    #[test]
    fn test_truncation_counts_chars() {
        let (s, _dir) = settings(json!({"config_string_value_maxlen": 3}));
        let c = config(json!({"k": "ééééé"}));
        assert_eq!(s.test_config_string(&c, true), "k-ééé,");
    }

    #[test]
    fn test_filtered_strips_path_separators() {
        let (s, _dir) = settings(json!({}));
        let c = config(json!({"out": "x/../../../tmp/evil", "win": "a\\b"}));
        assert_eq!(s.test_config_string(&c, true), "out-x......tmpevil,win-ab,");
        assert_eq!(
            s.test_config_string(&c, false),
            "out-x/../../../tmp/evil,win-a\\b,"
        );
    }

    #[test]
    fn test_grid_summary_string() {
        let (s, _dir) = settings(json!({}));
        let maps = serde_json::from_value(json!([
            {"method": ["A", "B"], "num_packing": [1, 2]},
            {"method": ["C"]},
        ]))
        .unwrap();
        let grid = GridSpec::from_maps(maps).unwrap();
        assert_eq!(
            s.grid_summary_string(grid.groups()),
            "method-[\"A\",\"B\"],num_packing-[1,2],+method-[\"C\"],+"
        );
    }
}
