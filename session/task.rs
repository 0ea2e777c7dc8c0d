use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// In-progress workflow data shared by every screen of a session.
///
/// Any screen may write any key and the last write wins. A key that was never
/// written reads back as `None`, which is distinct from a stored `null`, empty
/// string or zero.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    entries: IndexMap<String, Value>,
}

impl TaskRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn last_write_wins() {
        let mut task = TaskRecord::new();
        assert_eq!(task.set("x", 1), None);
        assert_eq!(task.set("x", 2), Some(json!(1)));
        assert_eq!(task.get("x"), Some(&json!(2)));
        assert_eq!(task.len(), 1);
    }

    #[test]
    fn absent_is_not_a_zero_value() {
        let mut task = TaskRecord::new();
        assert_eq!(task.get("bidsDirectory"), None);

        task.set("bidsDirectory", "");
        task.set("lineFreq", 0);
        task.set("readOnly", false);
        task.set("edfData", Value::Null);

        assert_eq!(task.get_str("bidsDirectory"), Some(""));
        assert_eq!(task.get("lineFreq"), Some(&json!(0)));
        assert_eq!(task.get("readOnly"), Some(&json!(false)));
        assert_eq!(task.get("edfData"), Some(&Value::Null));
        assert!(!task.contains("session"));
    }

    #[test]
    fn keys_keep_insertion_order() {
        let mut task = TaskRecord::new();
        task.set("edfFile", "/data/a.edf");
        task.set("bidsDirectory", "/out");
        task.set("edfFile", "/data/b.edf");
        assert_eq!(task.keys().collect::<Vec<_>>(), vec!["edfFile", "bidsDirectory"]);
    }
}
