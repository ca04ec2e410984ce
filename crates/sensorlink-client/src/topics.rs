//! Topic namespace.
//!
//! ```text
//! {prefix}meta/{name}   schema blob, qos 1, retained
//! {prefix}data/{name}   data packets, qos 0
//! ```

/// Subscription intent meaning "every sensor".
pub const ALL_SENSORS: &str = "#";

const META_SEGMENT: &str = "meta/";
const DATA_SEGMENT: &str = "data/";

/// Kind of an incoming sensor topic, with the sensor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorTopic<'a> {
    Meta(&'a str),
    Data(&'a str),
}

/// Builds and classifies sensor topics under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    meta_prefix: String,
    data_prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new("sensors/")
    }
}

impl TopicScheme {
    pub fn new(prefix: &str) -> Self {
        Self {
            meta_prefix: format!("{prefix}{META_SEGMENT}"),
            data_prefix: format!("{prefix}{DATA_SEGMENT}"),
        }
    }

    pub fn meta_topic(&self, name: &str) -> String {
        format!("{}{}", self.meta_prefix, name)
    }

    pub fn data_topic(&self, name: &str) -> String {
        format!("{}{}", self.data_prefix, name)
    }

    /// `{prefix}meta/#`
    pub fn meta_wildcard(&self) -> String {
        self.meta_topic(ALL_SENSORS)
    }

    /// `{prefix}data/#`
    pub fn data_wildcard(&self) -> String {
        self.data_topic(ALL_SENSORS)
    }

    /// Classify an incoming topic. Topics outside the namespace, and
    /// topics with an empty sensor name, yield `None`.
    pub fn classify<'a>(&self, topic: &'a str) -> Option<SensorTopic<'a>> {
        if let Some(name) = topic.strip_prefix(&self.meta_prefix) {
            return (!name.is_empty()).then_some(SensorTopic::Meta(name));
        }
        if let Some(name) = topic.strip_prefix(&self.data_prefix) {
            return (!name.is_empty()).then_some(SensorTopic::Data(name));
        }
        None
    }
}
