// Typed command builder and the collected reply of one command.
//
// Keys are `&'static str` and the builder adds the `=` / `?` prefixes, so a
// caller cannot hand the wire a parameter word without its sigil.

use std::fmt;

use crate::sentence::{Row, Sentence};

/// One command ready to be written to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: String,
    words: Vec<String>,
}

impl Request {
    /// Start a request for `command`, e.g. `/ip/hotspot/user/print`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            words: Vec::new(),
        }
    }

    /// Add an `=key=value` parameter.
    pub fn attribute(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.words.push(format!("={key}={value}"));
        self
    }

    /// Add an `=key=value` parameter only when `value` is present.
    pub fn attribute_opt<V: fmt::Display>(self, key: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.attribute(key, v),
            None => self,
        }
    }

    /// Add a `?key=value` row filter.
    pub fn query(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.words.push(format!("?{key}={value}"));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Parameter and filter words, in insertion order.
    pub fn params(&self) -> &[String] {
        &self.words
    }

    pub fn to_sentence(&self) -> Sentence {
        let mut sentence = Sentence::from_words([self.command.as_str()]);
        for word in &self.words {
            sentence.push(word.as_str());
        }
        sentence
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)?;
        for word in &self.words {
            // Never echo secrets into logs.
            if word.starts_with("=password=") || word.starts_with("=response=") {
                write!(f, " {}", redact(word))?;
            } else {
                write!(f, " {word}")?;
            }
        }
        Ok(())
    }
}

fn redact(word: &str) -> String {
    let key = word
        .strip_prefix('=')
        .and_then(|rest| rest.split_once('='))
        .map_or("", |(k, _)| k);
    format!("={key}=***")
}

impl From<Request> for Sentence {
    fn from(request: Request) -> Self {
        request.to_sentence()
    }
}

/// Everything a device sent back for one successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// One row per `!re` sentence, in arrival order.
    pub rows: Vec<Row>,
    /// The `=ret=` value carried by `!done`, if any.
    pub ret: Option<String>,
}

impl Response {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_adds_prefixes_in_order() {
        let request = Request::new("/ip/hotspot/user/add")
            .attribute("name", "V1")
            .attribute("limit-bytes-total", 1_048_576)
            .query("profile", "default");
        assert_eq!(
            request.to_sentence().words(),
            [
                "/ip/hotspot/user/add",
                "=name=V1",
                "=limit-bytes-total=1048576",
                "?profile=default",
            ]
        );
    }

    #[test]
    fn optional_attribute_is_skipped_when_absent() {
        let request = Request::new("/ip/hotspot/user/add")
            .attribute_opt("limit-uptime", None::<&str>)
            .attribute_opt("profile", Some("default"));
        assert_eq!(request.params(), ["=profile=default"]);
    }

    #[test]
    fn display_redacts_secrets() {
        let request = Request::new("/login")
            .attribute("name", "admin")
            .attribute("password", "hunter2");
        assert_eq!(request.to_string(), "/login =name=admin =password=***");
    }
}
