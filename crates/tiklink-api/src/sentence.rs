// Sentence and word model
//
// A sentence is an ordered list of words. The first word says what the
// sentence is (a command path or a reply tag); the rest are attributes
// (`=key=value`), queries (`?key=value`), or API attributes (`.tag=N`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Attribute map of one reply row, e.g. `{".id": "*1", "name": "V1"}`.
pub type Row = BTreeMap<String, String>;

/// Reply tags a device may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr)]
pub enum ReplyTag {
    /// One streamed result row; more sentences follow.
    #[strum(serialize = "!re")]
    Re,
    /// Command complete (may carry `=ret=`).
    #[strum(serialize = "!done")]
    Done,
    /// Command-scoped error; the conversation continues.
    #[strum(serialize = "!trap")]
    Trap,
    /// Connection-fatal error; the device closes the socket.
    #[strum(serialize = "!fatal")]
    Fatal,
}

impl ReplyTag {
    /// Parse a bare word into a reply tag.
    pub fn from_word(word: &str) -> Option<Self> {
        Self::from_str(word).ok()
    }
}

/// Classified view of a single word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word<'a> {
    /// `/ip/hotspot/user/print`
    Command(&'a str),
    /// `!re`, `!done`, `!trap`, `!fatal`
    Reply(ReplyTag),
    /// `=key=value` (the value may itself contain `=`)
    Attribute { key: &'a str, value: &'a str },
    /// `?key=value` or `?key`
    Query { key: &'a str, value: &'a str },
    /// `.tag=value`
    ApiAttribute { key: &'a str, value: &'a str },
    /// Anything else, including the empty word.
    Other(&'a str),
}

impl<'a> Word<'a> {
    pub fn parse(word: &'a str) -> Self {
        if let Some(tag) = ReplyTag::from_word(word) {
            return Self::Reply(tag);
        }
        if word.starts_with('/') {
            return Self::Command(word);
        }
        if let Some(rest) = word.strip_prefix('=') {
            let (key, value) = split_pair(rest);
            return Self::Attribute { key, value };
        }
        if let Some(rest) = word.strip_prefix('?') {
            let (key, value) = split_pair(rest);
            return Self::Query { key, value };
        }
        if let Some((key, value)) = word.strip_prefix('.').and_then(|rest| rest.split_once('=')) {
            return Self::ApiAttribute { key, value };
        }
        Self::Other(word)
    }
}

fn split_pair(rest: &str) -> (&str, &str) {
    rest.split_once('=').unwrap_or((rest, ""))
}

/// One protocol message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Sentence {
    words: Vec<String>,
}

impl Sentence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// A sentence holding only the given reply tag.
    pub fn reply(tag: ReplyTag) -> Self {
        Self::from_words([tag.as_ref()])
    }

    pub fn push(&mut self, word: impl Into<String>) {
        self.words.push(word.into());
    }

    /// Append an `=key=value` word.
    pub fn with_attribute(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.words.push(format!("={key}={value}"));
        self
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The first word: a command path or a reply tag.
    pub fn head(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    pub fn reply_tag(&self) -> Option<ReplyTag> {
        self.head().and_then(ReplyTag::from_word)
    }

    /// Iterate the classified words after the head.
    pub fn tail(&self) -> impl Iterator<Item = Word<'_>> {
        self.words.iter().skip(1).map(|w| Word::parse(w))
    }

    /// Collect every `=key=value` word into a row.
    pub fn attributes(&self) -> Row {
        self.tail()
            .filter_map(|word| match word {
                Word::Attribute { key, value } => Some((key.to_owned(), value.to_owned())),
                _ => None,
            })
            .collect()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.tail().find_map(|word| match word {
            Word::Attribute { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }

    /// Every `?key=value` filter word, in order.
    pub fn queries(&self) -> Vec<(&str, &str)> {
        self.tail()
            .filter_map(|word| match word {
                Word::Query { key, value } => Some((key, value)),
                _ => None,
            })
            .collect()
    }

    /// The human-readable message of a `!trap` / `!fatal`.
    ///
    /// Devices send either `=message=<text>` or a bare text word.
    pub fn message(&self) -> Option<&str> {
        self.attribute("message").or_else(|| {
            self.tail().find_map(|word| match word {
                Word::Other(text) if !text.is_empty() => Some(text),
                _ => None,
            })
        })
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words.join(" "))
    }
}
