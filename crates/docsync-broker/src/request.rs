//! Request lines exchanged over the broker socket

use std::fmt;
use std::str::FromStr;

use docsync_store::{DocId, RevId};

use crate::Error;

/// Help text listing every accepted request form.
pub const USAGE: &str = "\
Request forms:
  doc:<hex id>   open the current revision of a document, keeping it in sync
  rev:<hex id>   open a read-only view of one revision
  kill           stop the running server";

/// One request, as given on the command line or received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Document(DocId),
    Revision(RevId),
    Kill,
}

impl FromStr for Request {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let invalid = || Error::InvalidRequest {
            line: line.to_string(),
        };
        if line == "kill" {
            Ok(Self::Kill)
        } else if let Some(hex) = line.strip_prefix("doc:") {
            DocId::from_hex(hex).map(Self::Document).map_err(|_| invalid())
        } else if let Some(hex) = line.strip_prefix("rev:") {
            RevId::from_hex(hex).map(Self::Revision).map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(doc) => write!(f, "doc:{doc}"),
            Self::Revision(rev) => write!(f, "rev:{rev}"),
            Self::Kill => f.write_str("kill"),
        }
    }
}
